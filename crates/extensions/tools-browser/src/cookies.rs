//! Per-tab cookie jar.
//!
//! Fed from `Set-Cookie` headers on the fetch engine and refreshed from the
//! browser context on the live engine. Entries are scoped to the domain and
//! path that set them and evicted by `Max-Age`/`Expires`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::trace;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    /// Without a `Domain` attribute the cookie only goes back to its exact host.
    #[serde(skip)]
    pub host_only: bool,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub secure: bool,
}

impl Cookie {
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let domain_ok = host == self.domain
            || (!self.host_only && host.ends_with(&format!(".{}", self.domain)));
        let path_ok = url.path().starts_with(&self.path);
        let secure_ok = !self.secure || url.scheme() == "https";
        domain_ok && path_ok && secure_ok
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Apply one `Set-Cookie` header received from `url`.
    pub fn store(&mut self, header: &str, url: &Url) {
        self.store_at(header, url, Utc::now());
    }

    pub(crate) fn store_at(&mut self, header: &str, url: &Url, now: DateTime<Utc>) {
        let Some(parsed) = parse_set_cookie(header, url, now) else {
            trace!("Ignoring unparseable Set-Cookie: {}", header);
            return;
        };
        self.cookies
            .retain(|c| !(c.name == parsed.name && c.domain == parsed.domain && c.path == parsed.path));
        if !parsed.is_expired(now) {
            self.cookies.push(parsed);
        }
    }

    /// Insert or replace a cookie reported by the live browser context.
    pub fn upsert(&mut self, cookie: Cookie) {
        self.cookies
            .retain(|c| !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path));
        self.cookies.push(cookie);
    }

    pub fn replace_all(&mut self, cookies: Vec<Cookie>) {
        self.cookies = cookies;
    }

    pub fn purge_expired(&mut self) {
        let now = Utc::now();
        self.cookies.retain(|c| !c.is_expired(now));
    }

    /// `Cookie` request header value for `url`, if any cookie applies.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let now = Utc::now();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Flat name→value view used in result envelopes.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.cookies
            .iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

/// Parse one `Set-Cookie` header. Returns `None` for malformed headers or a
/// `Domain` the request host may not set.
pub fn parse_set_cookie(header: &str, url: &Url, now: DateTime<Utc>) -> Option<Cookie> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        domain: host.clone(),
        host_only: true,
        path: default_path(url),
        expires: None,
        secure: false,
    };
    let mut max_age: Option<i64> = None;

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim()),
            None => (attr.trim().to_ascii_lowercase(), ""),
        };
        match key.as_str() {
            "domain" if !val.is_empty() => {
                let domain = val.trim_start_matches('.').to_ascii_lowercase();
                if host != domain && !host.ends_with(&format!(".{}", domain)) {
                    return None;
                }
                cookie.domain = domain;
                cookie.host_only = false;
            }
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "max-age" => max_age = val.parse().ok(),
            "expires" => cookie.expires = parse_cookie_date(val),
            "secure" => cookie.secure = true,
            _ => {}
        }
    }

    if let Some(secs) = max_age {
        cookie.expires = Some(if secs <= 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            chrono::Duration::try_seconds(secs)
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
    }
    Some(cookie)
}

fn parse_cookie_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let dashed = raw.replace('-', " ");
    if let Ok(dt) = DateTime::parse_from_rfc2822(&dashed) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a, %d-%b-%Y %H:%M:%S GMT"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_store_and_header() {
        let mut jar = CookieJar::new();
        let u = url("https://example.com/login");
        jar.store("session=abc123; Path=/; HttpOnly", &u);
        jar.store("theme=dark", &u);
        assert_eq!(jar.get("session"), Some("abc123"));
        assert_eq!(
            jar.header_for(&url("https://example.com/account")).as_deref(),
            Some("session=abc123; theme=dark")
        );
    }

    #[test]
    fn test_host_only_scoping() {
        let mut jar = CookieJar::new();
        jar.store("a=1; Path=/", &url("https://example.com/"));
        assert!(jar.header_for(&url("https://sub.example.com/")).is_none());
        assert!(jar.header_for(&url("https://other.org/")).is_none());
    }

    #[test]
    fn test_domain_attribute_covers_subdomains() {
        let mut jar = CookieJar::new();
        jar.store("a=1; Domain=.example.com; Path=/", &url("https://www.example.com/"));
        assert_eq!(
            jar.header_for(&url("https://api.example.com/v1")).as_deref(),
            Some("a=1")
        );
    }

    #[test]
    fn test_foreign_domain_rejected() {
        let mut jar = CookieJar::new();
        jar.store("a=1; Domain=evil.org", &url("https://example.com/"));
        assert!(jar.is_empty());
    }

    #[test]
    fn test_path_scoping_and_default_path() {
        let mut jar = CookieJar::new();
        jar.store("a=1", &url("https://example.com/app/login"));
        assert!(jar.header_for(&url("https://example.com/other")).is_none());
        assert_eq!(jar.header_for(&url("https://example.com/app/home")).as_deref(), Some("a=1"));
    }

    #[test]
    fn test_max_age_zero_evicts() {
        let mut jar = CookieJar::new();
        let u = url("https://example.com/");
        jar.store("session=abc; Path=/", &u);
        jar.store("session=; Max-Age=0; Path=/", &u);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_past_expires_evicts() {
        let mut jar = CookieJar::new();
        let u = url("https://example.com/");
        jar.store("a=1; Path=/", &u);
        jar.store("a=1; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT", &u);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_dashed_expires_parses() {
        let parsed = parse_cookie_date("Wed, 21-Oct-2037 07:28:00 GMT").unwrap();
        assert_eq!(parsed.timestamp(), 2139722880);
    }

    #[test]
    fn test_max_age_wins_over_expires() {
        let now = Utc::now();
        let cookie = parse_set_cookie(
            "a=1; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=60",
            &url("https://example.com/"),
            now,
        )
        .unwrap();
        assert_eq!(cookie.expires, Some(now + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_huge_max_age_saturates() {
        let u = url("https://example.com/");
        for raw in ["sid=1; Max-Age=100000000000000; Path=/", "sid=1; Max-Age=9223372036854775807"] {
            let cookie = parse_set_cookie(raw, &u, Utc::now()).unwrap();
            assert_eq!(cookie.expires, Some(DateTime::<Utc>::MAX_UTC));
        }

        let mut jar = CookieJar::new();
        jar.store("sid=1; Max-Age=100000000000000; Path=/", &u);
        assert_eq!(jar.header_for(&u).as_deref(), Some("sid=1"));
    }

    #[test]
    fn test_secure_cookie_not_sent_over_http() {
        let mut jar = CookieJar::new();
        jar.store("a=1; Secure; Path=/", &url("https://example.com/"));
        assert!(jar.header_for(&url("http://example.com/")).is_none());
    }

    #[test]
    fn test_malformed_header_ignored() {
        let mut jar = CookieJar::new();
        jar.store("novalue", &url("https://example.com/"));
        jar.store("=x", &url("https://example.com/"));
        assert!(jar.is_empty());
    }
}
