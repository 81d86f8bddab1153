//! Credential login and MFA code entry.
//!
//! Element discovery is heuristic: a few known services carry their own
//! selector lists, everything else falls through to generic guesses. A
//! detected second factor is reported, never guessed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use webhands_protocols::{AuthMode, Credential};

use super::interaction::js_str;
use super::{BrowserTool, CallOptions, Outcome};
use crate::driver::LivePage;
use crate::engine::Engine;
use crate::error::BrowserError;
use crate::html::{Form, FormField};
use crate::snapshot::{RefKind, Snapshot};

const FIELD_POLL: Duration = Duration::from_millis(250);
const OTP_MARK_ATTR: &str = "data-webhands-otp";
/// Below this many one-character boxes a page is treated as a single field.
const MIN_OTP_BOXES: usize = 4;

/// Selector guesses for one service, tried in order.
struct ServiceProfile {
    name: &'static str,
    identifier: &'static [&'static str],
    password: &'static [&'static str],
    next: &'static [&'static str],
    submit: &'static [&'static str],
}

const PROFILES: &[ServiceProfile] = &[
    ServiceProfile {
        name: "github",
        identifier: &["#login_field", "input[name=login]"],
        password: &["#password"],
        next: &[],
        submit: &["input[name=commit]"],
    },
    ServiceProfile {
        name: "google",
        identifier: &["#identifierId", "input[type=email]"],
        password: &["input[name=Passwd]"],
        next: &["#identifierNext button", "#identifierNext"],
        submit: &["#passwordNext button", "#passwordNext"],
    },
    ServiceProfile {
        name: "microsoft",
        identifier: &["input[name=loginfmt]"],
        password: &["input[name=passwd]"],
        next: &["#idSIButton9"],
        submit: &["#idSIButton9"],
    },
    ServiceProfile {
        name: "gitlab",
        identifier: &["#user_login", "input[name='user[login]']"],
        password: &["#user_password"],
        next: &[],
        submit: &["button[data-testid=sign-in-button]", "input[name=commit]"],
    },
];

const GENERIC: ServiceProfile = ServiceProfile {
    name: "generic",
    identifier: &[
        "input[autocomplete=username]",
        "input[type=email]",
        "input[name=username]",
        "input[name=email]",
        "input[name=login]",
        "input[name=user]",
        "input[id*=user i]",
        "input[id*=email i]",
        "input[type=text]",
    ],
    password: &["input[autocomplete=current-password]", "input[type=password]"],
    next: &[
        "button[id*=next i]",
        "button[name*=next i]",
        "button[type=submit]",
        "input[type=submit]",
    ],
    submit: &[
        "button[type=submit]",
        "input[type=submit]",
        "button[name*=login i]",
        "button[id*=login i]",
        "button[id*=sign i]",
    ],
};

const OTP_SELECTORS: &[&str] = &[
    "input[autocomplete=one-time-code]",
    "input[name*=otp i]",
    "input[id*=otp i]",
    "input[name*=totp i]",
    "input[name*=code i]",
    "input[id*=code i]",
    "input[inputmode=numeric]",
    "input[type=tel]",
    "input[type=number]",
];

const MFA_SUBMIT: &[&str] = &[
    "button[type=submit]",
    "input[type=submit]",
    "button[id*=verify i]",
    "button[name*=verify i]",
    "button[id*=submit i]",
];

const OTP_NAME_HINTS: &[&str] = &[
    "otp", "totp", "one-time", "onetime", "one_time", "2fa", "mfa", "code", "verification",
];

const MFA_TEXT_HINTS: &[&str] = &[
    "two-factor",
    "two factor",
    "2-step",
    "two-step",
    "verification code",
    "authentication code",
    "security code",
    "one-time code",
    "one-time password",
    "authenticator app",
    "enter the code",
];

const IDENTIFIER_HINTS: &[&str] = &["user", "login", "email", "ident", "account", "name"];

/// Tags visible one-character inputs and returns how many there are.
const OTP_BOXES_SCRIPT: &str = r#"(() => {
  const boxes = Array.from(document.querySelectorAll('input')).filter(el => {
    const type = (el.type || 'text').toLowerCase();
    if (!['text', 'tel', 'number', 'password'].includes(type)) return false;
    if (el.maxLength !== 1) return false;
    const r = el.getBoundingClientRect();
    return r.width > 0 && r.height > 0;
  });
  boxes.forEach((el, i) => el.setAttribute('data-webhands-otp', String(i)));
  return boxes.length;
})()"#;

/// Service names to try for a credential, most specific first:
/// the explicit name, the host without `www.`, its registrable part
/// and the bare second-level label.
pub fn service_candidates(explicit: Option<&str>, url: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    };

    if let Some(name) = explicit {
        push(name.trim().to_ascii_lowercase());
    }
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
    if let Some(host) = host {
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        let labels: Vec<&str> = host.split('.').collect();
        push(host.clone());
        if labels.len() >= 2 {
            push(labels[labels.len() - 2..].join("."));
            push(labels[labels.len() - 2].to_string());
        }
    }
    out
}

fn profile_for(candidates: &[String]) -> Option<&'static ServiceProfile> {
    candidates
        .iter()
        .find_map(|c| PROFILES.iter().find(|p| p.name == c.as_str()))
}

/// Known-service selectors followed by the generic ones.
fn selectors(profile: Option<&ServiceProfile>, pick: fn(&ServiceProfile) -> &'static [&'static str]) -> Vec<&'static str> {
    let mut list: Vec<&'static str> = profile.map(|p| pick(p).to_vec()).unwrap_or_default();
    for s in pick(&GENERIC) {
        if !list.contains(s) {
            list.push(s);
        }
    }
    list
}

fn first_present_script(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
  const list = {};
  return list.find(s => {{
    try {{
      const el = document.querySelector(s);
      return !!el && el.getClientRects().length > 0;
    }} catch (e) {{ return false; }}
  }}) || null;
}})()"#,
        json!(selectors)
    )
}

/// First selector matching a rendered element.
async fn first_present(page: &Arc<dyn LivePage>, selectors: &[&str]) -> Result<Option<String>, BrowserError> {
    if selectors.is_empty() {
        return Ok(None);
    }
    let found = page.evaluate(&first_present_script(selectors)).await?;
    Ok(found.as_str().map(str::to_string))
}

fn looks_like_otp(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    OTP_NAME_HINTS.iter().any(|hint| name.contains(hint))
}

fn is_otp_field(field: &FormField) -> bool {
    field.field_type != "hidden" && looks_like_otp(&field.name)
}

/// Whether a page asks for a second factor: an OTP-shaped input or
/// tell-tale wording.
pub(crate) fn detect_mfa(snapshot: &Snapshot) -> bool {
    let otp_field = snapshot.refs.iter().any(|r| {
        r.kind == RefKind::Field
            && r.field_type.as_deref() != Some("hidden")
            && (r.field.as_deref().is_some_and(looks_like_otp) || looks_like_otp(&r.name))
    });
    if otp_field {
        return true;
    }
    let text = snapshot.text.to_lowercase();
    MFA_TEXT_HINTS.iter().any(|hint| text.contains(hint))
}

fn is_identifier_field(field: &FormField) -> bool {
    matches!(field.field_type.as_str(), "email" | "text" | "tel")
        && (field.field_type == "email"
            || IDENTIFIER_HINTS
                .iter()
                .any(|hint| field.name.to_ascii_lowercase().contains(hint)))
}

/// The login form of a fetched page: one with a password field wins over
/// one with only an identifier field.
fn login_form(forms: &[Form]) -> Option<(usize, Option<String>, Option<String>)> {
    let describe = |form: &Form| {
        let password = form
            .fields
            .iter()
            .find(|f| f.field_type == "password")
            .map(|f| f.name.clone());
        let identifier = form
            .fields
            .iter()
            .find(|f| is_identifier_field(f))
            .map(|f| f.name.clone());
        (form.index, identifier, password)
    };
    forms
        .iter()
        .map(describe)
        .find(|(_, _, password)| password.is_some())
        .or_else(|| forms.iter().map(describe).find(|(_, identifier, _)| identifier.is_some()))
}

fn mfa_form(forms: &[Form]) -> Option<(usize, Vec<String>)> {
    forms.iter().find_map(|form| {
        let fields: Vec<String> = form
            .fields
            .iter()
            .filter(|f| is_otp_field(f))
            .map(|f| f.name.clone())
            .collect();
        (!fields.is_empty()).then_some((form.index, fields))
    })
}

impl BrowserTool {
    async fn find_credential(&self, candidates: &[String]) -> Result<(String, Credential), BrowserError> {
        for service in candidates {
            if let Some(credential) = self.credentials.get_credential(service).await? {
                return Ok((service.clone(), credential));
            }
        }
        Err(BrowserError::CredentialNotFound(candidates.join(", ")))
    }

    pub(super) async fn login(&self, call: &CallOptions, service: Option<String>) -> Result<Outcome, BrowserError> {
        let (tab_id, decision) = self.target(call)?;
        let url = self.state.lock().get(&tab_id)?.url.clone();
        let candidates = service_candidates(service.as_deref(), &url);
        let (service, credential) = self.find_credential(&candidates).await?;
        let passwordless = credential.auth_mode == AuthMode::Passwordless;
        info!("Signing in to {} on tab {}", service, tab_id);

        let outcome = match decision.engine {
            Engine::Live => {
                let profile = profile_for(&candidates);
                self.live_login(call, &tab_id, profile, &credential).await?
            }
            Engine::Fetch => self.fetch_login(call, &tab_id, &credential).await?,
        };
        let requires_mfa = outcome.snapshot.as_deref().is_some_and(detect_mfa);
        if requires_mfa {
            info!("{} asks for a second factor", service);
        }
        Ok(outcome
            .with_decision(&decision)
            .with("service", service)
            .with("identifier", credential.identifier.clone())
            .with("authMode", json!(credential.auth_mode))
            .with("passwordless", passwordless)
            .with("requiresMfa", requires_mfa))
    }

    async fn wait_for_any(
        &self,
        page: &Arc<dyn LivePage>,
        selectors: &[&str],
        timeout: Duration,
    ) -> Result<Option<String>, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = first_present(page, selectors).await? {
                return Ok(Some(found));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(FIELD_POLL).await;
        }
    }

    async fn live_login(
        &self,
        call: &CallOptions,
        tab_id: &str,
        profile: Option<&'static ServiceProfile>,
        credential: &Credential,
    ) -> Result<Outcome, BrowserError> {
        let page = self.ensure_live_page(tab_id, call).await?;
        let identifiers = selectors(profile, |p| p.identifier);
        let passwords = selectors(profile, |p| p.password);
        let nexts = selectors(profile, |p| p.next);
        let submits = selectors(profile, |p| p.submit);
        let passwordless = credential.auth_mode == AuthMode::Passwordless;

        let identifier = first_present(&page, &identifiers)
            .await?
            .ok_or_else(|| BrowserError::ElementNotFound("login identifier field".to_string()))?;
        page.fill(&identifier, &credential.identifier, call.action_timeout).await?;

        let mut password = first_present(&page, &passwords).await?;
        let mut continued = false;
        if password.is_none() {
            if let Some(next) = first_present(&page, &nexts).await? {
                debug!("Two-step login: continuing with {}", next);
                page.click(&next, call.action_timeout).await?;
                continued = true;
            }
            if !passwordless {
                password = self.wait_for_any(&page, &passwords, call.action_timeout).await?;
            }
        }

        if passwordless {
            if !continued {
                self.press_or_click(&page, &submits, &identifier, call).await?;
            }
        } else {
            let password = password
                .ok_or_else(|| BrowserError::ElementNotFound("login password field".to_string()))?;
            page.fill(&password, &credential.secret, call.action_timeout).await?;
            self.press_or_click(&page, &submits, &password, call).await?;
        }

        if let Err(e) = page.wait_for_load(call.navigation_timeout).await {
            debug!("Waiting for load after login: {}", e);
        }
        let snapshot = self.capture_live(tab_id, &page, None, &call.limits, true).await?;
        Ok(Outcome::on(Engine::Live, tab_id).with_snapshot(Some(snapshot)))
    }

    /// Click the first present button of `buttons`, else press Enter in `field`.
    async fn press_or_click(
        &self,
        page: &Arc<dyn LivePage>,
        buttons: &[&str],
        field: &str,
        call: &CallOptions,
    ) -> Result<&'static str, BrowserError> {
        let before = page.url().await.unwrap_or_default();
        let via = match first_present(page, buttons).await? {
            Some(button) => {
                page.click(&button, call.action_timeout).await?;
                "click"
            }
            None => {
                page.press("Enter", Some(field)).await?;
                "enter"
            }
        };
        let deadline = Instant::now() + self.config.popup_wait;
        while page.url().await.unwrap_or_default() == before && Instant::now() < deadline {
            tokio::time::sleep(FIELD_POLL).await;
        }
        Ok(via)
    }

    async fn fetch_login(&self, call: &CallOptions, tab_id: &str, credential: &Credential) -> Result<Outcome, BrowserError> {
        let passwordless = credential.auth_mode == AuthMode::Passwordless;
        self.ensure_snapshot(tab_id, call).await?;

        let mut password_sent = false;
        let mut outcome = None;
        // Identifier-first pages get a second round once the password form shows up.
        for step in 0..2 {
            let found = login_form(&self.state.lock().get(tab_id)?.forms);
            let Some((index, identifier, password)) = found else {
                if step == 0 {
                    return Err(BrowserError::ElementNotFound("login form".to_string()));
                }
                break;
            };
            if step > 0 && (password.is_none() || passwordless) {
                break;
            }
            {
                let mut state = self.state.lock();
                let values = state.get_mut(tab_id)?.form_values.entry(index).or_default();
                if let Some(name) = &identifier {
                    values.insert(name.clone(), credential.identifier.clone());
                }
                if let (Some(name), false) = (&password, passwordless) {
                    values.insert(name.clone(), credential.secret.clone());
                    password_sent = true;
                }
            }
            debug!("Submitting login form {} (step {})", index, step + 1);
            outcome = Some(self.submit_fetch_form(call, tab_id, index).await?);
            if password_sent || passwordless {
                break;
            }
        }
        outcome.ok_or_else(|| BrowserError::ElementNotFound("login form".to_string()))
    }

    pub(super) async fn mfa(&self, call: &CallOptions, code: &str) -> Result<Outcome, BrowserError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(BrowserError::MissingParameter("code".to_string()));
        }
        let (tab_id, decision) = self.target(call)?;
        let outcome = match decision.engine {
            Engine::Live => self.live_mfa(call, &tab_id, code).await?,
            Engine::Fetch => self.fetch_mfa(call, &tab_id, code).await?,
        };
        let still_required = outcome.snapshot.as_deref().is_some_and(detect_mfa);
        Ok(outcome
            .with_decision(&decision)
            .with("requiresMfa", still_required))
    }

    async fn live_mfa(&self, call: &CallOptions, tab_id: &str, code: &str) -> Result<Outcome, BrowserError> {
        let page = self.ensure_live_page(tab_id, call).await?;
        let boxes = page
            .evaluate(OTP_BOXES_SCRIPT)
            .await?
            .as_u64()
            .unwrap_or(0) as usize;

        let (last_field, layout) = if boxes >= MIN_OTP_BOXES {
            let mut last = String::new();
            for (i, ch) in code.chars().take(boxes).enumerate() {
                let selector = format!("[{}={}]", OTP_MARK_ATTR, js_str(&i.to_string()));
                page.fill(&selector, &ch.to_string(), call.action_timeout).await?;
                last = selector;
            }
            (last, "multi")
        } else {
            let field = first_present(&page, OTP_SELECTORS)
                .await?
                .ok_or_else(|| BrowserError::ElementNotFound("one-time code field".to_string()))?;
            page.fill(&field, code, call.action_timeout).await?;
            (field, "single")
        };
        debug!("Entered MFA code on tab {} ({} layout)", tab_id, layout);

        let via = self.press_or_click(&page, MFA_SUBMIT, &last_field, call).await?;
        if let Err(e) = page.wait_for_load(call.navigation_timeout).await {
            debug!("Waiting for load after MFA: {}", e);
        }
        let snapshot = self.capture_live(tab_id, &page, None, &call.limits, true).await?;
        Ok(Outcome::on(Engine::Live, tab_id)
            .with_snapshot(Some(snapshot))
            .with("layout", layout)
            .with("via", via))
    }

    async fn fetch_mfa(&self, call: &CallOptions, tab_id: &str, code: &str) -> Result<Outcome, BrowserError> {
        self.ensure_snapshot(tab_id, call).await?;
        let (index, fields) = mfa_form(&self.state.lock().get(tab_id)?.forms)
            .ok_or_else(|| BrowserError::ElementNotFound("one-time code field".to_string()))?;

        let chars: Vec<char> = code.chars().collect();
        let layout = {
            let mut state = self.state.lock();
            let values = state.get_mut(tab_id)?.form_values.entry(index).or_default();
            if fields.len() >= MIN_OTP_BOXES && fields.len() == chars.len() {
                for (name, ch) in fields.iter().zip(&chars) {
                    values.insert(name.clone(), ch.to_string());
                }
                "multi"
            } else {
                values.insert(fields[0].clone(), code.to_string());
                "single"
            }
        };
        let outcome = self.submit_fetch_form(call, tab_id, index).await?;
        Ok(outcome.with("layout", layout).with("via", "submit"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::FormMethod;

    fn field(name: &str, field_type: &str) -> FormField {
        FormField {
            name: name.to_string(),
            field_type: field_type.to_string(),
            value: String::new(),
            required: false,
            checked: None,
        }
    }

    fn form(index: usize, fields: Vec<FormField>) -> Form {
        Form {
            index,
            method: FormMethod::Post,
            action: "https://x.test/session".to_string(),
            fields,
            submit_label: None,
        }
    }

    #[test]
    fn test_service_candidates_order_and_dedup() {
        assert_eq!(
            service_candidates(Some("GitHub"), "https://www.github.com/login"),
            vec!["github", "github.com"]
        );
        assert_eq!(
            service_candidates(None, "https://accounts.google.com/signin"),
            vec!["accounts.google.com", "google.com", "google"]
        );
        assert!(service_candidates(None, "not a url").is_empty());
    }

    #[test]
    fn test_profile_lookup_uses_first_known_candidate() {
        let candidates = service_candidates(None, "https://gitlab.com/users/sign_in");
        assert_eq!(profile_for(&candidates).map(|p| p.name), Some("gitlab"));
        assert!(profile_for(&["example".to_string()]).is_none());
    }

    #[test]
    fn test_selectors_put_service_guesses_first() {
        let github = profile_for(&["github".to_string()]);
        let list = selectors(github, |p| p.identifier);
        assert_eq!(list[0], "#login_field");
        assert!(list.contains(&"input[type=email]"));
        assert_eq!(list.iter().filter(|s| **s == "input[name=login]").count(), 1);
    }

    #[test]
    fn test_login_form_prefers_password_form() {
        let forms = vec![
            form(1, vec![field("q", "text")]),
            form(2, vec![field("email", "email")]),
            form(3, vec![field("user", "text"), field("pass", "password"), field("csrf", "hidden")]),
        ];
        assert_eq!(
            login_form(&forms),
            Some((3, Some("user".to_string()), Some("pass".to_string())))
        );
        assert_eq!(login_form(&forms[..2]), Some((2, Some("email".to_string()), None)));
        assert_eq!(login_form(&forms[..1]), None);
    }

    #[test]
    fn test_mfa_form_ignores_hidden_tokens() {
        let forms = vec![
            form(1, vec![field("authenticity_token", "hidden"), field("otp_code", "hidden")]),
            form(2, vec![field("d1_code", "text"), field("d2_code", "text")]),
        ];
        assert_eq!(
            mfa_form(&forms),
            Some((2, vec!["d1_code".to_string(), "d2_code".to_string()]))
        );
    }

    #[test]
    fn test_first_present_script_embeds_selectors() {
        let script = first_present_script(&["#a", "input[name='x']"]);
        assert!(script.contains(r##"["#a","input[name='x']"]"##));
    }
}
