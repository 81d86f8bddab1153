//! Link, form and title extraction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static RE_RAW_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "style", "noscript", "template"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
        .collect()
});

static RE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").unwrap());

static RE_BASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<base\b([^>]*)>").unwrap());

static RE_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").unwrap());

static RE_IMG_ALT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<img\b[^>]*\balt\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static RE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:@][-a-zA-Z0-9_:.@]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .unwrap()
});

static RE_FORM_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<form\b([^>]*)>").unwrap());

static RE_FORM_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</form\s*>").unwrap());

static RE_CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(input|textarea|select|button)\b([^>]*)>").unwrap());

static RE_OPTION_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<option\b([^>]*)>").unwrap());

static RE_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});").unwrap()
});

/// Input types that never become editable fields.
const NON_FIELD_INPUTS: &[&str] = &["submit", "button", "image", "reset", "file"];

/// A hyperlink extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMethod {
    Get,
    Post,
}

/// One submittable control of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: String,
    pub required: bool,
    /// `Some` only for checkboxes and radio groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

/// A form extracted from a document. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub index: usize,
    pub method: FormMethod,
    pub action: String,
    pub fields: Vec<FormField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_label: Option<String>,
}

impl Form {
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name/value pairs to submit, with caller overrides applied. Unchecked
    /// checkboxes and radio groups are left out unless overridden.
    pub fn encoded_pairs(&self, overrides: &BTreeMap<String, String>) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter_map(|f| match overrides.get(&f.name) {
                Some(value) => Some((f.name.clone(), value.clone())),
                None if f.checked == Some(false) => None,
                None => Some((f.name.clone(), f.value.clone())),
            })
            .collect()
    }
}

/// Decode the common named entities and all numeric character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    RE_ENTITY
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            if let Some(num) = entity.strip_prefix('#') {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                return code
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string());
            }
            let decoded = match entity {
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                "apos" => "'",
                "nbsp" => " ",
                "copy" => "\u{a9}",
                "reg" => "\u{ae}",
                "trade" => "\u{2122}",
                "hellip" => "\u{2026}",
                "mdash" => "\u{2014}",
                "ndash" => "\u{2013}",
                "lsquo" => "\u{2018}",
                "rsquo" => "\u{2019}",
                "ldquo" => "\u{201c}",
                "rdquo" => "\u{201d}",
                "laquo" => "\u{ab}",
                "raquo" => "\u{bb}",
                "middot" => "\u{b7}",
                "bull" => "\u{2022}",
                _ => return caps[0].to_string(),
            };
            decoded.to_string()
        })
        .into_owned()
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove comments and raw-text blocks whose contents are not markup.
pub(crate) fn strip_non_content(html: &str) -> String {
    let mut out = RE_COMMENT.replace_all(html, "").into_owned();
    for re in RE_RAW_BLOCKS.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    out
}

fn inner_text(fragment: &str) -> String {
    collapse_whitespace(&decode_entities(&RE_TAG.replace_all(fragment, " ")))
}

/// Parse a tag's attribute string. Names are lowercased; the first
/// occurrence of a name wins; bare attributes map to an empty string.
pub(crate) fn parse_attrs(raw: &str) -> HashMap<String, String> {
    let raw = raw.trim_end().trim_end_matches('/');
    let mut attrs = HashMap::new();
    for caps in RE_ATTR.captures_iter(raw) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| decode_entities(m.as_str()))
            .unwrap_or_default();
        attrs.entry(name).or_insert(value);
    }
    attrs
}

/// Document title, entity-decoded and whitespace-collapsed.
pub fn parse_title(html: &str) -> Option<String> {
    RE_TITLE
        .captures(html)
        .map(|caps| collapse_whitespace(&decode_entities(&caps[1])))
        .filter(|t| !t.is_empty())
}

/// Base URL for relative links: `<base href>` when present, else `url`.
pub fn document_base(html: &str, url: &Url) -> Url {
    RE_BASE
        .captures(html)
        .and_then(|caps| parse_attrs(&caps[1]).remove("href"))
        .and_then(|href| url.join(href.trim()).ok())
        .unwrap_or_else(|| url.clone())
}

fn resolve_http(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Links in document order, deduplicated by absolute URL, capped at `max_links`.
pub fn parse_links(html: &str, base: &Url, max_links: usize) -> Vec<Link> {
    let cleaned = strip_non_content(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for caps in RE_ANCHOR.captures_iter(&cleaned) {
        if links.len() >= max_links {
            break;
        }
        let attrs = parse_attrs(&caps[1]);
        let Some(url) = attrs.get("href").and_then(|href| resolve_http(base, href)) else {
            continue;
        };
        let url = url.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        let inner = &caps[2];
        let mut text = inner_text(inner);
        if text.is_empty() {
            text = attrs
                .get("aria-label")
                .or_else(|| attrs.get("title"))
                .map(|s| collapse_whitespace(s))
                .or_else(|| {
                    RE_IMG_ALT.captures(inner).and_then(|c| {
                        c.get(1)
                            .or_else(|| c.get(2))
                            .map(|m| collapse_whitespace(&decode_entities(m.as_str())))
                    })
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| url.clone());
        }
        links.push(Link { url, text });
    }
    links
}

/// Forms in document order. An unclosed form runs to the next `<form` or
/// the end of the document.
pub fn parse_forms(html: &str, base: &Url) -> Vec<Form> {
    let cleaned = strip_non_content(html);
    let opens: Vec<(usize, usize, String)> = RE_FORM_OPEN
        .captures_iter(&cleaned)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            Some((m.start(), m.end(), caps[1].to_string()))
        })
        .collect();

    let mut forms = Vec::with_capacity(opens.len());
    for (i, (_, body_start, raw_attrs)) in opens.iter().enumerate() {
        let next_open = opens.get(i + 1).map(|o| o.0).unwrap_or(cleaned.len());
        let close = RE_FORM_CLOSE
            .find_at(&cleaned, *body_start)
            .map(|m| m.start())
            .unwrap_or(cleaned.len());
        let body = &cleaned[*body_start..close.min(next_open)];

        let attrs = parse_attrs(raw_attrs);
        let method = match attrs.get("method").map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "post" => FormMethod::Post,
            _ => FormMethod::Get,
        };
        let action = attrs
            .get("action")
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .and_then(|a| base.join(a).ok())
            .unwrap_or_else(|| base.clone())
            .to_string();

        let (fields, submit_label) = parse_controls(body);
        forms.push(Form {
            index: i + 1,
            method,
            action,
            fields,
            submit_label,
        });
    }
    forms
}

fn closing_tag(body: &str, from: usize, tag: &str) -> (usize, usize) {
    let needle = format!("</{}", tag);
    let lower = body[from..].to_ascii_lowercase();
    match lower.find(&needle) {
        Some(offset) => {
            let start = from + offset;
            let end = body[start..]
                .find('>')
                .map(|p| start + p + 1)
                .unwrap_or(body.len());
            (start, end)
        }
        None => (body.len(), body.len()),
    }
}

fn parse_controls(body: &str) -> (Vec<FormField>, Option<String>) {
    let mut fields: Vec<FormField> = Vec::new();
    let mut submit_label = None;
    let mut pos = 0;

    while let Some(caps) = RE_CONTROL.captures_at(body, pos) {
        let Some(whole) = caps.get(0) else { break };
        pos = whole.end();
        let tag = caps[1].to_ascii_lowercase();
        let attrs = parse_attrs(&caps[2]);
        let name = attrs.get("name").map(|n| n.trim().to_string()).unwrap_or_default();
        let required = attrs.contains_key("required");

        match tag.as_str() {
            "input" => {
                let field_type = attrs
                    .get("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "text".to_string());
                if matches!(field_type.as_str(), "submit" | "image") && submit_label.is_none() {
                    submit_label = Some(
                        attrs
                            .get("value")
                            .or_else(|| attrs.get("alt"))
                            .map(|v| collapse_whitespace(v))
                            .filter(|v| !v.is_empty())
                            .unwrap_or_else(|| "Submit".to_string()),
                    );
                }
                if NON_FIELD_INPUTS.contains(&field_type.as_str()) || name.is_empty() {
                    continue;
                }
                let (value, checked) = match field_type.as_str() {
                    "checkbox" | "radio" => {
                        let value = attrs.get("value").cloned().unwrap_or_else(|| "on".to_string());
                        let is_checked = attrs.contains_key("checked");
                        // One field per radio group, carrying the checked option.
                        if field_type == "radio" {
                            if let Some(group) = fields.iter_mut().find(|f| f.name == name) {
                                if is_checked && group.checked != Some(true) {
                                    group.value = value;
                                    group.checked = Some(true);
                                }
                                continue;
                            }
                        }
                        (value, Some(is_checked))
                    }
                    _ => (attrs.get("value").cloned().unwrap_or_default(), None),
                };
                fields.push(FormField {
                    name,
                    field_type,
                    value,
                    required,
                    checked,
                });
            }
            "button" => {
                let (close_start, close_end) = closing_tag(body, pos, "button");
                let label = inner_text(&body[pos..close_start]);
                pos = close_end;
                let button_type = attrs
                    .get("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .unwrap_or_else(|| "submit".to_string());
                if button_type == "submit" && submit_label.is_none() {
                    submit_label = Some(if label.is_empty() {
                        "Submit".to_string()
                    } else {
                        label
                    });
                }
            }
            "textarea" => {
                let (close_start, close_end) = closing_tag(body, pos, "textarea");
                let raw = &body[pos..close_start];
                let raw = raw.strip_prefix("\r\n").or_else(|| raw.strip_prefix('\n')).unwrap_or(raw);
                let value = decode_entities(raw);
                pos = close_end;
                if !name.is_empty() {
                    fields.push(FormField {
                        name,
                        field_type: "textarea".to_string(),
                        value,
                        required,
                        checked: None,
                    });
                }
            }
            "select" => {
                let (close_start, close_end) = closing_tag(body, pos, "select");
                let value = select_default(&body[pos..close_start]);
                pos = close_end;
                if !name.is_empty() {
                    fields.push(FormField {
                        name,
                        field_type: "select".to_string(),
                        value,
                        required,
                        checked: None,
                    });
                }
            }
            _ => {}
        }
    }
    (fields, submit_label)
}

/// First `selected` option's value, else the first option's value.
fn select_default(inner: &str) -> String {
    let opens: Vec<(usize, usize, HashMap<String, String>)> = RE_OPTION_OPEN
        .captures_iter(inner)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            Some((m.start(), m.end(), parse_attrs(&caps[1])))
        })
        .collect();

    let option_value = |i: usize| -> String {
        let (_, end, attrs) = &opens[i];
        if let Some(v) = attrs.get("value") {
            return v.clone();
        }
        let next = opens.get(i + 1).map(|o| o.0).unwrap_or(inner.len());
        let text = &inner[*end..next];
        let text = match text.to_ascii_lowercase().find("</option") {
            Some(p) => &text[..p],
            None => text,
        };
        collapse_whitespace(&decode_entities(text))
    };

    opens
        .iter()
        .position(|(_, _, attrs)| attrs.contains_key("selected"))
        .or(if opens.is_empty() { None } else { Some(0) })
        .map(option_value)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
