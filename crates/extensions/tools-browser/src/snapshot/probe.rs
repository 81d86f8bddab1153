//! In-page probe for actionable elements of a rendered page.

use serde::Deserialize;

use super::{ElementRef, RefCounter, RefKind};

/// Collects rendered, actionable elements with a short unique selector each.
pub const PROBE_SCRIPT: &str = r##"(() => {
  const QUERY = 'a[href], button, input, select, textarea, [role=button], [role=link], [role=textbox], [role=combobox], [contenteditable=""], [contenteditable=true]';
  const forms = Array.from(document.forms);
  const esc = (s) => (window.CSS && CSS.escape) ? CSS.escape(s) : String(s).replace(/[^a-zA-Z0-9_-]/g, '\\$&');
  const unique = (sel) => { try { return document.querySelectorAll(sel).length === 1; } catch (e) { return false; } };
  const selectorFor = (el) => {
    if (el.id && unique('#' + esc(el.id))) return '#' + esc(el.id);
    const parts = [];
    let node = el;
    for (let depth = 0; node && node.nodeType === 1 && depth < 8; depth++) {
      if (node !== el && node.id && unique('#' + esc(node.id))) { parts.unshift('#' + esc(node.id)); break; }
      const tag = node.tagName.toLowerCase();
      const parent = node.parentElement;
      if (!parent) { parts.unshift(tag); break; }
      const same = Array.from(parent.children).filter((c) => c.tagName === node.tagName);
      parts.unshift(same.length > 1 ? tag + ':nth-of-type(' + (same.indexOf(node) + 1) + ')' : tag);
      if (unique(parts.join(' > '))) break;
      node = parent;
    }
    return parts.join(' > ');
  };
  const labelFor = (el) => {
    const aria = el.getAttribute('aria-label');
    if (aria) return aria;
    if (el.labels && el.labels.length) return el.labels[0].innerText || '';
    const placeholder = el.getAttribute('placeholder');
    if (placeholder) return placeholder;
    const text = (el.innerText || '').trim();
    if (text) return text;
    if (el.tagName === 'INPUT' && ['submit', 'button', 'reset'].includes(el.type)) return el.value || '';
    return el.getAttribute('name') || el.getAttribute('title') || el.getAttribute('alt') || '';
  };
  const formInfo = (form) => {
    if (!form) return { formIndex: null, formMethod: null, formAction: null };
    let action = location.href;
    try { action = new URL(form.getAttribute('action') || '', document.baseURI).href; } catch (e) {}
    const method = (form.getAttribute('method') || 'get').toLowerCase() === 'post' ? 'post' : 'get';
    return { formIndex: forms.indexOf(form) + 1, formMethod: method, formAction: action };
  };
  const rows = [];
  const seenForms = new Set();
  for (const el of document.querySelectorAll(QUERY)) {
    const rect = el.getBoundingClientRect();
    if (rect.width <= 0 || rect.height <= 0) continue;
    const form = el.form || el.closest('form');
    const info = formInfo(form);
    if (form && !seenForms.has(form)) {
      seenForms.add(form);
      rows.push(Object.assign({
        tag: 'form', type: null, role: null,
        name: (form.getAttribute('aria-label') || form.getAttribute('name') || form.id || '').trim().slice(0, 80),
        selector: selectorFor(form), href: null, fieldName: null, editable: false,
      }, info));
    }
    rows.push(Object.assign({
      tag: el.tagName.toLowerCase(),
      type: (el.getAttribute('type') || '').toLowerCase() || null,
      role: el.getAttribute('role'),
      name: labelFor(el).replace(/\s+/g, ' ').trim().slice(0, 80),
      selector: selectorFor(el),
      href: el.tagName === 'A' ? el.href : null,
      fieldName: el.getAttribute('name'),
      editable: !!el.isContentEditable,
    }, info));
  }
  return rows;
})()"##;

/// One row reported by [`PROBE_SCRIPT`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRow {
    pub tag: String,
    #[serde(default, rename = "type")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: String,
    pub selector: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub form_index: Option<usize>,
    #[serde(default)]
    pub form_method: Option<String>,
    #[serde(default)]
    pub form_action: Option<String>,
    #[serde(default)]
    pub editable: bool,
}

/// Kind and role for a probed element, using the same rules as the
/// markup path.
pub fn classify(row: &ProbeRow) -> Option<(RefKind, &'static str)> {
    let input_type = row.input_type.as_deref().unwrap_or("");
    match (row.tag.as_str(), row.role.as_deref()) {
        ("form", _) => Some((RefKind::Form, "form")),
        ("a", _) if row.href.is_some() => Some((RefKind::Link, "link")),
        (_, Some("link")) => Some((RefKind::Link, "link")),
        ("input", _) => match input_type {
            "submit" | "image" => Some((RefKind::Submit, "button")),
            "button" | "reset" => Some((RefKind::Button, "button")),
            "hidden" => None,
            "checkbox" => Some((RefKind::Field, "checkbox")),
            "radio" => Some((RefKind::Field, "radio")),
            _ => Some((RefKind::Field, "textbox")),
        },
        ("button", _) => match input_type {
            "button" | "reset" => Some((RefKind::Button, "button")),
            "submit" => Some((RefKind::Submit, "button")),
            _ if row.form_index.is_some() => Some((RefKind::Submit, "button")),
            _ => Some((RefKind::Button, "button")),
        },
        ("select", _) => Some((RefKind::Field, "combobox")),
        ("textarea", _) => Some((RefKind::Field, "textbox")),
        (_, Some("button")) => Some((RefKind::Button, "button")),
        (_, Some("textbox")) => Some((RefKind::Field, "textbox")),
        (_, Some("combobox")) => Some((RefKind::Field, "combobox")),
        _ if row.editable => Some((RefKind::Field, "textbox")),
        _ => None,
    }
}

/// Refs from probe rows, in document order. Link rows stop at `max_links`.
pub fn refs_from_probe(rows: &[ProbeRow], max_links: usize, counter: &mut RefCounter) -> Vec<ElementRef> {
    let mut refs = Vec::with_capacity(rows.len());
    let mut links = 0usize;

    for row in rows {
        let Some((kind, role)) = classify(row) else {
            continue;
        };
        if kind == RefKind::Link {
            if links >= max_links {
                continue;
            }
            links += 1;
        }
        let name = match (kind, row.form_index) {
            (RefKind::Form, Some(i)) if row.name.is_empty() => format!(
                "form {} ({} {})",
                i,
                row.form_method.as_deref().unwrap_or("get").to_ascii_uppercase(),
                row.form_action.as_deref().unwrap_or("")
            ),
            _ => row.name.clone(),
        };
        let mut r = ElementRef::new(counter.next_id(), kind, role, name);
        r.selector = Some(row.selector.clone());
        r.form_index = row.form_index.filter(|i| *i > 0);
        if r.form_index.is_some() {
            r.form_method = row.form_method.clone();
            r.form_action = row.form_action.clone();
        }
        match kind {
            RefKind::Link => r.url = row.href.clone(),
            RefKind::Form => r.url = row.form_action.clone(),
            _ => {}
        }
        if kind == RefKind::Field {
            r.field = row.field_name.clone();
            r.field_type = Some(match row.tag.as_str() {
                "select" | "textarea" => row.tag.clone(),
                "input" => row.input_type.clone().unwrap_or_else(|| "text".to_string()),
                _ => "text".to_string(),
            });
        }
        refs.push(r);
    }
    refs
}
