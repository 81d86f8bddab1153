//! Snapshot construction from fetched documents and rendered pages.

use chrono::Utc;
use url::Url;

use super::probe::{refs_from_probe, ProbeRow};
use super::{ElementRef, RefCounter, RefKind, Snapshot, SnapshotLimits};
use crate::html::{
    document_base, is_html, parse_forms, parse_links, parse_title, readable_text, truncate_bytes,
    truncate_chars, Form, FormMethod, Link,
};

/// A fetched HTTP response body.
pub struct DocumentCapture<'a> {
    pub url: &'a Url,
    pub status: u16,
    pub content_type: &'a str,
    /// Possibly capped by the fetcher; `total_bytes` is the full size.
    pub body: &'a [u8],
    pub total_bytes: usize,
}

/// What the live page reported about itself.
pub struct LiveCapture<'a> {
    pub url: &'a Url,
    pub title: &'a str,
    pub status: u16,
    pub html: &'a str,
    pub rows: Vec<ProbeRow>,
}

fn host_title(url: &Url) -> String {
    url.host_str().map(str::to_string).unwrap_or_else(|| url.to_string())
}

fn field_role(field_type: &str) -> &'static str {
    match field_type {
        "checkbox" => "checkbox",
        "radio" => "radio",
        "select" => "combobox",
        "hidden" => "hidden",
        "range" => "slider",
        "number" => "spinbutton",
        _ => "textbox",
    }
}

/// Links in encounter order, then per form: one form ref, one ref per field
/// and one submit ref.
pub fn html_refs(links: &[Link], forms: &[Form], counter: &mut RefCounter) -> Vec<ElementRef> {
    let mut refs = Vec::with_capacity(links.len() + forms.iter().map(|f| f.fields.len() + 2).sum::<usize>());

    for link in links {
        let mut r = ElementRef::new(counter.next_id(), RefKind::Link, "link", link.text.clone());
        r.url = Some(link.url.clone());
        refs.push(r);
    }

    for form in forms {
        let method = match form.method {
            FormMethod::Get => "get",
            FormMethod::Post => "post",
        };
        let scoped = |mut r: ElementRef| {
            r.form_index = Some(form.index);
            r.form_method = Some(method.to_string());
            r.form_action = Some(form.action.clone());
            r
        };
        let mut r = scoped(ElementRef::new(
            counter.next_id(),
            RefKind::Form,
            "form",
            format!("form {} ({} {})", form.index, method.to_ascii_uppercase(), form.action),
        ));
        r.url = Some(form.action.clone());
        refs.push(r);

        for field in &form.fields {
            let mut r = scoped(ElementRef::new(
                counter.next_id(),
                RefKind::Field,
                field_role(&field.field_type),
                field.name.clone(),
            ));
            r.field = Some(field.name.clone());
            r.field_type = Some(field.field_type.clone());
            refs.push(r);
        }

        refs.push(scoped(ElementRef::new(
            counter.next_id(),
            RefKind::Submit,
            "button",
            form.submit_label.clone().unwrap_or_else(|| "Submit".to_string()),
        )));
    }
    refs
}

/// Build a snapshot from a fetched response. Returns the snapshot, the
/// parsed forms and the (byte-truncated) raw document.
pub fn build_document_snapshot(
    doc: DocumentCapture<'_>,
    limits: &SnapshotLimits,
    counter: &mut RefCounter,
) -> (Snapshot, Vec<Form>, String) {
    let (kept, byte_truncated) = truncate_bytes(doc.body, limits.max_bytes);
    let raw = String::from_utf8_lossy(kept).into_owned();

    let (title, links, forms) = if is_html(doc.content_type, kept) {
        let base = document_base(&raw, doc.url);
        (
            parse_title(&raw),
            parse_links(&raw, &base, limits.max_links),
            parse_forms(&raw, &base),
        )
    } else {
        (None, Vec::new(), Vec::new())
    };

    let (text, char_truncated) = truncate_chars(&readable_text(kept, doc.content_type), limits.max_chars);
    let refs = html_refs(&links, &forms, counter);

    let snapshot = Snapshot {
        captured_at: Utc::now(),
        url: doc.url.to_string(),
        title: title.unwrap_or_else(|| host_title(doc.url)),
        status: doc.status,
        ok: (200..400).contains(&doc.status),
        content_type: doc.content_type.to_string(),
        truncated: byte_truncated || char_truncated,
        bytes: doc.total_bytes.max(doc.body.len()),
        text,
        links,
        refs,
    };
    (snapshot, forms, raw)
}

/// Build a snapshot from a rendered page. Probe rows drive the refs; when
/// the probe produced nothing the markup-derived refs stand in.
pub fn build_live_snapshot(
    capture: LiveCapture<'_>,
    limits: &SnapshotLimits,
    counter: &mut RefCounter,
) -> (Snapshot, Vec<Form>) {
    let bytes = capture.html.len();
    let (kept, byte_truncated) = truncate_bytes(capture.html.as_bytes(), limits.max_bytes);
    let html = String::from_utf8_lossy(kept);
    let base = document_base(&html, capture.url);
    let links = parse_links(&html, &base, limits.max_links);
    let forms = parse_forms(&html, &base);

    let refs = if capture.rows.is_empty() {
        html_refs(&links, &forms, counter)
    } else {
        refs_from_probe(&capture.rows, limits.max_links, counter)
    };

    let (text, char_truncated) = truncate_chars(&readable_text(kept, "text/html"), limits.max_chars);
    let title = match capture.title.trim() {
        "" => parse_title(&html).unwrap_or_else(|| host_title(capture.url)),
        t => t.to_string(),
    };

    let snapshot = Snapshot {
        captured_at: Utc::now(),
        url: capture.url.to_string(),
        title,
        status: capture.status,
        ok: (200..400).contains(&capture.status),
        content_type: "text/html".to_string(),
        truncated: byte_truncated || char_truncated,
        bytes,
        text,
        links,
        refs,
    };
    (snapshot, forms)
}
