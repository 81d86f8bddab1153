use super::*;
use crate::html::parse_forms;
use url::Url;

const PAGE: &str = r#"<html><head><title>Login</title></head><body>
<a href="/help">Help</a>
<a href="/about">About</a>
<form method="post" action="/session">
  <input type="hidden" name="csrf" value="t0k">
  <input name="user">
  <input type="password" name="pass">
  <button>Sign in</button>
</form>
</body></html>"#;

fn url() -> Url {
    Url::parse("https://example.com/login").unwrap()
}

fn doc<'a>(url: &'a Url, body: &'a [u8], content_type: &'a str) -> DocumentCapture<'a> {
    DocumentCapture {
        url,
        status: 200,
        content_type,
        body,
        total_bytes: body.len(),
    }
}

#[test]
fn test_ref_order_links_then_form_fields_submit() {
    let u = url();
    let mut counter = RefCounter::new();
    let (snap, forms, raw) = build_document_snapshot(
        doc(&u, PAGE.as_bytes(), "text/html"),
        &SnapshotLimits::default(),
        &mut counter,
    );

    let kinds: Vec<RefKind> = snap.refs.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RefKind::Link,
            RefKind::Link,
            RefKind::Form,
            RefKind::Field,
            RefKind::Field,
            RefKind::Field,
            RefKind::Submit,
        ]
    );
    let ids: Vec<&str> = snap.refs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2", "e3", "e4", "e5", "e6", "e7"]);
    assert_eq!(snap.refs.len(), snap.links.len() + forms.iter().map(|f| f.fields.len() + 2).sum::<usize>());

    assert_eq!(snap.refs[0].url.as_deref(), Some("https://example.com/help"));
    assert_eq!(snap.refs[3].field.as_deref(), Some("csrf"));
    assert_eq!(snap.refs[3].role, "hidden");
    assert_eq!(snap.refs[5].role, "textbox");
    assert_eq!(snap.refs[6].name, "Sign in");
    assert_eq!(snap.title, "Login");
    assert!(snap.ok);
    assert!(!snap.truncated);
    assert_eq!(raw, PAGE);
}

#[test]
fn test_ref_counter_continues_across_snapshots() {
    let u = url();
    let mut counter = RefCounter::new();
    let limits = SnapshotLimits::default();
    let (first, _, _) = build_document_snapshot(doc(&u, PAGE.as_bytes(), "text/html"), &limits, &mut counter);
    let (second, _, _) = build_document_snapshot(doc(&u, PAGE.as_bytes(), "text/html"), &limits, &mut counter);

    assert_eq!(second.refs[0].id, "e8");
    for r in &first.refs {
        assert!(second.find_ref(&r.id).is_none());
    }
}

#[test]
fn test_find_ref_is_case_sensitive() {
    let u = url();
    let mut counter = RefCounter::new();
    let (snap, _, _) = build_document_snapshot(
        doc(&u, PAGE.as_bytes(), "text/html"),
        &SnapshotLimits::default(),
        &mut counter,
    );
    assert!(snap.find_ref("e1").is_some());
    assert!(snap.find_ref("E1").is_none());
    assert!(snap.find_ref("e99").is_none());
}

#[test]
fn test_title_falls_back_to_host() {
    let u = Url::parse("https://docs.example.org/x").unwrap();
    let mut counter = RefCounter::new();
    let (snap, _, _) = build_document_snapshot(
        doc(&u, b"<p>untitled</p>", "text/html"),
        &SnapshotLimits::default(),
        &mut counter,
    );
    assert_eq!(snap.title, "docs.example.org");
}

#[test]
fn test_non_html_has_no_refs() {
    let u = Url::parse("https://api.example.com/v1").unwrap();
    let mut counter = RefCounter::new();
    let (snap, forms, _) = build_document_snapshot(
        doc(&u, br#"{"href":"<a href='/x'>x</a>"}"#, "application/json"),
        &SnapshotLimits::default(),
        &mut counter,
    );
    assert!(snap.refs.is_empty());
    assert!(forms.is_empty());
    assert!(snap.text.contains("\"href\""));
    assert_eq!(counter.issued(), 0);
}

#[test]
fn test_byte_truncation_before_char_truncation() {
    let u = url();
    let body = format!("<html><body><p>{}</p></body></html>", "x".repeat(5000));
    let limits = SnapshotLimits {
        max_chars: 200,
        max_bytes: 1024,
        max_links: 80,
    };
    let mut counter = RefCounter::new();
    let (snap, _, raw) = build_document_snapshot(doc(&u, body.as_bytes(), "text/html"), &limits, &mut counter);
    assert!(snap.truncated);
    assert_eq!(snap.bytes, body.len());
    assert_eq!(raw.len(), 1024);
    assert!(snap.text.ends_with(crate::html::TRUNCATION_MARKER));
    assert_eq!(snap.text.chars().count(), 200 + crate::html::TRUNCATION_MARKER.chars().count());
}

#[test]
fn test_capped_body_reports_full_size() {
    let u = url();
    let mut counter = RefCounter::new();
    let limits = SnapshotLimits {
        max_bytes: 1024,
        ..SnapshotLimits::default()
    };
    let capped = "a".repeat(1025);
    let (snap, _, raw) = build_document_snapshot(
        DocumentCapture {
            url: &u,
            status: 200,
            content_type: "text/plain",
            body: capped.as_bytes(),
            total_bytes: 5_000_000,
        },
        &limits,
        &mut counter,
    );
    assert!(snap.truncated);
    assert_eq!(snap.bytes, 5_000_000);
    assert_eq!(raw.len(), 1024);
}

#[test]
fn test_error_status_not_ok() {
    let u = url();
    let mut counter = RefCounter::new();
    let (snap, _, _) = build_document_snapshot(
        DocumentCapture {
            url: &u,
            status: 404,
            content_type: "text/html",
            body: b"<title>Missing</title>",
            total_bytes: 22,
        },
        &SnapshotLimits::default(),
        &mut counter,
    );
    assert_eq!(snap.status, 404);
    assert!(!snap.ok);
}

fn row(tag: &str, input_type: Option<&str>, selector: &str) -> ProbeRow {
    ProbeRow {
        tag: tag.to_string(),
        input_type: input_type.map(str::to_string),
        selector: selector.to_string(),
        name: selector.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_probe_classification() {
    let mut link = row("a", None, "#home");
    link.href = Some("https://example.com/".into());
    assert_eq!(classify(&link), Some((RefKind::Link, "link")));

    assert_eq!(classify(&row("input", Some("submit"), "s")), Some((RefKind::Submit, "button")));
    assert_eq!(classify(&row("input", Some("reset"), "r")), Some((RefKind::Button, "button")));
    assert_eq!(classify(&row("input", None, "i")), Some((RefKind::Field, "textbox")));
    assert_eq!(classify(&row("select", None, "c")), Some((RefKind::Field, "combobox")));

    let mut in_form = row("button", None, "b");
    in_form.form_index = Some(1);
    assert_eq!(classify(&in_form), Some((RefKind::Submit, "button")));
    assert_eq!(classify(&row("button", None, "b2")), Some((RefKind::Button, "button")));

    let mut aria = row("div", None, "d");
    aria.role = Some("button".into());
    assert_eq!(classify(&aria), Some((RefKind::Button, "button")));

    let mut editable = row("div", None, "e");
    editable.editable = true;
    assert_eq!(classify(&editable), Some((RefKind::Field, "textbox")));

    assert_eq!(classify(&row("span", None, "x")), None);
}

#[test]
fn test_live_snapshot_uses_probe_rows() {
    let u = url();
    let mut counter = RefCounter::new();
    let mut field = row("input", Some("email"), "#email");
    field.field_name = Some("email".into());
    field.form_index = Some(1);
    let (snap, forms) = build_live_snapshot(
        LiveCapture {
            url: &u,
            title: "Rendered",
            status: 200,
            html: PAGE,
            rows: vec![field],
        },
        &SnapshotLimits::default(),
        &mut counter,
    );
    assert_eq!(snap.title, "Rendered");
    assert_eq!(snap.refs.len(), 1);
    assert_eq!(snap.refs[0].selector.as_deref(), Some("#email"));
    assert_eq!(snap.refs[0].field_type.as_deref(), Some("email"));
    assert_eq!(snap.refs[0].form_index, Some(1));
    assert_eq!(forms.len(), 1);
    assert_eq!(snap.links.len(), 2);
}

#[test]
fn test_probe_form_rows_carry_method_and_action() {
    let u = url();
    let mut counter = RefCounter::new();
    let scoped = |mut r: ProbeRow| {
        r.form_index = Some(1);
        r.form_method = Some("post".into());
        r.form_action = Some("https://example.com/session".into());
        r
    };
    let form = scoped(row("form", None, "form#login"));
    let mut user = scoped(row("input", Some("text"), "#user"));
    user.field_name = Some("user".into());
    let submit = scoped(row("button", Some("submit"), "#go"));
    let mut unnamed = scoped(row("form", None, "form:nth-of-type(2)"));
    unnamed.name = String::new();
    unnamed.form_index = Some(2);

    let (snap, _) = build_live_snapshot(
        LiveCapture {
            url: &u,
            title: "Sign in",
            status: 200,
            html: PAGE,
            rows: vec![form, user, submit, unnamed],
        },
        &SnapshotLimits::default(),
        &mut counter,
    );
    assert_eq!(snap.refs.len(), 4);
    assert_eq!(snap.refs[0].kind, RefKind::Form);
    assert_eq!(snap.refs[0].url.as_deref(), Some("https://example.com/session"));
    assert_eq!(snap.refs[0].form_method.as_deref(), Some("post"));
    for r in &snap.refs[1..3] {
        assert_eq!(r.form_index, Some(1));
        assert_eq!(r.form_method.as_deref(), Some("post"));
        assert_eq!(r.form_action.as_deref(), Some("https://example.com/session"));
    }
    assert_eq!(snap.refs[2].kind, RefKind::Submit);
    assert_eq!(snap.refs[3].name, "form 2 (POST https://example.com/session)");
}

#[test]
fn test_markup_refs_carry_form_method_and_action() {
    let forms = parse_forms(
        r#"<form method="post" action="/login"><input name="u"><button>Go</button></form>"#,
        &url(),
    );
    let refs = html_refs(&[], &forms, &mut RefCounter::new());
    assert_eq!(refs.len(), 3);
    assert!(refs.iter().all(|r| r.form_method.as_deref() == Some("post")));
    assert!(refs.iter().all(|r| r.form_action.as_deref() == Some("https://example.com/login")));
    assert_eq!(refs[0].name, "form 1 (POST https://example.com/login)");
}

#[test]
fn test_live_snapshot_falls_back_to_markup_refs() {
    let u = url();
    let mut counter = RefCounter::new();
    let (snap, _) = build_live_snapshot(
        LiveCapture {
            url: &u,
            title: "",
            status: 200,
            html: PAGE,
            rows: Vec::new(),
        },
        &SnapshotLimits::default(),
        &mut counter,
    );
    assert_eq!(snap.refs.len(), 7);
    assert!(snap.refs.iter().all(|r| r.selector.is_none()));
    assert_eq!(snap.title, "Login");
}

#[test]
fn test_probe_links_capped() {
    let mut counter = RefCounter::new();
    let rows: Vec<ProbeRow> = (0..5)
        .map(|i| {
            let mut r = row("a", None, &format!("a:nth-of-type({})", i + 1));
            r.href = Some(format!("https://example.com/{i}"));
            r
        })
        .collect();
    let refs = refs_from_probe(&rows, 2, &mut counter);
    assert_eq!(refs.len(), 2);
}
