//! Readable-text projection and truncation.

use std::sync::LazyLock;

use regex::Regex;

use super::parser::{decode_entities, strip_non_content};

pub const TRUNCATION_MARKER: &str = "\n\u{2026}[truncated]";

static RE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|br|hr|li|ul|ol|dl|dt|dd|h[1-6]|tr|table|thead|tbody|section|article|header|footer|nav|main|aside|blockquote|pre|form|fieldset|figure|figcaption|address|details|summary)\b[^>]*>",
    )
    .unwrap()
});

static RE_CELL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</?(?:td|th)\b[^>]*>").unwrap());

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

pub fn is_html(content_type: &str, body: &[u8]) -> bool {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("html") {
        return true;
    }
    if !ct.is_empty() && !ct.starts_with("text/plain") {
        return false;
    }
    let head = String::from_utf8_lossy(&body[..body.len().min(512)]);
    let head = head.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.starts_with("<head")
}

/// Block elements become line breaks, everything else is flattened.
pub fn html_to_text(html: &str) -> String {
    let cleaned = strip_non_content(html);
    let spaced = RE_BLOCK.replace_all(&cleaned, "\n");
    let spaced = RE_CELL.replace_all(&spaced, " ");
    let flat = RE_TAG.replace_all(&spaced, "");
    let decoded = decode_entities(&flat);

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text projection chosen by content type.
pub fn readable_text(body: &[u8], content_type: &str) -> String {
    let ct = content_type.to_ascii_lowercase();
    if is_html(&ct, body) {
        return html_to_text(&String::from_utf8_lossy(body));
    }
    if ct.contains("json") {
        return match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) => serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned()),
            Err(_) => String::from_utf8_lossy(body).into_owned(),
        };
    }
    if ct.is_empty() || ct.starts_with("text/") || ct.contains("xml") || ct.contains("javascript") {
        return String::from_utf8_lossy(body).into_owned();
    }
    format!("[binary content: {} bytes]", body.len())
}

/// Cut `bytes` to at most `max` bytes, backing off so a UTF-8 sequence is
/// never split.
pub fn truncate_bytes(bytes: &[u8], max: usize) -> (&[u8], bool) {
    if bytes.len() <= max {
        return (bytes, false);
    }
    let mut end = max;
    while end > 0 && (bytes[end] & 0xC0) == 0x80 {
        end -= 1;
    }
    (&bytes[..end], true)
}

/// Cut `text` to `max` characters and append the truncation marker.
pub fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((cut, _)) => {
            let mut out = text[..cut].to_string();
            out.push_str(TRUNCATION_MARKER);
            (out, true)
        }
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_blocks_and_scripts() {
        let html = r#"<html><head><style>p{}</style><script>var x = "<p>";</script></head>
            <body><h1>Title</h1><p>First&nbsp;para</p><div>Second   para</div>
            <table><tr><td>a</td><td>b</td></tr></table></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Title\nFirst para\nSecond para\na b");
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_readable_text_by_content_type() {
        assert_eq!(
            readable_text(br#"{"a":1}"#, "application/json"),
            "{\n  \"a\": 1\n}"
        );
        assert_eq!(readable_text(b"plain <b>", "text/plain"), "plain <b>");
        assert_eq!(
            readable_text(&[0u8, 1, 2, 3], "image/png"),
            "[binary content: 4 bytes]"
        );
        assert_eq!(readable_text(b"<p>hi</p>", "text/html; charset=utf-8"), "hi");
    }

    #[test]
    fn test_sniff_html_without_content_type() {
        assert!(is_html("", b"  <!DOCTYPE html><html></html>"));
        assert!(!is_html("", b"just text"));
        assert!(!is_html("application/json", b"<html>"));
    }

    #[test]
    fn test_truncate_bytes_respects_utf8() {
        let s = "aé";
        let (cut, truncated) = truncate_bytes(s.as_bytes(), 2);
        assert!(truncated);
        assert_eq!(cut, b"a");
        let (cut, truncated) = truncate_bytes(s.as_bytes(), 10);
        assert!(!truncated);
        assert_eq!(cut.len(), 3);
    }

    #[test]
    fn test_truncate_chars() {
        let (out, truncated) = truncate_chars("héllo world", 5);
        assert!(truncated);
        assert!(out.starts_with("héllo"));
        assert!(out.ends_with("[truncated]"));
        let (out, truncated) = truncate_chars("short", 5);
        assert!(!truncated);
        assert_eq!(out, "short");
    }
}
