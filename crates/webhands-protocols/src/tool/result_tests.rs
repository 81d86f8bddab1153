use super::*;

#[test]
fn test_summary_only_result() {
    let result = ToolResult::success("tabs: 2");
    assert!(result.success);
    assert_eq!(result.content, "tabs: 2");
    assert!(result.structured_output.is_none());
}

#[test]
fn test_envelope_result() {
    let result = ToolResult::success_json("opened t1", json!({"ok": true, "engine": "fetch"}));
    assert_eq!(result.content, "opened t1");
    assert_eq!(result.into_envelope()["engine"], "fetch");
}

#[test]
fn test_summary_only_envelope_fallback() {
    let envelope = ToolResult::success("reset").into_envelope();
    assert_eq!(envelope, json!({"ok": true, "summary": "reset"}));
}

#[test]
fn test_metadata_is_attached_and_omitted_when_empty() {
    let result = ToolResult::success("OK").with_metadata("callId", json!("c1"));
    assert_eq!(result.metadata["callId"], "c1");

    let json = serde_json::to_string(&ToolResult::success("OK")).unwrap();
    assert!(!json.contains("structured_output"));
    assert!(!json.contains("metadata"));
}
