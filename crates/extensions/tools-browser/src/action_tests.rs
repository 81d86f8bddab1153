use super::*;
use serde_json::json;

#[test]
fn test_parse_open() {
    let req = ActionRequest::parse(&json!({"action": "open", "url": "https://example.com"})).unwrap();
    match req.action {
        BrowserAction::Open { url, background } => {
            assert_eq!(url, "https://example.com");
            assert!(!background);
        }
        other => panic!("unexpected action {:?}", other),
    }
    assert!(!req.via_act);
}

#[test]
fn test_parse_unit_actions() {
    for name in ["reload", "back", "forward", "snapshot", "pdf", "tabs", "focus", "close", "reset"] {
        let req = ActionRequest::parse(&json!({"action": name, "tabId": "t1"})).unwrap();
        assert_eq!(req.action.name(), name);
        assert_eq!(req.common.tab_id.as_deref(), Some("t1"));
    }
}

#[test]
fn test_parse_click_ref_and_camel_case() {
    let req = ActionRequest::parse(&json!({
        "action": "click",
        "ref": "e4",
        "focusPopup": false
    }))
    .unwrap();
    match req.action {
        BrowserAction::Click {
            reference,
            focus_popup,
            selector,
            ..
        } => {
            assert_eq!(reference.as_deref(), Some("e4"));
            assert_eq!(focus_popup, Some(false));
            assert!(selector.is_none());
        }
        other => panic!("unexpected action {:?}", other),
    }
}

#[test]
fn test_fill_accepts_numeric_value_and_form_alias() {
    let req = ActionRequest::parse(&json!({
        "action": "fill",
        "form": "1",
        "name": "age",
        "value": 42
    }))
    .unwrap();
    match req.action {
        BrowserAction::Fill {
            form_index,
            field,
            value,
            ..
        } => {
            assert_eq!(form_index, Some(1.0));
            assert_eq!(field.as_deref(), Some("age"));
            assert_eq!(value, "42");
        }
        other => panic!("unexpected action {:?}", other),
    }
}

#[test]
fn test_select_single_value() {
    let req = ActionRequest::parse(&json!({"action": "select", "selector": "#c", "value": "de"})).unwrap();
    match req.action {
        BrowserAction::Select { values, .. } => assert_eq!(values, vec!["de".to_string()]),
        other => panic!("unexpected action {:?}", other),
    }
}

#[test]
fn test_missing_required_field() {
    let err = ActionRequest::parse(&json!({"action": "navigate"})).unwrap_err();
    match err {
        BrowserError::MissingParameter(field) => assert_eq!(field, "url"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_missing_action() {
    let err = ActionRequest::parse(&json!({"url": "https://x"})).unwrap_err();
    assert!(matches!(err, BrowserError::MissingParameter(_)));
}

#[test]
fn test_unknown_action() {
    let err = ActionRequest::parse(&json!({"action": "teleport"})).unwrap_err();
    match err {
        BrowserError::InvalidParameter(msg) => assert!(msg.contains("unknown action")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_non_object_params() {
    let err = ActionRequest::parse(&json!("open")).unwrap_err();
    assert!(matches!(err, BrowserError::InvalidParameter(_)));
}

#[test]
fn test_act_dispatches_to_kind() {
    let req = ActionRequest::parse(&json!({
        "action": "act",
        "kind": "hover",
        "selector": "#menu"
    }))
    .unwrap();
    assert!(req.via_act);
    assert_eq!(req.action.name(), "hover");
}

#[test]
fn test_act_cannot_nest() {
    let err = ActionRequest::parse(&json!({"action": "act", "kind": "act"})).unwrap_err();
    assert!(matches!(err, BrowserError::InvalidParameter(_)));
}

#[test]
fn test_act_rejects_non_interaction() {
    let err = ActionRequest::parse(&json!({"action": "act", "kind": "reset"})).unwrap_err();
    match err {
        BrowserError::InvalidParameter(msg) => assert!(msg.contains("reset")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_requires_live() {
    let hover = ActionRequest::parse(&json!({"action": "hover", "selector": "a"})).unwrap();
    assert!(hover.action.requires_live());
    let click = ActionRequest::parse(&json!({"action": "click", "ref": "e1"})).unwrap();
    assert!(!click.action.requires_live());
    let reload = ActionRequest::parse(&json!({"action": "reload"})).unwrap();
    assert!(reload.action.is_navigation());
}

#[test]
fn test_open_external_name() {
    let req = ActionRequest::parse(&json!({"action": "open_external", "url": "https://x"})).unwrap();
    assert_eq!(req.action.name(), "open_external");
}
