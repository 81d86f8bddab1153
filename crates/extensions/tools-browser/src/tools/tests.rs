use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use webhands_protocols::{Credential, ToolError};

use super::*;
use crate::error::ErrorKind;
use crate::fetch::{HttpMethod, HttpRequest, HttpResponse};

/// Serves canned pages by path and records every request.
#[derive(Default)]
struct Site {
    pages: Mutex<HashMap<String, (u16, Vec<(String, String)>, String)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl Site {
    fn page(self, path: &str, html: &str) -> Self {
        self.pages.lock().insert(
            path.to_string(),
            (
                200,
                vec![("Content-Type".to_string(), "text/html; charset=utf-8".to_string())],
                html.to_string(),
            ),
        );
        self
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpFetcher for Site {
    async fn send(&self, request: HttpRequest) -> Result<crate::fetch::HttpResponse, BrowserError> {
        let key = request.url.path().to_string();
        self.requests.lock().push(request);
        let (status, headers, body) = self
            .pages
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or((404, Vec::new(), "not found".to_string()));
        Ok(HttpResponse {
            status,
            headers,
            total_bytes: body.len(),
            body: body.into_bytes(),
        })
    }
}

#[derive(Default)]
struct RecordingLauncher {
    opened: Mutex<Vec<String>>,
}

impl ExternalLauncher for RecordingLauncher {
    fn open(&self, url: &str) -> Result<(), ToolError> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

const HOME: &str = r#"<html><head><title>Home</title></head><body>
<a href="/docs">Docs</a>
<form action="/search" method="get"><input name="q" value=""></form>
</body></html>"#;

const DOCS: &str = "<html><head><title>Docs</title></head><body><p>Reference</p></body></html>";

fn site() -> Arc<Site> {
    Arc::new(
        Site::default()
            .page("/", HOME)
            .page("/docs", DOCS)
            .page("/search", "<title>Results</title><p>found</p>"),
    )
}

fn fetch_only(site: Arc<Site>) -> BrowserTool {
    BrowserTool::new(BrowserToolConfig::default(), site, None)
}

async fn run(tool: &BrowserTool, params: Value) -> Result<Value, BrowserError> {
    tool.run(ActionRequest::parse(&params)?).await
}

#[test]
fn test_definition() {
    let tool = fetch_only(site());
    let def = tool.definition();
    assert_eq!(def.id, "browser");
    assert_eq!(def.risk_level, RiskLevel::Medium);
    let schema = def.parameters_schema.as_ref().unwrap();
    assert!(schema["properties"]["action"]["enum"]
        .as_array()
        .unwrap()
        .contains(&json!("open_external")));
}

#[test]
fn test_call_options_clamp_and_default() {
    let tool = fetch_only(site());
    let common: CommonParams = serde_json::from_value(json!({
        "timeoutMs": 5,
        "maxChars": 1e9,
        "maxLinks": -3,
        "retries": 9,
        "tabId": "  "
    }))
    .unwrap();
    let call = tool.call_options(&common).unwrap();
    assert_eq!(call.navigation_timeout, Duration::from_millis(500));
    assert_eq!(call.action_timeout, Duration::from_millis(500));
    assert_eq!(call.limits.max_chars, 200_000);
    assert_eq!(call.limits.max_links, 0);
    assert_eq!(call.limits.max_bytes, 2_000_000);
    assert_eq!(call.retries, 3);
    assert_eq!(call.mode, EngineMode::Auto);
    assert!(call.allow_fallback);
    assert!(call.tab_id.is_none());

    let defaults = tool.call_options(&CommonParams::default()).unwrap();
    assert_eq!(defaults.navigation_timeout, Duration::from_secs(20));
    assert_eq!(defaults.action_timeout, Duration::from_secs(10));
    assert_eq!(defaults.retries, 1);
}

#[tokio::test]
async fn test_open_builds_envelope() {
    let tool = fetch_only(site());
    let out = run(&tool, json!({"action": "open", "url": "https://site.test/"}))
        .await
        .unwrap();
    assert_eq!(out["ok"], true);
    assert_eq!(out["action"], "open");
    assert_eq!(out["engine"], "fetch");
    assert_eq!(out["activeTabId"], "t1");
    assert_eq!(out["tab"]["id"], "t1");
    assert_eq!(out["snapshot"]["title"], "Home");
    // link, form, field q, submit
    let refs = out["snapshot"]["refs"].as_array().unwrap();
    assert_eq!(refs.len(), 4);
    assert_eq!(refs[0]["ref"], "e1");
    assert_eq!(refs[0]["kind"], "link");
    assert!(out.get("fallbackFrom").is_none());
}

#[tokio::test]
async fn test_background_open_keeps_focus() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    let out = run(
        &tool,
        json!({"action": "open", "url": "https://site.test/docs", "background": true}),
    )
    .await
    .unwrap();
    assert_eq!(out["activeTabId"], "t1");
    assert_eq!(out["tab"]["id"], "t2");
    assert_eq!(out["tab"]["active"], false);
}

#[tokio::test]
async fn test_failed_open_rolls_back_tab() {
    struct Down;
    #[async_trait]
    impl HttpFetcher for Down {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, BrowserError> {
            Err(BrowserError::Http("connection refused".to_string()))
        }
    }
    let tool = BrowserTool::new(BrowserToolConfig::default(), Arc::new(Down), None);
    let err = run(&tool, json!({"action": "open", "url": "https://down.test/"}))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::Http(_)));
    let tabs = run(&tool, json!({"action": "tabs"})).await.unwrap();
    assert_eq!(tabs["tabs"].as_array().unwrap().len(), 0);
    assert!(tabs["activeTabId"].is_null());
}

#[tokio::test]
async fn test_navigate_without_tab_opens_one() {
    let tool = fetch_only(site());
    let out = run(&tool, json!({"action": "navigate", "url": "https://site.test/docs"}))
        .await
        .unwrap();
    assert_eq!(out["activeTabId"], "t1");
    assert_eq!(out["snapshot"]["title"], "Docs");
}

#[tokio::test]
async fn test_stale_ref_is_rejected_after_navigation() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    run(&tool, json!({"action": "navigate", "url": "https://site.test/docs"}))
        .await
        .unwrap();
    let err = run(&tool, json!({"action": "click", "ref": "e1"})).await.unwrap_err();
    assert!(matches!(err, BrowserError::RefNotFound { .. }));

    // Lookups are case-sensitive.
    run(&tool, json!({"action": "back"})).await.unwrap();
    let err = run(&tool, json!({"action": "click", "ref": "E5"})).await.unwrap_err();
    assert!(matches!(err, BrowserError::RefNotFound { .. }));
}

#[tokio::test]
async fn test_click_ref_follows_link_with_referer() {
    let site = site();
    let tool = fetch_only(site.clone());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    let out = run(&tool, json!({"action": "click", "ref": "e1"})).await.unwrap();
    assert_eq!(out["snapshot"]["url"], "https://site.test/docs");
    assert_eq!(out["tab"]["historyLength"], 2);

    let last = site.requests().pop().unwrap();
    assert!(last
        .headers
        .iter()
        .any(|(k, v)| k == "Referer" && v == "https://site.test/"));
}

#[tokio::test]
async fn test_legacy_click_by_text_and_missing_link() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    let err = run(&tool, json!({"action": "click", "text": "pricing"})).await.unwrap_err();
    assert!(matches!(err, BrowserError::LinkNotFound(_)));
    let out = run(&tool, json!({"action": "click", "text": "docs"})).await.unwrap();
    assert_eq!(out["snapshot"]["title"], "Docs");
}

#[tokio::test]
async fn test_fill_and_submit_get_form() {
    let site = site();
    let tool = fetch_only(site.clone());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    let out = run(
        &tool,
        json!({"action": "fill", "formIndex": 1, "field": "q", "value": "rust & tokio"}),
    )
    .await
    .unwrap();
    assert_eq!(out["formIndex"], 1);
    assert_eq!(out["field"], "q");

    let out = run(&tool, json!({"action": "submit"})).await.unwrap();
    assert_eq!(out["snapshot"]["title"], "Results");
    let last = site.requests().pop().unwrap();
    assert_eq!(last.method, HttpMethod::Get);
    assert_eq!(last.url.query(), Some("q=rust+%26+tokio"));
}

#[tokio::test]
async fn test_fill_validates_form_and_field() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();

    let err = run(&tool, json!({"action": "fill", "value": "x"})).await.unwrap_err();
    assert!(matches!(err, BrowserError::MissingParameter(_)));

    let err = run(&tool, json!({"action": "fill", "formIndex": 3, "field": "q", "value": "x"}))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::FormNotFound(3)));

    let err = run(&tool, json!({"action": "fill", "field": "nope", "value": "x"}))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::FieldNotFound { form: 1, .. }));

    let err = run(&tool, json!({"action": "fill", "ref": "e1", "value": "x"}))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::InvalidParameter(_)));
}

#[tokio::test]
async fn test_live_only_actions_fail_fast_on_fetch() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    for params in [
        json!({"action": "hover", "selector": "a"}),
        json!({"action": "press", "key": "Enter"}),
        json!({"action": "evaluate", "expression": "1 + 1"}),
        json!({"action": "console"}),
        json!({"action": "dialog", "accept": true}),
        json!({"action": "pdf"}),
        json!({"action": "scroll"}),
        json!({"action": "resize", "width": 800}),
        json!({"action": "screenshot"}),
        json!({"action": "click", "selector": "a"}),
    ] {
        let err = run(&tool, params.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported, "{}", params);
    }
}

#[tokio::test]
async fn test_explicit_live_without_driver() {
    let tool = fetch_only(site());
    let out = run(
        &tool,
        json!({"action": "open", "url": "https://site.test/", "engine": "live"}),
    )
    .await
    .unwrap();
    assert_eq!(out["engine"], "fetch");
    assert_eq!(out["fallbackFrom"], "live");
    assert!(out["fallbackReason"].is_string());

    let err = run(
        &tool,
        json!({"action": "open", "url": "https://site.test/", "engine": "live", "allowFallback": false}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BrowserError::LiveUnavailable(_)));
}

#[tokio::test]
async fn test_history_boundaries_are_reported() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    let out = run(&tool, json!({"action": "back"})).await.unwrap();
    assert_eq!(out["moved"], false);
    assert!(out["reason"].as_str().unwrap().contains("oldest"));

    run(&tool, json!({"action": "navigate", "url": "https://site.test/docs"}))
        .await
        .unwrap();
    let out = run(&tool, json!({"action": "back"})).await.unwrap();
    assert_eq!(out["moved"], true);
    assert_eq!(out["snapshot"]["title"], "Home");
    let out = run(&tool, json!({"action": "forward"})).await.unwrap();
    assert_eq!(out["snapshot"]["url"], "https://site.test/docs");
}

#[tokio::test]
async fn test_failed_history_move_keeps_position() {
    struct Switchable {
        site: Arc<Site>,
        down: AtomicBool,
    }
    #[async_trait]
    impl HttpFetcher for Switchable {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BrowserError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(BrowserError::Http("connection reset".to_string()));
            }
            self.site.send(request).await
        }
    }
    let fetcher = Arc::new(Switchable {
        site: site(),
        down: AtomicBool::new(false),
    });
    let tool = BrowserTool::new(BrowserToolConfig::default(), fetcher.clone(), None);
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    run(&tool, json!({"action": "navigate", "url": "https://site.test/docs"}))
        .await
        .unwrap();

    fetcher.down.store(true, Ordering::SeqCst);
    let err = run(&tool, json!({"action": "back"})).await.unwrap_err();
    assert!(matches!(err, BrowserError::Http(_)));

    let tabs = run(&tool, json!({"action": "tabs"})).await.unwrap();
    let tab = &tabs["tabs"][0];
    assert_eq!(tab["historyIndex"], 1);
    assert_eq!(tab["url"], "https://site.test/docs");
    assert_eq!(tab["title"], "Docs");
    assert_eq!(tab["hasSnapshot"], true);

    fetcher.down.store(false, Ordering::SeqCst);
    let out = run(&tool, json!({"action": "back"})).await.unwrap();
    assert_eq!(out["moved"], true);
    assert_eq!(out["snapshot"]["title"], "Home");
}

#[tokio::test]
async fn test_act_reports_kind() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    let out = run(&tool, json!({"action": "act", "kind": "click", "ref": "e1"}))
        .await
        .unwrap();
    assert_eq!(out["action"], "act");
    assert_eq!(out["kind"], "click");
    assert_eq!(out["snapshot"]["title"], "Docs");
}

#[tokio::test]
async fn test_focus_close_and_reset() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    run(&tool, json!({"action": "open", "url": "https://site.test/docs"})).await.unwrap();

    let err = run(&tool, json!({"action": "focus"})).await.unwrap_err();
    assert!(matches!(err, BrowserError::MissingParameter(_)));
    let out = run(&tool, json!({"action": "focus", "tabId": "t1"})).await.unwrap();
    assert_eq!(out["activeTabId"], "t1");

    let out = run(&tool, json!({"action": "close"})).await.unwrap();
    assert_eq!(out["closed"], "t1");
    assert_eq!(out["activeTabId"], "t2");

    let out = run(&tool, json!({"action": "reset"})).await.unwrap();
    assert_eq!(out["reset"], true);
    assert!(out["activeTabId"].is_null());
    let out = run(&tool, json!({"action": "open", "url": "https://site.test/"})).await.unwrap();
    assert_eq!(out["activeTabId"], "t1");
}

#[tokio::test]
async fn test_open_external_uses_launcher() {
    let launcher = Arc::new(RecordingLauncher::default());
    let tool = fetch_only(site()).with_launcher(launcher.clone());
    let out = run(&tool, json!({"action": "open_external", "url": "https://site.test/x"}))
        .await
        .unwrap();
    assert_eq!(out["opened"], "https://site.test/x");
    assert_eq!(launcher.opened.lock().as_slice(), ["https://site.test/x"]);

    let err = run(&tool, json!({"action": "open_external", "url": "file:///etc/passwd"}))
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::InvalidUrl(_)));
    assert_eq!(launcher.opened.lock().len(), 1);
}

#[tokio::test]
async fn test_fetch_login_reports_mfa() {
    let site = Arc::new(
        Site::default()
            .page(
                "/login",
                r#"<title>Sign in</title><form method="post" action="/session">
                <input type="hidden" name="csrf" value="tok">
                <input name="username"><input type="password" name="password">
                </form>"#,
            )
            .page(
                "/session",
                r#"<title>Verify</title><p>Enter the verification code from your authenticator app</p>
                <form method="post" action="/otp"><input name="otp"></form>"#,
            )
            .page("/otp", "<title>Dashboard</title><p>Welcome</p>"),
    );
    let store = StaticCredentialStore::new().with("site.test", Credential::password("ann", "s3cret"));
    let tool = fetch_only(site.clone()).with_credentials(Arc::new(store));

    run(&tool, json!({"action": "open", "url": "https://site.test/login"}))
        .await
        .unwrap();
    let out = run(&tool, json!({"action": "login"})).await.unwrap();
    assert_eq!(out["service"], "site.test");
    assert_eq!(out["identifier"], "ann");
    assert_eq!(out["authMode"], "password");
    assert_eq!(out["requiresMfa"], true);
    let body = site.requests().pop().unwrap().body.unwrap();
    assert_eq!(body, "csrf=tok&username=ann&password=s3cret");

    let out = run(&tool, json!({"action": "mfa", "code": "123456"})).await.unwrap();
    assert_eq!(out["requiresMfa"], false);
    assert_eq!(out["snapshot"]["title"], "Dashboard");
    assert_eq!(site.requests().pop().unwrap().body.as_deref(), Some("otp=123456"));
}

#[tokio::test]
async fn test_login_without_credential() {
    let tool = fetch_only(site());
    run(&tool, json!({"action": "open", "url": "https://www.site.test/"}))
        .await
        .unwrap();
    let err = run(&tool, json!({"action": "login", "service": "Acme"}))
        .await
        .unwrap_err();
    match err {
        BrowserError::CredentialNotFound(tried) => assert_eq!(tried, "acme, site.test, site"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_execute_wraps_envelope() {
    let tool = fetch_only(site());
    let ctx = ToolContext::new("s1").with_correlation_id("call-7");
    let result = tool
        .execute(json!({"action": "open", "url": "https://site.test/"}), ctx)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.content, "open ok: https://site.test/ (Home)");
    assert_eq!(result.metadata.get("callId"), Some(&json!("call-7")));
    assert_eq!(result.structured_output.unwrap()["engine"], "fetch");
}

#[tokio::test]
async fn test_execute_maps_errors() {
    let tool = fetch_only(site());
    let err = tool
        .execute(json!({"action": "open", "url": "ftp://x"}), ToolContext::new("s1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidParameters(_)));

    let err = tool
        .execute(json!({"action": "snapshot", "tabId": "t9"}), ToolContext::new("s1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::ResourceNotFound(_)));

    let ctx = ToolContext::new("s1");
    ctx.abort_signal.abort();
    let err = tool.execute(json!({"action": "tabs"}), ctx).await.unwrap_err();
    assert!(matches!(err, ToolError::Cancelled));
}
