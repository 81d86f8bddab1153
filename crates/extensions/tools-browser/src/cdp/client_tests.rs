use super::*;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_version_reads_debugger_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Browser": "HeadlessChrome/126.0.0.0",
            "Protocol-Version": "1.3",
            "webSocketDebuggerUrl": "ws://127.0.0.1:1/devtools/browser/x"
        })))
        .mount(&server)
        .await;

    let version = CdpClient::version(&server.uri()).await.unwrap();
    assert_eq!(version.browser, "HeadlessChrome/126.0.0.0");
    assert!(version.web_socket_debugger_url.starts_with("ws://"));
}

#[tokio::test]
async fn test_version_unreachable_endpoint() {
    let err = CdpClient::version("http://127.0.0.1:9").await.unwrap_err();
    assert!(matches!(err, CdpError::ChromeNotAvailable(_)));
}

#[tokio::test]
async fn test_connect_fails_when_websocket_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Browser": "HeadlessChrome",
            "Protocol-Version": "1.3",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9/devtools/browser/none"
        })))
        .mount(&server)
        .await;

    let result = CdpClient::connect(&server.uri(), Duration::from_secs(1)).await;
    assert!(matches!(result, Err(CdpError::ConnectionFailed(_))));
}
