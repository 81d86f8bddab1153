//! CDP WebSocket client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use super::error::CdpError;
use super::protocol::{BrowserVersion, CdpRequest, CdpResponse};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>>;
type EventHandlers = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<CdpResponse>>>>;

/// Session key for browser-level events (no `sessionId`).
pub const BROWSER_SESSION: &str = "";

/// One WebSocket connection to the browser endpoint. Page sessions are
/// multiplexed over it with flattened `sessionId`s.
pub struct CdpClient {
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: PendingMap,
    event_handlers: EventHandlers,
    connected: Arc<AtomicBool>,
    command_timeout: Duration,
    recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to the debugging endpoint, e.g. `http://127.0.0.1:9222`.
    pub async fn connect(endpoint: &str, command_timeout: Duration) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/');
        let version = Self::version(http_endpoint).await?;
        debug!("Connected to browser: {}", version.browser);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&version.web_socket_debugger_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let event_handlers: EventHandlers = Arc::new(RwLock::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let recv_task = {
            let pending = pending.clone();
            let event_handlers = event_handlers.clone();
            let connected = connected.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, pending.clone(), event_handlers.clone()).await;
                connected.store(false, Ordering::SeqCst);
                // Dropping the senders fails in-flight calls and ends every subscriber.
                pending.lock().clear();
                event_handlers.write().await.clear();
            })
        };

        debug!("CDP client connected to {}", version.web_socket_debugger_url);

        Ok(Self {
            ws_tx: tokio::sync::Mutex::new(ws_sink),
            request_id: AtomicU64::new(1),
            pending,
            event_handlers,
            connected,
            command_timeout,
            recv_task,
        })
    }

    /// `GET /json/version` on the debugging endpoint.
    pub async fn version(http_endpoint: &str) -> Result<BrowserVersion, CdpError> {
        let version_url = format!("{}/json/version", http_endpoint);
        reqwest::get(&version_url)
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", http_endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", http_endpoint, e)))
    }

    async fn receive_loop(mut ws_source: WsSource, pending: PendingMap, event_handlers: EventHandlers) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {}", text);
                    let resp = match serde_json::from_str::<CdpResponse>(&text) {
                        Ok(resp) => resp,
                        Err(e) => {
                            warn!("Failed to parse CDP message: {}", e);
                            continue;
                        }
                    };
                    if let Some(id) = resp.id {
                        if let Some(tx) = pending.lock().remove(&id) {
                            let result = match resp.error {
                                Some(error) => Err(CdpError::Protocol {
                                    code: error.code,
                                    message: error.message,
                                }),
                                None => Ok(resp.result.unwrap_or(Value::Null)),
                            };
                            let _ = tx.send(result);
                        }
                    } else if resp.method.is_some() {
                        let session_id = resp.session_id.clone().unwrap_or_default();
                        let handlers = event_handlers.read().await;
                        if let Some(tx) = handlers.get(&session_id) {
                            let _ = tx.send(resp);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    debug!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send a command and wait for its response. `session_id` targets an
    /// attached page; `None` talks to the browser itself.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        self.call_with_timeout(method, params, session_id, self.command_timeout)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Value, CdpError> {
        if !self.is_connected() {
            return Err(CdpError::SessionClosed);
        }
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.pending.lock().remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!(
                    "{} did not answer within {}ms",
                    method,
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Receive events for `session_id` ([`BROWSER_SESSION`] for browser-level).
    pub async fn subscribe(&self, session_id: &str) -> mpsc::UnboundedReceiver<CdpResponse> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_handlers
            .write()
            .await
            .insert(session_id.to_string(), tx);
        rx
    }

    pub async fn unsubscribe(&self, session_id: &str) {
        self.event_handlers.write().await.remove(session_id);
    }

    /// Attach to a target with a flattened session and return its `sessionId`.
    pub async fn attach(&self, target_id: &str) -> Result<String, CdpError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
                None,
            )
            .await?;

        result["sessionId"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))
    }

    /// Close a page/target.
    pub async fn close_target(&self, target_id: &str) -> Result<(), CdpError> {
        self.call(
            "Target.closeTarget",
            Some(json!({"targetId": target_id})),
            None,
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
