//! Tool execution context.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Context for tool execution.
#[derive(Clone)]
pub struct ToolContext {
    /// Session ID for the current session.
    pub session_id: String,

    /// Correlation ID for tracing; doubles as the call id of one invocation.
    pub correlation_id: String,

    /// Abort signal for cancellation.
    pub abort_signal: Arc<AbortSignal>,

    /// Additional context data.
    pub data: HashMap<String, serde_json::Value>,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
            abort_signal: Arc::new(AbortSignal::new()),
            data: HashMap::new(),
        }
    }

    /// Use an explicit call id instead of a generated one.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Check if the operation should be aborted.
    pub fn is_aborted(&self) -> bool {
        self.abort_signal.is_aborted()
    }
}

/// Signal for aborting operations.
pub struct AbortSignal {
    aborted: AtomicBool,
}

impl AbortSignal {
    /// Create a new abort signal.
    pub fn new() -> Self {
        Self {
            aborted: AtomicBool::new(false),
        }
    }

    /// Check if aborted.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Trigger the abort.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_context_new() {
        let ctx = ToolContext::new("session-1");
        assert_eq!(ctx.session_id, "session-1");
        assert!(!ctx.correlation_id.is_empty());
        assert!(ctx.data.is_empty());
        assert!(!ctx.is_aborted());
    }

    #[test]
    fn test_explicit_correlation_id() {
        let ctx = ToolContext::new("s").with_correlation_id("call-7");
        assert_eq!(ctx.correlation_id, "call-7");
    }

    #[test]
    fn test_shared_abort_signal() {
        let ctx = ToolContext::new("session-1");
        let signal = ctx.abort_signal.clone();
        signal.abort();
        signal.abort();
        assert!(ctx.is_aborted());
    }

    #[test]
    fn test_correlation_id_unique() {
        let a = ToolContext::new("s");
        let b = ToolContext::new("s");
        assert_ne!(a.correlation_id, b.correlation_id);
    }
}
