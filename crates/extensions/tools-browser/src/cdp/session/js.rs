//! JavaScript execution operations for CDP page session.

use serde_json::{json, Value};

use crate::cdp::error::CdpError;
use crate::cdp::protocol::ExceptionDetails;

use super::core::PageSession;

fn exception_error(result: &Value) -> Option<CdpError> {
    let details = result.get("exceptionDetails")?;
    let message = serde_json::from_value::<ExceptionDetails>(details.clone())
        .map(|d| d.message())
        .unwrap_or_else(|_| "Unknown error".to_string());
    Some(CdpError::JavaScript(message))
}

impl PageSession {
    /// Evaluate JavaScript expression, awaiting promises.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(err) = exception_error(&result) {
            return Err(err);
        }

        Ok(result["result"]["value"].clone())
    }

    /// Call `function` with `this` bound to a remote object.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, CdpError> {
        let params = json!({
            "objectId": object_id,
            "functionDeclaration": function,
            "arguments": args.into_iter().map(|v| json!({"value": v})).collect::<Vec<_>>(),
            "returnByValue": true,
            "awaitPromise": true,
        });

        let result = self.call("Runtime.callFunctionOn", Some(params)).await?;

        if let Some(err) = exception_error(&result) {
            return Err(err);
        }

        Ok(result["result"]["value"].clone())
    }

    /// Run `function` against the element matched by `selector`.
    pub async fn call_on_selector(
        &self,
        selector: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, CdpError> {
        let node_id = self
            .query_selector(selector)
            .await?
            .ok_or_else(|| CdpError::ElementNotFound(selector.to_string()))?;
        let object_id = self.resolve_node(node_id).await?;
        self.call_function_on(&object_id, function, args).await
    }
}
