//! Tool trait definition.

use async_trait::async_trait;

use super::{ToolContext, ToolDefinition, ToolResult};
use crate::error::ToolError;
use crate::types::RiskLevel;

/// Core trait for tools.
///
/// Tools are executable units that agents can invoke to perform actions.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult, ToolError>;

    /// Validate the parameters before execution.
    fn validate(&self, params: &serde_json::Value) -> Result<(), ToolError> {
        let definition = self.definition();
        if let Some(schema) = &definition.parameters_schema {
            if schema.get("type") == Some(&serde_json::json!("object")) && !params.is_object() {
                return Err(ToolError::ValidationFailed(
                    "Parameters must be an object".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Returns the risk level of this tool.
    fn risk_level(&self) -> RiskLevel {
        self.definition().risk_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        definition: ToolDefinition,
    }

    impl EchoTool {
        fn with_schema(schema: serde_json::Value) -> Self {
            Self {
                definition: ToolDefinition::new("echo", "Echo", "Echoes the action name")
                    .with_parameters_schema(schema)
                    .with_risk_level(RiskLevel::Medium),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(
            &self,
            params: serde_json::Value,
            _ctx: ToolContext,
        ) -> Result<ToolResult, ToolError> {
            let action = params["action"].as_str().unwrap_or("none").to_string();
            Ok(ToolResult::success(action))
        }
    }

    #[test]
    fn test_validate_object_schema_accepts_object() {
        let tool = EchoTool::with_schema(serde_json::json!({"type": "object"}));
        assert!(tool.validate(&serde_json::json!({"action": "open"})).is_ok());
    }

    #[test]
    fn test_validate_object_schema_rejects_scalars() {
        let tool = EchoTool::with_schema(serde_json::json!({"type": "object"}));
        for params in [
            serde_json::json!("open"),
            serde_json::json!(42),
            serde_json::json!([1, 2]),
            serde_json::Value::Null,
        ] {
            match tool.validate(&params) {
                Err(ToolError::ValidationFailed(msg)) => assert!(msg.contains("must be an object")),
                other => panic!("expected ValidationFailed, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_validate_non_object_schema() {
        let tool = EchoTool::with_schema(serde_json::json!({"type": "string"}));
        assert!(tool.validate(&serde_json::json!("anything")).is_ok());
    }

    #[test]
    fn test_risk_level_from_definition() {
        let tool = EchoTool::with_schema(serde_json::json!({"type": "object"}));
        assert_eq!(tool.risk_level(), RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_execute() {
        let tool = EchoTool::with_schema(serde_json::json!({"type": "object"}));
        let ctx = ToolContext::new("session-1");
        let result = tool
            .execute(serde_json::json!({"action": "snapshot"}), ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "snapshot");
    }
}
