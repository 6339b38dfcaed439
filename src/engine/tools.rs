// ── Vitalis Engine — Tool Registry ─────────────────────────────────────────
// Every tool call the model requests goes through here.
//
// Tools are named functions taking a JSON argument object and returning a
// JSON result. Implementations live outside this core (the health-data
// aggregation service registers its own); the engine owns only the
// contract and the dispatch. A failure — unknown tool, bad arguments,
// execution error — becomes `Error: …` result text for the model to read,
// never a loop-fatal error.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;

use crate::atoms::types::{ToolCall, ToolDefinition, ToolResult};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Schema advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute with a parsed JSON argument object. `Err` is a human/model
    /// readable reason, not an internal error chain.
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!("[tools] Re-registered tool '{name}'");
        }
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas for every registered tool, in stable name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute one requested call. The result's `output` is what the model
    /// sees; the validator later scans the same text as ground truth.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let tool = match self.tools.get(&call.name) {
            Some(tool) => tool,
            None => {
                warn!("[tools] Unknown tool requested: {}", call.name);
                return ToolResult::error(format!("unknown tool '{}'", call.name));
            }
        };

        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(Value::Null) => Value::Object(serde_json::Map::new()),
            Ok(v) => v,
            Err(e) => {
                warn!("[tools] Undecodable arguments for {}: {e}", call.name);
                return ToolResult::error(format!("invalid arguments for '{}': {e}", call.name));
            }
        };

        info!("[tools] Executing {} id={}", call.name, call.id);
        match tool.execute(args).await {
            Ok(result) => {
                let output = match &result {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                ToolResult::ok(output)
            }
            Err(reason) => {
                warn!("[tools] {} failed: {reason}", call.name);
                ToolResult::error(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Adder;

    #[async_trait]
    impl Tool for Adder {
        fn name(&self) -> &str {
            "add"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "add".into(),
                description: "Add two numbers".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                    "required": ["a", "b"]
                }),
            }
        }

        async fn execute(&self, args: Value) -> Result<Value, String> {
            let a = args["a"].as_f64().ok_or("missing 'a'")?;
            let b = args["b"].as_f64().ok_or("missing 'b'")?;
            Ok(json!({"sum": a + b}))
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall { id: "call_1".into(), name: name.into(), arguments: arguments.into() }
    }

    #[tokio::test]
    async fn dispatch_and_result_text() {
        let registry = ToolRegistry::new().with(Arc::new(Adder));
        let result = registry.execute(&call("add", r#"{"a": 2, "b": 3}"#)).await;
        assert!(result.success);
        assert!(result.output.contains("5"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute(&call("nope", "{}")).await;
        assert!(!result.success);
        assert!(result.output.starts_with("Error:"));
    }

    #[tokio::test]
    async fn tool_failure_is_an_error_result() {
        let registry = ToolRegistry::new().with(Arc::new(Adder));
        let result = registry.execute(&call("add", r#"{"a": 2}"#)).await;
        assert!(!result.success);
        assert!(result.output.contains("missing 'b'"));
    }

    #[tokio::test]
    async fn bad_argument_json_is_an_error_result() {
        let registry = ToolRegistry::new().with(Arc::new(Adder));
        let result = registry.execute(&call("add", "not json")).await;
        assert!(!result.success);
        assert!(result.output.starts_with("Error: invalid arguments"));
    }
}
