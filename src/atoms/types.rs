// ── Vitalis Atoms: Chat Types ──────────────────────────────────────────────
// The data structures that flow through the tool-calling loop.
// They are independent of any specific model provider.

use serde::{Deserialize, Serialize};

// ── Messages ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message { role: Role::System, content: content.into(), tool_calls: None, tool_call_id: None, name: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message { role: Role::User, content: content.into(), tool_calls: None, tool_call_id: None, name: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message { role: Role::Assistant, content: content.into(), tool_calls: None, tool_call_id: None, name: None }
    }

    /// Assistant message that requests tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(calls),
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool-result message, linked back to the originating call.
    pub fn tool_result(call_id: impl Into<String>, tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Message {
            role: Role::Tool,
            content: output.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            name: Some(tool_name.into()),
        }
    }
}

// ── Tool calling ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the argument object.
    pub parameters: serde_json::Value,
}

/// Result of executing one tool call. Failures are plain text prefixed with
/// `Error:` so the model can read and react to them on the next round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub output: String,
    pub success: bool,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        ToolResult { output: output.into(), success: true }
    }

    pub fn error(reason: impl std::fmt::Display) -> Self {
        ToolResult { output: format!("Error: {reason}"), success: false }
    }
}

// ── Model turns ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One completed model response: either final text, or a batch of tool-call
/// requests (possibly with interleaved text).
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl ModelTurn {
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

// ── Chat responses ─────────────────────────────────────────────────────────

/// The outcome of one full chat turn, returned to the transport layer.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub text: String,
    pub tools_used: Vec<String>,
    pub tool_calls_made: u32,
    pub execution_time_ms: u64,
    /// Validation score for the final text (1.0 when nothing to check).
    pub validation_score: f32,
    /// Whether a corrective retry replaced the original response.
    pub corrected: bool,
}
