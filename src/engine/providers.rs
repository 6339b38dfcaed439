// ── Vitalis Engine — Model Provider ────────────────────────────────────────
// Direct HTTP calls to the LLM endpoint. No gateway, no middleman.
//
// The boundary is narrow: a message list plus optional tool schemas in, one
// completed turn out — either final text or a batch of tool-call requests.
// Transient HTTP failures (429/5xx) are retried here with exponential
// backoff so the loop above stays free of transport concerns.

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde_json::{json, Value};

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Message, ModelTurn, TokenUsage, ToolCall, ToolDefinition};
use crate::engine::config::LoopConfig;

/// Retry configuration for transient API errors.
const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// Check if an HTTP status code should be retried.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 529)
}

/// Sleep with exponential backoff.
async fn retry_delay(attempt: u32) {
    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
    tokio::time::sleep(delay).await;
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// One model call. The turn terminates in final text or tool calls.
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> EngineResult<ModelTurn>;
}

// ── Ollama-compatible chat endpoint ────────────────────────────────────────

/// Non-streaming `POST {base}/api/chat` with OpenAI-style tool schemas.
pub struct OllamaChatProvider {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaChatProvider {
    pub fn new(config: &LoopConfig) -> Self {
        OllamaChatProvider {
            client: Client::new(),
            base_url: config.model_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.model_timeout_secs),
        }
    }

    fn format_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let mut v = json!({
                    "role": serde_json::to_value(m.role).unwrap_or(Value::Null),
                    "content": m.content,
                });
                if let Some(calls) = &m.tool_calls {
                    v["tool_calls"] = calls
                        .iter()
                        .map(|c| {
                            json!({
                                "function": {
                                    "name": c.name,
                                    "arguments": serde_json::from_str::<Value>(&c.arguments)
                                        .unwrap_or(Value::Null),
                                }
                            })
                        })
                        .collect();
                }
                v
            })
            .collect()
    }

    fn format_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn parse_turn(v: &Value) -> ModelTurn {
        let message = &v["message"];
        let text = message["content"].as_str().unwrap_or_default().to_string();

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        let name = c["function"]["name"].as_str()?.to_string();
                        // Arguments arrive as an object; the loop carries
                        // them as the JSON string the tool will parse.
                        let arguments = serde_json::to_string(&c["function"]["arguments"]).ok()?;
                        Some(ToolCall {
                            id: format!("call_{}", uuid::Uuid::new_v4()),
                            name,
                            arguments,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage = match (v["prompt_eval_count"].as_u64(), v["eval_count"].as_u64()) {
            (None, None) => None,
            (input, output) => Some(TokenUsage {
                input_tokens: input.unwrap_or(0),
                output_tokens: output.unwrap_or(0),
            }),
        };

        ModelTurn { text, tool_calls, usage }
    }
}

#[async_trait]
impl ModelProvider for OllamaChatProvider {
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> EngineResult<ModelTurn> {
        let url = format!("{}/api/chat", self.base_url);
        let mut body = json!({
            "model": self.model,
            "messages": Self::format_messages(messages),
            "stream": false,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(Self::format_tools(tools));
        }

        let mut attempt = 0;
        loop {
            let resp = self
                .client
                .post(&url)
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| EngineError::Model(format!("endpoint unreachable at {}: {e}", self.base_url)))?;

            let status = resp.status();
            if status.is_success() {
                let v: Value = resp
                    .json()
                    .await
                    .map_err(|e| EngineError::Model(format!("undecodable response: {e}")))?;
                let turn = Self::parse_turn(&v);
                info!(
                    "[model] Turn: {} chars, {} tool calls",
                    turn.text.len(),
                    turn.tool_calls.len()
                );
                return Ok(turn);
            }

            let detail = resp.text().await.unwrap_or_default();
            if is_retryable_status(status.as_u16()) && attempt < MAX_RETRIES {
                warn!(
                    "[model] {} from endpoint (attempt {}/{}), backing off",
                    status,
                    attempt + 1,
                    MAX_RETRIES
                );
                retry_delay(attempt).await;
                attempt += 1;
                continue;
            }
            return Err(EngineError::Model(format!("endpoint returned {status}: {detail}")));
        }
    }
}

// ── Scripted test double ───────────────────────────────────────────────────

/// Replays a fixed sequence of turns; repeats the last one when the script
/// runs out. Records every message list it was called with.
pub struct ScriptedProvider {
    turns: parking_lot::Mutex<Vec<ModelTurn>>,
    pub calls: parking_lot::Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        ScriptedProvider { turns: parking_lot::Mutex::new(turns), calls: parking_lot::Mutex::new(Vec::new()) }
    }

    /// A provider that answers every call with the same turn.
    pub fn repeating(turn: ModelTurn) -> Self {
        Self::new(vec![turn])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, messages: &[Message], _tools: &[ToolDefinition]) -> EngineResult<ModelTurn> {
        self.calls.lock().push(messages.to_vec());
        let mut turns = self.turns.lock();
        if turns.len() > 1 {
            Ok(turns.remove(0))
        } else {
            turns
                .first()
                .cloned()
                .ok_or_else(|| EngineError::Model("scripted provider exhausted".into()))
        }
    }
}
