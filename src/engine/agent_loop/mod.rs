// Vitalis Engine — Agentic Loop
// The core orchestration loop: send to model → tool calls → execute → repeat.
//
// Per turn: START → AWAIT_MODEL → (tool calls?) → EXEC_TOOLS → AWAIT_MODEL
// → … → DONE. The loop is strictly sequential — one model call, then its
// tool calls in order — so tool-call ordering stays deterministic and
// auditable. Termination: a model turn with no tool calls, or the
// `max_tool_calls` budget. Tool failures are fed back to the model as
// `Error: …` results, never raised.

mod helpers;

use std::time::Instant;

use log::{info, warn};

use crate::atoms::error::EngineResult;
use crate::atoms::memory_types::MemoryContext;
use crate::atoms::types::Message;
use crate::engine::config::LoopConfig;
use crate::engine::providers::ModelProvider;
use crate::engine::tools::ToolRegistry;

pub use helpers::compose_system_prompt;

/// Transient per-turn loop state. Destroyed at end of turn; the coordinator
/// persists a derived subset (conversation message, procedural pattern).
pub struct ToolLoopState {
    pub messages: Vec<Message>,
    pub tool_calls_made: u32,
    pub max_tool_calls: u32,
    pub tools_used: Vec<String>,
}

impl ToolLoopState {
    fn new(system_prompt: String, user_msg: &str, max_tool_calls: u32) -> Self {
        ToolLoopState {
            messages: vec![Message::system(system_prompt), Message::user(user_msg)],
            tool_calls_made: 0,
            max_tool_calls,
            tools_used: Vec::new(),
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.tool_calls_made >= self.max_tool_calls
    }
}

/// What one completed turn hands back to the chat layer.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub tools_used: Vec<String>,
    pub tool_calls_made: u32,
    pub tool_failures: u32,
    /// Concatenated raw tool outputs for this turn — the validator's
    /// ground truth.
    pub tool_transcript: String,
    pub execution_time_ms: u64,
    /// Message history at DONE, for the corrective-retry pathway.
    pub messages: Vec<Message>,
}

impl TurnOutcome {
    /// Fraction of tool calls that succeeded (1.0 when none were made).
    pub fn success_score(&self) -> f32 {
        if self.tool_calls_made == 0 {
            1.0
        } else {
            (self.tool_calls_made - self.tool_failures) as f32 / self.tool_calls_made as f32
        }
    }
}

/// Run a complete agent turn: send messages to the model, execute tool
/// calls, and repeat until the model produces a final text response or the
/// tool-call budget is spent.
pub async fn run_agent_turn(
    provider: &dyn ModelProvider,
    registry: &ToolRegistry,
    context: &MemoryContext,
    user_msg: &str,
    config: &LoopConfig,
) -> EngineResult<TurnOutcome> {
    let started = Instant::now();
    let mut state = ToolLoopState::new(compose_system_prompt(context), user_msg, config.max_tool_calls);
    let tool_defs = registry.definitions();

    let mut final_text = String::new();
    let mut transcript = String::new();
    let mut tool_failures = 0u32;
    let mut round = 0u32;

    loop {
        if state.budget_exhausted() {
            warn!(
                "[engine] Tool-call budget ({}) spent after {} rounds, stopping",
                state.max_tool_calls, round
            );
            if final_text.is_empty() {
                final_text = helpers::budget_exhausted_fallback();
            }
            break;
        }
        round += 1;

        // ── 1. Call the model ──────────────────────────────────────────
        let turn = provider.chat(&state.messages, &tool_defs).await?;
        info!(
            "[engine] Round {} session turn: {} chars, {} tool calls ({}/{} budget)",
            round,
            turn.text.len(),
            turn.tool_calls.len(),
            state.tool_calls_made,
            state.max_tool_calls
        );

        // ── 2. No tool calls: the turn is done ─────────────────────────
        if turn.is_final() {
            final_text = if turn.text.is_empty() {
                warn!("[engine] Model returned an empty final turn at round {round}");
                helpers::empty_response_fallback()
            } else {
                turn.text.clone()
            };
            state.messages.push(Message::assistant(turn.text));
            break;
        }

        // ── 3. Record the request, then execute each call in order ─────
        state
            .messages
            .push(Message::assistant_tool_calls(turn.text.clone(), turn.tool_calls.clone()));

        for call in &turn.tool_calls {
            if state.budget_exhausted() {
                warn!(
                    "[engine] Budget spent mid-batch; skipping remaining calls from round {round}"
                );
                break;
            }

            let result = registry.execute(call).await;
            state.tool_calls_made += 1;
            if !state.tools_used.contains(&call.name) {
                state.tools_used.push(call.name.clone());
            }
            if !result.success {
                tool_failures += 1;
            }

            transcript.push_str(&result.output);
            transcript.push('\n');
            state
                .messages
                .push(Message::tool_result(call.id.clone(), call.name.clone(), result.output));
        }

        // ── 4. Loop: the model sees the results next round ─────────────
    }

    Ok(TurnOutcome {
        text: final_text,
        tools_used: state.tools_used,
        tool_calls_made: state.tool_calls_made,
        tool_failures,
        tool_transcript: transcript,
        execution_time_ms: started.elapsed().as_millis() as u64,
        messages: state.messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{ModelTurn, ToolCall, ToolDefinition};
    use crate::engine::providers::ScriptedProvider;
    use crate::engine::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Metrics;

    #[async_trait]
    impl Tool for Metrics {
        fn name(&self) -> &str {
            "get_health_metrics"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "get_health_metrics".into(),
                description: "Aggregate a health metric".into(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Ok(json!({"average": "72.5 bpm"}))
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "broken"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition { name: "broken".into(), description: "".into(), parameters: json!({}) }
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Err("backend unavailable".into())
        }
    }

    fn tool_call_turn(name: &str) -> ModelTurn {
        ModelTurn {
            text: String::new(),
            tool_calls: vec![ToolCall { id: "c".into(), name: name.into(), arguments: "{}".into() }],
            usage: None,
        }
    }

    fn config(max: u32) -> LoopConfig {
        LoopConfig { max_tool_calls: max, ..LoopConfig::default() }
    }

    #[tokio::test]
    async fn terminates_without_tool_calls() {
        let provider = ScriptedProvider::repeating(ModelTurn { text: "hello".into(), ..Default::default() });
        let registry = ToolRegistry::new();
        let outcome =
            run_agent_turn(&provider, &registry, &MemoryContext::default(), "hi", &config(6)).await.unwrap();
        assert_eq!(outcome.text, "hello");
        assert_eq!(outcome.tool_calls_made, 0);
        assert_eq!(outcome.success_score(), 1.0);
    }

    #[tokio::test]
    async fn always_calling_model_is_bounded_exactly() {
        let provider = ScriptedProvider::repeating(tool_call_turn("get_health_metrics"));
        let registry = ToolRegistry::new().with(Arc::new(Metrics));
        let outcome =
            run_agent_turn(&provider, &registry, &MemoryContext::default(), "hi", &config(3)).await.unwrap();
        // Exactly 3 tool calls executed, then the loop stops.
        assert_eq!(outcome.tool_calls_made, 3);
        assert_eq!(provider.call_count(), 3);
        assert!(!outcome.text.is_empty());
    }

    #[tokio::test]
    async fn tool_failure_is_fed_back_not_fatal() {
        let provider = ScriptedProvider::new(vec![
            tool_call_turn("broken"),
            ModelTurn { text: "The metrics backend is unavailable right now.".into(), ..Default::default() },
        ]);
        let registry = ToolRegistry::new().with(Arc::new(Failing));
        let outcome =
            run_agent_turn(&provider, &registry, &MemoryContext::default(), "hi", &config(6)).await.unwrap();
        assert_eq!(outcome.tool_failures, 1);
        assert!(outcome.tool_transcript.contains("Error: backend unavailable"));
        assert!(outcome.text.contains("unavailable"));
        assert!(outcome.success_score() < 1.0);
        // The error reached the model as a tool-result message.
        let second_call = &provider.calls.lock()[1];
        assert!(second_call.iter().any(|m| m.content.starts_with("Error:")));
    }

    #[tokio::test]
    async fn transcript_collects_raw_tool_output() {
        let provider = ScriptedProvider::new(vec![
            tool_call_turn("get_health_metrics"),
            ModelTurn { text: "Your average heart rate was 72.5 bpm.".into(), ..Default::default() },
        ]);
        let registry = ToolRegistry::new().with(Arc::new(Metrics));
        let outcome =
            run_agent_turn(&provider, &registry, &MemoryContext::default(), "hi", &config(6)).await.unwrap();
        assert!(outcome.tool_transcript.contains("72.5 bpm"));
        assert_eq!(outcome.tools_used, vec!["get_health_metrics".to_string()]);
    }
}
