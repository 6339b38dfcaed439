// ── Vitalis Engine — Chat Workflow ─────────────────────────────────────────
// The composition root: one turn end to end.
//
//   retrieve context → run the tool-calling loop → validate (+ at most one
//   corrective retry) → store the interaction → respond
//
// Dependencies are constructed once at process start and passed in — no
// module-level singletons. Fatal errors (critical retrieval, model failure,
// short-term storage) abort the turn; `respond` maps them to a generic
// user-visible message that never leaks internal error text.

use std::sync::Arc;

use log::{error, info};

use crate::atoms::error::EngineResult;
use crate::atoms::memory_types::MemoryFlags;
use crate::atoms::types::ChatResponse;
use crate::engine::agent_loop::run_agent_turn;
use crate::engine::config::EngineConfig;
use crate::engine::memory::MemoryCoordinator;
use crate::engine::providers::ModelProvider;
use crate::engine::tools::ToolRegistry;
use crate::engine::validation::validate_and_correct;

/// Shown when a turn aborts. Internal detail goes to the log, not the user.
pub const GENERIC_FAILURE_TEXT: &str =
    "I'm sorry — something went wrong while processing that. Please try again.";

pub struct ChatEngine {
    coordinator: Arc<MemoryCoordinator>,
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    config: EngineConfig,
}

impl ChatEngine {
    pub fn new(
        coordinator: Arc<MemoryCoordinator>,
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ToolRegistry>,
        config: EngineConfig,
    ) -> Self {
        ChatEngine { coordinator, provider, registry, config }
    }

    pub fn coordinator(&self) -> &MemoryCoordinator {
        &self.coordinator
    }

    /// One full chat turn. Errors returned here are the fatal ones: critical
    /// retrieval failures, model endpoint failure, short-term storage
    /// failure. Everything else already degraded along the way.
    pub async fn handle_message(&self, session_id: &str, user_msg: &str) -> EngineResult<ChatResponse> {
        let context = self
            .coordinator
            .retrieve_all_context(session_id, user_msg, MemoryFlags::default())
            .await?;

        let outcome = run_agent_turn(
            self.provider.as_ref(),
            &self.registry,
            &context,
            user_msg,
            &self.config.chat,
        )
        .await?;

        let validation = validate_and_correct(
            self.provider.as_ref(),
            user_msg,
            &outcome.text,
            &outcome.tool_transcript,
            &outcome.messages,
            &self.config.validation,
        )
        .await;

        let stored = self
            .coordinator
            .store_interaction(
                session_id,
                user_msg,
                &validation.final_text,
                &outcome.tools_used,
                outcome.execution_time_ms,
                outcome.success_score(),
            )
            .await?;

        info!(
            "[chat] Turn done: session={} tools={:?} score={:.2} corrected={} stored={:?}",
            session_id,
            outcome.tools_used,
            validation.report.score(),
            validation.corrected,
            stored
        );

        Ok(ChatResponse {
            text: validation.final_text,
            tools_used: outcome.tools_used,
            tool_calls_made: outcome.tool_calls_made,
            execution_time_ms: outcome.execution_time_ms,
            validation_score: validation.report.score(),
            corrected: validation.corrected,
        })
    }

    /// `handle_message`, with fatal errors mapped to the generic failure
    /// response for direct use by a transport layer.
    pub async fn respond(&self, session_id: &str, user_msg: &str) -> ChatResponse {
        match self.handle_message(session_id, user_msg).await {
            Ok(response) => response,
            Err(e) => {
                error!("[chat] Turn aborted for session {session_id}: {e}");
                ChatResponse {
                    text: GENERIC_FAILURE_TEXT.to_string(),
                    tools_used: Vec::new(),
                    tool_calls_made: 0,
                    execution_time_ms: 0,
                    validation_score: 0.0,
                    corrected: false,
                }
            }
        }
    }
}
