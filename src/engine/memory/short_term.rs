// ── Vitalis Memory — Short-Term Store ──────────────────────────────────────
// Per-session conversation log with TTL refresh and token-budget trimming.
//
// Storage is a newest-first list (O(1) prepend). Retrieval formats the
// recent window oldest-first for prompt inclusion. The token-aware variant
// drops oldest messages until the window fits `max_tokens × usage_ratio`,
// but never below the keep-floor — hitting the floor while still over
// budget is reported in the usage stats, not an error.

use std::sync::Arc;

use log::{debug, warn};

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::memory_types::{ContextUsage, ConversationMessage, ConversationRole};
use crate::engine::config::MemoryConfig;
use crate::engine::memory::tokenizer::Tokenizer;
use crate::engine::store::MemoryStore;

pub const STORE_NAME: &str = "short_term";

pub struct ShortTermMemory {
    store: Arc<dyn MemoryStore>,
    config: MemoryConfig,
    tokenizer: Tokenizer,
}

impl ShortTermMemory {
    pub fn new(store: Arc<dyn MemoryStore>, config: MemoryConfig) -> Self {
        ShortTermMemory { store, config, tokenizer: Tokenizer::heuristic() }
    }

    /// Append one message to the session log, refreshing the session TTL.
    pub async fn append(&self, session_id: &str, role: ConversationRole, content: &str) -> EngineResult<()> {
        let message = ConversationMessage {
            role,
            content: content.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        self.store
            .push_message(session_id, &message, self.config.session_ttl_secs)
            .await
            .map_err(|e| match e {
                EngineError::CircuitBreakerOpen => EngineError::CircuitBreakerOpen,
                other => EngineError::storage(STORE_NAME, other.to_string()),
            })
    }

    /// The recent window as a formatted block, oldest first.
    /// `None` when the session has no history.
    pub async fn get_context(&self, session_id: &str, limit: usize) -> EngineResult<Option<String>> {
        let messages = self.fetch(session_id, limit).await?;
        if messages.is_empty() {
            return Ok(None);
        }
        Ok(Some(format_context(&messages)))
    }

    /// Token-aware variant: same window, trimmed to the configured budget.
    pub async fn get_context_token_aware(
        &self,
        session_id: &str,
        limit: usize,
    ) -> EngineResult<(Option<String>, ContextUsage)> {
        let messages = self.fetch(session_id, limit).await?;
        if messages.is_empty() {
            return Ok((None, ContextUsage::default()));
        }

        let threshold =
            (self.config.context_max_tokens as f32 * self.config.context_usage_ratio) as usize;
        let (kept, usage) = trim_messages(
            &messages,
            &self.tokenizer,
            threshold,
            self.config.min_messages_to_keep,
        );
        if usage.is_over_threshold {
            warn!(
                "[memory] Session {} context still {} tokens over a {} threshold at the keep-floor",
                session_id,
                usage.total_tokens - usage.threshold,
                usage.threshold
            );
        } else if usage.messages_dropped > 0 {
            debug!(
                "[memory] Session {} trimmed {} oldest messages to fit {} tokens",
                session_id, usage.messages_dropped, threshold
            );
        }
        Ok((Some(format_context(kept)), usage))
    }

    pub async fn len(&self, session_id: &str) -> EngineResult<usize> {
        self.store.session_len(session_id).await
    }

    pub async fn clear(&self, session_id: &str) -> EngineResult<()> {
        self.store.drop_session(session_id).await
    }

    async fn fetch(&self, session_id: &str, limit: usize) -> EngineResult<Vec<ConversationMessage>> {
        self.store
            .recent_messages(session_id, limit)
            .await
            .map_err(|e| match e {
                EngineError::CircuitBreakerOpen => EngineError::CircuitBreakerOpen,
                other => EngineError::retrieval(STORE_NAME, other.to_string()),
            })
    }
}

/// Drop oldest messages (the tail of a newest-first list) until the window
/// fits `threshold` tokens or only `min_keep` messages remain. Windows that
/// already fit come back unchanged.
///
/// Returns the kept slice (still newest first) and usage accounting.
pub fn trim_messages<'a>(
    messages: &'a [ConversationMessage],
    tokenizer: &Tokenizer,
    threshold: usize,
    min_keep: usize,
) -> (&'a [ConversationMessage], ContextUsage) {
    let mut kept = messages.len();
    let count = |n: usize| tokenizer.count_messages(messages[..n].iter().map(|m| m.content.as_str()));

    let mut total = count(kept);
    while total > threshold && kept > min_keep.min(messages.len()) {
        kept -= 1;
        total = count(kept);
    }

    let usage = ContextUsage {
        total_tokens: total,
        threshold,
        messages_kept: kept,
        messages_dropped: messages.len() - kept,
        is_over_threshold: total > threshold,
    };
    (&messages[..kept], usage)
}

/// Render a newest-first window as `User:` / `Assistant:` lines, oldest first.
fn format_context(messages: &[ConversationMessage]) -> String {
    messages
        .iter()
        .rev()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
