// ── Vitalis Atoms: Error Types ─────────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (store, embedding, tool, model…).
//   • Per-store failures carry the store name so the coordinator can log and
//     degrade the right slice of context.
//   • Retrieval errors carry a `critical` flag: non-critical failures are
//     downgraded to "no context available", critical ones abort the turn.
//   • No variant carries internal detail that is shown to end users; the chat
//     layer maps fatal errors to a generic failure message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Redis protocol or connection failure.
    #[error("Store error: {0}")]
    Store(#[from] bb8_redis::redis::RedisError),

    /// Connection pool exhaustion or checkout failure.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Input shape rejected at a store or component boundary
    /// (e.g. a record written without its embedding vector).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A memory store failed to produce context for a query.
    #[error("Memory retrieval failed ({store}): {reason}")]
    MemoryRetrieval {
        store: &'static str,
        reason: String,
        /// Critical retrieval errors propagate out of the coordinator
        /// instead of degrading to empty context.
        critical: bool,
    },

    /// A memory store failed to persist a record.
    #[error("Memory storage failed ({store}): {reason}")]
    MemoryStorage { store: &'static str, reason: String },

    /// Tool execution failure (tool name + underlying reason).
    #[error("Tool error: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    /// The shared circuit breaker is open; the store call was never attempted.
    #[error("Circuit breaker is open — store operations suspended")]
    CircuitBreakerOpen,

    /// Embedding endpoint failure: empty input, non-200 upstream response,
    /// or a vector of the wrong dimension.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Model (LLM) endpoint failure after retries.
    #[error("Model error: {0}")]
    Model(String),

    /// Engine configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    /// Non-critical retrieval failure for a named store.
    pub fn retrieval(store: &'static str, reason: impl Into<String>) -> Self {
        Self::MemoryRetrieval { store, reason: reason.into(), critical: false }
    }

    /// Critical retrieval failure — propagates out of the coordinator.
    pub fn retrieval_critical(store: &'static str, reason: impl Into<String>) -> Self {
        Self::MemoryRetrieval { store, reason: reason.into(), critical: true }
    }

    /// Storage failure for a named store.
    pub fn storage(store: &'static str, reason: impl Into<String>) -> Self {
        Self::MemoryStorage { store, reason: reason.into() }
    }

    /// Tool execution failure with name and reason.
    pub fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolExecution { tool: tool.into(), reason: reason.into() }
    }

    /// True when this error must abort the current turn rather than degrade.
    pub fn is_critical(&self) -> bool {
        matches!(self, EngineError::MemoryRetrieval { critical: true, .. })
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations return this type.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_criticality() {
        assert!(!EngineError::retrieval("semantic", "index missing").is_critical());
        assert!(EngineError::retrieval_critical("episodic", "corrupt record").is_critical());
        assert!(!EngineError::CircuitBreakerOpen.is_critical());
    }

    #[test]
    fn display_carries_store_name() {
        let e = EngineError::storage("short_term", "LPUSH failed");
        assert!(e.to_string().contains("short_term"));
    }
}
