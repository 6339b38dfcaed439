// ── Vitalis Engine — Configuration ─────────────────────────────────────────
// One config struct per subsystem, aggregated into `EngineConfig`.
// Constructed once at process start and passed by reference into the
// engine — there are no module-level singletons.
//
// Heuristic constants (plan fallback confidence, numeric tolerance) are
// fields, not hard-codes; deployments tune them.

use serde::{Deserialize, Serialize};

use crate::atoms::constants::*;

// ── Store ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis-compatible store, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    pub pool_max_connections: u32,
    pub breaker_failure_threshold: u32,
    pub breaker_recovery_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            url: "redis://127.0.0.1:6379".into(),
            pool_max_connections: POOL_MAX_CONNECTIONS,
            breaker_failure_threshold: BREAKER_FAILURE_THRESHOLD,
            breaker_recovery_timeout_secs: BREAKER_RECOVERY_TIMEOUT_SECS,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub embedding_base_url: String,
    pub embedding_model: String,
    /// Fixed per deployment; wrong-dimension vectors are total failures.
    pub embedding_dimension: usize,
    pub record_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub context_max_tokens: usize,
    pub context_usage_ratio: f32,
    pub min_messages_to_keep: usize,
    pub context_message_limit: usize,
    pub top_k: usize,
    /// Floor below which tool-call patterns are not persisted.
    pub min_pattern_success_score: f32,
    /// Confidence assigned to plans built from static defaults.
    pub default_plan_confidence: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            embedding_base_url: "http://localhost:11434".into(),
            embedding_model: "mxbai-embed-large".into(),
            embedding_dimension: EMBEDDING_DIMENSION,
            record_ttl_secs: MEMORY_TTL_SECS,
            session_ttl_secs: SESSION_TTL_SECS,
            context_max_tokens: CONTEXT_MAX_TOKENS,
            context_usage_ratio: CONTEXT_USAGE_RATIO,
            min_messages_to_keep: MIN_MESSAGES_TO_KEEP,
            context_message_limit: CONTEXT_MESSAGE_LIMIT,
            top_k: DEFAULT_TOP_K,
            min_pattern_success_score: MIN_PATTERN_SUCCESS_SCORE,
            default_plan_confidence: DEFAULT_PLAN_CONFIDENCE,
        }
    }
}

// ── Tool-calling loop ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub model_base_url: String,
    pub model: String,
    pub max_tool_calls: u32,
    pub model_timeout_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            model_base_url: "http://localhost:11434".into(),
            model: "llama3.1".into(),
            max_tool_calls: MAX_TOOL_CALLS,
            model_timeout_secs: MODEL_TIMEOUT_SECS,
        }
    }
}

// ── Response validation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Relative tolerance for numeric matching.
    pub tolerance: f32,
    /// Minimum matched-fraction for a response to pass.
    pub pass_score: f32,
    /// Master switch; when off, every response reports valid at 1.0.
    pub enabled: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig { tolerance: NUMERIC_TOLERANCE, pass_score: VALIDATION_PASS_SCORE, enabled: true }
    }
}

// ── Aggregate ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub memory: MemoryConfig,
    pub chat: LoopConfig,
    pub validation: ValidationConfig,
}
