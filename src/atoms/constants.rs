// ── Vitalis Atoms: Constants ───────────────────────────────────────────────
// All named constants for the crate live here.
// Rationale: collecting constants in one place eliminates magic numbers,
// makes auditing easier, and keeps every layer's code self-documenting.

// ── Vector store ───────────────────────────────────────────────────────────
// The embedding dimension is fixed per deployment. A vector of any other
// length is a total failure at the write boundary — never truncated/padded.
pub const EMBEDDING_DIMENSION: usize = 1024;

/// TTL for long-term memory records (~210 days). The durable health-data
/// blob lives outside this core and does not expire.
pub const MEMORY_TTL_SECS: i64 = 210 * 24 * 60 * 60;

/// TTL for a session's conversation list, refreshed on every append.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Key prefix for everything this engine writes.
pub const KEY_DOMAIN: &str = "health";

// ── Connection manager / circuit breaker ───────────────────────────────────
pub const POOL_MAX_CONNECTIONS: u32 = 16;
pub const BREAKER_FAILURE_THRESHOLD: u32 = 5;
pub const BREAKER_RECOVERY_TIMEOUT_SECS: u64 = 30;

// ── Short-term context trimming ────────────────────────────────────────────
// Token-aware retrieval drops oldest messages until the context fits
// `max_tokens × usage_ratio`, but never below the keep-floor.
pub const CONTEXT_MAX_TOKENS: usize = 4096;
pub const CONTEXT_USAGE_RATIO: f32 = 0.8;
pub const MIN_MESSAGES_TO_KEEP: usize = 3;
pub const CONTEXT_MESSAGE_LIMIT: usize = 20;

// ── Tool-calling loop ──────────────────────────────────────────────────────
pub const MAX_TOOL_CALLS: u32 = 6;
pub const MODEL_TIMEOUT_SECS: u64 = 60;
pub const EMBEDDING_TIMEOUT_SECS: u64 = 30;

// ── Procedural memory ──────────────────────────────────────────────────────
// Patterns below the floor are dropped (a no-op, not an error); plans built
// from static defaults carry the fallback confidence.
pub const MIN_PATTERN_SUCCESS_SCORE: f32 = 0.7;
pub const DEFAULT_PLAN_CONFIDENCE: f32 = 0.3;

// ── Coordinator storage gates ──────────────────────────────────────────────
/// Responses at or below this length are not worth an episodic event record.
pub const EPISODIC_MIN_RESPONSE_CHARS: usize = 50;

// ── Response validation ────────────────────────────────────────────────────
pub const NUMERIC_TOLERANCE: f32 = 0.1;
pub const NUMERIC_ABSOLUTE_SLACK: f64 = 1.0;
pub const VALIDATION_PASS_SCORE: f32 = 0.8;

// ── Retrieval defaults ─────────────────────────────────────────────────────
pub const DEFAULT_TOP_K: usize = 3;
