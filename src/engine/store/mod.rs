// ── Vitalis Engine — Store Layer ───────────────────────────────────────────
// One generic storage interface behind which the four memory kinds live.
//
// Module layout:
//   breaker.rs — three-state circuit breaker (shared back-pressure)
//   redis.rs   — pooled Redis Stack client: hash records, HNSW KNN queries
//   memory.rs  — in-process store for tests and offline runs
//
// Records are `VectorRecord`s keyed `health:{scope}:{kind}:{timestamp}` with
// a TTL; session conversation logs are newest-first lists under
// `health:session:{id}:messages`.

pub mod breaker;
pub mod memory;
pub mod redis;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::atoms::error::EngineResult;
use crate::atoms::memory_types::{ConversationMessage, RecordKind, ScoredRecord, VectorRecord};

pub use breaker::{BreakerState, CircuitBreaker};
pub use memory::InMemoryStore;
pub use redis::RedisMemoryStore;

// ── Queries ────────────────────────────────────────────────────────────────

/// A similarity query against one vector index. Tag filters are exact-match
/// conjunctions (every listed tag must match).
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub filter_tags: BTreeMap<String, String>,
    pub top_k: usize,
}

impl VectorQuery {
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        VectorQuery { vector, filter_tags: BTreeMap::new(), top_k }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter_tags.insert(key.into(), value.into());
        self
    }
}

// ── The storage interface ──────────────────────────────────────────────────

/// Generic record store shared by all four memory kinds. Implementations own
/// their connection usage and TTL enforcement; callers own record shapes.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist a record under `health:{scope}:{kind}:{timestamp}` with a TTL.
    /// Returns the storage key.
    async fn put_record(&self, scope: &str, record: VectorRecord, ttl_secs: i64) -> EngineResult<String>;

    /// Cosine-similarity search over one kind's index, highest score first.
    async fn query_records(&self, kind: RecordKind, query: VectorQuery) -> EngineResult<Vec<ScoredRecord>>;

    /// Delete every record of a kind within a scope. Returns how many went.
    async fn delete_records(&self, kind: RecordKind, scope: &str) -> EngineResult<usize>;

    /// Count records of a kind within a scope.
    async fn count_records(&self, kind: RecordKind, scope: &str) -> EngineResult<usize>;

    /// O(1) prepend to a session's conversation log, refreshing its TTL.
    async fn push_message(
        &self,
        session_id: &str,
        message: &ConversationMessage,
        ttl_secs: i64,
    ) -> EngineResult<()>;

    /// Up to `limit` messages, newest first.
    async fn recent_messages(&self, session_id: &str, limit: usize) -> EngineResult<Vec<ConversationMessage>>;

    /// Total messages currently held for a session.
    async fn session_len(&self, session_id: &str) -> EngineResult<usize>;

    /// Remove a session's conversation log entirely.
    async fn drop_session(&self, session_id: &str) -> EngineResult<()>;
}

/// Key for a session's conversation list.
pub fn session_key(session_id: &str) -> String {
    format!("{}:session:{}:messages", crate::atoms::constants::KEY_DOMAIN, session_id)
}

// ── Vector byte packing ────────────────────────────────────────────────────
// Vector fields travel as fixed-byte-length little-endian f32 arrays.

pub fn f32_vec_to_bytes(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ── Similarity ─────────────────────────────────────────────────────────────

/// Cosine similarity in [-1, 1]; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
