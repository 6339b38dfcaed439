// ── Vitalis Atoms: Memory Types ────────────────────────────────────────────
// Typed record shapes for the four memory kinds, plus the generic
// `VectorRecord` storage primitive they all lower to.
//
// The store keeps one schema (`VectorRecord`); each memory kind owns a typed
// view over it. Records are append-only: goals and patterns are never
// mutated in place — newer records win at read time by similarity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::atoms::error::{EngineError, EngineResult};

// ── Record kinds & the generic storage shape ───────────────────────────────

/// Which vector index a record belongs to. Each kind has its own
/// independently-schemed index over the same underlying store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Episodic,
    Procedural,
    Semantic,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Episodic => "episodic",
            RecordKind::Procedural => "procedural",
            RecordKind::Semantic => "semantic",
        }
    }
}

/// The generic record shape underlying the episodic / procedural / semantic
/// stores. `scope_tags` are exact-match filterable; `metadata` is the typed
/// payload serialized to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub kind: RecordKind,
    pub scope_tags: BTreeMap<String, String>,
    /// Unix epoch milliseconds; also the key discriminator, so two records
    /// written in the same millisecond would collide.
    pub timestamp: i64,
    /// Natural-language description; this is the text that was embedded.
    pub description: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    /// Storage key: `health:{scope}:{type}:{timestamp}`.
    pub fn key(&self, scope: &str) -> String {
        format!("health:{}:{}:{}", scope, self.kind.as_str(), self.timestamp)
    }

    /// A record must carry a vector of exactly the configured dimension;
    /// anything else is rejected at the write boundary.
    pub fn check_dimension(&self, dimension: usize) -> EngineResult<()> {
        if self.embedding.len() != dimension {
            return Err(EngineError::Validation(format!(
                "record embedding has {} dims, index requires {}",
                self.embedding.len(),
                dimension
            )));
        }
        Ok(())
    }
}

/// A record returned from a similarity query, with its cosine score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}

// ── Typed views per memory kind ────────────────────────────────────────────

/// A user health goal, captured from a goal-setting utterance.
/// Append-only; the latest-by-similarity goal wins at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicGoal {
    pub metric: String,
    pub value: f64,
    pub unit: String,
}

/// A successful tool-call sequence for a class of query.
/// Only persisted when `success_score ≥ min_success_score`; never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProceduralPattern {
    pub query_type: QueryType,
    pub tools_used: Vec<String>,
    pub success_score: f32,
    pub execution_time_ms: u64,
}

/// A pre-populated domain fact. Owned by an offline loading process; this
/// core only reads them (and exposes the write boundary the loader calls).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticFact {
    pub category: String,
    pub fact_type: String,
    pub confidence: f32,
    pub content: String,
}

// ── Query classification ───────────────────────────────────────────────────

/// The small fixed set of query classes the procedural planner understands.
/// Classification is keyword-based; the first matching class wins and
/// anything unmatched falls back to `HealthMetric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    HealthMetric,
    Trend,
    Goal,
    Comparison,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::HealthMetric => "health_metric",
            QueryType::Trend => "trend",
            QueryType::Goal => "goal",
            QueryType::Comparison => "comparison",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A suggested tool sequence for an incoming query, produced by the
/// procedural planning step.
#[derive(Debug, Clone, Serialize)]
pub struct ToolPlan {
    pub query_type: QueryType,
    pub tools: Vec<String>,
    pub confidence: f32,
    /// True when the plan came from a stored pattern rather than the
    /// static per-type default.
    pub from_pattern: bool,
}

// ── Conversation log ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

impl ConversationRole {
    pub fn label(&self) -> &'static str {
        match self {
            ConversationRole::User => "User",
            ConversationRole::Assistant => "Assistant",
        }
    }
}

/// Usage accounting for token-aware context retrieval.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextUsage {
    pub total_tokens: usize,
    pub threshold: usize,
    pub messages_kept: usize,
    pub messages_dropped: usize,
    /// Set when trimming hit the keep-floor while still over the threshold.
    /// The context is returned anyway; this is a report, not an error.
    pub is_over_threshold: bool,
}

// ── Assembled context ──────────────────────────────────────────────────────

/// Everything the coordinator gathered for one turn. Any slice may be empty
/// when its store failed non-critically; the chat proceeds with less.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub conversation: Option<String>,
    pub conversation_usage: Option<ContextUsage>,
    pub goals: Vec<ScoredRecord>,
    pub facts: Vec<ScoredRecord>,
    pub plan: Option<ToolPlan>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.conversation.is_none() && self.goals.is_empty() && self.facts.is_empty() && self.plan.is_none()
    }
}

/// Which long-term slices a retrieval (or bulk clear) should touch.
#[derive(Debug, Clone, Copy)]
pub struct MemoryFlags {
    pub episodic: bool,
    pub procedural: bool,
    pub semantic: bool,
}

impl Default for MemoryFlags {
    fn default() -> Self {
        MemoryFlags { episodic: true, procedural: true, semantic: true }
    }
}

// ── Stats ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    pub session_messages: usize,
    pub episodic_records: usize,
    pub procedural_records: usize,
    pub semantic_records: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_key_scheme() {
        let rec = VectorRecord {
            kind: RecordKind::Episodic,
            scope_tags: BTreeMap::new(),
            timestamp: 1_700_000_000,
            description: "goal".into(),
            metadata: serde_json::json!({}),
            embedding: vec![0.0; 4],
        };
        assert_eq!(rec.key("user"), "health:user:episodic:1700000000");
    }

    #[test]
    fn dimension_check_rejects_mismatch() {
        let rec = VectorRecord {
            kind: RecordKind::Semantic,
            scope_tags: BTreeMap::new(),
            timestamp: 0,
            description: String::new(),
            metadata: serde_json::json!({}),
            embedding: vec![0.0; 8],
        };
        assert!(rec.check_dimension(8).is_ok());
        assert!(rec.check_dimension(1024).is_err());
    }
}
