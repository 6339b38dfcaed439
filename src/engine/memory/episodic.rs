// ── Vitalis Memory — Episodic Store ────────────────────────────────────────
// User-specific discrete events: health goals and notable interactions.
// Records are append-only — goals are never mutated; when several goals for
// one metric exist, the latest-by-similarity wins at read time.
//
// Goal capture starts from the utterance itself: "my goal is to reach 150
// lbs" parses into `{metric: weight, value: 150, unit: lbs}`, renders to a
// natural-language description, and is embedded and written with the
// standard record TTL.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::LazyLock;

use log::info;
use regex::Regex;

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::memory_types::{EpisodicGoal, RecordKind, ScoredRecord, VectorRecord};
use crate::engine::config::MemoryConfig;
use crate::engine::memory::embedding::Embedder;
use crate::engine::store::{MemoryStore, VectorQuery};

pub const STORE_NAME: &str = "episodic";

pub struct EpisodicMemory {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    config: MemoryConfig,
    scope: String,
}

impl EpisodicMemory {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        config: MemoryConfig,
        scope: impl Into<String>,
    ) -> Self {
        EpisodicMemory { store, embedder, config, scope: scope.into() }
    }

    /// Persist one goal record. The description is what gets embedded, so
    /// later similarity queries ("what's my weight goal") land on it.
    pub async fn store_goal(&self, goal: &EpisodicGoal) -> EngineResult<String> {
        let description = describe_goal(goal);
        let embedding = self.embedder.embed(&description).await?;

        let mut scope_tags = BTreeMap::new();
        scope_tags.insert("event_type".to_string(), "goal".to_string());
        scope_tags.insert("metric".to_string(), goal.metric.clone());

        let record = VectorRecord {
            kind: RecordKind::Episodic,
            scope_tags,
            timestamp: chrono::Utc::now().timestamp_millis(),
            description,
            metadata: serde_json::to_value(goal)?,
            embedding,
        };

        let key = self
            .store
            .put_record(&self.scope, record, self.config.record_ttl_secs)
            .await
            .map_err(wrap_storage)?;
        info!("[memory] Stored goal {}={} {} ({})", goal.metric, goal.value, goal.unit, key);
        Ok(key)
    }

    /// Persist a notable interaction as an episodic event.
    pub async fn store_event(&self, user_msg: &str, assistant_msg: &str) -> EngineResult<String> {
        let description = format!("User asked: {}", truncate(user_msg, 200));
        let embedding = self.embedder.embed(&description).await?;

        let mut scope_tags = BTreeMap::new();
        scope_tags.insert("event_type".to_string(), "interaction".to_string());

        let record = VectorRecord {
            kind: RecordKind::Episodic,
            scope_tags,
            timestamp: chrono::Utc::now().timestamp_millis(),
            description,
            metadata: serde_json::json!({
                "user": truncate(user_msg, 500),
                "assistant": truncate(assistant_msg, 500),
            }),
            embedding,
        };

        self.store
            .put_record(&self.scope, record, self.config.record_ttl_secs)
            .await
            .map_err(wrap_storage)
    }

    /// Similarity search over goal records only.
    pub async fn retrieve_goals(&self, query: &str, top_k: usize) -> EngineResult<Vec<ScoredRecord>> {
        let vector = self.embedder.embed(query).await?;
        let q = VectorQuery::new(vector, top_k)
            .with_tag("scope", &self.scope)
            .with_tag("event_type", "goal");
        self.query(q).await
    }

    /// Similarity search across every episodic record in scope.
    pub async fn retrieve_events(&self, query: &str, top_k: usize) -> EngineResult<Vec<ScoredRecord>> {
        let vector = self.embedder.embed(query).await?;
        let q = VectorQuery::new(vector, top_k).with_tag("scope", &self.scope);
        self.query(q).await
    }

    pub async fn count(&self) -> EngineResult<usize> {
        self.store.count_records(RecordKind::Episodic, &self.scope).await
    }

    pub async fn clear(&self) -> EngineResult<usize> {
        self.store.delete_records(RecordKind::Episodic, &self.scope).await
    }

    async fn query(&self, q: VectorQuery) -> EngineResult<Vec<ScoredRecord>> {
        self.store.query_records(RecordKind::Episodic, q).await.map_err(|e| match e {
            EngineError::CircuitBreakerOpen => EngineError::CircuitBreakerOpen,
            other => EngineError::retrieval(STORE_NAME, other.to_string()),
        })
    }
}

fn wrap_storage(e: EngineError) -> EngineError {
    match e {
        EngineError::CircuitBreakerOpen => EngineError::CircuitBreakerOpen,
        other => EngineError::storage(STORE_NAME, other.to_string()),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Natural-language rendering of a goal, the text that gets embedded.
pub fn describe_goal(goal: &EpisodicGoal) -> String {
    format!("User goal: {} of {} {}", goal.metric, goal.value, goal.unit)
}

// ── Goal-utterance parsing ─────────────────────────────────────────────────

static GOAL_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(my goal|goal is|i want to (?:reach|hit|get to|weigh|lose|walk|sleep)|i(?:'| a)m aiming (?:for|to)|aim (?:for|to)|my target)\b",
    )
    .expect("goal phrase regex")
});

static GOAL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(lbs|lb|pounds|kg|kilograms|kilos|bpm|steps|hours|hrs|km|miles|mi|kcal|calories)?")
        .expect("goal value regex")
});

/// Keyword table mapping units and mentions to canonical metric names.
fn infer_metric(utterance: &str, unit: &str) -> (String, String) {
    let u = unit.to_lowercase();
    let canonical_unit = match u.as_str() {
        "lb" | "pounds" => "lbs".to_string(),
        "kilograms" | "kilos" => "kg".to_string(),
        "hrs" => "hours".to_string(),
        "mi" => "miles".to_string(),
        "calories" => "kcal".to_string(),
        other => other.to_string(),
    };
    let metric = match canonical_unit.as_str() {
        "lbs" | "kg" => "weight",
        "bpm" => "heart_rate",
        "steps" => "steps",
        "hours" => "sleep",
        "km" | "miles" => "distance",
        "kcal" => "calories",
        _ => {
            let t = utterance.to_lowercase();
            if t.contains("weigh") || t.contains("weight") {
                "weight"
            } else if t.contains("step") {
                "steps"
            } else if t.contains("sleep") {
                "sleep"
            } else if t.contains("heart") {
                "heart_rate"
            } else {
                "unknown"
            }
        }
    };
    (metric.to_string(), canonical_unit)
}

/// Parse a goal-setting utterance into a typed goal, or `None` when the text
/// is not goal-shaped (no goal phrase, or no numeric target).
pub fn parse_goal_utterance(text: &str) -> Option<EpisodicGoal> {
    if !GOAL_PHRASE.is_match(text) {
        return None;
    }
    let caps = GOAL_VALUE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let (metric, unit) = infer_metric(text, unit);
    Some(EpisodicGoal { metric, value, unit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weight_goal() {
        let goal = parse_goal_utterance("my goal is to reach 150 lbs").unwrap();
        assert_eq!(goal, EpisodicGoal { metric: "weight".into(), value: 150.0, unit: "lbs".into() });
    }

    #[test]
    fn parses_step_goal_with_unit_word() {
        let goal = parse_goal_utterance("I want to walk 10000 steps every day").unwrap();
        assert_eq!(goal.metric, "steps");
        assert_eq!(goal.value, 10_000.0);
    }

    #[test]
    fn infers_metric_from_context_when_unit_missing() {
        let goal = parse_goal_utterance("my target weight is 68").unwrap();
        assert_eq!(goal.metric, "weight");
        assert_eq!(goal.value, 68.0);
    }

    #[test]
    fn non_goal_text_is_rejected() {
        assert!(parse_goal_utterance("what was my heart rate yesterday").is_none());
        assert!(parse_goal_utterance("my goal is to feel better").is_none());
    }

    #[test]
    fn goal_description_is_readable() {
        let goal = EpisodicGoal { metric: "weight".into(), value: 150.0, unit: "lbs".into() };
        assert_eq!(describe_goal(&goal), "User goal: weight of 150 lbs");
    }
}
