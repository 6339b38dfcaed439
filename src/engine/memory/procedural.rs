// ── Vitalis Memory — Procedural Store ──────────────────────────────────────
// Past successful tool-call sequences, used to plan new, similar queries.
//
// Write side: a pattern is only worth keeping when it worked — anything
// below the success floor is silently dropped (`Ok(false)`, not an error).
// Patterns are never updated in place.
//
// Read side runs the planning step: classify the query into a small fixed
// set of types by keyword (first matching category wins, default
// `health_metric`), then either suggest the tool sequence of the best
// stored pattern (confidence = its success score) or fall back to the
// static per-type default at the configured fallback confidence.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::memory_types::{ProceduralPattern, QueryType, RecordKind, ToolPlan, VectorRecord};
use crate::engine::config::MemoryConfig;
use crate::engine::memory::embedding::Embedder;
use crate::engine::store::{MemoryStore, VectorQuery};

pub const STORE_NAME: &str = "procedural";

// ── Query classification ───────────────────────────────────────────────────

const TREND_KEYWORDS: &[&str] =
    &["trend", "over time", "progress", "improving", "getting better", "getting worse", "history", "change"];
const GOAL_KEYWORDS: &[&str] = &["goal", "target", "aim"];
const COMPARISON_KEYWORDS: &[&str] =
    &["compare", "comparison", " vs ", "versus", "difference between", "more than", "less than"];

/// Keyword classification; categories are checked in a fixed order and the
/// first hit wins. Unmatched queries are plain metric lookups.
pub fn classify_query(query: &str) -> QueryType {
    let q = query.to_lowercase();
    let contains_any = |terms: &[&str]| terms.iter().any(|t| q.contains(t));

    if contains_any(TREND_KEYWORDS) {
        QueryType::Trend
    } else if contains_any(GOAL_KEYWORDS) {
        QueryType::Goal
    } else if contains_any(COMPARISON_KEYWORDS) {
        QueryType::Comparison
    } else {
        QueryType::HealthMetric
    }
}

/// Static tool sequence per query type, used when no stored pattern applies.
pub fn default_tools(query_type: QueryType) -> Vec<String> {
    let tools: &[&str] = match query_type {
        QueryType::HealthMetric => &["get_health_metrics"],
        QueryType::Trend => &["get_health_metrics", "analyze_trends"],
        QueryType::Goal => &["get_goals", "get_health_metrics"],
        QueryType::Comparison => &["get_health_metrics", "compare_periods"],
    };
    tools.iter().map(|t| t.to_string()).collect()
}

// ── Store ──────────────────────────────────────────────────────────────────

pub struct ProceduralMemory {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    config: MemoryConfig,
    scope: String,
}

impl ProceduralMemory {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        config: MemoryConfig,
        scope: impl Into<String>,
    ) -> Self {
        ProceduralMemory { store, embedder, config, scope: scope.into() }
    }

    /// Persist a pattern when it cleared the success floor.
    /// Returns `Ok(false)` — a no-op, not an error — below the floor.
    pub async fn store_pattern(&self, query: &str, pattern: &ProceduralPattern) -> EngineResult<bool> {
        if !(0.0..=1.0).contains(&pattern.success_score) {
            return Err(EngineError::Validation(format!(
                "success_score {} outside [0, 1]",
                pattern.success_score
            )));
        }
        if pattern.success_score < self.config.min_pattern_success_score {
            debug!(
                "[memory] Dropping pattern for '{}' (score {:.2} < floor {:.2})",
                pattern.query_type, pattern.success_score, self.config.min_pattern_success_score
            );
            return Ok(false);
        }

        let description = format!("Query pattern ({}): {}", pattern.query_type, query);
        let embedding = self.embedder.embed(&description).await?;

        let mut scope_tags = BTreeMap::new();
        scope_tags.insert("query_type".to_string(), pattern.query_type.as_str().to_string());

        let record = VectorRecord {
            kind: RecordKind::Procedural,
            scope_tags,
            timestamp: chrono::Utc::now().timestamp_millis(),
            description,
            metadata: serde_json::to_value(pattern)?,
            embedding,
        };

        self.store
            .put_record(&self.scope, record, self.config.record_ttl_secs)
            .await
            .map_err(|e| match e {
                EngineError::CircuitBreakerOpen => EngineError::CircuitBreakerOpen,
                other => EngineError::storage(STORE_NAME, other.to_string()),
            })?;
        info!(
            "[memory] Stored pattern {} tools={:?} score={:.2}",
            pattern.query_type, pattern.tools_used, pattern.success_score
        );
        Ok(true)
    }

    /// The planning step: suggest a tool sequence for an incoming query.
    pub async fn suggest_plan(&self, query: &str) -> EngineResult<ToolPlan> {
        let query_type = classify_query(query);

        let vector = self.embedder.embed(query).await?;
        let similar = self
            .store
            .query_records(
                RecordKind::Procedural,
                VectorQuery::new(vector, self.config.top_k)
                    .with_tag("scope", &self.scope)
                    .with_tag("query_type", query_type.as_str()),
            )
            .await
            .map_err(|e| match e {
                EngineError::CircuitBreakerOpen => EngineError::CircuitBreakerOpen,
                other => EngineError::retrieval(STORE_NAME, other.to_string()),
            })?;

        let best = similar
            .iter()
            .filter_map(|hit| serde_json::from_value::<ProceduralPattern>(hit.record.metadata.clone()).ok())
            .max_by(|a, b| {
                a.success_score.partial_cmp(&b.success_score).unwrap_or(std::cmp::Ordering::Equal)
            });

        if let Some(pattern) = best {
            debug!(
                "[memory] Plan from stored pattern: {:?} (confidence {:.2})",
                pattern.tools_used, pattern.success_score
            );
            return Ok(ToolPlan {
                query_type,
                tools: pattern.tools_used,
                confidence: pattern.success_score,
                from_pattern: true,
            });
        }

        Ok(ToolPlan {
            query_type,
            tools: default_tools(query_type),
            confidence: self.config.default_plan_confidence,
            from_pattern: false,
        })
    }

    pub async fn count(&self) -> EngineResult<usize> {
        self.store.count_records(RecordKind::Procedural, &self.scope).await
    }

    pub async fn clear(&self) -> EngineResult<usize> {
        self.store.delete_records(RecordKind::Procedural, &self.scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::embedding::MockEmbedder;
    use crate::engine::store::InMemoryStore;

    fn memory() -> ProceduralMemory {
        let dim = 64;
        ProceduralMemory::new(
            Arc::new(InMemoryStore::new(dim)),
            Arc::new(MockEmbedder::new(dim)),
            MemoryConfig { embedding_dimension: dim, ..MemoryConfig::default() },
            "default",
        )
    }

    fn pattern(score: f32) -> ProceduralPattern {
        ProceduralPattern {
            query_type: QueryType::HealthMetric,
            tools_used: vec!["get_health_metrics".into()],
            success_score: score,
            execution_time_ms: 120,
        }
    }

    #[test]
    fn classification_first_match_wins() {
        assert_eq!(classify_query("show my heart rate trend over time"), QueryType::Trend);
        assert_eq!(classify_query("am I close to my step goal"), QueryType::Goal);
        assert_eq!(classify_query("compare this week and last week"), QueryType::Comparison);
        assert_eq!(classify_query("what was my heart rate yesterday"), QueryType::HealthMetric);
    }

    #[tokio::test]
    async fn floor_gate_is_exact() {
        let mem = memory();
        assert!(!mem.store_pattern("q", &pattern(0.69)).await.unwrap());
        assert_eq!(mem.count().await.unwrap(), 0);
        assert!(mem.store_pattern("q", &pattern(0.7)).await.unwrap());
        assert_eq!(mem.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn out_of_range_scores_are_rejected() {
        let mem = memory();
        assert!(mem.store_pattern("q", &pattern(1.2)).await.is_err());
    }

    #[tokio::test]
    async fn plan_prefers_highest_scoring_pattern() {
        let mem = memory();
        let mut strong = pattern(0.95);
        strong.tools_used = vec!["get_health_metrics".into(), "analyze_trends".into()];
        mem.store_pattern("what was my heart rate", &pattern(0.75)).await.unwrap();
        // Records key on timestamp; keep them distinct.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        mem.store_pattern("what was my resting heart rate", &strong).await.unwrap();

        let plan = mem.suggest_plan("what was my heart rate this morning").await.unwrap();
        assert!(plan.from_pattern);
        assert!((plan.confidence - 0.95).abs() < 1e-6);
        assert_eq!(plan.tools, vec!["get_health_metrics".to_string(), "analyze_trends".to_string()]);
    }

    #[tokio::test]
    async fn plan_falls_back_to_defaults() {
        let mem = memory();
        let plan = mem.suggest_plan("what was my blood pressure").await.unwrap();
        assert!(!plan.from_pattern);
        assert_eq!(plan.query_type, QueryType::HealthMetric);
        assert!((plan.confidence - 0.3).abs() < 1e-6);
        assert_eq!(plan.tools, vec!["get_health_metrics".to_string()]);
    }
}
