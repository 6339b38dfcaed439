// ── Vitalis Memory — Coordinator ───────────────────────────────────────────
// Fan-out/fan-in orchestrator over the four memory stores.
//
// Retrieval: the four sub-queries are independent reads and run
// concurrently. Each failure is caught and logged, producing a partial
// context — the chat continues with whatever memory is available — except
// for errors explicitly marked critical, which propagate and abort the turn.
//
// Storage (end of turn) is sequential: short-term must be observed first
// because its failure is fatal; episodic and procedural degrade to a
// logged `false` in the per-store success map.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};

use crate::atoms::error::EngineResult;
use crate::atoms::memory_types::{
    ConversationRole, MemoryContext, MemoryFlags, MemoryStats, ProceduralPattern,
};
use crate::engine::config::MemoryConfig;
use crate::engine::memory::embedding::Embedder;
use crate::engine::memory::episodic::{parse_goal_utterance, EpisodicMemory};
use crate::engine::memory::procedural::{classify_query, ProceduralMemory};
use crate::engine::memory::semantic::SemanticMemory;
use crate::engine::memory::short_term::ShortTermMemory;
use crate::engine::store::MemoryStore;

pub struct MemoryCoordinator {
    short_term: ShortTermMemory,
    episodic: EpisodicMemory,
    procedural: ProceduralMemory,
    semantic: SemanticMemory,
    config: MemoryConfig,
}

impl MemoryCoordinator {
    /// Wire the four stores over one backing store and one embedder.
    /// `scope` partitions long-term memory (one scope per user).
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        config: MemoryConfig,
        scope: impl Into<String> + Clone,
    ) -> Self {
        MemoryCoordinator {
            short_term: ShortTermMemory::new(store.clone(), config.clone()),
            episodic: EpisodicMemory::new(store.clone(), embedder.clone(), config.clone(), scope.clone()),
            procedural: ProceduralMemory::new(store.clone(), embedder.clone(), config.clone(), scope.clone()),
            semantic: SemanticMemory::new(store, embedder, config.clone(), scope),
            config,
        }
    }

    // ── Retrieval fan-out ──────────────────────────────────────────────────

    /// Gather everything relevant to one turn. Individual store failures
    /// degrade to empty slices; critical errors propagate.
    pub async fn retrieve_all_context(
        &self,
        session_id: &str,
        query: &str,
        flags: MemoryFlags,
    ) -> EngineResult<MemoryContext> {
        let top_k = self.config.top_k;
        let limit = self.config.context_message_limit;

        let (conversation, goals, facts, plan) = futures::join!(
            self.short_term.get_context_token_aware(session_id, limit),
            async {
                if flags.episodic {
                    self.episodic.retrieve_goals(query, top_k).await.map(Some)
                } else {
                    Ok(None)
                }
            },
            async {
                if flags.semantic {
                    self.semantic.retrieve_facts(query, None, top_k).await.map(Some)
                } else {
                    Ok(None)
                }
            },
            async {
                if flags.procedural {
                    self.procedural.suggest_plan(query).await.map(Some)
                } else {
                    Ok(None)
                }
            },
        );

        let mut context = MemoryContext::default();
        if let Some((text, usage)) = degrade("short_term", conversation)? {
            context.conversation = text;
            context.conversation_usage = Some(usage);
        }
        if let Some(Some(goals)) = degrade("episodic", goals)? {
            context.goals = goals;
        }
        if let Some(Some(facts)) = degrade("semantic", facts)? {
            context.facts = facts;
        }
        if let Some(Some(plan)) = degrade("procedural", plan)? {
            context.plan = Some(plan);
        }

        info!(
            "[memory] Context for session {}: conversation={} goals={} facts={} plan={}",
            session_id,
            context.conversation.is_some(),
            context.goals.len(),
            context.facts.len(),
            context.plan.is_some(),
        );
        Ok(context)
    }

    // ── End-of-turn storage ────────────────────────────────────────────────

    /// Persist one completed turn. Short-term storage failure is fatal;
    /// the other stores degrade to `false` in the returned map. A parsed
    /// goal utterance stores exactly one goal record and suppresses the
    /// generic interaction event for that turn.
    pub async fn store_interaction(
        &self,
        session_id: &str,
        user_msg: &str,
        assistant_msg: &str,
        tools_used: &[String],
        execution_time_ms: u64,
        success_score: f32,
    ) -> EngineResult<BTreeMap<&'static str, bool>> {
        let mut outcome = BTreeMap::new();

        // Short-term first: a turn that cannot be remembered did not happen.
        self.short_term.append(session_id, ConversationRole::User, user_msg).await?;
        self.short_term.append(session_id, ConversationRole::Assistant, assistant_msg).await?;
        outcome.insert("short_term", true);

        if let Some(goal) = parse_goal_utterance(user_msg) {
            let stored = match self.episodic.store_goal(&goal).await {
                Ok(_) => true,
                Err(e) => {
                    warn!("[memory] Goal storage degraded: {e}");
                    false
                }
            };
            outcome.insert("episodic", stored);
        } else if assistant_msg.chars().count() > crate::atoms::constants::EPISODIC_MIN_RESPONSE_CHARS {
            let stored = match self.episodic.store_event(user_msg, assistant_msg).await {
                Ok(_) => true,
                Err(e) => {
                    warn!("[memory] Episodic storage degraded: {e}");
                    false
                }
            };
            outcome.insert("episodic", stored);
        }

        if !tools_used.is_empty() {
            let pattern = ProceduralPattern {
                query_type: classify_query(user_msg),
                tools_used: tools_used.to_vec(),
                success_score,
                execution_time_ms,
            };
            let stored = match self.procedural.store_pattern(user_msg, &pattern).await {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("[memory] Pattern storage degraded: {e}");
                    false
                }
            };
            outcome.insert("procedural", stored);
        }

        Ok(outcome)
    }

    // ── Maintenance surface ────────────────────────────────────────────────

    pub async fn clear_session(&self, session_id: &str) -> EngineResult<()> {
        self.short_term.clear(session_id).await?;
        info!("[memory] Cleared session {session_id}");
        Ok(())
    }

    /// Wipe long-term user memory, per flags. Semantic facts are shared
    /// domain knowledge and only cleared when explicitly requested.
    pub async fn clear_user_memories(&self, flags: MemoryFlags) -> EngineResult<BTreeMap<&'static str, usize>> {
        let mut removed = BTreeMap::new();
        if flags.episodic {
            removed.insert("episodic", self.episodic.clear().await?);
        }
        if flags.procedural {
            removed.insert("procedural", self.procedural.clear().await?);
        }
        if flags.semantic {
            removed.insert("semantic", self.semantic.clear().await?);
        }
        Ok(removed)
    }

    pub async fn get_stats(&self, session_id: &str) -> EngineResult<MemoryStats> {
        Ok(MemoryStats {
            session_messages: self.short_term.len(session_id).await?,
            episodic_records: self.episodic.count().await?,
            procedural_records: self.procedural.count().await?,
            semantic_records: self.semantic.count().await?,
        })
    }

    // Direct store access for the loader boundary and targeted queries.

    pub fn semantic(&self) -> &SemanticMemory {
        &self.semantic
    }

    pub fn episodic(&self) -> &EpisodicMemory {
        &self.episodic
    }

    pub fn procedural(&self) -> &ProceduralMemory {
        &self.procedural
    }
}

/// Collapse one store's retrieval result: critical errors propagate, the
/// rest degrade to `None` with a warning.
fn degrade<T>(store: &'static str, result: EngineResult<T>) -> EngineResult<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_critical() => Err(e),
        Err(e) => {
            warn!("[memory] {store} retrieval degraded: {e}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::embedding::MockEmbedder;
    use crate::engine::store::InMemoryStore;

    const DIM: usize = 64;

    fn coordinator() -> MemoryCoordinator {
        MemoryCoordinator::new(
            Arc::new(InMemoryStore::new(DIM)),
            Arc::new(MockEmbedder::new(DIM)),
            MemoryConfig { embedding_dimension: DIM, ..MemoryConfig::default() },
            "default",
        )
    }

    #[tokio::test]
    async fn goal_utterance_stores_exactly_one_episodic_record() {
        let coord = coordinator();
        let outcome = coord
            .store_interaction(
                "s1",
                "my goal is to reach 150 lbs",
                "Great — I've noted your weight goal of 150 lbs and will track progress.",
                &[],
                10,
                1.0,
            )
            .await
            .unwrap();
        assert_eq!(outcome.get("episodic"), Some(&true));
        assert_eq!(coord.episodic.count().await.unwrap(), 1);

        let hits = coord.episodic.retrieve_goals("what's my weight goal", 3).await.unwrap();
        assert!(!hits.is_empty());
        let goal: crate::atoms::memory_types::EpisodicGoal =
            serde_json::from_value(hits[0].record.metadata.clone()).unwrap();
        assert_eq!(goal.metric, "weight");
        assert_eq!(goal.value, 150.0);
        assert_eq!(goal.unit, "lbs");
    }

    #[tokio::test]
    async fn short_responses_skip_the_episodic_event() {
        let coord = coordinator();
        let outcome = coord.store_interaction("s1", "hi", "Hello!", &[], 5, 1.0).await.unwrap();
        assert_eq!(outcome.get("short_term"), Some(&true));
        assert!(!outcome.contains_key("episodic"));
        assert_eq!(coord.episodic.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn procedural_stored_only_with_tools_and_score() {
        let coord = coordinator();
        // No tools used: no procedural entry at all.
        let outcome = coord
            .store_interaction("s1", "what was my heart rate", &"x".repeat(60), &[], 5, 1.0)
            .await
            .unwrap();
        assert!(!outcome.contains_key("procedural"));

        // Tools used but below the success floor: entry present, false.
        let tools = vec!["get_health_metrics".to_string()];
        let outcome = coord
            .store_interaction("s1", "what was my heart rate", &"x".repeat(60), &tools, 5, 0.69)
            .await
            .unwrap();
        assert_eq!(outcome.get("procedural"), Some(&false));
        assert_eq!(coord.procedural.count().await.unwrap(), 0);

        // Above the floor: stored.
        let outcome = coord
            .store_interaction("s1", "what was my heart rate", &"x".repeat(60), &tools, 5, 0.9)
            .await
            .unwrap();
        assert_eq!(outcome.get("procedural"), Some(&true));
        assert_eq!(coord.procedural.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn retrieval_degrades_on_empty_query_embedding() {
        let coord = coordinator();
        coord.store_interaction("s1", "hello there", "Hi! How can I help you today with your health?", &[], 5, 1.0)
            .await
            .unwrap();
        // Empty query: embedding fails, long-term slices degrade, the
        // conversation slice still arrives.
        let ctx = coord.retrieve_all_context("s1", "", MemoryFlags::default()).await.unwrap();
        assert!(ctx.conversation.is_some());
        assert!(ctx.goals.is_empty());
        assert!(ctx.facts.is_empty());
    }

    #[tokio::test]
    async fn stats_and_clearing() {
        let coord = coordinator();
        coord
            .store_interaction("s1", "my goal is to reach 150 lbs", &"y".repeat(60), &[], 5, 1.0)
            .await
            .unwrap();
        let stats = coord.get_stats("s1").await.unwrap();
        assert_eq!(stats.session_messages, 2);
        assert_eq!(stats.episodic_records, 1);

        coord.clear_session("s1").await.unwrap();
        assert_eq!(coord.get_stats("s1").await.unwrap().session_messages, 0);

        let removed = coord.clear_user_memories(MemoryFlags::default()).await.unwrap();
        assert_eq!(removed.get("episodic"), Some(&1));
        assert_eq!(coord.get_stats("s1").await.unwrap().episodic_records, 0);
    }
}
