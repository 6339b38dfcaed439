// ── Vitalis Memory — Semantic Store ────────────────────────────────────────
// Pre-populated, read-mostly knowledge base of health-domain facts
// ("normal resting heart rate is 60–100 bpm", …). An offline loading
// process owns population; this core reads, and exposes the single write
// boundary the loader calls. Reads are pure retrieval — no planning step.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::memory_types::{RecordKind, ScoredRecord, SemanticFact, VectorRecord};
use crate::engine::config::MemoryConfig;
use crate::engine::memory::embedding::Embedder;
use crate::engine::store::{MemoryStore, VectorQuery};

pub const STORE_NAME: &str = "semantic";

pub struct SemanticMemory {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    config: MemoryConfig,
    scope: String,
}

impl SemanticMemory {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        config: MemoryConfig,
        scope: impl Into<String>,
    ) -> Self {
        SemanticMemory { store, embedder, config, scope: scope.into() }
    }

    /// Write boundary for the offline fact loader.
    pub async fn store_fact(&self, fact: &SemanticFact) -> EngineResult<String> {
        let embedding = self.embedder.embed(&fact.content).await?;

        let mut scope_tags = BTreeMap::new();
        scope_tags.insert("category".to_string(), fact.category.clone());
        scope_tags.insert("fact_type".to_string(), fact.fact_type.clone());

        let record = VectorRecord {
            kind: RecordKind::Semantic,
            scope_tags,
            timestamp: chrono::Utc::now().timestamp_millis(),
            description: fact.content.clone(),
            metadata: serde_json::to_value(fact)?,
            embedding,
        };

        let key = self
            .store
            .put_record(&self.scope, record, self.config.record_ttl_secs)
            .await
            .map_err(|e| match e {
                EngineError::CircuitBreakerOpen => EngineError::CircuitBreakerOpen,
                other => EngineError::storage(STORE_NAME, other.to_string()),
            })?;
        info!("[memory] Stored fact {}/{} ({})", fact.category, fact.fact_type, key);
        Ok(key)
    }

    /// Similarity retrieval, optionally narrowed to a category.
    pub async fn retrieve_facts(
        &self,
        query: &str,
        category: Option<&str>,
        top_k: usize,
    ) -> EngineResult<Vec<ScoredRecord>> {
        let vector = self.embedder.embed(query).await?;
        let mut q = VectorQuery::new(vector, top_k).with_tag("scope", &self.scope);
        if let Some(category) = category {
            q = q.with_tag("category", category);
        }
        self.store.query_records(RecordKind::Semantic, q).await.map_err(|e| match e {
            EngineError::CircuitBreakerOpen => EngineError::CircuitBreakerOpen,
            other => EngineError::retrieval(STORE_NAME, other.to_string()),
        })
    }

    pub async fn count(&self) -> EngineResult<usize> {
        self.store.count_records(RecordKind::Semantic, &self.scope).await
    }

    pub async fn clear(&self) -> EngineResult<usize> {
        self.store.delete_records(RecordKind::Semantic, &self.scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::embedding::MockEmbedder;
    use crate::engine::store::InMemoryStore;

    fn memory() -> SemanticMemory {
        let dim = 64;
        SemanticMemory::new(
            Arc::new(InMemoryStore::new(dim)),
            Arc::new(MockEmbedder::new(dim)),
            MemoryConfig { embedding_dimension: dim, ..MemoryConfig::default() },
            "default",
        )
    }

    fn fact(category: &str, content: &str) -> SemanticFact {
        SemanticFact {
            category: category.into(),
            fact_type: "reference_range".into(),
            confidence: 0.9,
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn retrieval_is_similarity_ranked() {
        let mem = memory();
        mem.store_fact(&fact("heart_rate", "normal resting heart rate is 60 to 100 bpm")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        mem.store_fact(&fact("sleep", "adults need 7 to 9 hours of sleep")).await.unwrap();

        let hits = mem.retrieve_facts("what is a normal resting heart rate", None, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].record.description.contains("heart rate"));
    }

    #[tokio::test]
    async fn category_filter_narrows() {
        let mem = memory();
        mem.store_fact(&fact("heart_rate", "normal resting heart rate is 60 to 100 bpm")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        mem.store_fact(&fact("sleep", "adults need 7 to 9 hours of sleep")).await.unwrap();

        let hits = mem.retrieve_facts("how much sleep do I need", Some("sleep"), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.scope_tags.get("category").unwrap(), "sleep");
    }
}
