// ── Vitalis Engine — In-Memory Store ───────────────────────────────────────
// Brute-force implementation of `MemoryStore` over process-local maps.
// Serves tests and offline runs; mirrors the Redis implementation's
// contract exactly (tag conjunctions, cosine ranking, newest-first lists,
// dimension checks). TTLs are accepted and ignored — nothing here outlives
// the process anyway.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::atoms::error::EngineResult;
use crate::atoms::memory_types::{ConversationMessage, RecordKind, ScoredRecord, VectorRecord};
use crate::engine::store::{cosine_similarity, MemoryStore, VectorQuery};

#[derive(Default)]
struct Inner {
    /// Storage key → (scope, record).
    records: HashMap<String, (String, VectorRecord)>,
    /// Session id → messages, newest first.
    sessions: HashMap<String, Vec<ConversationMessage>>,
}

pub struct InMemoryStore {
    inner: Mutex<Inner>,
    embedding_dimension: usize,
}

impl InMemoryStore {
    pub fn new(embedding_dimension: usize) -> Self {
        InMemoryStore { inner: Mutex::default(), embedding_dimension }
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn put_record(&self, scope: &str, mut record: VectorRecord, _ttl_secs: i64) -> EngineResult<String> {
        record.check_dimension(self.embedding_dimension)?;
        let key = record.key(scope);
        // The redis store writes `scope` as a filterable field and hands it
        // back as a tag; mirror that so tag filters behave identically.
        record.scope_tags.insert("scope".to_string(), scope.to_string());
        self.inner.lock().records.insert(key.clone(), (scope.to_string(), record));
        Ok(key)
    }

    async fn query_records(&self, kind: RecordKind, query: VectorQuery) -> EngineResult<Vec<ScoredRecord>> {
        let inner = self.inner.lock();
        let mut hits: Vec<ScoredRecord> = inner
            .records
            .values()
            .filter(|(_, r)| r.kind == kind)
            .filter(|(_, r)| {
                query
                    .filter_tags
                    .iter()
                    .all(|(tag, want)| r.scope_tags.get(tag).map(String::as_str) == Some(want.as_str()))
            })
            .map(|(_, r)| ScoredRecord {
                score: cosine_similarity(&query.vector, &r.embedding),
                record: r.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.top_k);
        Ok(hits)
    }

    async fn delete_records(&self, kind: RecordKind, scope: &str) -> EngineResult<usize> {
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        inner.records.retain(|_, (s, r)| !(r.kind == kind && s == scope));
        Ok(before - inner.records.len())
    }

    async fn count_records(&self, kind: RecordKind, scope: &str) -> EngineResult<usize> {
        let inner = self.inner.lock();
        Ok(inner.records.values().filter(|(s, r)| r.kind == kind && s == scope).count())
    }

    async fn push_message(
        &self,
        session_id: &str,
        message: &ConversationMessage,
        _ttl_secs: i64,
    ) -> EngineResult<()> {
        self.inner
            .lock()
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(0, message.clone());
        Ok(())
    }

    async fn recent_messages(&self, session_id: &str, limit: usize) -> EngineResult<Vec<ConversationMessage>> {
        let inner = self.inner.lock();
        Ok(inner
            .sessions
            .get(session_id)
            .map(|m| m.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn session_len(&self, session_id: &str) -> EngineResult<usize> {
        Ok(self.inner.lock().sessions.get(session_id).map(Vec::len).unwrap_or(0))
    }

    async fn drop_session(&self, session_id: &str) -> EngineResult<()> {
        self.inner.lock().sessions.remove(session_id);
        Ok(())
    }
}
