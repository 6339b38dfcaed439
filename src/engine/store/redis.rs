// ── Vitalis Engine — Redis Stack Store ─────────────────────────────────────
// Pooled, circuit-broken client for the shared vector / key-value store.
//
// Layout on the wire:
//   • records:  HSET health:{scope}:{kind}:{ts} … + EXPIRE (≈210 d TTL)
//   • vectors:  fixed-byte little-endian f32 arrays in the `embedding` field
//   • queries:  FT.SEARCH idx:{kind} "(@tag:{v} …)=>[KNN k @embedding $vec]"
//   • sessions: LPUSH health:session:{id}:messages + EXPIRE
//
// Every operation passes through the shared circuit breaker: while open,
// calls fail fast with `CircuitBreakerOpen` and the network is not touched.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis::{self, Value};
use bb8_redis::{bb8, RedisConnectionManager};
use log::{debug, info, warn};

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::memory_types::{ConversationMessage, RecordKind, ScoredRecord, VectorRecord};
use crate::engine::config::StoreConfig;
use crate::engine::store::{
    bytes_to_f32_vec, f32_vec_to_bytes, session_key, CircuitBreaker, MemoryStore, VectorQuery,
};

/// Tag fields declared on every index schema. Writers may use any subset;
/// any other string field read back from a record hash is kept as a tag.
const TAG_FIELDS: &[&str] = &["scope", "event_type", "metric", "query_type", "category", "fact_type"];

fn index_name(kind: RecordKind) -> String {
    format!("idx:{}", kind.as_str())
}

pub struct RedisMemoryStore {
    pool: bb8::Pool<RedisConnectionManager>,
    breaker: CircuitBreaker,
    embedding_dimension: usize,
}

impl RedisMemoryStore {
    /// Build the pool and create the three vector indices if absent.
    pub async fn connect(config: &StoreConfig, embedding_dimension: usize) -> EngineResult<Self> {
        let manager = RedisConnectionManager::new(config.url.as_str())?;
        let pool = bb8::Pool::builder()
            .max_size(config.pool_max_connections)
            .build(manager)
            .await?;

        let store = RedisMemoryStore {
            pool,
            breaker: CircuitBreaker::new(
                config.breaker_failure_threshold,
                Duration::from_secs(config.breaker_recovery_timeout_secs),
            ),
            embedding_dimension,
        };
        store.ensure_indices().await?;
        info!("[store] Connected to {} (pool={})", config.url, config.pool_max_connections);
        Ok(store)
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn conn(&self) -> EngineResult<bb8::PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| EngineError::Pool(e.to_string()))
    }

    /// Record the outcome of one gated operation on the shared breaker.
    fn track<T>(&self, result: EngineResult<T>) -> EngineResult<T> {
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }

    /// Create `idx:episodic` / `idx:procedural` / `idx:semantic`. Each index
    /// covers the shared `health:` key space, filtered on the `kind` field,
    /// with an HNSW cosine vector field of the configured dimension.
    async fn ensure_indices(&self) -> EngineResult<()> {
        let mut conn = self.conn().await?;
        for kind in [RecordKind::Episodic, RecordKind::Procedural, RecordKind::Semantic] {
            let mut cmd = redis::cmd("FT.CREATE");
            cmd.arg(index_name(kind))
                .arg("ON")
                .arg("HASH")
                .arg("PREFIX")
                .arg(1)
                .arg("health:")
                .arg("FILTER")
                .arg(format!("@kind==\"{}\"", kind.as_str()))
                .arg("SCHEMA")
                .arg("kind")
                .arg("TAG");
            for tag in TAG_FIELDS {
                cmd.arg(*tag).arg("TAG");
            }
            cmd.arg("timestamp")
                .arg("NUMERIC")
                .arg("SORTABLE")
                .arg("description")
                .arg("TEXT")
                .arg("embedding")
                .arg("VECTOR")
                .arg("HNSW")
                .arg(6)
                .arg("TYPE")
                .arg("FLOAT32")
                .arg("DIM")
                .arg(self.embedding_dimension)
                .arg("DISTANCE_METRIC")
                .arg("COSINE");

            match cmd.query_async::<Value>(&mut *conn).await {
                Ok(_) => info!("[store] Created index {}", index_name(kind)),
                Err(e) if e.to_string().contains("already exists") => {
                    debug!("[store] Index {} already exists", index_name(kind));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn put_record_inner(&self, scope: &str, record: &VectorRecord, ttl_secs: i64) -> EngineResult<String> {
        let key = record.key(scope);
        let mut conn = self.conn().await?;

        let mut cmd = redis::cmd("HSET");
        cmd.arg(&key)
            .arg("kind")
            .arg(record.kind.as_str())
            .arg("scope")
            .arg(scope)
            .arg("timestamp")
            .arg(record.timestamp)
            .arg("description")
            .arg(&record.description)
            .arg("metadata")
            .arg(serde_json::to_string(&record.metadata)?)
            .arg("embedding")
            .arg(f32_vec_to_bytes(&record.embedding));
        for (tag, value) in &record.scope_tags {
            cmd.arg(tag).arg(value);
        }
        cmd.query_async::<()>(&mut *conn).await?;

        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(ttl_secs)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(key)
    }

    async fn query_records_inner(&self, kind: RecordKind, query: &VectorQuery) -> EngineResult<Vec<ScoredRecord>> {
        let mut conn = self.conn().await?;

        let mut filter = String::new();
        for (tag, value) in &query.filter_tags {
            if !filter.is_empty() {
                filter.push(' ');
            }
            filter.push_str(&format!("@{}:{{{}}}", tag, escape_tag(value)));
        }
        let query_string = if filter.is_empty() {
            format!("*=>[KNN {} @embedding $vec AS vector_score]", query.top_k)
        } else {
            format!("({})=>[KNN {} @embedding $vec AS vector_score]", filter, query.top_k)
        };

        let reply = redis::cmd("FT.SEARCH")
            .arg(index_name(kind))
            .arg(&query_string)
            .arg("PARAMS")
            .arg(2)
            .arg("vec")
            .arg(f32_vec_to_bytes(&query.vector))
            .arg("SORTBY")
            .arg("vector_score")
            .arg("ASC")
            .arg("LIMIT")
            .arg(0)
            .arg(query.top_k)
            .arg("DIALECT")
            .arg(2)
            .query_async::<Value>(&mut *conn)
            .await?;

        parse_search_reply(kind, reply)
    }

    async fn scan_record_keys(&self, kind: RecordKind, scope: &str) -> EngineResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let pattern = format!("health:{}:{}:*", scope, kind.as_str());
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }
}

/// Tag values go inside `{…}`; RediSearch separators must be escaped.
fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if !c.is_alphanumeric() && c != '_' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ── Reply parsing ──────────────────────────────────────────────────────────
// FT.SEARCH replies as [count, key, [field, value, …], key, …].

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

fn value_to_bytes(v: &Value) -> Option<Vec<u8>> {
    match v {
        Value::BulkString(bytes) => Some(bytes.clone()),
        Value::SimpleString(s) => Some(s.clone().into_bytes()),
        _ => None,
    }
}

fn parse_search_reply(kind: RecordKind, reply: Value) -> EngineResult<Vec<ScoredRecord>> {
    let items = match reply {
        Value::Array(items) => items,
        other => {
            return Err(EngineError::Validation(format!(
                "unexpected FT.SEARCH reply shape: {other:?}"
            )))
        }
    };

    let mut results = Vec::new();
    // items[0] is the total count; entries alternate key / field-array.
    let mut i = 1;
    while i + 1 < items.len() {
        let fields = match &items[i + 1] {
            Value::Array(fields) => fields,
            _ => {
                i += 2;
                continue;
            }
        };

        let mut description = String::new();
        let mut timestamp = 0i64;
        let mut metadata = serde_json::Value::Null;
        let mut embedding = Vec::new();
        let mut score = 0.0f32;
        let mut scope_tags = BTreeMap::new();

        let mut f = 0;
        while f + 1 < fields.len() {
            let name = match value_to_string(&fields[f]) {
                Some(n) => n,
                None => {
                    f += 2;
                    continue;
                }
            };
            let value = &fields[f + 1];
            match name.as_str() {
                "description" => description = value_to_string(value).unwrap_or_default(),
                "timestamp" => {
                    timestamp = value_to_string(value).and_then(|s| s.parse().ok()).unwrap_or(0)
                }
                "metadata" => {
                    metadata = value_to_string(value)
                        .and_then(|s| serde_json::from_str(&s).ok())
                        .unwrap_or(serde_json::Value::Null)
                }
                "embedding" => {
                    embedding = value_to_bytes(value).map(|b| bytes_to_f32_vec(&b)).unwrap_or_default()
                }
                "vector_score" => {
                    // Cosine *distance* from the index; flip to similarity.
                    let dist: f32 =
                        value_to_string(value).and_then(|s| s.parse().ok()).unwrap_or(2.0);
                    score = 1.0 - dist;
                }
                "kind" => {}
                other => {
                    if let Some(v) = value_to_string(value) {
                        scope_tags.insert(other.to_string(), v);
                    }
                }
            }
            f += 2;
        }

        results.push(ScoredRecord {
            record: VectorRecord { kind, scope_tags, timestamp, description, metadata, embedding },
            score,
        });
        i += 2;
    }

    // FT.SEARCH sorted by distance ascending = similarity descending already,
    // but keep the contract explicit.
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(results)
}

// ── MemoryStore impl ───────────────────────────────────────────────────────

#[async_trait]
impl MemoryStore for RedisMemoryStore {
    async fn put_record(&self, scope: &str, record: VectorRecord, ttl_secs: i64) -> EngineResult<String> {
        record.check_dimension(self.embedding_dimension)?;
        self.breaker.try_acquire()?;
        let result = self.put_record_inner(scope, &record, ttl_secs).await;
        self.track(result)
    }

    async fn query_records(&self, kind: RecordKind, query: VectorQuery) -> EngineResult<Vec<ScoredRecord>> {
        self.breaker.try_acquire()?;
        let result = self.query_records_inner(kind, &query).await;
        self.track(result)
    }

    async fn delete_records(&self, kind: RecordKind, scope: &str) -> EngineResult<usize> {
        self.breaker.try_acquire()?;
        let result = async {
            let keys = self.scan_record_keys(kind, scope).await?;
            if keys.is_empty() {
                return Ok(0);
            }
            let mut conn = self.conn().await?;
            let removed: usize = redis::cmd("DEL").arg(&keys).query_async(&mut *conn).await?;
            warn!("[store] Cleared {} {} records in scope {}", removed, kind.as_str(), scope);
            Ok(removed)
        }
        .await;
        self.track(result)
    }

    async fn count_records(&self, kind: RecordKind, scope: &str) -> EngineResult<usize> {
        self.breaker.try_acquire()?;
        let result = async { Ok(self.scan_record_keys(kind, scope).await?.len()) }.await;
        self.track(result)
    }

    async fn push_message(
        &self,
        session_id: &str,
        message: &ConversationMessage,
        ttl_secs: i64,
    ) -> EngineResult<()> {
        self.breaker.try_acquire()?;
        let result = async {
            let key = session_key(session_id);
            let payload = serde_json::to_string(message)?;
            let mut conn = self.conn().await?;
            redis::cmd("LPUSH").arg(&key).arg(payload).query_async::<()>(&mut *conn).await?;
            redis::cmd("EXPIRE").arg(&key).arg(ttl_secs).query_async::<()>(&mut *conn).await?;
            Ok(())
        }
        .await;
        self.track(result)
    }

    async fn recent_messages(&self, session_id: &str, limit: usize) -> EngineResult<Vec<ConversationMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.breaker.try_acquire()?;
        let result = async {
            let mut conn = self.conn().await?;
            let raw: Vec<String> = redis::cmd("LRANGE")
                .arg(session_key(session_id))
                .arg(0)
                .arg(limit as isize - 1)
                .query_async(&mut *conn)
                .await?;
            let mut messages = Vec::with_capacity(raw.len());
            for item in raw {
                match serde_json::from_str::<ConversationMessage>(&item) {
                    Ok(m) => messages.push(m),
                    Err(e) => warn!("[store] Skipping undecodable session message: {e}"),
                }
            }
            Ok(messages)
        }
        .await;
        self.track(result)
    }

    async fn session_len(&self, session_id: &str) -> EngineResult<usize> {
        self.breaker.try_acquire()?;
        let result = async {
            let mut conn = self.conn().await?;
            let len: usize = redis::cmd("LLEN").arg(session_key(session_id)).query_async(&mut *conn).await?;
            Ok(len)
        }
        .await;
        self.track(result)
    }

    async fn drop_session(&self, session_id: &str) -> EngineResult<()> {
        self.breaker.try_acquire()?;
        let result = async {
            let mut conn = self.conn().await?;
            redis::cmd("DEL").arg(session_key(session_id)).query_async::<()>(&mut *conn).await?;
            Ok(())
        }
        .await;
        self.track(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_escaping() {
        assert_eq!(escape_tag("heart_rate"), "heart_rate");
        assert_eq!(escape_tag("blood-pressure"), "blood\\-pressure");
    }

    #[test]
    fn parse_reply_builds_scored_records() {
        let reply = Value::Array(vec![
            Value::Int(1),
            Value::BulkString(b"health:default:episodic:1700000000".to_vec()),
            Value::Array(vec![
                Value::BulkString(b"kind".to_vec()),
                Value::BulkString(b"episodic".to_vec()),
                Value::BulkString(b"description".to_vec()),
                Value::BulkString(b"User goal: weight of 150 lbs".to_vec()),
                Value::BulkString(b"timestamp".to_vec()),
                Value::BulkString(b"1700000000".to_vec()),
                Value::BulkString(b"metadata".to_vec()),
                Value::BulkString(br#"{"metric":"weight"}"#.to_vec()),
                Value::BulkString(b"event_type".to_vec()),
                Value::BulkString(b"goal".to_vec()),
                Value::BulkString(b"vector_score".to_vec()),
                Value::BulkString(b"0.25".to_vec()),
            ]),
        ]);

        let parsed = parse_search_reply(RecordKind::Episodic, reply).unwrap();
        assert_eq!(parsed.len(), 1);
        let hit = &parsed[0];
        assert_eq!(hit.record.scope_tags.get("event_type").unwrap(), "goal");
        assert_eq!(hit.record.timestamp, 1_700_000_000);
        assert!((hit.score - 0.75).abs() < 1e-6);
    }

    #[test]
    fn parse_reply_rejects_non_array() {
        assert!(parse_search_reply(RecordKind::Semantic, Value::Int(0)).is_err());
    }
}
