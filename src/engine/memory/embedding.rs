// ── Vitalis Memory — Embedding Client ──────────────────────────────────────
// Turns text into a fixed-length vector via an external model endpoint.
//
// Contract: `embed(text) -> [f32; D]` or `EngineError::Embedding` on empty
// input, a non-2xx upstream response, or a wrong-dimension vector. A vector
// of any other length is a total failure — never truncated or padded.
// No retry at this layer; callers decide.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use crate::atoms::constants::EMBEDDING_TIMEOUT_SECS;
use crate::atoms::error::{EngineError, EngineResult};
use crate::engine::config::MemoryConfig;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>>;

    /// The fixed vector dimension this embedder produces.
    fn dimension(&self) -> usize;
}

// ── Ollama-compatible endpoint ─────────────────────────────────────────────

/// Calls `POST {base}/api/embeddings` with `{model, prompt}` and expects
/// `{embedding: [f32; D]}` back.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl OllamaEmbedder {
    pub fn new(config: &MemoryConfig) -> Self {
        OllamaEmbedder {
            client: Client::new(),
            base_url: config.embedding_base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
            timeout: Duration::from_secs(EMBEDDING_TIMEOUT_SECS),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EngineError::Embedding("cannot embed empty text".into()));
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": text,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::Embedding(format!("endpoint unreachable at {}: {e}", self.base_url)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(EngineError::Embedding(format!("endpoint returned {status}: {detail}")));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Embedding(format!("undecodable response: {e}")))?;

        let embedding: Vec<f32> = v["embedding"]
            .as_array()
            .ok_or_else(|| EngineError::Embedding("no 'embedding' array in response".into()))?
            .iter()
            .filter_map(|x| x.as_f64().map(|f| f as f32))
            .collect();

        if embedding.len() != self.dimension {
            return Err(EngineError::Embedding(format!(
                "model '{}' produced {} dims, deployment requires {}",
                self.model,
                embedding.len(),
                self.dimension
            )));
        }

        debug!("[memory] Embedded {} chars into {} dims", text.len(), embedding.len());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ── Deterministic test double ──────────────────────────────────────────────

/// Hash-seeded unit vectors: equal texts embed identically, different texts
/// diverge, shared words pull vectors together. Cosine ranking behaves
/// plausibly without a model in the loop.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        MockEmbedder { dimension }
    }

    fn hash_word(word: &str) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut h = std::collections::hash_map::DefaultHasher::new();
        word.hash(&mut h);
        h.finish()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EngineError::Embedding("cannot embed empty text".into()));
        }
        let mut vec = vec![0.0f32; self.dimension];
        for word in text.to_lowercase().split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() {
                continue;
            }
            let h = Self::hash_word(word);
            vec[(h as usize) % self.dimension] += 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }
        Ok(vec)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
