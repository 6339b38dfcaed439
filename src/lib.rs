// ── Vitalis ────────────────────────────────────────────────────────────────
// Conversational health assistant engine: layered agent memory, a bounded
// validated tool-calling loop, and circuit-broken access to a shared
// vector/key-value store. The LLM, the embedding model, and the store are
// external services behind narrow interfaces; HTTP transport, ingestion,
// and per-metric aggregation live outside this crate.

pub mod atoms;
pub mod engine;

pub use atoms::error::{EngineError, EngineResult};
pub use atoms::types::ChatResponse;
pub use engine::chat::ChatEngine;
pub use engine::config::EngineConfig;
pub use engine::memory::MemoryCoordinator;
