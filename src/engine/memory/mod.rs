// ── Vitalis Engine — Memory System ─────────────────────────────────────────
// Four memory kinds over one backing store:
//
//   short_term  — per-session conversation log, token-budget trimmed
//   episodic    — user goals and notable events, similarity-retrieved
//   procedural  — successful tool sequences, reused as plans
//   semantic    — pre-populated domain facts, pure retrieval
//
// Module layout:
//   embedding.rs   — Embedder trait, Ollama client, deterministic mock
//   tokenizer.rs   — token estimation for context budgeting
//   short_term.rs  — session log + trim algorithm
//   episodic.rs    — goal parsing / storage / retrieval
//   procedural.rs  — pattern gate + query classification + planning
//   semantic.rs    — fact retrieval (loader write boundary included)
//   coordinator.rs — concurrent fan-out, ordered stores, maintenance

pub mod coordinator;
pub mod embedding;
pub mod episodic;
pub mod procedural;
pub mod semantic;
pub mod short_term;
pub mod tokenizer;

pub use coordinator::MemoryCoordinator;
pub use embedding::{Embedder, MockEmbedder, OllamaEmbedder};
pub use episodic::{parse_goal_utterance, EpisodicMemory};
pub use procedural::{classify_query, default_tools, ProceduralMemory};
pub use semantic::SemanticMemory;
pub use short_term::{trim_messages, ShortTermMemory};
pub use tokenizer::Tokenizer;
