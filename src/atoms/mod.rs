// ── Vitalis Atoms ──────────────────────────────────────────────────────────
// Foundation layer: error taxonomy, chat wire types, memory record shapes,
// and named constants. Atoms depend on nothing inside the engine.

pub mod constants;
pub mod error;
pub mod memory_types;
pub mod types;

pub use error::{EngineError, EngineResult};
