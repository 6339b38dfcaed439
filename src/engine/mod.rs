// ── Vitalis Engine ─────────────────────────────────────────────────────────
// The assistant core, leaves first:
//
//   config     — per-subsystem configuration, injected at construction
//   store      — circuit-broken pooled access to the vector/KV store
//   memory     — four memory kinds + the coordinator
//   providers  — the narrow LLM boundary
//   tools      — tool contract and registry
//   agent_loop — bounded model ↔ tool orchestration
//   validation — numeric/date hallucination checks + corrective retry
//   chat       — composition root for one full turn

pub mod agent_loop;
pub mod chat;
pub mod config;
pub mod memory;
pub mod providers;
pub mod store;
pub mod tools;
pub mod validation;
