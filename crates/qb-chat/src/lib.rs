//! qb-chat: conversation orchestration
//!
//! - `orchestrator`: the bounded model-invoke / tool-dispatch loop
//! - `router`: `POST /query` and `GET /health`

pub mod orchestrator;
pub mod router;

pub use orchestrator::{Answer, Orchestrator, OrchestratorConfig, TerminationReason};
pub use router::create_router;
