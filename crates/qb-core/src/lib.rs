//! Core types and utilities for querybridge
//!
//! # Modules
//!
//! - `config`: Environment file loading and config lookups
//! - `error`: Error taxonomy shared by the peer, provider and orchestrator layers
//! - `types`: Transcript data model and tool declarations

pub mod config;
pub mod error;
pub mod types;

// Re-exports
pub use error::{ConnectError, OrchestratorError, PeerError, ProviderError};
pub use types::*;
