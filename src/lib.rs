//! subcontrol: job orchestration and streaming control plane for a subtitle
//! pipeline. See `DESIGN.md` for the grounding ledger behind each module.

pub mod backends;
pub mod circuit_engine;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod http;
pub mod logging;
pub mod media_supervisor;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod queue;
pub mod shutdown;
pub mod srt;
pub mod sync_ext;
