//! Seed/stat extraction pipeline and its per-run workspace

pub mod orchestrator;
pub mod output;
pub mod region;
pub mod workspace;
