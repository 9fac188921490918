//! # Orchestrator
//!
//! The finite-state iteration driver: loads a run's state from the backend,
//! drives the five-stage Iteration Pipeline once per optimization iteration,
//! persists the result, and repeats until approval, archival, exhaustion, or
//! an unrecoverable error.

pub mod error;
pub mod events;
pub mod pipeline;
pub mod run_context;
pub mod runner;

pub use error::OrchestratorRuntimeError;
pub use pipeline::{PipelineConfig, PipelineDeps};
pub use run_context::RunContext;
pub use runner::{RunOutcomeStatus, RunResult, Runner};
