//! # Stage Adapters
//!
//! Thin contracts for the two AI-assisted stages the orchestrator composes
//! but does not itself implement: Engineer (code
//! generation) and Analyst (backtest diagnosis). Both are `#[async_trait]`
//! traits over plain request/response structs — no retained state, no
//! internal retry loop (those live inside the real implementations, out of
//! scope for this repository).
//!
//! This is a Layer 1 crate: it depends only on `core-types`.

pub mod analyst;
pub mod engineer;
pub mod error;
pub mod http;

#[cfg(feature = "testing")]
pub mod mock;

pub use analyst::{Analyst, AnalystRequest, AnalystResponse};
pub use engineer::{Engineer, EngineerInput, EngineerMode, EngineerRequest, EngineerResponse};
pub use error::StageError;
pub use http::{HttpAnalyst, HttpEngineer};
