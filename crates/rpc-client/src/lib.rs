//! # RPC Client
//!
//! A typed async wrapper over the backtest/strategy/optimization-control RPC
//! surface: the generated gRPC stub (`client`), the
//! transport-status-code → `OrchestratorError` taxonomy mapping (`status`),
//! request/response proto<->domain conversions (`convert`), and the
//! `OrchestratorRpc` trait every caller (and every test double) programs
//! against (`trait_def`).
//!
//! This is a Layer 1 crate: it depends only on `core-types`.

pub mod client;
pub mod convert;
pub mod status;
pub mod trait_def;
pub mod types;

#[cfg(feature = "testing")]
pub mod mock;

pub mod proto {
    tonic::include_proto!("orchestrator.v1");
}

pub use client::GrpcOrchestratorClient;
pub use status::{DEFAULT_DEADLINE, VALIDATE_DEADLINE};
pub use trait_def::OrchestratorRpc;
pub use types::{
    ControlAction, ControlOptimizationOutcome, ControlOptimizationParams, CreateStrategyParams,
    IterationSummary, Page, PageResult, RecordIterationParams, RunSnapshot, SubmitBacktestParams,
    ValidationOutcome,
};
