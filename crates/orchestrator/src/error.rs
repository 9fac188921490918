use thiserror::Error;

/// Crate-local error type, following a one-error-enum-per-crate
/// convention. Every variant wraps `OrchestratorError` (the shared RPC
/// taxonomy) or a stage-adapter failure; there is no standalone
/// "iteration failed" variant because a failing stage never propagates an
/// `Err` out of the pipeline — it is always converted into a
/// terminal `IterationState` (the one exception being a genuinely
/// unexpected panic-worthy bug, which `Runner::run_optimization` still
/// catches via this type so it can never escape `run_optimization` itself).
#[derive(Error, Debug)]
pub enum OrchestratorRuntimeError {
    #[error(transparent)]
    Rpc(#[from] core_types::OrchestratorError),

    #[error(transparent)]
    Events(#[from] events::EventsError),

    #[error("stage adapter error: {0}")]
    Stage(#[from] stage_adapters::StageError),

    #[error("{0}")]
    Other(String),
}
