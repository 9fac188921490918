use thiserror::Error;

/// Errors a stage adapter can raise. Kept deliberately thin: the contract
/// treats Engineer/Analyst as black boxes, so the only thing
/// the orchestrator needs from a failure is "it threw, here's why" — the
/// two call sites handle the two kinds very differently (Stage 1 terminates
/// the iteration on an Engineer error; Stage 4 absorbs an Analyst error into
/// a `NeedsModification` decision), but that branching lives in
/// `orchestrator`, not here.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("engineer failed: {0}")]
    Engineer(String),

    #[error("analyst failed: {0}")]
    Analyst(String),
}
