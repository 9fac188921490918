use thiserror::Error;

/// The fixed error taxonomy shared by every crate that talks to the RPC
/// backend. Transport-level status codes are mapped into one of these kinds
/// once, at the `rpc-client` boundary, so the rest of the workspace never
/// matches on raw transport codes.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("backend unreachable: {0}")]
    Connection(String),

    #[error("call timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("call cancelled: {0}")]
    Cancelled(String),

    #[error("internal backend error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Connection(_) | OrchestratorError::Internal(_)
        )
    }
}
