use core_types::OrchestratorError;
use std::time::Duration;
use tonic::Code;

/// Default per-call deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
/// `validate_strategy`'s longer default, since the first call may need to
/// build a sandbox image.
pub const VALIDATE_DEADLINE: Duration = Duration::from_secs(60);

/// Maps a gRPC status code into the fixed error taxonomy every crate that
/// talks to the backend shares (`core_types::OrchestratorError`).
pub fn map_status(status: tonic::Status) -> OrchestratorError {
    let message = status.message().to_string();
    match status.code() {
        Code::NotFound => OrchestratorError::NotFound(message),
        Code::InvalidArgument | Code::FailedPrecondition => OrchestratorError::Validation(message),
        Code::Unavailable => OrchestratorError::Connection(message),
        Code::DeadlineExceeded => OrchestratorError::Timeout(message),
        Code::Cancelled => OrchestratorError::Cancelled(message),
        _ => OrchestratorError::Internal(message),
    }
}

/// Maps a transport-layer connect failure (establishing the channel itself,
/// not an individual call) into `ConnectionError`.
pub fn map_transport_err(err: tonic::transport::Error) -> OrchestratorError {
    OrchestratorError::Connection(err.to_string())
}

/// Maps `tokio::time::timeout`'s elapsed error, for the per-call deadline
/// wrapper around every RPC, into `TimeoutError`.
pub fn map_elapsed(_: tokio::time::error::Elapsed, deadline: Duration) -> OrchestratorError {
    OrchestratorError::Timeout(format!("call exceeded {deadline:?} deadline"))
}
