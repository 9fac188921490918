use thiserror::Error;

/// Errors raised by the event bus. Kept separate from `OrchestratorError`
/// (core-types) since the broker is not part of the RPC backend's taxonomy —
/// callers that need to treat a publish failure as "backend unreachable"
/// make that call themselves at the orchestrator layer.
#[derive(Error, Debug)]
pub enum EventsError {
    #[error("failed to serialize event payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("handler failed: {0}")]
    Handler(String),
}
