use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StageError;

/// Whether the Engineer is processing a brand-new strategy, evolving one
/// against Analyst feedback, or fixing validation errors in place. The
/// orchestrator's own stage 1 only ever asks for `New` (iteration 0's first
/// call) or `Evolve` (every other call) — `Fix` exists in the Engineer's
/// own contract for its internal retry handling and is never
/// selected by this repo, but is kept here since it is part of the black-box
/// interface this crate publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineerMode {
    New,
    Evolve,
    Fix,
}

/// The subject strategy the Engineer is asked to produce or evolve code for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineerInput {
    pub id: Option<String>,
    pub name: String,
    pub code: String,
    pub diagnosis: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineerRequest {
    pub input_data: EngineerInput,
    pub mode: EngineerMode,
    pub max_retries: u32,
}

/// The Engineer's output. `hyperopt_config` is opaque
/// pass-through metadata the orchestrator never parses — it rides on the
/// `strategy.ready_for_backtest` event untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineerResponse {
    pub generated_code: String,
    pub validation_passed: bool,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub strategy_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub hyperopt_config: Option<Value>,
}

/// The Engineer stage adapter: a black-box async callable.
/// Fails over within itself on code-validity failures up to
/// `request.max_retries` — that retry budget is orthogonal to and separate
/// from the orchestrator's own `MAX_VALIDATION_RETRIES` loop in
/// `orchestrator::pipeline::validate_and_engineer`, which retries around
/// this call entirely (i.e. each orchestrator retry is a fresh `generate`
/// call with an accumulated `diagnosis`).
#[async_trait]
pub trait Engineer: Send + Sync {
    async fn generate(&self, request: EngineerRequest) -> Result<EngineerResponse, StageError>;
}
