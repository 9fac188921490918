use async_trait::async_trait;
use core_types::BacktestResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StageError;

/// Input to the Analyst: the completed backtest result,
/// identifiers for logging/correlation, and the iteration bound the
/// Analyst's own max-iteration coercion (see `AnalystResponse` docs) is
/// required to check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystRequest {
    pub backtest_result: BacktestResult,
    pub strategy_code: Option<String>,
    pub optimization_run_id: String,
    pub current_iteration: u32,
    pub max_iterations: u32,
}

/// The Analyst's raw verdict. `decision` is the raw wire
/// string (`"approve"`/`"modify"`/`"archive"`, case-insensitive) — it is
/// parsed into `core_types::Decision` by the orchestrator's stage 4, not
/// here, since decision-string validation is a boundary concern that stage
/// owns: reject unknown values at the boundary with a validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystResponse {
    pub decision: String,
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub root_causes: Vec<String>,
    pub suggestion_type: Option<String>,
    pub suggestion_description: Option<String>,
    #[serde(default)]
    pub target_metrics: Vec<String>,
    #[serde(default)]
    pub metrics: Value,
    /// Set only when this response is a coerced `archive` (see below);
    /// carried through to logs/events as extra context.
    pub termination_reason: Option<String>,
}

/// The Analyst stage adapter: a black-box async callable.
///
/// Required behavior, part of this contract rather than the orchestrator's
/// own code: when `request.current_iteration >= request.max_iterations`, a
/// would-be `"modify"` decision **must** be coerced to `"archive"` with
/// `termination_reason` explaining the override. The orchestrator's Stage 5
/// / Runner also enforce the outer iteration bound independently — this is
/// defence-in-depth, not a substitute for it.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(&self, request: AnalystRequest) -> Result<AnalystResponse, StageError>;
}
