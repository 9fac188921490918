use crate::backtest::BacktestConfig;
use serde::{Deserialize, Serialize};

/// Lifecycle of an `OptimizationRun`. `{Completed, Failed, Cancelled}` are
/// final: once reached, the backend record does not mutate further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }
}

/// The run's stored configuration. Currently just the backtest parameters,
/// but kept as its own struct (rather than inlining `BacktestConfig` into
/// `OptimizationRun`) since the backend's `config` column is a JSON blob
/// that may carry sibling keys this orchestrator doesn't interpret.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub backtest_config: BacktestConfig,
}

/// The persisted optimization run record, as the orchestrator sees it via
/// `get_optimization_run`. Invariants (`0 <= current_iteration <=
/// max_iterations`, `best_sharpe` monotonically non-decreasing) are
/// maintained by the backend; the orchestrator never writes
/// `current_iteration` or `best_sharpe` directly, only through
/// `control_optimization`/derived `save` semantics in `RunContext`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub run_id: String,
    pub base_strategy_id: String,
    pub max_iterations: u32,
    pub current_iteration: u32,
    pub status: RunStatus,
    pub best_strategy_id: Option<String>,
    pub best_sharpe: f64,
    pub config: RunConfig,
}

impl OptimizationRun {
    pub fn has_iterations_remaining(&self) -> bool {
        self.current_iteration < self.max_iterations
    }
}
