use core_types::{BacktestConfig, OptimizationRun, RunStatus};
use serde::{Deserialize, Serialize};

/// Result of `validate_strategy`. `valid` is the only field the orchestrator
/// branches on; `errors`/`warnings`/`class_name` ride through to diagnosis
/// text and logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub class_name: Option<String>,
}

/// Parameters for `create_strategy`.
#[derive(Debug, Clone, Default)]
pub struct CreateStrategyParams {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub tags: Vec<String>,
}

/// Parameters for `submit_backtest`.
#[derive(Debug, Clone)]
pub struct SubmitBacktestParams {
    pub strategy_id: String,
    pub config: BacktestConfig,
    pub run_id: Option<String>,
    pub priority: Option<i32>,
}

/// The five control actions `control_optimization` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
    Complete,
    Fail,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Cancel => "cancel",
            ControlAction::Complete => "complete",
            ControlAction::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlOptimizationParams {
    pub run_id: String,
    pub action: ControlAction,
    pub termination_reason: Option<String>,
    pub best_strategy_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ControlOptimizationOutcome {
    pub success: bool,
    pub run: OptimizationRun,
}

/// One persisted iteration, as summarized by `get_optimization_run` — only
/// the fields `RunContext::load` needs to derive the previous analyst
/// feedback from the last persisted iteration.
#[derive(Debug, Clone)]
pub struct IterationSummary {
    pub iteration_index: u32,
    pub analyst_feedback: Option<String>,
    pub decision: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub run: OptimizationRun,
    pub iterations: Vec<IterationSummary>,
}

/// Parameters for `record_iteration`: the single backend write that persists
/// one completed iteration and advances the run's `current_iteration`
/// counter, so the next `get_optimization_run` reflects it.
#[derive(Debug, Clone, Default)]
pub struct RecordIterationParams {
    pub run_id: String,
    pub iteration_index: u32,
    pub analyst_feedback: Option<String>,
    pub decision: Option<String>,
    /// Both set only when this iteration's Sharpe displaced the incumbent
    /// best; the backend updates `best_strategy_id`/`best_sharpe` together.
    pub new_best_strategy_id: Option<String>,
    pub new_best_sharpe: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct PageResult {
    pub runs: Vec<OptimizationRun>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u32,
}

pub fn run_status_from_wire(raw: &str) -> Option<RunStatus> {
    match raw {
        "pending" => Some(RunStatus::Pending),
        "running" => Some(RunStatus::Running),
        "paused" => Some(RunStatus::Paused),
        "completed" => Some(RunStatus::Completed),
        "failed" => Some(RunStatus::Failed),
        "cancelled" => Some(RunStatus::Cancelled),
        _ => None,
    }
}
