use core_types::{BacktestConfig, BacktestOutcome, Decision, IterationMode, TerminationReason};
use stage_adapters::EngineerResponse;

/// The single record the five pipeline stages consume and return. One concrete struct with
/// `Option<T>` fields for not-yet-populated outputs, never a
/// `serde_json::Value`/`HashMap<String, Value>` bag.
///
/// Built by `RunContext::to_iteration_state`, mutated only by the pipeline
/// stages, frozen once `pipeline::run_iteration` returns.
#[derive(Debug, Clone)]
pub struct IterationState {
    // --- context, set once at construction, read-only to every stage ---
    pub optimization_run_id: String,
    pub iteration_index: u32,
    pub max_iterations: u32,
    pub base_strategy_id: String,
    pub current_strategy_id: String,
    pub backtest_config: BacktestConfig,
    pub input_code: String,
    pub input_feedback: Option<String>,
    pub mode: IterationMode,
    pub best_sharpe: f64,
    pub best_strategy_id: Option<String>,

    // --- stage 1: validate_and_engineer ---
    pub engineer_response: Option<EngineerResponse>,
    pub validation_passed: bool,
    pub validation_retry_count: u32,

    // --- stage 2: submit_backtest ---
    pub generated_strategy_id: Option<String>,
    pub backtest_job_id: Option<String>,

    // --- stage 3: wait_for_result ---
    pub backtest_outcome: Option<BacktestOutcome>,

    // --- stage 4: invoke_analyst ---
    pub decision: Option<Decision>,
    pub feedback: Option<String>,

    // --- stage 5: decide_next ---
    pub is_new_best: bool,
    pub new_best_sharpe: Option<f64>,

    // --- set by any stage on a terminal path ---
    pub should_terminate: bool,
    pub termination_reason: Option<TerminationReason>,
}

impl IterationState {
    /// The Sharpe this iteration should be judged against for best-tracking
    /// for stage 5's best-tracking: `f64::NEG_INFINITY` if no backtest outcome
    /// exists yet (i.e. the iteration terminated before stage 3).
    pub fn current_sharpe(&self) -> f64 {
        self.backtest_outcome
            .as_ref()
            .map(BacktestOutcome::sharpe_or_neg_infinity)
            .unwrap_or(f64::NEG_INFINITY)
    }
}
