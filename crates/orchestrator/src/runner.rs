use core_types::{BacktestOutcome, OrchestratorError, RunStatus, TerminationReason};
use rpc_client::{ControlAction, ControlOptimizationParams};

use crate::events::{
    emit_iteration_completed, emit_iteration_started, emit_optimization_completed, emit_optimization_failed,
    IterationCompletedPayload, IterationStartedPayload, OptimizationCompletedPayload, OptimizationFailedPayload,
};
use crate::pipeline::{run_iteration, PipelineConfig, PipelineDeps};
use crate::run_context::RunContext;

/// The two terminal buckets `run_optimization` ever reports (the
/// result envelope's `status ∈ {completed, failed}`). A backend-cancelled run
/// is reported as `Failed` here too — the envelope has no third bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcomeStatus {
    Completed,
    Failed,
}

/// The envelope `run_optimization` always returns. Never an
/// `Err` — every failure path, including ones this Runner never anticipated,
/// is folded into `error`/`status: Failed` before returning.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub base_strategy_id: String,
    pub iterations_completed: u32,
    pub max_iterations: u32,
    pub best_strategy_id: Option<String>,
    pub best_sharpe: f64,
    pub termination_reason: Option<TerminationReason>,
    pub status: RunOutcomeStatus,
    pub error: Option<String>,
    /// Sourced from the `BacktestOutcome` attached to the best iteration,
    /// since `OptimizationRun` itself doesn't carry these metrics.
    pub best_profit_pct: Option<f64>,
    pub best_win_rate: Option<f64>,
    pub best_max_drawdown_pct: Option<f64>,
}

/// The three reasons `RunContext::save` itself already resolves against the
/// backend via `control_optimization`: on terminal decisions
/// in the returned state (approved/archived/validation_max_retries) it calls
/// `control_optimization` directly. Every other `should_terminate` reason is the
/// Runner's own responsibility — backtest timeout, cancelled, or
/// strategy-creation failure terminate the iteration and the Runner marks the
/// run failed.
fn save_already_handled(reason: TerminationReason) -> bool {
    matches!(
        reason,
        TerminationReason::Approved | TerminationReason::Archived | TerminationReason::ValidationMaxRetries
    )
}

/// Drives one optimization run to completion.
pub struct Runner {
    deps: PipelineDeps,
    config: PipelineConfig,
}

impl Runner {
    pub fn new(deps: PipelineDeps, config: PipelineConfig) -> Self {
        Self { deps, config }
    }

    /// Runs the outer iteration loop to completion or termination.
    pub async fn run_optimization(&self, run_id: &str) -> RunResult {
        let mut ctx = match RunContext::load(self.deps.rpc.as_ref(), run_id).await {
            Ok(ctx) => ctx,
            Err(err) => return Self::unloadable_failure(run_id, err),
        };

        if ctx.is_terminal() {
            return Self::already_terminal_result(&ctx);
        }

        if let Err(err) = self
            .deps
            .rpc
            .control_optimization(ControlOptimizationParams {
                run_id: ctx.run_id.clone(),
                action: ControlAction::Resume,
                termination_reason: None,
                best_strategy_id: None,
            })
            .await
        {
            return self.fail_with_error(&mut ctx, format!("failed to resume run: {err}")).await;
        }

        let mut best_outcome: Option<BacktestOutcome> = None;

        while ctx.has_iterations_remaining() {
            let iteration = ctx.current_iteration;
            emit_iteration_started(
                self.deps.events.as_ref(),
                IterationStartedPayload {
                    optimization_run_id: &ctx.run_id,
                    iteration,
                    max_iterations: ctx.max_iterations,
                },
            )
            .await;

            let state = ctx.to_iteration_state();
            let result = run_iteration(state, &self.deps, &self.config).await;

            if let Err(err) = ctx.save(self.deps.rpc.as_ref(), &result).await {
                return self
                    .fail_with_error(&mut ctx, format!("failed to persist iteration {iteration}: {err}"))
                    .await;
            }

            if result.is_new_best {
                best_outcome = result.backtest_outcome.clone();
            }

            let sharpe = result.backtest_outcome.as_ref().map(|_| result.current_sharpe());
            emit_iteration_completed(
                self.deps.events.as_ref(),
                IterationCompletedPayload {
                    optimization_run_id: &ctx.run_id,
                    iteration,
                    decision: result.decision.map(|d| d.as_canonical_str()),
                    sharpe_ratio: sharpe,
                    is_best: result.is_new_best,
                },
            )
            .await;

            if result.should_terminate {
                return self.build_terminal_result(&mut ctx, result.termination_reason, best_outcome).await;
            }

            ctx = match RunContext::load(self.deps.rpc.as_ref(), run_id).await {
                Ok(ctx) => ctx,
                Err(err) => return self.fail_with_error(&mut ctx, format!("failed to reload run: {err}")).await,
            };
        }

        self.build_terminal_result(&mut ctx, Some(TerminationReason::MaxIterations), best_outcome)
            .await
    }

    /// `resume_optimization(run_id)` is `run_optimization(run_id, ...)`
    /// exactly — `RunContext::load` already derives
    /// `base_strategy_id`/`max_iterations` from the backend, and
    /// `run_optimization` already early-returns on an already-terminal run,
    /// so there is nothing left for this wrapper to do but name the intent.
    pub async fn resume_optimization(&self, run_id: &str) -> RunResult {
        self.run_optimization(run_id).await
    }

    async fn build_terminal_result(
        &self,
        ctx: &mut RunContext,
        reason: Option<TerminationReason>,
        best_outcome: Option<BacktestOutcome>,
    ) -> RunResult {
        if let Some(reason) = reason {
            if reason == TerminationReason::MaxIterations {
                let _ = self
                    .deps
                    .rpc
                    .control_optimization(ControlOptimizationParams {
                        run_id: ctx.run_id.clone(),
                        action: ControlAction::Complete,
                        termination_reason: Some(reason.to_string()),
                        best_strategy_id: ctx.best_strategy_id.clone(),
                    })
                    .await;
                ctx.status = RunStatus::Completed;
            } else if !save_already_handled(reason) {
                let _ = self
                    .deps
                    .rpc
                    .control_optimization(ControlOptimizationParams {
                        run_id: ctx.run_id.clone(),
                        action: ControlAction::Fail,
                        termination_reason: Some(reason.to_string()),
                        best_strategy_id: ctx.best_strategy_id.clone(),
                    })
                    .await;
                ctx.status = RunStatus::Failed;
            }
        }

        let status = if reason.map(|r| r.is_success()).unwrap_or(false) {
            RunOutcomeStatus::Completed
        } else {
            RunOutcomeStatus::Failed
        };

        let (best_profit_pct, best_win_rate, best_max_drawdown_pct) = completed_metrics(&best_outcome);
        let reason_str = reason.map(|r| r.to_string()).unwrap_or_default();

        match status {
            RunOutcomeStatus::Completed => {
                emit_optimization_completed(
                    self.deps.events.as_ref(),
                    OptimizationCompletedPayload {
                        optimization_run_id: &ctx.run_id,
                        base_strategy_id: &ctx.base_strategy_id,
                        total_iterations: ctx.current_iteration,
                        termination_reason: &reason_str,
                        best_strategy_id: ctx.best_strategy_id.as_deref(),
                        best_sharpe: ctx.best_sharpe,
                        best_profit_pct,
                        best_win_rate,
                        best_max_drawdown: best_max_drawdown_pct,
                    },
                )
                .await;
            }
            RunOutcomeStatus::Failed => {
                emit_optimization_failed(
                    self.deps.events.as_ref(),
                    OptimizationFailedPayload {
                        optimization_run_id: &ctx.run_id,
                        base_strategy_id: &ctx.base_strategy_id,
                        iteration: ctx.current_iteration,
                        reason: &reason_str,
                        errors: &[],
                    },
                )
                .await;
            }
        }

        RunResult {
            run_id: ctx.run_id.clone(),
            base_strategy_id: ctx.base_strategy_id.clone(),
            iterations_completed: ctx.current_iteration,
            max_iterations: ctx.max_iterations,
            best_strategy_id: ctx.best_strategy_id.clone(),
            best_sharpe: ctx.best_sharpe,
            termination_reason: reason,
            status,
            error: None,
            best_profit_pct,
            best_win_rate,
            best_max_drawdown_pct,
        }
    }

    async fn fail_with_error(&self, ctx: &mut RunContext, message: String) -> RunResult {
        let _ = self
            .deps
            .rpc
            .control_optimization(ControlOptimizationParams {
                run_id: ctx.run_id.clone(),
                action: ControlAction::Fail,
                termination_reason: Some(format!("iteration_exception: {message}")),
                best_strategy_id: ctx.best_strategy_id.clone(),
            })
            .await;
        ctx.status = RunStatus::Failed;

        emit_optimization_failed(
            self.deps.events.as_ref(),
            OptimizationFailedPayload {
                optimization_run_id: &ctx.run_id,
                base_strategy_id: &ctx.base_strategy_id,
                iteration: ctx.current_iteration,
                reason: "iteration_exception",
                errors: std::slice::from_ref(&message),
            },
        )
        .await;

        RunResult {
            run_id: ctx.run_id.clone(),
            base_strategy_id: ctx.base_strategy_id.clone(),
            iterations_completed: ctx.current_iteration,
            max_iterations: ctx.max_iterations,
            best_strategy_id: ctx.best_strategy_id.clone(),
            best_sharpe: ctx.best_sharpe,
            termination_reason: Some(TerminationReason::IterationException),
            status: RunOutcomeStatus::Failed,
            error: Some(message),
            best_profit_pct: None,
            best_win_rate: None,
            best_max_drawdown_pct: None,
        }
    }

    fn unloadable_failure(run_id: &str, err: OrchestratorError) -> RunResult {
        RunResult {
            run_id: run_id.to_string(),
            base_strategy_id: String::new(),
            iterations_completed: 0,
            max_iterations: 0,
            best_strategy_id: None,
            best_sharpe: f64::NEG_INFINITY,
            termination_reason: None,
            status: RunOutcomeStatus::Failed,
            error: Some(format!("failed to load run: {err}")),
            best_profit_pct: None,
            best_win_rate: None,
            best_max_drawdown_pct: None,
        }
    }

    fn already_terminal_result(ctx: &RunContext) -> RunResult {
        let status = if ctx.status == RunStatus::Completed {
            RunOutcomeStatus::Completed
        } else {
            RunOutcomeStatus::Failed
        };
        RunResult {
            run_id: ctx.run_id.clone(),
            base_strategy_id: ctx.base_strategy_id.clone(),
            iterations_completed: ctx.current_iteration,
            max_iterations: ctx.max_iterations,
            best_strategy_id: ctx.best_strategy_id.clone(),
            best_sharpe: ctx.best_sharpe,
            termination_reason: None,
            status,
            error: None,
            best_profit_pct: None,
            best_win_rate: None,
            best_max_drawdown_pct: None,
        }
    }
}

fn completed_metrics(outcome: &Option<BacktestOutcome>) -> (Option<f64>, Option<f64>, Option<f64>) {
    match outcome {
        Some(BacktestOutcome::Completed(result)) => (result.profit_pct, result.win_rate, result.max_drawdown_pct),
        _ => (None, None, None),
    }
}
