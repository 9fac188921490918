use core_types::{BacktestConfig, IterationMode, OrchestratorError, RunStatus, TerminationReason};
use rpc_client::{ControlAction, ControlOptimizationParams, OrchestratorRpc, Page, RecordIterationParams};

use crate::pipeline::IterationState;

/// The orchestrator's read-cache of one run's backend state.
/// The backend is the single source of truth: `save` persists each
/// iteration's outcome via `record_iteration` before updating its own
/// fields, so the advance it makes locally is exactly the advance the next
/// `load` reads back.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub base_strategy_id: String,
    pub max_iterations: u32,
    pub current_iteration: u32,
    pub status: RunStatus,
    pub current_strategy_id: String,
    pub current_code: String,
    pub previous_feedback: Option<String>,
    pub backtest_config: BacktestConfig,
    pub best_strategy_id: Option<String>,
    pub best_sharpe: f64,
    /// The last `iteration_index` a `save` call actually advanced, so a
    /// replayed save of the same iteration is a no-op rather than double
    /// incrementing.
    last_saved_iteration_index: Option<u32>,
}

impl RunContext {
    /// Fetches the run, its iteration history, and the current strategy's
    /// code via RPC.
    pub async fn load(rpc: &dyn OrchestratorRpc, run_id: &str) -> Result<Self, OrchestratorError> {
        let snapshot = rpc.get_optimization_run(run_id).await?;
        let run = snapshot.run;

        let current_strategy_id = run
            .best_strategy_id
            .clone()
            .unwrap_or_else(|| run.base_strategy_id.clone());
        let current_strategy = rpc.get_strategy(&current_strategy_id).await?;

        let previous_feedback = snapshot
            .iterations
            .iter()
            .max_by_key(|it| it.iteration_index)
            .and_then(|it| it.analyst_feedback.clone());

        Ok(Self {
            run_id: run.run_id,
            base_strategy_id: run.base_strategy_id,
            max_iterations: run.max_iterations,
            current_iteration: run.current_iteration,
            status: run.status,
            current_strategy_id,
            current_code: current_strategy.code,
            previous_feedback,
            backtest_config: run.config.backtest_config,
            best_strategy_id: run.best_strategy_id,
            best_sharpe: run.best_sharpe,
            last_saved_iteration_index: None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_iterations_remaining(&self) -> bool {
        self.current_iteration < self.max_iterations
    }

    /// Builds the pipeline's input record for the current iteration:
    /// `mode` is `New` only on iteration 0.
    pub fn to_iteration_state(&self) -> IterationState {
        IterationState {
            optimization_run_id: self.run_id.clone(),
            iteration_index: self.current_iteration,
            max_iterations: self.max_iterations,
            base_strategy_id: self.base_strategy_id.clone(),
            current_strategy_id: self.current_strategy_id.clone(),
            backtest_config: self.backtest_config.clone(),
            input_code: self.current_code.clone(),
            input_feedback: self.previous_feedback.clone(),
            mode: if self.current_iteration == 0 {
                IterationMode::New
            } else {
                IterationMode::Evolve
            },
            best_sharpe: self.best_sharpe,
            best_strategy_id: self.best_strategy_id.clone(),
            engineer_response: None,
            validation_passed: false,
            validation_retry_count: 0,
            generated_strategy_id: None,
            backtest_job_id: None,
            backtest_outcome: None,
            decision: None,
            feedback: None,
            is_new_best: false,
            new_best_sharpe: None,
            should_terminate: false,
            termination_reason: None,
        }
    }

    /// Persists the result of one pipeline run. Always
    /// attempted, even on a path that will go on to terminate the run, so a
    /// crashed process can resume from exactly this point.
    pub async fn save(&mut self, rpc: &dyn OrchestratorRpc, result: &IterationState) -> Result<(), OrchestratorError> {
        if self.last_saved_iteration_index == Some(result.iteration_index) {
            return Ok(());
        }

        let new_best_sharpe = result.is_new_best.then_some(result.new_best_sharpe.unwrap_or(f64::NEG_INFINITY));
        let new_best_strategy_id = result.is_new_best.then(|| result.generated_strategy_id.clone()).flatten();

        rpc.record_iteration(RecordIterationParams {
            run_id: self.run_id.clone(),
            iteration_index: result.iteration_index,
            analyst_feedback: result.feedback.clone(),
            decision: result.decision.map(|d| d.as_canonical_str().to_string()),
            new_best_strategy_id,
            new_best_sharpe,
        })
        .await?;

        if let Some(strategy_id) = &result.generated_strategy_id {
            self.current_strategy_id = strategy_id.clone();
        }
        self.previous_feedback = result.feedback.clone();
        self.current_iteration += 1;
        self.last_saved_iteration_index = Some(result.iteration_index);

        if result.is_new_best {
            let candidate = result.new_best_sharpe.unwrap_or(f64::NEG_INFINITY);
            if candidate > self.best_sharpe {
                self.best_sharpe = candidate;
            }
            self.best_strategy_id = result.generated_strategy_id.clone();
        }

        match result.termination_reason {
            Some(TerminationReason::Approved) => {
                rpc.control_optimization(ControlOptimizationParams {
                    run_id: self.run_id.clone(),
                    action: ControlAction::Complete,
                    termination_reason: Some(TerminationReason::Approved.to_string()),
                    best_strategy_id: self.best_strategy_id.clone(),
                })
                .await?;
                self.status = RunStatus::Completed;
            }
            Some(TerminationReason::Archived) => {
                rpc.control_optimization(ControlOptimizationParams {
                    run_id: self.run_id.clone(),
                    action: ControlAction::Fail,
                    termination_reason: Some(TerminationReason::Archived.to_string()),
                    best_strategy_id: self.best_strategy_id.clone(),
                })
                .await?;
                self.status = RunStatus::Failed;
            }
            Some(TerminationReason::ValidationMaxRetries) => {
                rpc.control_optimization(ControlOptimizationParams {
                    run_id: self.run_id.clone(),
                    action: ControlAction::Fail,
                    termination_reason: Some(TerminationReason::ValidationMaxRetries.to_string()),
                    best_strategy_id: self.best_strategy_id.clone(),
                })
                .await?;
                self.status = RunStatus::Failed;
            }
            _ => {}
        }

        Ok(())
    }
}

/// The default page the Runner asks for when listing runs (`src/main.rs`'s
/// `list-runs` command uses its own, user-controlled `Page`).
pub fn default_page() -> Page {
    Page {
        page: 1,
        page_size: 50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{OptimizationRun, RunConfig, Strategy};
    use rpc_client::mock::ScriptedRpc;
    use rpc_client::IterationSummary;

    fn seeded_rpc() -> ScriptedRpc {
        let run = OptimizationRun {
            run_id: "r1".into(),
            base_strategy_id: "base".into(),
            max_iterations: 5,
            current_iteration: 2,
            status: RunStatus::Running,
            best_strategy_id: Some("strat-1".into()),
            best_sharpe: 1.2,
            config: RunConfig::default(),
        };
        let strategy = Strategy {
            strategy_id: "strat-1".into(),
            name: "s1".into(),
            code: "code-v1".into(),
            parent_id: Some("base".into()),
            generation: 1,
        };
        ScriptedRpc::new(run, strategy)
    }

    fn base_iteration_state(run_ctx: &RunContext) -> IterationState {
        let mut state = run_ctx.to_iteration_state();
        state.generated_strategy_id = Some("strat-2".into());
        state
    }

    #[tokio::test]
    async fn load_derives_current_strategy_code_and_evolve_mode() {
        let rpc = seeded_rpc();
        let ctx = RunContext::load(&rpc, "r1").await.unwrap();

        assert_eq!(ctx.current_strategy_id, "strat-1");
        assert_eq!(ctx.current_code, "code-v1");
        assert_eq!(ctx.to_iteration_state().mode, IterationMode::Evolve);
    }

    #[tokio::test]
    async fn save_advances_iteration_and_replaces_strategy_and_feedback() {
        let rpc = seeded_rpc();
        let mut ctx = RunContext::load(&rpc, "r1").await.unwrap();
        let mut result = base_iteration_state(&ctx);
        result.feedback = Some("tune stop loss".into());

        ctx.save(&rpc, &result).await.unwrap();

        assert_eq!(ctx.current_iteration, 3);
        assert_eq!(ctx.current_strategy_id, "strat-2");
        assert_eq!(ctx.previous_feedback.as_deref(), Some("tune stop loss"));
    }

    #[tokio::test]
    async fn save_is_idempotent_per_iteration_index() {
        let rpc = seeded_rpc();
        let mut ctx = RunContext::load(&rpc, "r1").await.unwrap();
        let result = base_iteration_state(&ctx);

        ctx.save(&rpc, &result).await.unwrap();
        ctx.save(&rpc, &result).await.unwrap();

        assert_eq!(ctx.current_iteration, 3);
    }

    #[tokio::test]
    async fn save_never_decreases_best_sharpe() {
        let rpc = seeded_rpc();
        let mut ctx = RunContext::load(&rpc, "r1").await.unwrap();
        let mut result = base_iteration_state(&ctx);
        result.is_new_best = true;
        result.new_best_sharpe = Some(0.5);

        ctx.save(&rpc, &result).await.unwrap();

        assert_eq!(ctx.best_sharpe, 1.2);
    }

    #[tokio::test]
    async fn approved_termination_completes_run_via_control_optimization() {
        let rpc = seeded_rpc();
        let mut ctx = RunContext::load(&rpc, "r1").await.unwrap();
        let mut result = base_iteration_state(&ctx);
        result.is_new_best = true;
        result.new_best_sharpe = Some(3.0);
        result.termination_reason = Some(TerminationReason::Approved);

        ctx.save(&rpc, &result).await.unwrap();

        assert_eq!(ctx.status, RunStatus::Completed);
        let log = rpc.control_log().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, ControlAction::Complete);
    }

    #[tokio::test]
    async fn validation_max_retries_fails_run_via_control_optimization() {
        let rpc = seeded_rpc();
        let mut ctx = RunContext::load(&rpc, "r1").await.unwrap();
        let mut result = base_iteration_state(&ctx);
        result.termination_reason = Some(TerminationReason::ValidationMaxRetries);

        ctx.save(&rpc, &result).await.unwrap();

        assert_eq!(ctx.status, RunStatus::Failed);
        let log = rpc.control_log().await;
        assert_eq!(log[0].action, ControlAction::Fail);
    }

    #[tokio::test]
    async fn previous_feedback_comes_from_highest_iteration_index() {
        let rpc = seeded_rpc();
        rpc.push_iteration(IterationSummary {
            iteration_index: 0,
            analyst_feedback: Some("old feedback".into()),
            decision: Some("NEEDS_MODIFICATION".into()),
        })
        .await;
        rpc.push_iteration(IterationSummary {
            iteration_index: 1,
            analyst_feedback: Some("latest feedback".into()),
            decision: Some("NEEDS_MODIFICATION".into()),
        })
        .await;

        let ctx = RunContext::load(&rpc, "r1").await.unwrap();
        assert_eq!(ctx.previous_feedback.as_deref(), Some("latest feedback"));
    }
}
