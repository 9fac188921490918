use core_types::TerminationReason;
use events::{routing_keys, EventSink};
use rpc_client::{CreateStrategyParams, OrchestratorRpc, SubmitBacktestParams};
use serde_json::json;
use tracing::{error, info};

use super::state::IterationState;

/// Stage 2: `submit_backtest`. Skips entirely if stage 1 did
/// not reach `validation_passed` — the outer `run_iteration` sequencer
/// guards this, but the check is repeated here defensively since the
/// function takes an owned `&mut IterationState` and nothing prevents a
/// future caller from invoking it out of order.
pub async fn submit_backtest(state: &mut IterationState, rpc: &dyn OrchestratorRpc, events: &dyn EventSink) {
    if !state.validation_passed {
        return;
    }

    let Some(engineer_result) = state.engineer_response.clone() else {
        return;
    };

    let strategy_name = format!(
        "strategy_{}_opt_{}_iter_{}",
        state.base_strategy_id, state.optimization_run_id, state.iteration_index
    );

    let create_params = CreateStrategyParams {
        name: strategy_name,
        code: engineer_result.generated_code.clone(),
        description: Some(format!(
            "Generated in optimization run {}, iteration {}",
            state.optimization_run_id, state.iteration_index
        )),
        parent_id: Some(state.current_strategy_id.clone()),
        tags: Vec::new(),
    };

    let strategy = match rpc.create_strategy(create_params).await {
        Ok(s) => s,
        Err(err) => {
            error!(iteration = state.iteration_index, error = %err, "failed to create strategy");
            state.should_terminate = true;
            state.termination_reason = Some(TerminationReason::StrategyCreationFailed);
            return;
        }
    };

    info!(strategy_id = %strategy.strategy_id, iteration = state.iteration_index, "strategy created");
    state.generated_strategy_id = Some(strategy.strategy_id.clone());

    let submit_params = SubmitBacktestParams {
        strategy_id: strategy.strategy_id.clone(),
        config: state.backtest_config.clone(),
        run_id: Some(state.optimization_run_id.clone()),
        priority: None,
    };

    let job = match rpc.submit_backtest(submit_params).await {
        Ok(job) => job,
        Err(err) => {
            error!(iteration = state.iteration_index, error = %err, "failed to submit backtest");
            state.should_terminate = true;
            state.termination_reason = Some(TerminationReason::BacktestSubmissionFailed);
            return;
        }
    };

    info!(job_id = %job.job_id, strategy_id = %strategy.strategy_id, "backtest submitted");
    state.backtest_job_id = Some(job.job_id.clone());

    let _ = events
        .publish(
            routing_keys::BACKTEST_SUBMITTED,
            json!({
                "optimization_run_id": state.optimization_run_id,
                "iteration": state.iteration_index,
                "strategy_id": strategy.strategy_id,
                "job_id": job.job_id,
            }),
        )
        .await;
}
