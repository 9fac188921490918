use std::time::Duration;

use core_types::{BacktestOutcome, JobStatus, TerminationReason};
use events::{routing_keys, EventSink};
use rpc_client::OrchestratorRpc;
use serde_json::json;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::state::IterationState;

/// Stage 3: `wait_for_result`. Polls `get_backtest_job` every
/// `poll_interval` until the job leaves `Queued`/`Running`, up to
/// `max_wait`. Skips entirely if stage 2 did not produce a `backtest_job_id`.
///
/// A completed job fetches and attaches the real result. A failed job is
/// demoted to a synthetic `BacktestOutcome::Failed` and handed to the
/// Analyst as diagnosis — the job's own crash never becomes a Rust `Err`
/// here, only `Cancelled` and timeout do — a backtest-code crash is
/// information, not a failure.
pub async fn wait_for_result(
    state: &mut IterationState,
    rpc: &dyn OrchestratorRpc,
    events: &dyn EventSink,
    poll_interval: Duration,
    max_wait: Duration,
) {
    let Some(job_id) = state.backtest_job_id.clone() else {
        return;
    };

    let deadline = Instant::now() + max_wait;

    loop {
        if Instant::now() >= deadline {
            error!(job_id = %job_id, iteration = state.iteration_index, "backtest timed out");
            state.should_terminate = true;
            state.termination_reason = Some(TerminationReason::BacktestTimeout);
            return;
        }

        let job = match rpc.get_backtest_job(&job_id).await {
            Ok(job) => job,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "transient error polling backtest job, retrying");
                tokio::time::sleep(poll_interval.min(remaining(deadline))).await;
                continue;
            }
        };

        match job.status {
            JobStatus::Queued | JobStatus::Running => {
                tokio::time::sleep(poll_interval.min(remaining(deadline))).await;
                continue;
            }
            JobStatus::Completed => {
                let result = match rpc.get_backtest_result(&job_id).await {
                    Ok(result) => result,
                    Err(err) => {
                        error!(job_id = %job_id, error = %err, "completed job has no fetchable result");
                        state.should_terminate = true;
                        state.termination_reason = Some(TerminationReason::BacktestSubmissionFailed);
                        return;
                    }
                };
                info!(job_id = %job_id, sharpe = ?result.sharpe_ratio, "backtest completed");
                let _ = events
                    .publish(
                        routing_keys::BACKTEST_COMPLETED,
                        json!({
                            "optimization_run_id": state.optimization_run_id,
                            "iteration": state.iteration_index,
                            "job_id": job_id,
                            "sharpe_ratio": result.sharpe_ratio,
                        }),
                    )
                    .await;
                state.backtest_outcome = Some(BacktestOutcome::Completed(result));
                return;
            }
            JobStatus::Failed => {
                let error_message = job.error_message.unwrap_or_else(|| "backtest failed".to_string());
                warn!(job_id = %job_id, error = %error_message, "backtest job failed, demoting to diagnosis");
                let _ = events
                    .publish(
                        routing_keys::BACKTEST_FAILED,
                        json!({
                            "optimization_run_id": state.optimization_run_id,
                            "iteration": state.iteration_index,
                            "job_id": job_id,
                            "error_message": error_message,
                        }),
                    )
                    .await;
                state.backtest_outcome = Some(BacktestOutcome::Failed {
                    error_message,
                    logs: job.logs,
                });
                return;
            }
            JobStatus::Cancelled => {
                error!(job_id = %job_id, "backtest job was cancelled");
                state.should_terminate = true;
                state.termination_reason = Some(TerminationReason::BacktestCancelled);
                return;
            }
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{BacktestConfig, BacktestResult, IterationMode, OptimizationRun, RunConfig, RunStatus, Strategy};
    use events::mock::RecordingEventSink;
    use rpc_client::mock::ScriptedRpc;

    fn state_with_job(job_id: &str) -> IterationState {
        IterationState {
            optimization_run_id: "r1".into(),
            iteration_index: 0,
            max_iterations: 5,
            base_strategy_id: "base".into(),
            current_strategy_id: "base".into(),
            backtest_config: BacktestConfig::default(),
            input_code: "code".into(),
            input_feedback: None,
            mode: IterationMode::New,
            best_sharpe: f64::NEG_INFINITY,
            best_strategy_id: None,
            engineer_response: None,
            validation_passed: true,
            validation_retry_count: 0,
            generated_strategy_id: Some("strat-1".into()),
            backtest_job_id: Some(job_id.to_string()),
            backtest_outcome: None,
            decision: None,
            feedback: None,
            is_new_best: false,
            new_best_sharpe: None,
            should_terminate: false,
            termination_reason: None,
        }
    }

    fn backend() -> ScriptedRpc {
        let run = OptimizationRun {
            run_id: "r1".into(),
            base_strategy_id: "base".into(),
            max_iterations: 5,
            current_iteration: 0,
            status: RunStatus::Running,
            best_strategy_id: None,
            best_sharpe: f64::NEG_INFINITY,
            config: RunConfig::default(),
        };
        let strategy = Strategy {
            strategy_id: "base".into(),
            name: "base".into(),
            code: "code".into(),
            parent_id: None,
            generation: 0,
        };
        ScriptedRpc::new(run, strategy)
    }

    #[tokio::test]
    async fn completed_job_attaches_result_and_emits_event() {
        let mut state = state_with_job("job-1");
        let rpc = backend();
        rpc.script_job(
            "job-1",
            vec![JobStatus::Running, JobStatus::Completed],
            Some(BacktestResult {
                job_id: "job-1".into(),
                strategy_id: "strat-1".into(),
                sharpe_ratio: Some(1.5),
                profit_pct: Some(10.0),
                win_rate: Some(0.6),
                max_drawdown_pct: Some(5.0),
                metrics: serde_json::Value::Null,
            }),
        )
        .await;
        let events = RecordingEventSink::new("orchestrator");

        wait_for_result(&mut state, &rpc, &events, Duration::from_millis(1), Duration::from_secs(5)).await;

        assert!(!state.should_terminate);
        match state.backtest_outcome {
            Some(BacktestOutcome::Completed(ref r)) => assert_eq!(r.sharpe_ratio, Some(1.5)),
            other => panic!("expected completed outcome, got {other:?}"),
        }
        assert_eq!(events.routing_keys().await, vec![routing_keys::BACKTEST_COMPLETED]);
    }

    #[tokio::test]
    async fn failed_job_becomes_synthetic_outcome_without_terminating() {
        let mut state = state_with_job("job-2");
        let rpc = backend();
        rpc.script_job("job-2", vec![JobStatus::Failed], None).await;
        let events = RecordingEventSink::new("orchestrator");

        wait_for_result(&mut state, &rpc, &events, Duration::from_millis(1), Duration::from_secs(5)).await;

        assert!(!state.should_terminate);
        assert!(state.backtest_outcome.as_ref().unwrap().is_failed());
        assert_eq!(events.routing_keys().await, vec![routing_keys::BACKTEST_FAILED]);
    }

    #[tokio::test]
    async fn cancelled_job_terminates_iteration() {
        let mut state = state_with_job("job-3");
        let rpc = backend();
        rpc.script_job("job-3", vec![JobStatus::Cancelled], None).await;
        let events = RecordingEventSink::new("orchestrator");

        wait_for_result(&mut state, &rpc, &events, Duration::from_millis(1), Duration::from_secs(5)).await;

        assert!(state.should_terminate);
        assert_eq!(state.termination_reason, Some(TerminationReason::BacktestCancelled));
    }

    #[tokio::test]
    async fn exceeding_max_wait_terminates_with_timeout() {
        let mut state = state_with_job("job-4");
        let rpc = backend();
        rpc.script_job("job-4", vec![JobStatus::Running], None).await;
        let events = RecordingEventSink::new("orchestrator");

        wait_for_result(&mut state, &rpc, &events, Duration::from_millis(5), Duration::from_millis(20)).await;

        assert!(state.should_terminate);
        assert_eq!(state.termination_reason, Some(TerminationReason::BacktestTimeout));
    }

    #[tokio::test]
    async fn transient_poll_errors_are_absorbed() {
        let mut state = state_with_job("job-5");
        let rpc = backend();
        rpc.script_job("job-5", vec![JobStatus::Completed], Some(BacktestResult {
            job_id: "job-5".into(),
            strategy_id: "strat-1".into(),
            sharpe_ratio: Some(0.9),
            profit_pct: None,
            win_rate: None,
            max_drawdown_pct: None,
            metrics: serde_json::Value::Null,
        }))
        .await;
        rpc.script_transient_poll_errors(2).await;
        let events = RecordingEventSink::new("orchestrator");

        wait_for_result(&mut state, &rpc, &events, Duration::from_millis(1), Duration::from_secs(5)).await;

        assert!(!state.should_terminate);
        assert!(state.backtest_outcome.is_some());
    }
}
