use core_types::{Decision, IterationMode, TerminationReason};
use events::{routing_keys, EventSink};
use serde_json::json;
use tracing::info;

use super::state::IterationState;

/// Stage 5: `decide_next`. Skips if an earlier stage already
/// terminated the iteration or if stage 4 produced no decision.
///
/// Best-tracking uses a strict `>` tie-break: an equal Sharpe never displaces
/// the incumbent best. Iteration 0 (`IterationMode::New`) always becomes the
/// initial best by definition — that's bookkeeping, not an improvement, so it
/// updates `is_new_best` for persistence but never emits `optimization.new_best`.
pub async fn decide_next(state: &mut IterationState, events: &dyn EventSink) {
    if state.should_terminate {
        return;
    }

    let Some(decision) = state.decision else {
        return;
    };

    let sharpe = state.current_sharpe();
    if sharpe > state.best_sharpe {
        state.is_new_best = true;
        state.new_best_sharpe = Some(sharpe);
        info!(iteration = state.iteration_index, sharpe, "new best sharpe");
        if state.mode != IterationMode::New {
            let _ = events
                .publish(
                    routing_keys::OPTIMIZATION_NEW_BEST,
                    json!({
                        "optimization_run_id": state.optimization_run_id,
                        "iteration": state.iteration_index,
                        "strategy_id": state.generated_strategy_id,
                        "sharpe_ratio": sharpe,
                    }),
                )
                .await;
        }
    }

    match decision {
        Decision::ReadyForLive => {
            state.should_terminate = true;
            state.termination_reason = Some(TerminationReason::Approved);
        }
        Decision::Archive => {
            state.should_terminate = true;
            state.termination_reason = Some(TerminationReason::Archived);
        }
        Decision::NeedsModification => {
            // Whether the outer iteration bound has been reached is the
            // caller's (RunContext/Runner) decision, not this stage's.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{BacktestConfig, BacktestOutcome, BacktestResult, IterationMode};
    use events::mock::RecordingEventSink;

    fn state_with(decision: Decision, sharpe: f64, best_sharpe: f64) -> IterationState {
        IterationState {
            optimization_run_id: "r1".into(),
            iteration_index: 3,
            max_iterations: 5,
            base_strategy_id: "base".into(),
            current_strategy_id: "base".into(),
            backtest_config: BacktestConfig::default(),
            input_code: "code".into(),
            input_feedback: None,
            mode: IterationMode::Evolve,
            best_sharpe,
            best_strategy_id: None,
            engineer_response: None,
            validation_passed: true,
            validation_retry_count: 0,
            generated_strategy_id: Some("strat-1".into()),
            backtest_job_id: Some("job-1".into()),
            backtest_outcome: Some(BacktestOutcome::Completed(BacktestResult {
                job_id: "job-1".into(),
                strategy_id: "strat-1".into(),
                sharpe_ratio: Some(sharpe),
                profit_pct: None,
                win_rate: None,
                max_drawdown_pct: None,
                metrics: serde_json::Value::Null,
            })),
            decision: Some(decision),
            feedback: None,
            is_new_best: false,
            new_best_sharpe: None,
            should_terminate: false,
            termination_reason: None,
        }
    }

    #[tokio::test]
    async fn strictly_greater_sharpe_is_a_new_best() {
        let mut state = state_with(Decision::NeedsModification, 1.5, 1.0);
        let events = RecordingEventSink::new("orchestrator");

        decide_next(&mut state, &events).await;

        assert!(state.is_new_best);
        assert_eq!(state.new_best_sharpe, Some(1.5));
        assert_eq!(events.routing_keys().await, vec![routing_keys::OPTIMIZATION_NEW_BEST]);
    }

    #[tokio::test]
    async fn equal_sharpe_does_not_displace_incumbent() {
        let mut state = state_with(Decision::NeedsModification, 1.0, 1.0);
        let events = RecordingEventSink::new("orchestrator");

        decide_next(&mut state, &events).await;

        assert!(!state.is_new_best);
        assert!(events.routing_keys().await.is_empty());
    }

    #[tokio::test]
    async fn ready_for_live_terminates_as_approved() {
        let mut state = state_with(Decision::ReadyForLive, 2.0, 1.0);
        let events = RecordingEventSink::new("orchestrator");

        decide_next(&mut state, &events).await;

        assert!(state.should_terminate);
        assert_eq!(state.termination_reason, Some(TerminationReason::Approved));
    }

    #[tokio::test]
    async fn archive_terminates_as_archived() {
        let mut state = state_with(Decision::Archive, 0.1, 1.0);
        let events = RecordingEventSink::new("orchestrator");

        decide_next(&mut state, &events).await;

        assert!(state.should_terminate);
        assert_eq!(state.termination_reason, Some(TerminationReason::Archived));
    }

    #[tokio::test]
    async fn needs_modification_does_not_terminate() {
        let mut state = state_with(Decision::NeedsModification, 0.1, 1.0);
        let events = RecordingEventSink::new("orchestrator");

        decide_next(&mut state, &events).await;

        assert!(!state.should_terminate);
        assert!(state.termination_reason.is_none());
    }
}
