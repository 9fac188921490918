use core_types::{BacktestOutcome, Decision, TerminationReason};
use stage_adapters::{Analyst, AnalystRequest};
use tracing::{error, warn};

use super::state::IterationState;

/// Stage 4: `invoke_analyst`. Skips if an earlier stage
/// already terminated the iteration, or if stage 3 produced no outcome at
/// all.
///
/// A synthetic `BacktestOutcome::Failed` never reaches the Analyst: it is
/// mapped straight to `NeedsModification` with the crash folded into
/// feedback, since the Analyst contract expects a completed result to
/// diagnose — a backtest-code crash is information, not a failure, and
/// that principle extends here to skipping the Analyst call entirely.
pub async fn invoke_analyst(state: &mut IterationState, analyst: &dyn Analyst) {
    if state.should_terminate {
        return;
    }

    let Some(outcome) = state.backtest_outcome.clone() else {
        return;
    };

    let result = match outcome {
        BacktestOutcome::Failed { error_message, .. } => {
            state.decision = Some(Decision::NeedsModification);
            state.feedback = Some(format!("fix code error: {error_message}"));
            return;
        }
        BacktestOutcome::Completed(result) => result,
    };

    let request = AnalystRequest {
        backtest_result: result,
        strategy_code: state.engineer_response.as_ref().map(|r| r.generated_code.clone()),
        optimization_run_id: state.optimization_run_id.clone(),
        current_iteration: state.iteration_index,
        max_iterations: state.max_iterations,
    };

    let response = match analyst.analyze(request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(iteration = state.iteration_index, error = %err, "analyst call failed, defaulting to needs_modification");
            state.decision = Some(Decision::NeedsModification);
            state.feedback = Some(format!("analyst call failed: {err}"));
            return;
        }
    };

    let decision = match Decision::parse(&response.decision) {
        Ok(decision) => decision,
        Err(parse_err) => {
            error!(iteration = state.iteration_index, raw = %response.decision, "analyst returned an unrecognized decision");
            state.should_terminate = true;
            state.termination_reason = Some(TerminationReason::IterationException);
            state.feedback = Some(parse_err);
            return;
        }
    };

    let mut feedback_parts = Vec::new();
    if let Some(suggestion) = response.suggestion_description {
        feedback_parts.push(suggestion);
    }
    feedback_parts.extend(response.issues);
    feedback_parts.extend(response.root_causes);

    state.decision = Some(decision);
    state.feedback = if feedback_parts.is_empty() {
        None
    } else {
        Some(feedback_parts.join("\n"))
    };
}
