use core_types::{IterationMode, TerminationReason};
use rpc_client::OrchestratorRpc;
use stage_adapters::{Engineer, EngineerInput, EngineerMode, EngineerRequest};
use tracing::{error, info, warn};

use super::state::IterationState;

/// Stage 1: `validate_and_engineer`.
///
/// Retries internally, up to `max_validation_retries` times, WITHOUT
/// touching `state.iteration_index` — the outer optimization iteration
/// counter is only ever advanced by `RunContext::save`, never by this loop
/// so validation retries never consume an optimization iteration.
pub async fn validate_and_engineer(
    state: &mut IterationState,
    engineer: &dyn Engineer,
    rpc: &dyn OrchestratorRpc,
    max_validation_retries: u32,
) {
    let mut code = state.input_code.clone();
    let mut diagnosis = if state.mode == IterationMode::Evolve {
        state.input_feedback.clone()
    } else {
        None
    };

    let mut retry_count = 0u32;

    while retry_count < max_validation_retries {
        let engineer_mode = if retry_count == 0 && state.mode == IterationMode::New {
            EngineerMode::New
        } else {
            EngineerMode::Evolve
        };

        let request = EngineerRequest {
            input_data: EngineerInput {
                id: Some(state.current_strategy_id.clone()),
                name: format!("strategy_{}_iter_{}", state.base_strategy_id, state.iteration_index),
                code: code.clone(),
                diagnosis: diagnosis.clone(),
                parent_id: None,
            },
            mode: engineer_mode,
            max_retries: max_validation_retries,
        };

        let engineer_result = match engineer.generate(request).await {
            Ok(resp) => resp,
            Err(err) => {
                error!(iteration = state.iteration_index, error = %err, "engineer threw");
                state.should_terminate = true;
                state.termination_reason = Some(TerminationReason::EngineerException);
                return;
            }
        };

        if !engineer_result.validation_passed {
            warn!(
                iteration = state.iteration_index,
                retry = retry_count,
                errors = ?engineer_result.validation_errors,
                "engineer's internal validation failed"
            );
            retry_count += 1;
            diagnosis = Some(format!(
                "Code validation failed: {:?}. Please fix.",
                engineer_result.validation_errors
            ));
            continue;
        }

        if engineer_result.generated_code.is_empty() {
            error!(iteration = state.iteration_index, "engineer produced no code");
            state.should_terminate = true;
            state.termination_reason = Some(TerminationReason::EngineerNoCode);
            return;
        }

        code = engineer_result.generated_code.clone();

        let validation_name = format!("strategy_iter_{}_v{}", state.iteration_index, retry_count);
        let validation = match rpc.validate_strategy(&code, &validation_name).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // Transport-level failure of the backend's own validation
                // call: trust Engineer's self-reported validity rather than
                // block the iteration on a flaky sidecar.
                warn!(error = %err, "backend validation call failed, trusting engineer");
                rpc_client::ValidationOutcome {
                    valid: true,
                    errors: Vec::new(),
                    warnings: Vec::new(),
                    class_name: None,
                }
            }
        };

        if validation.valid {
            info!(iteration = state.iteration_index, retries = retry_count, "validation passed");
            state.engineer_response = Some(engineer_result);
            state.validation_passed = true;
            state.validation_retry_count = retry_count;
            return;
        }

        warn!(
            iteration = state.iteration_index,
            retry = retry_count,
            errors = ?validation.errors,
            "backend validation failed, retrying"
        );
        retry_count += 1;
        diagnosis = Some(format!(
            "Strategy code failed backend validation: {:?}. Please fix these issues.",
            validation.errors
        ));
    }

    error!(iteration = state.iteration_index, retries = retry_count, "validation retries exhausted");
    state.validation_passed = false;
    state.validation_retry_count = retry_count;
    state.should_terminate = true;
    state.termination_reason = Some(TerminationReason::ValidationMaxRetries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::BacktestConfig;
    use rpc_client::mock::ScriptedRpc;
    use stage_adapters::mock::{ScriptedEngineer, ScriptedOutcome};
    use stage_adapters::EngineerResponse;

    fn base_state() -> IterationState {
        IterationState {
            optimization_run_id: "r1".into(),
            iteration_index: 0,
            max_iterations: 5,
            base_strategy_id: "base".into(),
            current_strategy_id: "base".into(),
            backtest_config: BacktestConfig::default(),
            input_code: "code-v0".into(),
            input_feedback: None,
            mode: IterationMode::New,
            best_sharpe: f64::NEG_INFINITY,
            best_strategy_id: None,
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

    fn run_and_base_strategy() -> (core_types::OptimizationRun, core_types::Strategy) {
        let run = core_types::OptimizationRun {
            run_id: "r1".into(),
            base_strategy_id: "base".into(),
            max_iterations: 5,
            current_iteration: 0,
            status: core_types::RunStatus::Pending,
            best_strategy_id: None,
            best_sharpe: f64::NEG_INFINITY,
            config: core_types::RunConfig::default(),
        };
        let strategy = core_types::Strategy {
            strategy_id: "base".into(),
            name: "base".into(),
            code: "code-v0".into(),
            parent_id: None,
            generation: 0,
        };
        (run, strategy)
    }

    #[tokio::test]
    async fn succeeds_first_try_without_touching_iteration_index() {
        let mut state = base_state();
        let engineer = ScriptedEngineer::always_valid("good-code", "s1");
        let (run, strategy) = run_and_base_strategy();
        let rpc = ScriptedRpc::new(run, strategy);

        validate_and_engineer(&mut state, &engineer, &rpc, 5).await;

        assert!(state.validation_passed);
        assert!(!state.should_terminate);
        assert_eq!(state.validation_retry_count, 0);
        assert_eq!(state.iteration_index, 0);
    }

    #[tokio::test]
    async fn absorbs_three_backend_validation_failures_before_succeeding() {
        let mut state = base_state();
        let engineer = ScriptedEngineer::always_valid("good-code", "s1");
        let (run, strategy) = run_and_base_strategy();
        let rpc = ScriptedRpc::new(run, strategy);
        rpc.push_validation_failure(vec!["bad 1".into()]).await;
        rpc.push_validation_failure(vec!["bad 2".into()]).await;
        rpc.push_validation_failure(vec!["bad 3".into()]).await;
        rpc.push_validation_outcome(rpc_client::ValidationOutcome {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            class_name: None,
        })
        .await;

        validate_and_engineer(&mut state, &engineer, &rpc, 5).await;

        assert!(state.validation_passed);
        assert!(!state.should_terminate);
        assert_eq!(state.validation_retry_count, 3);
        // the outer iteration counter is never touched by this loop
        assert_eq!(state.iteration_index, 0);
    }

    #[tokio::test]
    async fn exhausting_retries_terminates_with_validation_max_retries() {
        let mut state = base_state();
        let engineer = ScriptedEngineer::always_valid("good-code", "s1");
        let (run, strategy) = run_and_base_strategy();
        let rpc = ScriptedRpc::new(run, strategy);
        for _ in 0..10 {
            rpc.push_validation_failure(vec!["always bad".into()]).await;
        }

        validate_and_engineer(&mut state, &engineer, &rpc, 5).await;

        assert!(!state.validation_passed);
        assert!(state.should_terminate);
        assert_eq!(state.termination_reason, Some(TerminationReason::ValidationMaxRetries));
        assert_eq!(state.validation_retry_count, 5);
    }

    #[tokio::test]
    async fn engineer_exception_terminates_iteration() {
        let mut state = base_state();
        let engineer = ScriptedEngineer::new(vec![ScriptedOutcome::Err("llm timeout".into())]);
        let (run, strategy) = run_and_base_strategy();
        let rpc = ScriptedRpc::new(run, strategy);

        validate_and_engineer(&mut state, &engineer, &rpc, 5).await;

        assert!(state.should_terminate);
        assert_eq!(state.termination_reason, Some(TerminationReason::EngineerException));
    }

    #[tokio::test]
    async fn empty_generated_code_terminates_with_engineer_no_code() {
        let mut state = base_state();
        let empty = EngineerResponse {
            generated_code: String::new(),
            validation_passed: true,
            validation_errors: Vec::new(),
            retry_count: 0,
            strategy_name: "s1".into(),
            description: None,
            tags: Vec::new(),
            hyperopt_config: None,
        };
        let engineer = ScriptedEngineer::new(vec![ScriptedOutcome::Ok(empty)]);
        let (run, strategy) = run_and_base_strategy();
        let rpc = ScriptedRpc::new(run, strategy);

        validate_and_engineer(&mut state, &engineer, &rpc, 5).await;

        assert!(state.should_terminate);
        assert_eq!(state.termination_reason, Some(TerminationReason::EngineerNoCode));
    }

    #[tokio::test]
    async fn transport_failure_during_backend_validation_trusts_engineer() {
        let mut state = base_state();
        let engineer = ScriptedEngineer::always_valid("good-code", "s1");
        let (run, strategy) = run_and_base_strategy();
        let rpc = ScriptedRpc::new(run, strategy);
        rpc.script_validate_transport_errors(1).await;

        validate_and_engineer(&mut state, &engineer, &rpc, 5).await;

        assert!(state.validation_passed);
        assert_eq!(state.validation_retry_count, 0);
    }
}
