//! End-to-end scenarios driving `Runner::run_optimization`/`resume_optimization`
//! entirely against scripted in-memory doubles (`ScriptedRpc`,
//! `ScriptedEngineer`, `ScriptedAnalyst`, `RecordingEventSink`) — no live
//! backend, broker, or LLM involved.

use std::sync::Arc;
use std::time::Duration;

use core_types::{BacktestResult, JobStatus, OptimizationRun, RunConfig, RunStatus, Strategy};
use events::mock::RecordingEventSink;
use events::routing_keys;
use orchestrator::pipeline::{PipelineConfig, PipelineDeps};
use orchestrator::{RunOutcomeStatus, Runner};
use rpc_client::mock::ScriptedRpc;
use rpc_client::IterationSummary;
use stage_adapters::mock::{ScriptedAnalyst, ScriptedEngineer, ScriptedOutcome};

fn base_run(run_id: &str, max_iterations: u32) -> OptimizationRun {
    OptimizationRun {
        run_id: run_id.to_string(),
        base_strategy_id: "base".to_string(),
        max_iterations,
        current_iteration: 0,
        status: RunStatus::Pending,
        best_strategy_id: None,
        best_sharpe: f64::NEG_INFINITY,
        config: RunConfig::default(),
    }
}

fn base_strategy() -> Strategy {
    Strategy {
        strategy_id: "base".to_string(),
        name: "base".to_string(),
        code: "fn base_strategy() {}".to_string(),
        parent_id: None,
        generation: 0,
    }
}

fn result_with_sharpe(job_id: &str, strategy_id: &str, sharpe: f64) -> BacktestResult {
    BacktestResult {
        job_id: job_id.to_string(),
        strategy_id: strategy_id.to_string(),
        sharpe_ratio: Some(sharpe),
        profit_pct: Some(sharpe * 4.0),
        win_rate: Some(0.55),
        max_drawdown_pct: Some(3.0),
        metrics: serde_json::Value::Null,
    }
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        max_validation_retries: 5,
        poll_interval: Duration::from_millis(1),
        max_wait: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn s1_approval_on_iteration_two() {
    let rpc = Arc::new(ScriptedRpc::new(base_run("R1", 5), base_strategy()));
    rpc.script_job("job-strat-1", vec![JobStatus::Completed], Some(result_with_sharpe("job-strat-1", "strat-1", 1.2)))
        .await;
    rpc.script_job("job-strat-2", vec![JobStatus::Completed], Some(result_with_sharpe("job-strat-2", "strat-2", 2.5)))
        .await;

    let engineer = Arc::new(ScriptedEngineer::always_valid("fn strategy() {}", "s"));
    let analyst = Arc::new(ScriptedAnalyst::new(
        vec![
            ScriptedOutcome::Ok(ScriptedAnalyst::decision("modify", Some("tighten stop loss"))),
            ScriptedOutcome::Ok(ScriptedAnalyst::decision("approve", None)),
        ],
        true,
    ));
    let events = Arc::new(RecordingEventSink::new("orchestrator"));

    let deps = PipelineDeps {
        rpc: rpc.clone(),
        engineer,
        analyst,
        events: events.clone(),
    };
    let runner = Runner::new(deps, fast_config());

    let result = runner.run_optimization("R1").await;

    assert_eq!(result.iterations_completed, 2);
    assert_eq!(
        result.termination_reason,
        Some(core_types::TerminationReason::Approved)
    );
    assert_eq!(result.best_sharpe, 2.5);
    assert_eq!(result.status, RunOutcomeStatus::Completed);

    let keys = events.routing_keys().await;
    assert_eq!(
        keys.iter().filter(|k| *k == &routing_keys::OPTIMIZATION_ITERATION_STARTED).count(),
        2
    );
    assert_eq!(
        keys.iter().filter(|k| *k == &routing_keys::OPTIMIZATION_NEW_BEST).count(),
        1
    );
    assert!(keys.contains(&routing_keys::OPTIMIZATION_COMPLETED.to_string()));
}

#[tokio::test]
async fn s2_max_iterations_without_approval() {
    let rpc = Arc::new(ScriptedRpc::new(base_run("R2", 3), base_strategy()));
    rpc.script_job("job-strat-1", vec![JobStatus::Completed], Some(result_with_sharpe("job-strat-1", "strat-1", 0.9)))
        .await;
    rpc.script_job("job-strat-2", vec![JobStatus::Completed], Some(result_with_sharpe("job-strat-2", "strat-2", 1.0)))
        .await;
    rpc.script_job("job-strat-3", vec![JobStatus::Completed], Some(result_with_sharpe("job-strat-3", "strat-3", 0.95)))
        .await;

    let engineer = Arc::new(ScriptedEngineer::always_valid("fn strategy() {}", "s"));
    // coerce_at_max = false: proves the Runner's own max_iterations bound
    // terminates the run even if the Analyst contract never self-coerces.
    let analyst = Arc::new(ScriptedAnalyst::new(
        vec![
            ScriptedOutcome::Ok(ScriptedAnalyst::decision("modify", None)),
            ScriptedOutcome::Ok(ScriptedAnalyst::decision("modify", None)),
            ScriptedOutcome::Ok(ScriptedAnalyst::decision("modify", None)),
        ],
        false,
    ));
    let events = Arc::new(RecordingEventSink::new("orchestrator"));

    let deps = PipelineDeps {
        rpc: rpc.clone(),
        engineer,
        analyst,
        events: events.clone(),
    };
    let runner = Runner::new(deps, fast_config());

    let result = runner.run_optimization("R2").await;

    assert_eq!(result.iterations_completed, 3);
    assert_eq!(
        result.termination_reason,
        Some(core_types::TerminationReason::MaxIterations)
    );
    assert_eq!(result.best_sharpe, 1.0);
    assert_eq!(result.best_strategy_id.as_deref(), Some("strat-2"));
    assert_eq!(result.status, RunOutcomeStatus::Completed);
}

#[tokio::test]
async fn s3_validation_loop_absorbed_without_wasting_an_iteration() {
    let rpc = Arc::new(ScriptedRpc::new(base_run("R3", 2), base_strategy()));
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
    rpc.script_job("job-strat-1", vec![JobStatus::Completed], Some(result_with_sharpe("job-strat-1", "strat-1", 1.1)))
        .await;
    rpc.script_job("job-strat-2", vec![JobStatus::Completed], Some(result_with_sharpe("job-strat-2", "strat-2", 1.3)))
        .await;

    let engineer = Arc::new(ScriptedEngineer::always_valid("fn strategy() {}", "s"));
    let analyst = Arc::new(ScriptedAnalyst::new(
        vec![
            ScriptedOutcome::Ok(ScriptedAnalyst::decision("modify", None)),
            ScriptedOutcome::Ok(ScriptedAnalyst::decision("approve", None)),
        ],
        true,
    ));
    let events = Arc::new(RecordingEventSink::new("orchestrator"));

    let deps = PipelineDeps {
        rpc: rpc.clone(),
        engineer,
        analyst,
        events: events.clone(),
    };
    let runner = Runner::new(deps, fast_config());

    let result = runner.run_optimization("R3").await;

    assert_eq!(result.iterations_completed, 2);
    assert_ne!(
        result.termination_reason,
        Some(core_types::TerminationReason::ValidationMaxRetries)
    );
    let keys = events.routing_keys().await;
    assert!(!keys.contains(&routing_keys::OPTIMIZATION_FAILED.to_string()));
}

#[tokio::test]
async fn s4_code_crash_becomes_fix_feedback_then_recovers() {
    let rpc = Arc::new(ScriptedRpc::new(base_run("R4", 3), base_strategy()));
    rpc.script_job_failure("job-strat-1", "NameError: x").await;
    rpc.script_job("job-strat-2", vec![JobStatus::Completed], Some(result_with_sharpe("job-strat-2", "strat-2", 1.8)))
        .await;

    let engineer = Arc::new(ScriptedEngineer::always_valid("fn strategy() {}", "s"));
    // iteration 0's outcome is synthetic-failed and never reaches the
    // Analyst, so only one entry is scripted for iteration 1.
    let analyst = Arc::new(ScriptedAnalyst::new(
        vec![ScriptedOutcome::Ok(ScriptedAnalyst::decision("approve", None))],
        true,
    ));
    let events = Arc::new(RecordingEventSink::new("orchestrator"));

    let deps = PipelineDeps {
        rpc: rpc.clone(),
        engineer,
        analyst,
        events: events.clone(),
    };
    let runner = Runner::new(deps, fast_config());

    let result = runner.run_optimization("R4").await;

    assert_eq!(result.iterations_completed, 2);
    assert_eq!(
        result.termination_reason,
        Some(core_types::TerminationReason::Approved)
    );
    assert_eq!(result.best_sharpe, 1.8);

    let keys = events.routing_keys().await;
    assert_eq!(
        keys.iter().filter(|k| *k == &routing_keys::OPTIMIZATION_NEW_BEST).count(),
        1
    );
    assert!(keys.contains(&routing_keys::BACKTEST_FAILED.to_string()));
}

#[tokio::test]
async fn s5_backtest_timeout_fails_the_run_and_leaves_job_untouched() {
    let rpc = Arc::new(ScriptedRpc::new(base_run("R5", 3), base_strategy()));
    rpc.script_job("job-strat-1", vec![JobStatus::Running], None).await;

    let engineer = Arc::new(ScriptedEngineer::always_valid("fn strategy() {}", "s"));
    let analyst = Arc::new(ScriptedAnalyst::new(Vec::new(), true));
    let events = Arc::new(RecordingEventSink::new("orchestrator"));

    let deps = PipelineDeps {
        rpc: rpc.clone(),
        engineer,
        analyst,
        events: events.clone(),
    };
    let config = PipelineConfig {
        max_validation_retries: 5,
        poll_interval: Duration::from_millis(2),
        max_wait: Duration::from_millis(10),
    };
    let runner = Runner::new(deps, config);

    let result = runner.run_optimization("R5").await;

    assert_eq!(
        result.termination_reason,
        Some(core_types::TerminationReason::BacktestTimeout)
    );
    assert_eq!(result.status, RunOutcomeStatus::Failed);

    let keys = events.routing_keys().await;
    assert!(keys.contains(&routing_keys::OPTIMIZATION_FAILED.to_string()));

    let job = rpc.job_snapshot("job-strat-1").await.expect("job should still exist");
    assert_eq!(job.status, JobStatus::Running);
}

#[tokio::test]
async fn s6_resume_continues_from_persisted_iteration_with_retained_best() {
    let mut run = base_run("R6", 4);
    run.current_iteration = 3;
    run.status = RunStatus::Running;
    run.best_strategy_id = Some("strat-3".to_string());
    run.best_sharpe = 1.4;

    let current_strategy = Strategy {
        strategy_id: "strat-3".to_string(),
        name: "s3".to_string(),
        code: "fn strategy_v3() {}".to_string(),
        parent_id: Some("base".to_string()),
        generation: 3,
    };

    let rpc = Arc::new(ScriptedRpc::new(run, base_strategy()));
    rpc.seed_strategy(current_strategy).await;
    rpc.push_iteration(IterationSummary {
        iteration_index: 2,
        analyst_feedback: Some("iter2 feedback".into()),
        decision: Some("NEEDS_MODIFICATION".into()),
    })
    .await;
    rpc.script_job(
        "job-strat-4",
        vec![JobStatus::Completed],
        Some(result_with_sharpe("job-strat-4", "strat-4", 1.0)),
    )
    .await;

    let engineer = Arc::new(ScriptedEngineer::always_valid("fn strategy_v4() {}", "s"));
    let analyst = Arc::new(ScriptedAnalyst::new(
        vec![ScriptedOutcome::Ok(ScriptedAnalyst::decision("approve", None))],
        true,
    ));
    let events = Arc::new(RecordingEventSink::new("orchestrator"));

    let deps = PipelineDeps {
        rpc: rpc.clone(),
        engineer,
        analyst,
        events: events.clone(),
    };
    let runner = Runner::new(deps, fast_config());

    let result = runner.resume_optimization("R6").await;

    assert_eq!(result.iterations_completed, 4);
    assert_eq!(
        result.termination_reason,
        Some(core_types::TerminationReason::Approved)
    );
    // sharpe 1.0 on the resumed iteration never displaces the retained 1.4.
    assert_eq!(result.best_sharpe, 1.4);
    let keys = events.routing_keys().await;
    assert!(!keys.contains(&routing_keys::OPTIMIZATION_NEW_BEST.to_string()));
}
