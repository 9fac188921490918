use core_types::{
    BacktestConfig, BacktestJob, BacktestResult, JobStatus, OptimizationRun, OrchestratorError,
    RunConfig, RunStatus, Strategy,
};

use crate::proto;
use crate::types::{IterationSummary, RunSnapshot, ValidationOutcome};

pub fn strategy_from_proto(p: proto::Strategy) -> Strategy {
    Strategy {
        strategy_id: p.strategy_id,
        name: p.name,
        code: p.code,
        parent_id: p.parent_id,
        generation: p.generation,
    }
}

pub fn backtest_config_to_proto(c: &BacktestConfig) -> proto::BacktestConfigProto {
    proto::BacktestConfigProto {
        exchange: c.exchange.clone(),
        pairs: c.pairs.clone(),
        timeframe: c.timeframe.clone(),
        timerange_start: c.timerange_start.clone(),
        timerange_end: c.timerange_end.clone(),
        dry_run_wallet: c.dry_run_wallet,
        max_open_trades: c.max_open_trades,
        stake_amount: c.stake_amount.clone(),
    }
}

pub fn backtest_config_from_proto(p: proto::BacktestConfigProto) -> BacktestConfig {
    BacktestConfig {
        exchange: p.exchange,
        pairs: p.pairs,
        timeframe: p.timeframe,
        timerange_start: p.timerange_start,
        timerange_end: p.timerange_end,
        dry_run_wallet: p.dry_run_wallet,
        max_open_trades: p.max_open_trades,
        stake_amount: p.stake_amount,
    }
}

pub fn job_status_from_proto(p: i32) -> JobStatus {
    match proto::JobStatusProto::try_from(p).unwrap_or(proto::JobStatusProto::Unspecified) {
        proto::JobStatusProto::Queued => JobStatus::Queued,
        proto::JobStatusProto::Running => JobStatus::Running,
        proto::JobStatusProto::Completed => JobStatus::Completed,
        proto::JobStatusProto::Failed => JobStatus::Failed,
        proto::JobStatusProto::Cancelled => JobStatus::Cancelled,
        proto::JobStatusProto::Unspecified => JobStatus::Queued,
    }
}

pub fn backtest_job_from_proto(p: proto::BacktestJob) -> BacktestJob {
    BacktestJob {
        job_id: p.job_id,
        status: job_status_from_proto(p.status),
        error_message: p.error_message,
        logs: p.logs,
    }
}

pub fn backtest_result_from_proto(p: proto::BacktestResult) -> Result<BacktestResult, OrchestratorError> {
    let metrics = if p.metrics_json.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&p.metrics_json)
            .map_err(|e| OrchestratorError::Internal(format!("malformed metrics_json: {e}")))?
    };

    Ok(BacktestResult {
        job_id: p.job_id,
        strategy_id: p.strategy_id,
        sharpe_ratio: p.sharpe_ratio,
        profit_pct: p.profit_pct,
        win_rate: p.win_rate,
        max_drawdown_pct: p.max_drawdown_pct,
        metrics,
    })
}

pub fn validation_outcome_from_proto(p: proto::ValidateStrategyResponse) -> ValidationOutcome {
    ValidationOutcome {
        valid: p.valid,
        errors: p.errors,
        warnings: p.warnings,
        class_name: p.class_name,
    }
}

pub fn run_status_from_proto(p: i32) -> RunStatus {
    match proto::RunStatusProto::try_from(p).unwrap_or(proto::RunStatusProto::Unspecified) {
        proto::RunStatusProto::Pending => RunStatus::Pending,
        proto::RunStatusProto::Running => RunStatus::Running,
        proto::RunStatusProto::Paused => RunStatus::Paused,
        proto::RunStatusProto::Completed => RunStatus::Completed,
        proto::RunStatusProto::Failed => RunStatus::Failed,
        proto::RunStatusProto::Cancelled => RunStatus::Cancelled,
        proto::RunStatusProto::Unspecified => RunStatus::Pending,
    }
}

pub fn run_status_to_proto(s: RunStatus) -> proto::RunStatusProto {
    match s {
        RunStatus::Pending => proto::RunStatusProto::Pending,
        RunStatus::Running => proto::RunStatusProto::Running,
        RunStatus::Paused => proto::RunStatusProto::Paused,
        RunStatus::Completed => proto::RunStatusProto::Completed,
        RunStatus::Failed => proto::RunStatusProto::Failed,
        RunStatus::Cancelled => proto::RunStatusProto::Cancelled,
    }
}

pub fn optimization_run_from_proto(p: proto::OptimizationRunProto) -> Result<OptimizationRun, OrchestratorError> {
    let config: RunConfig = if p.config_json.is_empty() {
        RunConfig::default()
    } else {
        serde_json::from_str(&p.config_json)
            .map_err(|e| OrchestratorError::Internal(format!("malformed config_json: {e}")))?
    };

    Ok(OptimizationRun {
        run_id: p.run_id,
        base_strategy_id: p.base_strategy_id,
        max_iterations: p.max_iterations,
        current_iteration: p.current_iteration,
        status: run_status_from_proto(p.status),
        best_strategy_id: p.best_strategy_id,
        best_sharpe: p.best_sharpe,
        config,
    })
}

pub fn run_snapshot_from_proto(p: proto::GetOptimizationRunResponse) -> Result<RunSnapshot, OrchestratorError> {
    let run = p
        .run
        .ok_or_else(|| OrchestratorError::Internal("get_optimization_run response missing run".into()))?;

    Ok(RunSnapshot {
        run: optimization_run_from_proto(run)?,
        iterations: p
            .iterations
            .into_iter()
            .map(|i| IterationSummary {
                iteration_index: i.iteration_index,
                analyst_feedback: i.analyst_feedback,
                decision: i.decision,
            })
            .collect(),
    })
}
