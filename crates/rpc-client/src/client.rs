use std::time::Duration;

use core_types::{BacktestJob, BacktestResult, OrchestratorError, Strategy};
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use crate::convert;
use crate::proto::orchestrator_service_client::OrchestratorServiceClient;
use crate::proto::{self};
use crate::status::{map_elapsed, map_status, map_transport_err, DEFAULT_DEADLINE, VALIDATE_DEADLINE};
use crate::trait_def::OrchestratorRpc;
use crate::types::{
    ControlAction, ControlOptimizationOutcome, ControlOptimizationParams, CreateStrategyParams,
    Page, PageResult, RecordIterationParams, RunSnapshot, SubmitBacktestParams, ValidationOutcome,
};

/// A typed async wrapper over the generated gRPC stub. Opened once per
/// `run_optimization` call, as a scoped resource, and held
/// for the run's duration; the underlying `Channel` is cheaply `Clone`, so
/// concurrent runs can share one `GrpcOrchestratorClient` safely.
#[derive(Clone)]
pub struct GrpcOrchestratorClient {
    inner: OrchestratorServiceClient<Channel>,
    default_deadline: Duration,
    validate_deadline: Duration,
}

impl GrpcOrchestratorClient {
    pub async fn connect(addr: &str) -> Result<Self, OrchestratorError> {
        Self::connect_with_deadlines(addr, DEFAULT_DEADLINE, VALIDATE_DEADLINE).await
    }

    pub async fn connect_with_deadlines(
        addr: &str,
        default_deadline: Duration,
        validate_deadline: Duration,
    ) -> Result<Self, OrchestratorError> {
        let endpoint: Endpoint = addr
            .to_string()
            .parse::<Endpoint>()
            .map_err(|e| OrchestratorError::Validation(format!("invalid rpc address {addr}: {e}")))?;

        let channel = endpoint.connect().await.map_err(map_transport_err)?;

        Ok(Self {
            inner: OrchestratorServiceClient::new(channel),
            default_deadline,
            validate_deadline,
        })
    }
}

/// Wraps one RPC invocation with the per-call deadline the spec requires —
/// a plain `tokio::time::timeout`, independent of any transport-level
/// timeout layer, since deadlines differ per method (30s default, 60s for
/// `validate_strategy`).
async fn call_with<Resp, Fut>(deadline: Duration, fut: Fut) -> Result<Resp, OrchestratorError>
where
    Fut: std::future::Future<Output = Result<tonic::Response<Resp>, tonic::Status>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(resp)) => Ok(resp.into_inner()),
        Ok(Err(status)) => Err(map_status(status)),
        Err(elapsed) => Err(map_elapsed(elapsed, deadline)),
    }
}

#[async_trait::async_trait]
impl OrchestratorRpc for GrpcOrchestratorClient {
    async fn create_strategy(&self, params: CreateStrategyParams) -> Result<Strategy, OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::CreateStrategyRequest {
            name: params.name,
            code: params.code,
            description: params.description,
            parent_id: params.parent_id,
            tags: params.tags,
        };
        let resp = call_with(self.default_deadline, client.create_strategy(Request::new(req))).await?;
        Ok(convert::strategy_from_proto(resp))
    }

    async fn get_strategy(&self, strategy_id: &str) -> Result<Strategy, OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::GetStrategyRequest {
            strategy_id: strategy_id.to_string(),
        };
        let resp = call_with(self.default_deadline, client.get_strategy(Request::new(req))).await?;
        Ok(convert::strategy_from_proto(resp))
    }

    async fn validate_strategy(&self, code: &str, name: &str) -> Result<ValidationOutcome, OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::ValidateStrategyRequest {
            code: code.to_string(),
            name: name.to_string(),
        };
        let resp = call_with(self.validate_deadline, client.validate_strategy(Request::new(req))).await?;
        Ok(convert::validation_outcome_from_proto(resp))
    }

    async fn submit_backtest(&self, params: SubmitBacktestParams) -> Result<BacktestJob, OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::SubmitBacktestRequest {
            strategy_id: params.strategy_id,
            config: Some(convert::backtest_config_to_proto(&params.config)),
            run_id: params.run_id,
            priority: params.priority,
        };
        let resp = call_with(self.default_deadline, client.submit_backtest(Request::new(req))).await?;
        Ok(convert::backtest_job_from_proto(resp))
    }

    async fn get_backtest_job(&self, job_id: &str) -> Result<BacktestJob, OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::GetBacktestJobRequest {
            job_id: job_id.to_string(),
        };
        let resp = call_with(self.default_deadline, client.get_backtest_job(Request::new(req))).await?;
        Ok(convert::backtest_job_from_proto(resp))
    }

    async fn get_backtest_result(&self, job_id: &str) -> Result<BacktestResult, OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::GetBacktestResultRequest {
            job_id: job_id.to_string(),
        };
        let resp = call_with(self.default_deadline, client.get_backtest_result(Request::new(req))).await?;
        convert::backtest_result_from_proto(resp)
    }

    async fn control_optimization(
        &self,
        params: ControlOptimizationParams,
    ) -> Result<ControlOptimizationOutcome, OrchestratorError> {
        let mut client = self.inner.clone();
        let action = match params.action {
            ControlAction::Pause => proto::ControlActionProto::Pause,
            ControlAction::Resume => proto::ControlActionProto::Resume,
            ControlAction::Cancel => proto::ControlActionProto::Cancel,
            ControlAction::Complete => proto::ControlActionProto::Complete,
            ControlAction::Fail => proto::ControlActionProto::Fail,
        };
        let req = proto::ControlOptimizationRequest {
            run_id: params.run_id,
            action: action as i32,
            termination_reason: params.termination_reason,
            best_strategy_id: params.best_strategy_id,
        };
        let resp = call_with(self.default_deadline, client.control_optimization(Request::new(req))).await?;
        let run = resp
            .run
            .ok_or_else(|| OrchestratorError::Internal("control_optimization response missing run".into()))?;
        Ok(ControlOptimizationOutcome {
            success: resp.success,
            run: convert::optimization_run_from_proto(run)?,
        })
    }

    async fn get_optimization_run(&self, run_id: &str) -> Result<RunSnapshot, OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::GetOptimizationRunRequest {
            run_id: run_id.to_string(),
        };
        let resp = call_with(self.default_deadline, client.get_optimization_run(Request::new(req))).await?;
        convert::run_snapshot_from_proto(resp)
    }

    async fn list_optimization_runs(
        &self,
        status: Option<core_types::RunStatus>,
        page: Page,
    ) -> Result<PageResult, OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::ListOptimizationRunsRequest {
            status: status.map(|s| convert::run_status_to_proto(s) as i32),
            page: page.page,
            page_size: page.page_size,
        };
        let resp = call_with(self.default_deadline, client.list_optimization_runs(Request::new(req))).await?;
        let runs = resp
            .runs
            .into_iter()
            .map(convert::optimization_run_from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResult {
            runs,
            page: resp.page,
            page_size: resp.page_size,
            total_count: resp.total_count,
        })
    }

    async fn record_iteration(&self, params: RecordIterationParams) -> Result<(), OrchestratorError> {
        let mut client = self.inner.clone();
        let req = proto::RecordIterationRequest {
            run_id: params.run_id,
            iteration_index: params.iteration_index,
            analyst_feedback: params.analyst_feedback,
            decision: params.decision,
            new_best_strategy_id: params.new_best_strategy_id,
            new_best_sharpe: params.new_best_sharpe,
        };
        call_with(self.default_deadline, client.record_iteration(Request::new(req))).await?;
        Ok(())
    }
}
