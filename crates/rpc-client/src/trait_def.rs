use async_trait::async_trait;
use core_types::{OrchestratorError, Strategy};

use crate::types::{
    ControlOptimizationOutcome, ControlOptimizationParams, CreateStrategyParams, Page,
    PageResult, RecordIterationParams, RunSnapshot, SubmitBacktestParams, ValidationOutcome,
};
use core_types::{BacktestJob, BacktestResult};

/// Every call the orchestrator makes against the backtest/strategy/
/// optimization-control RPC surface. The real
/// implementation (`GrpcOrchestratorClient`) wraps a tonic-generated stub;
/// test code substitutes `mock::ScriptedRpc` (behind the `testing` feature)
/// implementing the same trait, following the same
/// trait-plus-swappable-impl pattern used for the exchange connectors.
#[async_trait]
pub trait OrchestratorRpc: Send + Sync {
    async fn create_strategy(&self, params: CreateStrategyParams) -> Result<Strategy, OrchestratorError>;

    async fn get_strategy(&self, strategy_id: &str) -> Result<Strategy, OrchestratorError>;

    async fn validate_strategy(&self, code: &str, name: &str) -> Result<ValidationOutcome, OrchestratorError>;

    async fn submit_backtest(&self, params: SubmitBacktestParams) -> Result<BacktestJob, OrchestratorError>;

    async fn get_backtest_job(&self, job_id: &str) -> Result<BacktestJob, OrchestratorError>;

    async fn get_backtest_result(&self, job_id: &str) -> Result<BacktestResult, OrchestratorError>;

    async fn control_optimization(
        &self,
        params: ControlOptimizationParams,
    ) -> Result<ControlOptimizationOutcome, OrchestratorError>;

    async fn get_optimization_run(&self, run_id: &str) -> Result<RunSnapshot, OrchestratorError>;

    async fn list_optimization_runs(
        &self,
        status: Option<core_types::RunStatus>,
        page: Page,
    ) -> Result<PageResult, OrchestratorError>;

    /// Persists one completed iteration and advances `current_iteration`
    /// server-side. `RunContext::save` calls this for every iteration the
    /// pipeline returns, terminal or not — it is the only way the run's
    /// backend record ever moves past iteration 0.
    async fn record_iteration(&self, params: RecordIterationParams) -> Result<(), OrchestratorError>;
}
