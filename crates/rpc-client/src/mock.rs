//! `ScriptedRpc`: a scriptable in-memory `OrchestratorRpc`, used by
//! `orchestrator`'s test suite to drive end-to-end scenarios
//! without a live gRPC backend. Mirrors the trait-plus-swappable-impl
//! pattern used for the exchange connectors, one layer down the stack.
//!
//! Behind the `testing` feature only.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use core_types::{
    BacktestJob, BacktestResult, JobStatus, OptimizationRun, OrchestratorError, RunStatus,
    Strategy,
};
use tokio::sync::Mutex;

use crate::trait_def::OrchestratorRpc;
use crate::types::{
    ControlAction, ControlOptimizationOutcome, ControlOptimizationParams, CreateStrategyParams,
    IterationSummary, Page, PageResult, RecordIterationParams, RunSnapshot, SubmitBacktestParams,
    ValidationOutcome,
};

struct Inner {
    run: OptimizationRun,
    iterations: Vec<IterationSummary>,
    strategies: HashMap<String, Strategy>,
    strategy_seq: u32,
    /// Per-call validation outcomes, consumed in order. Once exhausted,
    /// every further call returns `valid: true` so a test only needs to
    /// script the retries it cares about.
    validation_script: VecDeque<ValidationOutcome>,
    /// Per-job-id sequence of statuses returned by successive
    /// `get_backtest_job` polls. The last entry repeats once exhausted.
    job_status_script: HashMap<String, VecDeque<JobStatus>>,
    jobs: HashMap<String, BacktestJob>,
    results: HashMap<String, BacktestResult>,
    control_log: Vec<ControlOptimizationParams>,
    /// If set, `get_backtest_job` returns this error the given number of
    /// times before falling through to the scripted status: transient RPC
    /// errors during polling are logged but do not terminate the wait.
    transient_poll_errors_remaining: u32,
    /// If nonzero, `validate_strategy` returns a transport-level
    /// `ConnectionError` this many times before consulting
    /// `validation_script` — used to exercise the "trust Engineer when
    /// backend validation itself is unreachable" path.
    validate_transport_errors_remaining: u32,
}

pub struct ScriptedRpc {
    inner: Mutex<Inner>,
}

impl ScriptedRpc {
    /// Seeds a fresh backend with one base strategy and a freshly-pending
    /// run pointed at it.
    pub fn new(run: OptimizationRun, base_strategy: Strategy) -> Self {
        let mut strategies = HashMap::new();
        strategies.insert(base_strategy.strategy_id.clone(), base_strategy);
        Self {
            inner: Mutex::new(Inner {
                run,
                iterations: Vec::new(),
                strategies,
                strategy_seq: 0,
                validation_script: VecDeque::new(),
                job_status_script: HashMap::new(),
                jobs: HashMap::new(),
                results: HashMap::new(),
                control_log: Vec::new(),
                transient_poll_errors_remaining: 0,
                validate_transport_errors_remaining: 0,
            }),
        }
    }

    pub async fn push_validation_outcome(&self, outcome: ValidationOutcome) {
        self.inner.lock().await.validation_script.push_back(outcome);
    }

    pub async fn push_validation_failure(&self, errors: Vec<String>) {
        self.push_validation_outcome(ValidationOutcome {
            valid: false,
            errors,
            warnings: Vec::new(),
            class_name: None,
        })
        .await;
    }

    /// Scripts the sequence of statuses `get_backtest_job` will return for
    /// `job_id`, one per call (the last repeats once exhausted), and stashes
    /// the matching result so `get_backtest_result` has something to return
    /// once the scripted status reaches `Completed`.
    pub async fn script_job(&self, job_id: &str, statuses: Vec<JobStatus>, result: Option<BacktestResult>) {
        let mut inner = self.inner.lock().await;
        inner
            .job_status_script
            .insert(job_id.to_string(), statuses.into_iter().collect());
        if let Some(result) = result {
            inner.results.insert(job_id.to_string(), result);
        }
    }

    /// Pre-seeds `job_id` as already `Failed` with a specific error message,
    /// bypassing `job_status_script` entirely — for scenarios that need
    /// exact diagnostic text rather than the generic "scripted failure"
    /// `get_backtest_job` otherwise fills in.
    pub async fn script_job_failure(&self, job_id: &str, error_message: &str) {
        let mut inner = self.inner.lock().await;
        inner.jobs.insert(
            job_id.to_string(),
            BacktestJob {
                job_id: job_id.to_string(),
                status: JobStatus::Failed,
                error_message: Some(error_message.to_string()),
                logs: None,
            },
        );
        inner
            .job_status_script
            .insert(job_id.to_string(), std::iter::once(JobStatus::Failed).collect());
    }

    pub async fn script_transient_poll_errors(&self, count: u32) {
        self.inner.lock().await.transient_poll_errors_remaining = count;
    }

    pub async fn script_validate_transport_errors(&self, count: u32) {
        self.inner.lock().await.validate_transport_errors_remaining = count;
    }

    pub async fn control_log(&self) -> Vec<ControlOptimizationParams> {
        self.inner.lock().await.control_log.clone()
    }

    pub async fn current_run(&self) -> OptimizationRun {
        self.inner.lock().await.run.clone()
    }

    pub async fn set_run(&self, run: OptimizationRun) {
        self.inner.lock().await.run = run;
    }
}

#[async_trait]
impl OrchestratorRpc for ScriptedRpc {
    async fn create_strategy(&self, params: CreateStrategyParams) -> Result<Strategy, OrchestratorError> {
        let mut inner = self.inner.lock().await;
        inner.strategy_seq += 1;
        let strategy_id = format!("strat-{}", inner.strategy_seq);
        let parent_generation = params
            .parent_id
            .as_deref()
            .and_then(|id| inner.strategies.get(id))
            .map(|s| s.generation)
            .unwrap_or(0);
        let strategy = Strategy {
            strategy_id: strategy_id.clone(),
            name: params.name,
            code: params.code,
            parent_id: params.parent_id,
            generation: parent_generation + 1,
        };
        inner.strategies.insert(strategy_id, strategy.clone());
        Ok(strategy)
    }

    async fn get_strategy(&self, strategy_id: &str) -> Result<Strategy, OrchestratorError> {
        self.inner
            .lock()
            .await
            .strategies
            .get(strategy_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("strategy {strategy_id}")))
    }

    async fn validate_strategy(&self, _code: &str, _name: &str) -> Result<ValidationOutcome, OrchestratorError> {
        let mut inner = self.inner.lock().await;
        if inner.validate_transport_errors_remaining > 0 {
            inner.validate_transport_errors_remaining -= 1;
            return Err(OrchestratorError::Connection("scripted transport failure".into()));
        }
        Ok(inner.validation_script.pop_front().unwrap_or(ValidationOutcome {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            class_name: None,
        }))
    }

    async fn submit_backtest(&self, params: SubmitBacktestParams) -> Result<BacktestJob, OrchestratorError> {
        let mut inner = self.inner.lock().await;
        let job_id = format!("job-{}", params.strategy_id);
        let job = BacktestJob {
            job_id: job_id.clone(),
            status: JobStatus::Queued,
            error_message: None,
            logs: None,
        };
        inner.jobs.insert(job_id, job.clone());
        Ok(job)
    }

    async fn get_backtest_job(&self, job_id: &str) -> Result<BacktestJob, OrchestratorError> {
        let mut inner = self.inner.lock().await;
        if inner.transient_poll_errors_remaining > 0 {
            inner.transient_poll_errors_remaining -= 1;
            return Err(OrchestratorError::Connection("scripted transient poll failure".into()));
        }

        let status = {
            let script = inner.job_status_script.get_mut(job_id);
            match script {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => *queue.front().unwrap(),
                None => JobStatus::Running,
            }
        };

        let job = inner.jobs.entry(job_id.to_string()).or_insert(BacktestJob {
            job_id: job_id.to_string(),
            status,
            error_message: None,
            logs: None,
        });
        job.status = status;
        if status == JobStatus::Failed && job.error_message.is_none() {
            job.error_message = Some("scripted failure".to_string());
        }
        Ok(job.clone())
    }

    async fn get_backtest_result(&self, job_id: &str) -> Result<BacktestResult, OrchestratorError> {
        self.inner
            .lock()
            .await
            .results
            .get(job_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("result for job {job_id}")))
    }

    async fn control_optimization(
        &self,
        params: ControlOptimizationParams,
    ) -> Result<ControlOptimizationOutcome, OrchestratorError> {
        let mut inner = self.inner.lock().await;
        inner.control_log.push(params.clone());

        match params.action {
            ControlAction::Resume => inner.run.status = RunStatus::Running,
            ControlAction::Pause => inner.run.status = RunStatus::Paused,
            ControlAction::Cancel => inner.run.status = RunStatus::Cancelled,
            ControlAction::Complete => {
                inner.run.status = RunStatus::Completed;
                if let Some(best) = params.best_strategy_id.clone() {
                    inner.run.best_strategy_id = Some(best);
                }
            }
            ControlAction::Fail => inner.run.status = RunStatus::Failed,
        }

        Ok(ControlOptimizationOutcome {
            success: true,
            run: inner.run.clone(),
        })
    }

    async fn get_optimization_run(&self, run_id: &str) -> Result<RunSnapshot, OrchestratorError> {
        let inner = self.inner.lock().await;
        if inner.run.run_id != run_id {
            return Err(OrchestratorError::NotFound(format!("run {run_id}")));
        }
        Ok(RunSnapshot {
            run: inner.run.clone(),
            iterations: inner.iterations.clone(),
        })
    }

    async fn list_optimization_runs(
        &self,
        status: Option<RunStatus>,
        page: Page,
    ) -> Result<PageResult, OrchestratorError> {
        let inner = self.inner.lock().await;
        let runs: Vec<_> = std::iter::once(inner.run.clone())
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect();
        let total_count = runs.len() as u32;
        Ok(PageResult {
            runs,
            page: page.page,
            page_size: page.page_size,
            total_count,
        })
    }

    async fn record_iteration(&self, params: RecordIterationParams) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock().await;
        if inner.run.run_id != params.run_id {
            return Err(OrchestratorError::NotFound(format!("run {}", params.run_id)));
        }
        inner.iterations.push(IterationSummary {
            iteration_index: params.iteration_index,
            analyst_feedback: params.analyst_feedback,
            decision: params.decision,
        });
        inner.run.current_iteration += 1;
        if let Some(sharpe) = params.new_best_sharpe {
            if sharpe > inner.run.best_sharpe {
                inner.run.best_sharpe = sharpe;
                inner.run.best_strategy_id = params.new_best_strategy_id;
            }
        }
        Ok(())
    }
}

/// Test-only seeding helper: back-fills iteration history (e.g. for a
/// resumed run) without touching `current_iteration` — only
/// `record_iteration` advances that counter, mirroring how the real
/// backend's run record moves forward.
impl ScriptedRpc {
    pub async fn push_iteration(&self, summary: IterationSummary) {
        let mut inner = self.inner.lock().await;
        inner.iterations.push(summary);
    }

    /// Seeds a strategy record directly, for resume scenarios where the
    /// run's `best_strategy_id` already points at a strategy that predates
    /// the mock's own `create_strategy` sequence.
    pub async fn seed_strategy(&self, strategy: Strategy) {
        self.inner.lock().await.strategies.insert(strategy.strategy_id.clone(), strategy);
    }

    /// Snapshot of a job's current record, for tests asserting a timed-out
    /// job was left untouched in the backend.
    pub async fn job_snapshot(&self, job_id: &str) -> Option<BacktestJob> {
        self.inner.lock().await.jobs.get(job_id).cloned()
    }
}
