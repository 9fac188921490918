//! The Iteration Pipeline: five stages run in a fixed,
//! loop-free sequence against one `IterationState`, each stage free to set
//! `should_terminate` and stop the sequence early.

mod stage1;
mod stage2;
mod stage3;
mod stage4;
mod stage5;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use events::EventSink;
use rpc_client::OrchestratorRpc;
use stage_adapters::{Analyst, Engineer};

pub use state::IterationState;

/// The pipeline's tunable constants, loaded from
/// `configuration::PipelineConfig`.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub max_validation_retries: u32,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl From<&configuration::PipelineConfig> for PipelineConfig {
    fn from(cfg: &configuration::PipelineConfig) -> Self {
        Self {
            max_validation_retries: cfg.max_validation_retries,
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            max_wait: Duration::from_secs(cfg.max_wait_secs),
        }
    }
}

/// The black-box dependencies every stage needs, bundled so `Runner` only
/// has to construct this once per run rather than threading five
/// `Arc<dyn Trait>`s through every call site.
#[derive(Clone)]
pub struct PipelineDeps {
    pub rpc: Arc<dyn OrchestratorRpc>,
    pub engineer: Arc<dyn Engineer>,
    pub analyst: Arc<dyn Analyst>,
    pub events: Arc<dyn EventSink>,
}

/// Runs all five stages against `state` in sequence, stopping early the
/// moment any stage sets `should_terminate`. Never returns an `Err`: a
/// failing stage always converts into a terminal `IterationState`
/// — unhandled error paths fold into a terminal state instead.
pub async fn run_iteration(mut state: IterationState, deps: &PipelineDeps, config: &PipelineConfig) -> IterationState {
    stage1::validate_and_engineer(&mut state, deps.engineer.as_ref(), deps.rpc.as_ref(), config.max_validation_retries)
        .await;
    if state.should_terminate {
        return state;
    }

    stage2::submit_backtest(&mut state, deps.rpc.as_ref(), deps.events.as_ref()).await;
    if state.should_terminate {
        return state;
    }

    stage3::wait_for_result(
        &mut state,
        deps.rpc.as_ref(),
        deps.events.as_ref(),
        config.poll_interval,
        config.max_wait,
    )
    .await;
    if state.should_terminate {
        return state;
    }

    stage4::invoke_analyst(&mut state, deps.analyst.as_ref()).await;
    if state.should_terminate {
        return state;
    }

    stage5::decide_next(&mut state, deps.events.as_ref()).await;
    state
}
