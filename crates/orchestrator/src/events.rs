//! Thin typed wrappers around `events::EventSink::publish` for the four
//! lifecycle events the Runner itself emits. The per-stage
//! events (`backtest.submitted`, `backtest.completed`, `optimization.new_best`)
//! are emitted inline by the pipeline stages that own them
//! (`pipeline::stage2`, `stage3`, `stage5`) and have no wrapper here.

use events::{routing_keys, EventSink};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
pub struct IterationStartedPayload<'a> {
    pub optimization_run_id: &'a str,
    pub iteration: u32,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationCompletedPayload<'a> {
    pub optimization_run_id: &'a str,
    pub iteration: u32,
    pub decision: Option<&'a str>,
    pub sharpe_ratio: Option<f64>,
    pub is_best: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationCompletedPayload<'a> {
    pub optimization_run_id: &'a str,
    pub base_strategy_id: &'a str,
    pub total_iterations: u32,
    pub termination_reason: &'a str,
    pub best_strategy_id: Option<&'a str>,
    pub best_sharpe: f64,
    pub best_profit_pct: Option<f64>,
    pub best_win_rate: Option<f64>,
    pub best_max_drawdown: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationFailedPayload<'a> {
    pub optimization_run_id: &'a str,
    pub base_strategy_id: &'a str,
    pub iteration: u32,
    pub reason: &'a str,
    pub errors: &'a [String],
}

pub async fn emit_iteration_started(events: &dyn EventSink, payload: IterationStartedPayload<'_>) {
    publish(events, routing_keys::OPTIMIZATION_ITERATION_STARTED, &payload).await;
}

pub async fn emit_iteration_completed(events: &dyn EventSink, payload: IterationCompletedPayload<'_>) {
    publish(events, routing_keys::OPTIMIZATION_ITERATION_COMPLETED, &payload).await;
}

pub async fn emit_optimization_completed(events: &dyn EventSink, payload: OptimizationCompletedPayload<'_>) {
    publish(events, routing_keys::OPTIMIZATION_COMPLETED, &payload).await;
}

pub async fn emit_optimization_failed(events: &dyn EventSink, payload: OptimizationFailedPayload<'_>) {
    publish(events, routing_keys::OPTIMIZATION_FAILED, &payload).await;
}

async fn publish(events: &dyn EventSink, routing_key: &str, payload: &impl Serialize) {
    let value = json!(payload);
    if let Err(err) = events.publish(routing_key, value).await {
        tracing::warn!(routing_key, error = %err, "failed to publish lifecycle event");
    }
}
