use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use configuration::Settings;
use core_types::RunStatus;
use events::{routing_keys, EventBus, EventSink, EventsError, HandlerFuture};
use orchestrator::pipeline::{PipelineConfig, PipelineDeps};
use orchestrator::{RunOutcomeStatus, RunResult, Runner};
use rpc_client::{run_status_from_wire, GrpcOrchestratorClient, OrchestratorRpc, Page};
use serde_json::Value as JsonValue;
use stage_adapters::{Analyst, Engineer, HttpAnalyst, HttpEngineer};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let config = configuration::load_config(None).context("failed to load config.toml")?;
    configuration::init_tracing(&config.logging)?;
    dotenvy::dotenv().ok();

    tracing::info!("optimization orchestrator starting");

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => handle_serve(&config).await?,
        Commands::Optimize(args) => handle_optimize(&config, args).await?,
        Commands::ListRuns(args) => handle_list_runs(&config, args).await?,
    }

    tracing::info!("optimization orchestrator exiting");
    Ok(())
}

// ==============================================================================
// CLI structure
// ==============================================================================

#[derive(Parser)]
#[command(author, version, about = "The optimization orchestrator: drives the closed-loop strategy search.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to `optimization.started` and drive each triggered run to completion.
    Serve,
    /// Trigger exactly one run synchronously and print its result.
    Optimize(OptimizeArgs),
    /// List optimization runs known to the backend.
    ListRuns(ListRunsArgs),
}

#[derive(Parser)]
struct OptimizeArgs {
    #[arg(long)]
    run_id: String,
    #[arg(long)]
    base_strategy_id: String,
    #[arg(long)]
    max_iterations: u32,
}

#[derive(Parser)]
struct ListRunsArgs {
    /// Filter by run status (pending, running, paused, completed, failed, cancelled).
    #[arg(long)]
    status: Option<String>,
}

// ==============================================================================
// Shared wiring
// ==============================================================================

/// Everything a command needs: a shared RPC handle (so `list-runs` doesn't
/// have to go through `Runner`) and, for the commands that actually drive a
/// pipeline, a `Runner` built from the same connections.
struct Wiring {
    rpc: Arc<GrpcOrchestratorClient>,
    events: Arc<EventBus>,
    runner: Runner,
}

/// Opens one RPC channel and one event-bus connection per process, as a
/// scoped resource spanning the whole run, and builds the Runner's
/// dependency bundle from them.
async fn build_wiring(config: &Settings) -> Result<Wiring> {
    let rpc = Arc::new(
        GrpcOrchestratorClient::connect_with_deadlines(
            &config.rpc.address,
            Duration::from_secs(config.rpc.deadline_secs),
            Duration::from_secs(config.rpc.validate_deadline_secs),
        )
        .await
        .context("failed to connect to the orchestrator RPC backend")?,
    );

    let events = Arc::new(
        EventBus::connect(
            &config.event_bus.url,
            &config.event_bus.exchange_name,
            &config.event_bus.source_tag,
            config.event_bus.prefetch_count,
        )
        .await
        .context("failed to connect to the event bus")?,
    );

    let engineer: Arc<dyn Engineer> = Arc::new(HttpEngineer::new(&config.stage_adapters.engineer_url));
    let analyst: Arc<dyn Analyst> = Arc::new(HttpAnalyst::new(&config.stage_adapters.analyst_url));
    let rpc_handle: Arc<dyn OrchestratorRpc> = rpc.clone();
    let event_sink: Arc<dyn EventSink> = events.clone();

    let deps = PipelineDeps {
        rpc: rpc_handle,
        engineer,
        analyst,
        events: event_sink,
    };
    let pipeline_config = PipelineConfig::from(&config.pipeline);
    let runner = Runner::new(deps, pipeline_config);

    Ok(Wiring { rpc, events, runner })
}

fn print_run_result(result: &RunResult) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Field", "Value"]);

    table.add_row(vec![Cell::new("run_id"), Cell::new(&result.run_id)]);
    table.add_row(vec![Cell::new("base_strategy_id"), Cell::new(&result.base_strategy_id)]);
    table.add_row(vec![
        Cell::new("iterations_completed"),
        Cell::new(format!("{}/{}", result.iterations_completed, result.max_iterations)),
    ]);
    table.add_row(vec![
        Cell::new("status"),
        Cell::new(match result.status {
            RunOutcomeStatus::Completed => "completed",
            RunOutcomeStatus::Failed => "failed",
        }),
    ]);
    table.add_row(vec![
        Cell::new("termination_reason"),
        Cell::new(result.termination_reason.map(|r| r.to_string()).unwrap_or_default()),
    ]);
    table.add_row(vec![
        Cell::new("best_strategy_id"),
        Cell::new(result.best_strategy_id.clone().unwrap_or_default()),
    ]);
    table.add_row(vec![Cell::new("best_sharpe"), Cell::new(format!("{:.4}", result.best_sharpe))]);
    if let Some(err) = &result.error {
        table.add_row(vec![Cell::new("error"), Cell::new(err)]);
    }

    println!("{table}");
}

// ==============================================================================
// `serve`
// ==============================================================================

/// The only field of an `optimization.started` trigger payload this binary
/// actually reads — the backend already derived everything
/// else (`base_strategy_id`, `max_iterations`, `backtest_config`) into the
/// stored `OptimizationRun` that `RunContext::load` fetches by id.
#[derive(Debug, serde::Deserialize)]
struct OptimizationStartedPayload {
    optimization_run_id: String,
}

async fn handle_serve(config: &Settings) -> Result<()> {
    let wiring = build_wiring(config).await?;
    let runner = Arc::new(wiring.runner);
    let events = wiring.events;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received, stopping subscription");
        signal_token.cancel();
    });

    let handler_runner = runner.clone();
    let handler = move |payload: JsonValue| -> HandlerFuture {
        let runner = handler_runner.clone();
        Box::pin(async move {
            let trigger: OptimizationStartedPayload = serde_json::from_value(payload)
                .map_err(|e| EventsError::Handler(format!("malformed optimization.started payload: {e}")))?;

            let run_id = trigger.optimization_run_id;
            tokio::spawn(async move {
                tracing::info!(run_id = %run_id, "starting triggered optimization run");
                let result = runner.run_optimization(&run_id).await;
                tracing::info!(run_id = %run_id, status = ?result.status, "optimization run finished");
            });

            Ok(())
        })
    };

    tracing::info!(routing_key = routing_keys::OPTIMIZATION_STARTED, "subscribing");

    tokio::select! {
        res = events.subscribe(routing_keys::OPTIMIZATION_STARTED, "orchestrator.optimization.started", handler) => {
            res.context("event bus subscription ended unexpectedly")?;
        }
        _ = shutdown.cancelled() => {
            tracing::info!("serve loop cancelled, shutting down cleanly");
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

// ==============================================================================
// `optimize`
// ==============================================================================

async fn handle_optimize(config: &Settings, args: OptimizeArgs) -> Result<()> {
    let wiring = build_wiring(config).await?;

    tracing::info!(
        run_id = %args.run_id,
        base_strategy_id = %args.base_strategy_id,
        max_iterations = args.max_iterations,
        "triggering a single optimization run"
    );

    let result = wiring.runner.run_optimization(&args.run_id).await;

    if !result.base_strategy_id.is_empty() && result.base_strategy_id != args.base_strategy_id {
        tracing::warn!(
            expected = %args.base_strategy_id,
            actual = %result.base_strategy_id,
            "the run's stored base_strategy_id differs from the one passed on the command line"
        );
    }

    print_run_result(&result);

    if result.status == RunOutcomeStatus::Failed {
        anyhow::bail!("optimization run {} failed: {}", result.run_id, result.error.unwrap_or_default());
    }

    Ok(())
}

// ==============================================================================
// `list-runs`
// ==============================================================================

async fn handle_list_runs(config: &Settings, args: ListRunsArgs) -> Result<()> {
    let wiring = build_wiring(config).await?;

    let status = match &args.status {
        Some(raw) => Some(
            run_status_from_wire(&raw.to_ascii_lowercase())
                .ok_or_else(|| anyhow::anyhow!("unknown status '{raw}'"))?,
        ),
        None => None,
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Run ID", "Base Strategy", "Iteration", "Status", "Best Sharpe"]);

    let mut page = Page { page: 1, page_size: 50 };
    let mut total_rows = 0u32;
    loop {
        let result = wiring.rpc.list_optimization_runs(status, page).await?;
        let got = result.runs.len() as u32;
        for run in &result.runs {
            table.add_row(vec![
                Cell::new(&run.run_id),
                Cell::new(&run.base_strategy_id),
                Cell::new(format!("{}/{}", run.current_iteration, run.max_iterations)),
                Cell::new(run_status_label(run.status)),
                Cell::new(format!("{:.4}", run.best_sharpe)),
            ]);
        }
        total_rows += got;
        if got == 0 || total_rows >= result.total_count {
            break;
        }
        page.page += 1;
    }

    println!("{table}");
    Ok(())
}

fn run_status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Paused => "paused",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
    }
}
