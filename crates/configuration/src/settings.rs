use crate::logging::LoggingConfig;
use core_types::BacktestConfig;
use serde::Deserialize;

/// The root configuration structure for the orchestrator binary.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub rpc: RpcConfig,
    pub event_bus: EventBusConfig,
    pub stage_adapters: StageAdaptersConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Defaults merged into a run's stored config when `backtest_config` is
    /// only partially specified at trigger time.
    #[serde(default)]
    pub default_backtest_config: BacktestConfig,
}

/// Base URLs for the two black-box AI-assisted stages. Both
/// are out of scope for this repository; the orchestrator only needs an
/// address to POST to.
#[derive(Debug, Clone, Deserialize)]
pub struct StageAdaptersConfig {
    pub engineer_url: String,
    pub analyst_url: String,
}

/// Connection settings for the backtest/strategy/optimization-control RPC
/// surface (`rpc-client`).
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub address: String,
    /// Default per-call deadline, in seconds. 30s default.
    #[serde(default = "default_rpc_deadline_secs")]
    pub deadline_secs: u64,
    /// `validate_strategy` gets a longer default deadline since the first
    /// call may need to build a sandbox image. 60s default.
    #[serde(default = "default_validate_deadline_secs")]
    pub validate_deadline_secs: u64,
}

fn default_rpc_deadline_secs() -> u64 {
    30
}

fn default_validate_deadline_secs() -> u64 {
    60
}

/// Connection settings for the topic-exchange event bus (`events`).
#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
    pub url: String,
    #[serde(default = "default_exchange_name")]
    pub exchange_name: String,
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

fn default_exchange_name() -> String {
    "optimization".to_string()
}

fn default_prefetch_count() -> u16 {
    16
}

fn default_source_tag() -> String {
    "orchestrator".to_string()
}

/// Tunables for the iteration pipeline's named constants.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_validation_retries")]
    pub max_validation_retries: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_max_validation_retries() -> u32 {
    5
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_wait_secs() -> u64 {
    600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_validation_retries: default_max_validation_retries(),
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}
