use serde::{Deserialize, Serialize};

fn default_exchange() -> String {
    "binance".to_string()
}
fn default_pairs() -> Vec<String> {
    vec!["BTC/USDT".to_string()]
}
fn default_timeframe() -> String {
    "1h".to_string()
}
fn default_timerange_start() -> String {
    "20230101".to_string()
}
fn default_timerange_end() -> String {
    "20230131".to_string()
}
fn default_dry_run_wallet() -> f64 {
    1000.0
}
fn default_max_open_trades() -> u32 {
    3
}
fn default_stake_amount() -> String {
    "unlimited".to_string()
}

/// Backtest parameters submitted alongside a strategy. Every field has the
/// bit-exact default required when absent from stored config, via
/// `#[serde(default = ...)]` so a partially-specified `RunConfig` round-trips
/// through storage with the gaps filled exactly the same way every time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_timerange_start")]
    pub timerange_start: String,
    #[serde(default = "default_timerange_end")]
    pub timerange_end: String,
    #[serde(default = "default_dry_run_wallet")]
    pub dry_run_wallet: f64,
    #[serde(default = "default_max_open_trades")]
    pub max_open_trades: u32,
    #[serde(default = "default_stake_amount")]
    pub stake_amount: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            pairs: default_pairs(),
            timeframe: default_timeframe(),
            timerange_start: default_timerange_start(),
            timerange_end: default_timerange_end(),
            dry_run_wallet: default_dry_run_wallet(),
            max_open_trades: default_max_open_trades(),
            stake_amount: default_stake_amount(),
        }
    }
}

/// Lifecycle of a submitted backtest job, owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestJob {
    pub job_id: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub logs: Option<String>,
}

/// A completed backtest's metrics. `sharpe_ratio` is the only field the
/// orchestrator itself branches on (best-tracking); everything else rides
/// through to the Analyst verbatim as `metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub job_id: String,
    pub strategy_id: String,
    pub sharpe_ratio: Option<f64>,
    pub profit_pct: Option<f64>,
    pub win_rate: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    #[serde(default)]
    pub metrics: serde_json::Value,
}

/// The outcome the pipeline actually carries through stages 3-5: either a
/// real completed result, or a synthetic failed result the Analyst is
/// expected to convert into diagnostic feedback — a backtest-code crash is
/// information, never a terminated iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BacktestOutcome {
    Completed(BacktestResult),
    Failed {
        error_message: String,
        logs: Option<String>,
    },
}

impl BacktestOutcome {
    /// Sharpe ratio for best-tracking. A synthetic failure, or an absent
    /// Sharpe on a completed result, both compare as less than any finite
    /// value.
    pub fn sharpe_or_neg_infinity(&self) -> f64 {
        match self {
            BacktestOutcome::Completed(r) => r.sharpe_ratio.filter(|s| !s.is_nan()).unwrap_or(f64::NEG_INFINITY),
            BacktestOutcome::Failed { .. } => f64::NEG_INFINITY,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BacktestOutcome::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtest_config_defaults_are_bit_exact() {
        let cfg = BacktestConfig::default();
        assert_eq!(cfg.exchange, "binance");
        assert_eq!(cfg.pairs, vec!["BTC/USDT".to_string()]);
        assert_eq!(cfg.timeframe, "1h");
        assert_eq!(cfg.timerange_start, "20230101");
        assert_eq!(cfg.timerange_end, "20230131");
        assert_eq!(cfg.dry_run_wallet, 1000.0);
        assert_eq!(cfg.max_open_trades, 3);
        assert_eq!(cfg.stake_amount, "unlimited");
    }

    #[test]
    fn partial_config_fills_gaps_from_defaults() {
        let partial: BacktestConfig = serde_json::from_str(r#"{"exchange":"kraken"}"#).unwrap();
        assert_eq!(partial.exchange, "kraken");
        assert_eq!(partial.timeframe, "1h");
        assert_eq!(partial.max_open_trades, 3);
    }

    #[test]
    fn missing_and_nan_sharpe_compare_below_any_finite_value() {
        let failed = BacktestOutcome::Failed {
            error_message: "boom".into(),
            logs: None,
        };
        assert!(failed.sharpe_or_neg_infinity() < 0.0);

        let nan_result = BacktestOutcome::Completed(BacktestResult {
            job_id: "j".into(),
            strategy_id: "s".into(),
            sharpe_ratio: Some(f64::NAN),
            profit_pct: None,
            win_rate: None,
            max_drawdown_pct: None,
            metrics: serde_json::Value::Null,
        });
        assert!(nan_result.sharpe_or_neg_infinity() < 0.0);
    }
}
