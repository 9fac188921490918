use serde::{Deserialize, Serialize};

/// Whether stage 1 is engineering a brand-new strategy or evolving an
/// existing one. Equals `New` only on the very first call of iteration 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationMode {
    New,
    Evolve,
}

/// The Analyst's verdict on a completed backtest. Canonical wire form is the
/// upper-snake-case name; case-insensitive aliases (`approve`, `modify`,
/// `archive`) are accepted on deserialization since that is the shape the
/// Analyst's black-box contract actually returns (see `stage-adapters`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "READY_FOR_LIVE")]
    ReadyForLive,
    #[serde(rename = "NEEDS_MODIFICATION")]
    NeedsModification,
    #[serde(rename = "ARCHIVE")]
    Archive,
}

impl Decision {
    /// Parses the Analyst's raw `decision` string. Accepts both the
    /// short verbs the Analyst contract returns (`approve`/`modify`/
    /// `archive`) and the canonical storage names, case-insensitively.
    /// Any other value is a boundary validation error, never a silent
    /// default.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.to_ascii_lowercase().as_str() {
            "approve" | "ready_for_live" => Ok(Decision::ReadyForLive),
            "modify" | "needs_modification" => Ok(Decision::NeedsModification),
            "archive" => Ok(Decision::Archive),
            other => Err(format!("unknown analyst decision: {other}")),
        }
    }

    pub fn as_canonical_str(&self) -> &'static str {
        match self {
            Decision::ReadyForLive => "READY_FOR_LIVE",
            Decision::NeedsModification => "NEEDS_MODIFICATION",
            Decision::Archive => "ARCHIVE",
        }
    }
}

/// Why an optimization run stopped iterating. `EngineerNoCode` and
/// `StrategyCreationFailed` are reachable terminal paths from stage 1 and
/// stage 2 respectively; the decision enum alone doesn't name them, but they
/// are real values that appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Approved,
    Archived,
    MaxIterations,
    ValidationMaxRetries,
    BacktestTimeout,
    BacktestCancelled,
    EngineerException,
    EngineerNoCode,
    StrategyCreationFailed,
    BacktestSubmissionFailed,
    IterationException,
}

impl TerminationReason {
    /// Terminal reasons under which the run record should be marked
    /// `completed` rather than `failed`.
    pub fn is_success(&self) -> bool {
        matches!(self, TerminationReason::Approved | TerminationReason::MaxIterations)
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TerminationReason::Approved => "approved",
            TerminationReason::Archived => "archived",
            TerminationReason::MaxIterations => "max_iterations",
            TerminationReason::ValidationMaxRetries => "validation_max_retries",
            TerminationReason::BacktestTimeout => "backtest_timeout",
            TerminationReason::BacktestCancelled => "backtest_cancelled",
            TerminationReason::EngineerException => "engineer_exception",
            TerminationReason::EngineerNoCode => "engineer_no_code",
            TerminationReason::StrategyCreationFailed => "strategy_creation_failed",
            TerminationReason::BacktestSubmissionFailed => "backtest_submission_failed",
            TerminationReason::IterationException => "iteration_exception",
        };
        write!(f, "{s}")
    }
}
