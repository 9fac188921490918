//! Bit-exact, lowercase, dotted routing keys the orchestrator publishes and
//! subscribes to. Kept as `&str` constants rather than an enum since the
//! broker itself is string-routed and a handful of keys (`strategy.*`) are
//! only ever published downstream of this repo, never matched on here.

pub const OPTIMIZATION_STARTED: &str = "optimization.started";
pub const OPTIMIZATION_ITERATION_STARTED: &str = "optimization.iteration.started";
pub const OPTIMIZATION_ITERATION_COMPLETED: &str = "optimization.iteration.completed";
pub const OPTIMIZATION_NEW_BEST: &str = "optimization.new_best";
pub const OPTIMIZATION_COMPLETED: &str = "optimization.completed";
pub const OPTIMIZATION_FAILED: &str = "optimization.failed";

pub const BACKTEST_SUBMITTED: &str = "backtest.submitted";
pub const BACKTEST_COMPLETED: &str = "backtest.completed";
pub const BACKTEST_FAILED: &str = "backtest.failed";

pub const STRATEGY_APPROVED: &str = "strategy.approved";
pub const STRATEGY_EVOLVE: &str = "strategy.evolve";
pub const STRATEGY_ARCHIVED: &str = "strategy.archived";
pub const STRATEGY_READY_FOR_BACKTEST: &str = "strategy.ready_for_backtest";

pub const AGENT_HEARTBEAT: &str = "agent.heartbeat";
