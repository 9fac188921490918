use serde::{Deserialize, Serialize};

/// A strategy record created by the orchestrator (via `create_strategy`)
/// whenever engineering succeeds, or fetched by id when deriving run
/// context. `generation` is non-negative and monotonic along a lineage:
/// a child's `generation` is always `parent.generation + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub strategy_id: String,
    pub name: String,
    pub code: String,
    pub parent_id: Option<String>,
    pub generation: u32,
}

impl Strategy {
    /// Builds the child strategy record the orchestrator creates in stage 2,
    /// wiring lineage explicitly rather than trusting the backend to infer it.
    pub fn child_of(parent: &Strategy, strategy_id: String, name: String, code: String) -> Self {
        Self {
            strategy_id,
            name,
            code,
            parent_id: Some(parent.strategy_id.clone()),
            generation: parent.generation + 1,
        }
    }
}
