//! Scriptable in-memory Engineer/Analyst implementations, used by
//! `orchestrator`'s test suite to drive end-to-end scenarios without calling
//! a real LLM. Behind the `testing` feature only.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::analyst::{Analyst, AnalystRequest, AnalystResponse};
use crate::engineer::{Engineer, EngineerRequest, EngineerResponse};
use crate::error::StageError;

/// One scripted outcome for a single `generate` call: either a response or
/// an error (to exercise the `engineer_exception` termination path).
pub enum ScriptedOutcome<T> {
    Ok(T),
    Err(String),
}

/// Replays a fixed sequence of responses, one per call. The last entry
/// repeats once the script is exhausted, so a test only needs to script the
/// calls it cares about distinguishing.
pub struct ScriptedEngineer {
    script: Mutex<VecDeque<ScriptedOutcome<EngineerResponse>>>,
    last: Mutex<Option<EngineerResponse>>,
}

impl ScriptedEngineer {
    pub fn new(script: Vec<ScriptedOutcome<EngineerResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
        }
    }

    /// Convenience for the common case: every call succeeds with valid code.
    pub fn always_valid(code: impl Into<String>, strategy_name: impl Into<String>) -> Self {
        let response = EngineerResponse {
            generated_code: code.into(),
            validation_passed: true,
            validation_errors: Vec::new(),
            retry_count: 0,
            strategy_name: strategy_name.into(),
            description: None,
            tags: Vec::new(),
            hyperopt_config: None,
        };
        Self::new(vec![ScriptedOutcome::Ok(response)])
    }
}

#[async_trait]
impl Engineer for ScriptedEngineer {
    async fn generate(&self, _request: EngineerRequest) -> Result<EngineerResponse, StageError> {
        let mut script = self.script.lock().await;
        let outcome = if script.len() > 1 {
            script.pop_front()
        } else {
            None
        };

        let outcome = match outcome {
            Some(o) => o,
            None => {
                // Exhausted (or only one entry left): replay the last Ok
                // response, or the remaining single scripted entry.
                if let Some(front) = script.pop_front() {
                    return Self::resolve(front, &self.last).await;
                }
                let last = self.last.lock().await.clone();
                return match last {
                    Some(resp) => Ok(resp),
                    None => Err(StageError::Engineer("scripted engineer exhausted with no prior response".into())),
                };
            }
        };

        Self::resolve(outcome, &self.last).await
    }
}

impl ScriptedEngineer {
    async fn resolve(
        outcome: ScriptedOutcome<EngineerResponse>,
        last: &Mutex<Option<EngineerResponse>>,
    ) -> Result<EngineerResponse, StageError> {
        match outcome {
            ScriptedOutcome::Ok(resp) => {
                *last.lock().await = Some(resp.clone());
                Ok(resp)
            }
            ScriptedOutcome::Err(msg) => Err(StageError::Engineer(msg)),
        }
    }
}

/// Replays a fixed sequence of Analyst responses, one per call, optionally
/// applying the contract's required max-iteration coercion.
/// `coerce_at_max = false` exists specifically so a test can prove the
/// Runner's own `max_iterations` bound holds even if the Analyst contract
/// were violated.
pub struct ScriptedAnalyst {
    script: Mutex<VecDeque<ScriptedOutcome<AnalystResponse>>>,
    coerce_at_max: bool,
}

impl ScriptedAnalyst {
    pub fn new(script: Vec<ScriptedOutcome<AnalystResponse>>, coerce_at_max: bool) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            coerce_at_max,
        }
    }

    pub fn decision(
        decision: &str,
        suggestion_description: Option<&str>,
    ) -> AnalystResponse {
        AnalystResponse {
            decision: decision.to_string(),
            confidence: 0.8,
            issues: Vec::new(),
            root_causes: Vec::new(),
            suggestion_type: None,
            suggestion_description: suggestion_description.map(|s| s.to_string()),
            target_metrics: Vec::new(),
            metrics: serde_json::Value::Null,
            termination_reason: None,
        }
    }
}

#[async_trait]
impl Analyst for ScriptedAnalyst {
    async fn analyze(&self, request: AnalystRequest) -> Result<AnalystResponse, StageError> {
        let mut script = self.script.lock().await;
        let outcome = script
            .pop_front()
            .ok_or_else(|| StageError::Analyst("scripted analyst script exhausted".into()))?;

        let mut response = match outcome {
            ScriptedOutcome::Ok(resp) => resp,
            ScriptedOutcome::Err(msg) => return Err(StageError::Analyst(msg)),
        };

        if self.coerce_at_max
            && request.current_iteration >= request.max_iterations
            && response.decision.eq_ignore_ascii_case("modify")
        {
            response.decision = "archive".to_string();
            response.termination_reason =
                Some("coerced from modify: current_iteration >= max_iterations".to_string());
        }

        Ok(response)
    }
}
