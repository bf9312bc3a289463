// Workflow Executor - owns the run state machine

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::actions::ActionRegistry;
use super::triggers::TriggerPayload;
use crate::error::AutomationError;
use crate::store::AutomationStore;
use tempo_shared::WorkflowRun;

/// How one selected run ended up. `AlreadyClaimed` means the conditional
/// status update touched zero rows and execution never started here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDisposition {
    AlreadyClaimed,
    Completed,
    Failed,
}

pub struct RunExecutor {
    store: Arc<dyn AutomationStore>,
    registry: Arc<ActionRegistry>,
}

impl RunExecutor {
    pub fn new(store: Arc<dyn AutomationStore>, registry: Arc<ActionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Drive one run from `queued` to a terminal state.
    ///
    /// The claim is a conditional update gated on its affected-row
    /// count; losing the claim means some other executor owns the run
    /// and we back off silently. Action errors fail only this run;
    /// store errors while claiming or finalizing propagate to the tick.
    pub async fn execute(&self, run: &WorkflowRun) -> Result<RunDisposition, AutomationError> {
        if !self.store.claim_run(run.id).await? {
            debug!(run_id = %run.id, "run already claimed, skipping");
            return Ok(RunDisposition::AlreadyClaimed);
        }

        let payload = TriggerPayload::new(run.trigger_payload.clone());
        let actions = self.store.workflow_actions(run.workflow_id).await?;

        let mut results: Vec<Value> = Vec::with_capacity(actions.len());
        for action in &actions {
            match self
                .registry
                .execute(&action.action_type, &action.action_config, &payload)
                .await
            {
                Ok(outcome) => {
                    results.push(json!({
                        "action_type": action.action_type,
                        "result": outcome.into_value(),
                    }));
                }
                Err(err) => {
                    warn!(
                        run_id = %run.id,
                        action_type = %action.action_type,
                        error = %err,
                        "action failed, aborting run"
                    );
                    // Results accumulated before the failure are dropped;
                    // only the final status and error text are recorded.
                    self.store.fail_run(run.id, &err.to_string()).await?;
                    return Ok(RunDisposition::Failed);
                }
            }
        }

        self.store
            .complete_run(run.id, Value::Array(results))
            .await?;
        info!(run_id = %run.id, actions = actions.len(), "workflow run completed");

        Ok(RunDisposition::Completed)
    }
}
