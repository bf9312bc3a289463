// Automation Engine - trigger enqueueing and due-run dispatch

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::actions::ActionRegistry;
use super::executor::{RunDisposition, RunExecutor};
use super::triggers::{Trigger, TriggerPayload};
use crate::error::AutomationError;
use crate::notifications::NotificationGateway;
use crate::store::AutomationStore;
use tempo_shared::WorkflowRun;

/// Upper bound on runs picked up by one dispatch tick; anything beyond
/// it spills into the next tick.
pub const RUN_BATCH_SIZE: i64 = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub selected: usize,
    pub completed: usize,
    pub failed: usize,
    pub already_claimed: usize,
}

pub struct AutomationEngine {
    store: Arc<dyn AutomationStore>,
    executor: RunExecutor,
}

impl AutomationEngine {
    pub fn new(store: Arc<dyn AutomationStore>, gateway: Arc<dyn NotificationGateway>) -> Self {
        let registry = ActionRegistry::with_builtin(store.clone(), gateway);
        Self::with_registry(store, registry)
    }

    /// Build the engine around a caller-assembled registry, e.g. one
    /// extended with extra action handlers.
    pub fn with_registry(store: Arc<dyn AutomationStore>, registry: ActionRegistry) -> Self {
        let executor = RunExecutor::new(store.clone(), Arc::new(registry));
        Self { store, executor }
    }

    /// Fan a domain event out into one queued run per subscribed active
    /// workflow. An empty trigger name is a no-op; lookup and insert
    /// errors propagate to the event producer.
    pub async fn enqueue_trigger(
        &self,
        trigger_type: &str,
        payload: Value,
    ) -> Result<Vec<WorkflowRun>, AutomationError> {
        if trigger_type.is_empty() {
            return Ok(Vec::new());
        }

        let workflows = self.store.active_workflows_for_trigger(trigger_type).await?;
        if workflows.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = TriggerPayload::with_trigger_type(trigger_type, payload);
        let mut runs = Vec::with_capacity(workflows.len());
        for workflow in &workflows {
            let run = self
                .store
                .insert_run(workflow.id, snapshot.as_value().clone())
                .await?;
            runs.push(run);
        }

        info!(trigger_type, count = runs.len(), "queued workflow runs");
        Ok(runs)
    }

    pub async fn enqueue(&self, trigger: Trigger) -> Result<Vec<WorkflowRun>, AutomationError> {
        self.enqueue_trigger(&trigger.trigger_type, trigger.payload)
            .await
    }

    /// Select due queued runs (oldest first, bounded by
    /// [`RUN_BATCH_SIZE`]) and execute them sequentially. A failed run
    /// does not stop the batch; a store error does.
    pub async fn run_due_batch(&self) -> Result<BatchOutcome, AutomationError> {
        let due = self.store.due_queued_runs(RUN_BATCH_SIZE).await?;

        let mut outcome = BatchOutcome {
            selected: due.len(),
            ..BatchOutcome::default()
        };
        for run in &due {
            match self.executor.execute(run).await? {
                RunDisposition::Completed => outcome.completed += 1,
                RunDisposition::Failed => outcome.failed += 1,
                RunDisposition::AlreadyClaimed => outcome.already_claimed += 1,
            }
        }

        Ok(outcome)
    }
}
