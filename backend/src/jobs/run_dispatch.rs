// Run Dispatch Job - executes due queued workflow runs each tick

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::scheduler::PeriodicJob;
use crate::error::AutomationError;
use crate::workflows::AutomationEngine;

pub struct RunDispatchJob {
    engine: Arc<AutomationEngine>,
}

impl RunDispatchJob {
    pub fn new(engine: Arc<AutomationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl PeriodicJob for RunDispatchJob {
    fn name(&self) -> &'static str {
        "run-dispatch"
    }

    async fn run_once(&self) -> Result<(), AutomationError> {
        let outcome = self.engine.run_due_batch().await?;
        if outcome.selected > 0 {
            info!(
                selected = outcome.selected,
                completed = outcome.completed,
                failed = outcome.failed,
                already_claimed = outcome.already_claimed,
                "dispatched queued workflow runs"
            );
        }
        Ok(())
    }
}
