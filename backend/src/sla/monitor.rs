// SLA Monitor Job - evaluates every active target each tick

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::checks::BreachCheckRegistry;
use super::reconciler::{IncidentReconciler, ReconcileOutcome};
use crate::error::AutomationError;
use crate::jobs::PeriodicJob;
use crate::store::AutomationStore;
use tempo_shared::SlaTarget;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SlaCheckOutcome {
    pub targets_checked: usize,
    pub opened: usize,
    pub resolved: usize,
}

pub struct SlaMonitorJob {
    store: Arc<dyn AutomationStore>,
    checks: BreachCheckRegistry,
    reconciler: IncidentReconciler,
}

impl SlaMonitorJob {
    pub fn new(store: Arc<dyn AutomationStore>) -> Self {
        let checks = BreachCheckRegistry::with_builtin(store.clone());
        Self::with_checks(store, checks)
    }

    /// Monitor with a caller-assembled check registry, e.g. one extended
    /// with additional entity types.
    pub fn with_checks(store: Arc<dyn AutomationStore>, checks: BreachCheckRegistry) -> Self {
        let reconciler = IncidentReconciler::new(store.clone());
        Self {
            store,
            checks,
            reconciler,
        }
    }

    pub async fn evaluate_target(
        &self,
        target: &SlaTarget,
    ) -> Result<ReconcileOutcome, AutomationError> {
        let Some(check) = self.checks.get(&target.entity_type) else {
            warn!(
                target = %target.name,
                entity_type = %target.entity_type,
                "no breach check registered for entity type, skipping target"
            );
            return Ok(ReconcileOutcome::default());
        };

        let breaching: HashSet<String> = check
            .breaching_entities(target.threshold_minutes)
            .await?
            .into_iter()
            .collect();

        self.reconciler.reconcile(target, &breaching).await
    }

    /// One full pass over the active targets, sequentially. A store
    /// error ends the pass early; the next tick re-evaluates every
    /// target from scratch.
    pub async fn run(&self) -> Result<SlaCheckOutcome, AutomationError> {
        let targets = self.store.active_sla_targets().await?;

        let mut outcome = SlaCheckOutcome::default();
        for target in &targets {
            let result = self.evaluate_target(target).await?;
            outcome.targets_checked += 1;
            outcome.opened += result.opened;
            outcome.resolved += result.resolved;
        }

        Ok(outcome)
    }
}

#[async_trait]
impl PeriodicJob for SlaMonitorJob {
    fn name(&self) -> &'static str {
        "sla-monitor"
    }

    async fn run_once(&self) -> Result<(), AutomationError> {
        let outcome = self.run().await?;
        if outcome.opened > 0 || outcome.resolved > 0 {
            info!(
                targets = outcome.targets_checked,
                opened = outcome.opened,
                resolved = outcome.resolved,
                "SLA evaluation pass finished"
            );
        }
        Ok(())
    }
}
