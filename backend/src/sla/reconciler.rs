// Incident Reconciler - diff breaching entities against open incidents

use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::error::AutomationError;
use crate::store::AutomationStore;
use tempo_shared::SlaTarget;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub opened: usize,
    pub resolved: usize,
}

pub struct IncidentReconciler {
    store: Arc<dyn AutomationStore>,
}

impl IncidentReconciler {
    pub fn new(store: Arc<dyn AutomationStore>) -> Self {
        Self { store }
    }

    /// Bring the target's incident rows in line with the current breach
    /// set: open an incident for every newly breaching entity, resolve
    /// every incident whose entity is no longer breaching. Re-running
    /// with an unchanged set performs zero writes.
    ///
    /// Matching is scoped to this target; another target tracking the
    /// same raw entity id keeps its own independent incidents.
    pub async fn reconcile(
        &self,
        target: &SlaTarget,
        breaching: &HashSet<String>,
    ) -> Result<ReconcileOutcome, AutomationError> {
        let unresolved = self.store.unresolved_incidents_for_target(target.id).await?;
        let tracked: HashSet<&str> = unresolved
            .iter()
            .map(|incident| incident.entity_id.as_str())
            .collect();

        let mut outcome = ReconcileOutcome::default();

        for entity_id in breaching {
            if !tracked.contains(entity_id.as_str()) {
                let reason = breach_reason(&target.entity_type, target.threshold_minutes);
                self.store
                    .open_incident(target.id, &target.entity_type, entity_id, &reason)
                    .await?;
                outcome.opened += 1;
                info!(
                    target = %target.name,
                    entity_type = %target.entity_type,
                    entity_id = %entity_id,
                    "opened SLA incident"
                );
            }
        }

        for incident in &unresolved {
            if !breaching.contains(&incident.entity_id) {
                self.store.resolve_incident(incident.id).await?;
                outcome.resolved += 1;
                info!(
                    target = %target.name,
                    entity_id = %incident.entity_id,
                    "resolved SLA incident"
                );
            }
        }

        Ok(outcome)
    }

    /// Resolve every unresolved incident for one entity across all
    /// targets. Called by event producers when the underlying condition
    /// clears outside the polling cadence, e.g. right when an
    /// appointment completes.
    pub async fn close_incidents_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<usize, AutomationError> {
        let incidents = self
            .store
            .unresolved_incidents_for_entity(entity_type, entity_id)
            .await?;

        for incident in &incidents {
            self.store.resolve_incident(incident.id).await?;
        }

        if !incidents.is_empty() {
            info!(
                entity_type,
                entity_id,
                count = incidents.len(),
                "closed SLA incidents for entity"
            );
        }

        Ok(incidents.len())
    }
}

fn breach_reason(entity_type: &str, threshold_minutes: i32) -> String {
    format!("{entity_type} exceeded the {threshold_minutes} minute service level threshold")
}
