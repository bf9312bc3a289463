// Shared test doubles: an in-memory store gateway with operation
// counters, a recording notification gateway, and an always-failing
// action handler.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::AutomationError;
use crate::notifications::{NotificationGateway, NotificationRequest};
use crate::store::AutomationStore;
use crate::workflows::{ActionHandler, ActionOutcome, TriggerPayload};
use tempo_shared::{
    IncidentStatus, RunStatus, SlaIncident, SlaTarget, Workflow, WorkflowAction, WorkflowRun,
};

#[derive(Default)]
struct MemoryState {
    workflows: Vec<Workflow>,
    actions: Vec<WorkflowAction>,
    runs: Vec<WorkflowRun>,
    targets: Vec<SlaTarget>,
    incidents: Vec<SlaIncident>,
    /// (id, status, scheduled_at)
    appointments: Vec<(Uuid, String, chrono::DateTime<Utc>)>,
    /// (conversation_id, created_at)
    messages: Vec<(Uuid, chrono::DateTime<Utc>)>,
}

/// In-memory [`AutomationStore`] with per-operation counters so tests
/// can assert scheduling and reconciliation behavior by call count.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    pub due_queries: AtomicUsize,
    pub incident_writes: AtomicUsize,
    pub appointment_queries: AtomicUsize,
    pub conversation_queries: AtomicUsize,
    /// Hold `due_queued_runs` open for this long, to keep a tick in flight.
    pub due_query_delay_ms: AtomicU64,
    /// Simulate a storage failure on the appointment breach query.
    pub fail_appointment_queries: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn add_workflow(&self, workflow: Workflow) {
        self.lock().workflows.push(workflow);
    }

    pub fn add_action(&self, action: WorkflowAction) {
        self.lock().actions.push(action);
    }

    pub fn add_run(&self, run: WorkflowRun) {
        self.lock().runs.push(run);
    }

    pub fn add_target(&self, target: SlaTarget) {
        self.lock().targets.push(target);
    }

    pub fn add_appointment(&self, id: Uuid, status: &str, scheduled_at: chrono::DateTime<Utc>) {
        self.lock()
            .appointments
            .push((id, status.to_string(), scheduled_at));
    }

    pub fn add_message(&self, conversation_id: Uuid, created_at: chrono::DateTime<Utc>) {
        self.lock().messages.push((conversation_id, created_at));
    }

    pub fn run(&self, run_id: Uuid) -> WorkflowRun {
        self.lock()
            .runs
            .iter()
            .find(|run| run.id == run_id)
            .cloned()
            .expect("run not found")
    }

    pub fn appointment_status(&self, id: Uuid) -> Option<String> {
        self.lock()
            .appointments
            .iter()
            .find(|(appt_id, _, _)| *appt_id == id)
            .map(|(_, status, _)| status.clone())
    }

    pub fn incidents(&self) -> Vec<SlaIncident> {
        self.lock().incidents.clone()
    }
}

#[async_trait]
impl AutomationStore for MemoryStore {
    async fn active_workflows_for_trigger(
        &self,
        trigger_type: &str,
    ) -> Result<Vec<Workflow>, AutomationError> {
        Ok(self
            .lock()
            .workflows
            .iter()
            .filter(|w| w.trigger_type == trigger_type && w.is_active)
            .cloned()
            .collect())
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, AutomationError> {
        Ok(self.lock().workflows.clone())
    }

    async fn workflow_actions(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<WorkflowAction>, AutomationError> {
        let mut actions: Vec<WorkflowAction> = self
            .lock()
            .actions
            .iter()
            .filter(|a| a.workflow_id == workflow_id)
            .cloned()
            .collect();
        actions.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(actions)
    }

    async fn insert_run(
        &self,
        workflow_id: Uuid,
        trigger_payload: Value,
    ) -> Result<WorkflowRun, AutomationError> {
        let run = WorkflowRun {
            id: Uuid::new_v4(),
            workflow_id,
            status: RunStatus::Queued,
            trigger_payload,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result_payload: None,
            error_message: None,
        };
        self.lock().runs.push(run.clone());
        Ok(run)
    }

    async fn due_queued_runs(&self, limit: i64) -> Result<Vec<WorkflowRun>, AutomationError> {
        self.due_queries.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.due_query_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        let now = Utc::now();
        let state = self.lock();
        let mut due: Vec<WorkflowRun> = state
            .runs
            .iter()
            .filter(|run| run.status == RunStatus::Queued)
            .filter(|run| {
                let delay = state
                    .workflows
                    .iter()
                    .find(|w| w.id == run.workflow_id)
                    .and_then(|w| w.minutes_delay)
                    .unwrap_or(0);
                run.queued_at + Duration::minutes(delay as i64) <= now
            })
            .cloned()
            .collect();
        due.sort_by_key(|run| run.queued_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn claim_run(&self, run_id: Uuid) -> Result<bool, AutomationError> {
        let mut state = self.lock();
        match state
            .runs
            .iter_mut()
            .find(|run| run.id == run_id && run.status == RunStatus::Queued)
        {
            Some(run) => {
                run.status = RunStatus::Running;
                run.started_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete_run(
        &self,
        run_id: Uuid,
        result_payload: Value,
    ) -> Result<(), AutomationError> {
        let mut state = self.lock();
        if let Some(run) = state.runs.iter_mut().find(|run| run.id == run_id) {
            run.status = RunStatus::Completed;
            run.completed_at = Some(Utc::now());
            run.result_payload = Some(result_payload);
        }
        Ok(())
    }

    async fn fail_run(&self, run_id: Uuid, error_message: &str) -> Result<(), AutomationError> {
        let mut state = self.lock();
        if let Some(run) = state.runs.iter_mut().find(|run| run.id == run_id) {
            run.status = RunStatus::Failed;
            run.completed_at = Some(Utc::now());
            run.error_message = Some(error_message.to_string());
        }
        Ok(())
    }

    async fn list_runs(
        &self,
        status: Option<RunStatus>,
    ) -> Result<Vec<WorkflowRun>, AutomationError> {
        Ok(self
            .lock()
            .runs
            .iter()
            .filter(|run| status.map_or(true, |s| run.status == s))
            .cloned()
            .collect())
    }

    async fn active_sla_targets(&self) -> Result<Vec<SlaTarget>, AutomationError> {
        Ok(self
            .lock()
            .targets
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn list_sla_targets(&self) -> Result<Vec<SlaTarget>, AutomationError> {
        Ok(self.lock().targets.clone())
    }

    async fn unresolved_incidents_for_target(
        &self,
        target_id: Uuid,
    ) -> Result<Vec<SlaIncident>, AutomationError> {
        Ok(self
            .lock()
            .incidents
            .iter()
            .filter(|i| i.target_id == target_id && i.status.is_unresolved())
            .cloned()
            .collect())
    }

    async fn unresolved_incidents_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<SlaIncident>, AutomationError> {
        Ok(self
            .lock()
            .incidents
            .iter()
            .filter(|i| {
                i.entity_type == entity_type
                    && i.entity_id == entity_id
                    && i.status.is_unresolved()
            })
            .cloned()
            .collect())
    }

    async fn open_incident(
        &self,
        target_id: Uuid,
        entity_type: &str,
        entity_id: &str,
        breach_reason: &str,
    ) -> Result<SlaIncident, AutomationError> {
        self.incident_writes.fetch_add(1, Ordering::SeqCst);
        let incident = SlaIncident {
            id: Uuid::new_v4(),
            target_id,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            status: IncidentStatus::Open,
            breach_reason: breach_reason.to_string(),
            opened_at: Utc::now(),
            resolved_at: None,
        };
        self.lock().incidents.push(incident.clone());
        Ok(incident)
    }

    async fn resolve_incident(&self, incident_id: Uuid) -> Result<(), AutomationError> {
        self.incident_writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if let Some(incident) = state.incidents.iter_mut().find(|i| i.id == incident_id) {
            incident.status = IncidentStatus::Resolved;
            incident.resolved_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_incidents(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<SlaIncident>, AutomationError> {
        Ok(self
            .lock()
            .incidents
            .iter()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect())
    }

    async fn overdue_pending_appointments(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<Uuid>, AutomationError> {
        self.appointment_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_appointment_queries.load(Ordering::SeqCst) {
            return Err(AutomationError::Database(sqlx::Error::PoolClosed));
        }

        let cutoff = Utc::now() - Duration::minutes(threshold_minutes as i64);
        Ok(self
            .lock()
            .appointments
            .iter()
            .filter(|(_, status, scheduled_at)| status == "pending" && *scheduled_at < cutoff)
            .map(|(id, _, _)| *id)
            .collect())
    }

    async fn unanswered_conversations(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<Uuid>, AutomationError> {
        self.conversation_queries.fetch_add(1, Ordering::SeqCst);

        let cutoff = Utc::now() - Duration::minutes(threshold_minutes as i64);
        let state = self.lock();
        let mut latest: std::collections::HashMap<Uuid, chrono::DateTime<Utc>> =
            std::collections::HashMap::new();
        for (conversation_id, created_at) in &state.messages {
            let entry = latest.entry(*conversation_id).or_insert(*created_at);
            if *created_at > *entry {
                *entry = *created_at;
            }
        }
        Ok(latest
            .into_iter()
            .filter(|(_, newest)| *newest < cutoff)
            .map(|(conversation_id, _)| conversation_id)
            .collect())
    }

    async fn set_appointment_status(
        &self,
        appointment_id: Uuid,
        status: &str,
    ) -> Result<(), AutomationError> {
        let mut state = self.lock();
        if let Some((_, current, _)) = state
            .appointments
            .iter_mut()
            .find(|(id, _, _)| *id == appointment_id)
        {
            *current = status.to_string();
        }
        Ok(())
    }
}

/// Gateway double that records every request instead of delivering it.
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<NotificationRequest>>,
}

impl RecordingGateway {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send_notification(
        &self,
        request: NotificationRequest,
    ) -> Result<Uuid, AutomationError> {
        self.sent.lock().unwrap().push(request);
        Ok(Uuid::new_v4())
    }
}

/// Handler that always raises, for exercising run failure paths.
pub struct ExplodingAction;

#[async_trait]
impl ActionHandler for ExplodingAction {
    async fn execute(
        &self,
        _config: &Value,
        _payload: &TriggerPayload,
    ) -> Result<ActionOutcome, AutomationError> {
        Err(AutomationError::Execution(
            "simulated action failure".to_string(),
        ))
    }
}
