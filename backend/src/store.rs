//! Store gateway for the automation engine.
//!
//! Every read and write the engine performs goes through the
//! [`AutomationStore`] trait: ordered/filtered reads, inserts with
//! generated ids, and conditional single-row updates whose affected-row
//! count gates run claiming. `PgStore` is the Postgres implementation;
//! tests substitute an in-memory store.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AutomationError;
use tempo_shared::{
    IncidentStatus, RunStatus, SlaIncident, SlaTarget, Workflow, WorkflowAction, WorkflowRun,
};

#[async_trait]
pub trait AutomationStore: Send + Sync {
    // Workflows
    async fn active_workflows_for_trigger(
        &self,
        trigger_type: &str,
    ) -> Result<Vec<Workflow>, AutomationError>;
    async fn list_workflows(&self) -> Result<Vec<Workflow>, AutomationError>;
    async fn workflow_actions(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<WorkflowAction>, AutomationError>;

    // Runs
    async fn insert_run(
        &self,
        workflow_id: Uuid,
        trigger_payload: serde_json::Value,
    ) -> Result<WorkflowRun, AutomationError>;
    /// Queued runs whose delay deadline has passed, oldest first.
    async fn due_queued_runs(&self, limit: i64) -> Result<Vec<WorkflowRun>, AutomationError>;
    /// Conditional `queued -> running` transition. Returns true only if
    /// this call performed the update; false means another executor
    /// already claimed the run.
    async fn claim_run(&self, run_id: Uuid) -> Result<bool, AutomationError>;
    async fn complete_run(
        &self,
        run_id: Uuid,
        result_payload: serde_json::Value,
    ) -> Result<(), AutomationError>;
    async fn fail_run(&self, run_id: Uuid, error_message: &str) -> Result<(), AutomationError>;
    async fn list_runs(
        &self,
        status: Option<RunStatus>,
    ) -> Result<Vec<WorkflowRun>, AutomationError>;

    // SLA targets and incidents
    async fn active_sla_targets(&self) -> Result<Vec<SlaTarget>, AutomationError>;
    async fn list_sla_targets(&self) -> Result<Vec<SlaTarget>, AutomationError>;
    /// Open and acknowledged incidents for one target.
    async fn unresolved_incidents_for_target(
        &self,
        target_id: Uuid,
    ) -> Result<Vec<SlaIncident>, AutomationError>;
    /// Open and acknowledged incidents for one entity across all targets.
    async fn unresolved_incidents_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<SlaIncident>, AutomationError>;
    async fn open_incident(
        &self,
        target_id: Uuid,
        entity_type: &str,
        entity_id: &str,
        breach_reason: &str,
    ) -> Result<SlaIncident, AutomationError>;
    async fn resolve_incident(&self, incident_id: Uuid) -> Result<(), AutomationError>;
    async fn list_incidents(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<SlaIncident>, AutomationError>;

    // Monitored platform entities
    /// Appointments still `pending` older than the threshold (minutes
    /// since their scheduled time).
    async fn overdue_pending_appointments(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<Uuid>, AutomationError>;
    /// Conversations whose most recent message is older than the threshold.
    async fn unanswered_conversations(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<Uuid>, AutomationError>;
    /// Unconditional status overwrite; a missing appointment is not an error.
    async fn set_appointment_status(
        &self,
        appointment_id: Uuid,
        status: &str,
    ) -> Result<(), AutomationError>;
}

pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AutomationStore for PgStore {
    async fn active_workflows_for_trigger(
        &self,
        trigger_type: &str,
    ) -> Result<Vec<Workflow>, AutomationError> {
        let workflows = sqlx::query_as::<_, Workflow>(
            "SELECT * FROM workflows WHERE trigger_type = $1 AND is_active = true ORDER BY created_at ASC",
        )
        .bind(trigger_type)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(workflows)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, AutomationError> {
        let workflows =
            sqlx::query_as::<_, Workflow>("SELECT * FROM workflows ORDER BY created_at DESC")
                .fetch_all(&self.db_pool)
                .await?;

        Ok(workflows)
    }

    async fn workflow_actions(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<WorkflowAction>, AutomationError> {
        let actions = sqlx::query_as::<_, WorkflowAction>(
            "SELECT * FROM workflow_actions WHERE workflow_id = $1 ORDER BY position ASC, created_at ASC",
        )
        .bind(workflow_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(actions)
    }

    async fn insert_run(
        &self,
        workflow_id: Uuid,
        trigger_payload: serde_json::Value,
    ) -> Result<WorkflowRun, AutomationError> {
        let run = sqlx::query_as::<_, WorkflowRun>(
            r#"
            INSERT INTO workflow_runs (id, workflow_id, status, trigger_payload, queued_at)
            VALUES ($1, $2, 'queued', $3, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(workflow_id)
        .bind(trigger_payload)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(run)
    }

    async fn due_queued_runs(&self, limit: i64) -> Result<Vec<WorkflowRun>, AutomationError> {
        let runs = sqlx::query_as::<_, WorkflowRun>(
            r#"
            SELECT r.*
            FROM workflow_runs r
            JOIN workflows w ON w.id = r.workflow_id
            WHERE r.status = 'queued'
              AND r.queued_at + make_interval(mins => COALESCE(w.minutes_delay, 0)) <= NOW()
            ORDER BY r.queued_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(runs)
    }

    async fn claim_run(&self, run_id: Uuid) -> Result<bool, AutomationError> {
        let result = sqlx::query(
            "UPDATE workflow_runs SET status = 'running', started_at = NOW()
             WHERE id = $1 AND status = 'queued'",
        )
        .bind(run_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_run(
        &self,
        run_id: Uuid,
        result_payload: serde_json::Value,
    ) -> Result<(), AutomationError> {
        sqlx::query(
            "UPDATE workflow_runs SET status = 'completed', completed_at = NOW(), result_payload = $2
             WHERE id = $1",
        )
        .bind(run_id)
        .bind(result_payload)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn fail_run(&self, run_id: Uuid, error_message: &str) -> Result<(), AutomationError> {
        sqlx::query(
            "UPDATE workflow_runs SET status = 'failed', completed_at = NOW(), error_message = $2
             WHERE id = $1",
        )
        .bind(run_id)
        .bind(error_message)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn list_runs(
        &self,
        status: Option<RunStatus>,
    ) -> Result<Vec<WorkflowRun>, AutomationError> {
        let runs = match status {
            Some(status) => {
                sqlx::query_as::<_, WorkflowRun>(
                    "SELECT * FROM workflow_runs WHERE status = $1 ORDER BY queued_at DESC",
                )
                .bind(status)
                .fetch_all(&self.db_pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, WorkflowRun>(
                    "SELECT * FROM workflow_runs ORDER BY queued_at DESC",
                )
                .fetch_all(&self.db_pool)
                .await?
            }
        };

        Ok(runs)
    }

    async fn active_sla_targets(&self) -> Result<Vec<SlaTarget>, AutomationError> {
        let targets = sqlx::query_as::<_, SlaTarget>(
            "SELECT * FROM sla_targets WHERE is_active = true ORDER BY created_at ASC",
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(targets)
    }

    async fn list_sla_targets(&self) -> Result<Vec<SlaTarget>, AutomationError> {
        let targets =
            sqlx::query_as::<_, SlaTarget>("SELECT * FROM sla_targets ORDER BY created_at DESC")
                .fetch_all(&self.db_pool)
                .await?;

        Ok(targets)
    }

    async fn unresolved_incidents_for_target(
        &self,
        target_id: Uuid,
    ) -> Result<Vec<SlaIncident>, AutomationError> {
        let incidents = sqlx::query_as::<_, SlaIncident>(
            "SELECT * FROM sla_incidents
             WHERE target_id = $1 AND status IN ('open', 'acknowledged')
             ORDER BY opened_at ASC",
        )
        .bind(target_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(incidents)
    }

    async fn unresolved_incidents_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<SlaIncident>, AutomationError> {
        let incidents = sqlx::query_as::<_, SlaIncident>(
            "SELECT * FROM sla_incidents
             WHERE entity_type = $1 AND entity_id = $2 AND status IN ('open', 'acknowledged')
             ORDER BY opened_at ASC",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(incidents)
    }

    async fn open_incident(
        &self,
        target_id: Uuid,
        entity_type: &str,
        entity_id: &str,
        breach_reason: &str,
    ) -> Result<SlaIncident, AutomationError> {
        let incident = sqlx::query_as::<_, SlaIncident>(
            r#"
            INSERT INTO sla_incidents (id, target_id, entity_type, entity_id, status, breach_reason, opened_at)
            VALUES ($1, $2, $3, $4, 'open', $5, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(target_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(breach_reason)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(incident)
    }

    async fn resolve_incident(&self, incident_id: Uuid) -> Result<(), AutomationError> {
        sqlx::query(
            "UPDATE sla_incidents SET status = 'resolved', resolved_at = NOW() WHERE id = $1",
        )
        .bind(incident_id)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn list_incidents(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<SlaIncident>, AutomationError> {
        let incidents = match status {
            Some(status) => {
                sqlx::query_as::<_, SlaIncident>(
                    "SELECT * FROM sla_incidents WHERE status = $1 ORDER BY opened_at DESC",
                )
                .bind(status)
                .fetch_all(&self.db_pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SlaIncident>(
                    "SELECT * FROM sla_incidents ORDER BY opened_at DESC",
                )
                .fetch_all(&self.db_pool)
                .await?
            }
        };

        Ok(incidents)
    }

    async fn overdue_pending_appointments(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<Uuid>, AutomationError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM appointments
             WHERE status = 'pending'
               AND scheduled_at < NOW() - make_interval(mins => $1)",
        )
        .bind(threshold_minutes)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(ids)
    }

    async fn unanswered_conversations(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<Uuid>, AutomationError> {
        // Latest message per conversation decides staleness; MAX(created_at)
        // breaks ties between same-timestamp messages.
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT m.conversation_id FROM messages m
             GROUP BY m.conversation_id
             HAVING MAX(m.created_at) < NOW() - make_interval(mins => $1)",
        )
        .bind(threshold_minutes)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(ids)
    }

    async fn set_appointment_status(
        &self,
        appointment_id: Uuid,
        status: &str,
    ) -> Result<(), AutomationError> {
        sqlx::query("UPDATE appointments SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(appointment_id)
            .bind(status)
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }
}
