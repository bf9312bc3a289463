// SLA monitoring: breach evaluation, idempotent reconciliation,
// per-target incident scoping, and out-of-cadence incident closing.

use chrono::{Duration, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use crate::sla::{IncidentReconciler, SlaMonitorJob};
use crate::store::AutomationStore;
use crate::tests::fixtures;
use crate::tests::support::MemoryStore;
use tempo_shared::IncidentStatus;

fn monitor_for(store: &Arc<MemoryStore>) -> SlaMonitorJob {
    SlaMonitorJob::new(store.clone() as Arc<dyn AutomationStore>)
}

#[tokio::test]
async fn test_overdue_pending_appointment_opens_then_resolves() {
    let store = Arc::new(MemoryStore::new());
    store.add_target(fixtures::sla_target("appointment.pending", 60));

    let appointment_id = Uuid::new_v4();
    store.add_appointment(
        appointment_id,
        "pending",
        Utc::now() - Duration::minutes(90),
    );

    let monitor = monitor_for(&store);

    let outcome = monitor.run().await.unwrap();
    assert_eq!(outcome.targets_checked, 1);
    assert_eq!(outcome.opened, 1);
    assert_eq!(outcome.resolved, 0);

    let incidents = store.incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].status, IncidentStatus::Open);
    assert_eq!(incidents[0].entity_id, appointment_id.to_string());
    assert!(incidents[0].breach_reason.contains("appointment.pending"));

    // Unchanged breach set: re-running must perform zero writes.
    let writes_before = store.incident_writes.load(Ordering::SeqCst);
    let outcome = monitor.run().await.unwrap();
    assert_eq!(outcome.opened, 0);
    assert_eq!(outcome.resolved, 0);
    assert_eq!(store.incident_writes.load(Ordering::SeqCst), writes_before);

    // The appointment leaves `pending`, so the incident resolves.
    store
        .set_appointment_status(appointment_id, "completed")
        .await
        .unwrap();
    let outcome = monitor.run().await.unwrap();
    assert_eq!(outcome.resolved, 1);

    let incidents = store.incidents();
    assert_eq!(incidents[0].status, IncidentStatus::Resolved);
    assert!(incidents[0].resolved_at.is_some());
}

#[tokio::test]
async fn test_appointment_within_threshold_does_not_breach() {
    let store = Arc::new(MemoryStore::new());
    store.add_target(fixtures::sla_target("appointment.pending", 60));
    store.add_appointment(Uuid::new_v4(), "pending", Utc::now() - Duration::minutes(30));

    let outcome = monitor_for(&store).run().await.unwrap();

    assert_eq!(outcome.opened, 0);
    assert!(store.incidents().is_empty());
}

#[tokio::test]
async fn test_unanswered_conversation_breaches_until_new_message() {
    let store = Arc::new(MemoryStore::new());
    store.add_target(fixtures::sla_target("chat.unanswered", 30));

    let conversation_id = Uuid::new_v4();
    store.add_message(conversation_id, Utc::now() - Duration::minutes(45));

    let monitor = monitor_for(&store);

    let outcome = monitor.run().await.unwrap();
    assert_eq!(outcome.opened, 1);
    assert_eq!(store.incidents()[0].entity_id, conversation_id.to_string());

    // A fresh reply moves the latest-message age under the threshold.
    store.add_message(conversation_id, Utc::now() - Duration::minutes(5));
    let outcome = monitor.run().await.unwrap();
    assert_eq!(outcome.resolved, 1);
    assert_eq!(store.incidents()[0].status, IncidentStatus::Resolved);
}

#[tokio::test]
async fn test_incidents_are_scoped_per_target() {
    let store = Arc::new(MemoryStore::new());
    let tight = fixtures::sla_target("appointment.pending", 30);
    let loose = fixtures::sla_target("appointment.pending", 60);
    store.add_target(tight.clone());
    store.add_target(loose.clone());

    let appointment_id = Uuid::new_v4();
    store.add_appointment(
        appointment_id,
        "pending",
        Utc::now() - Duration::minutes(90),
    );

    let outcome = monitor_for(&store).run().await.unwrap();
    assert_eq!(outcome.opened, 2);

    let incidents = store.incidents();
    assert_eq!(incidents.len(), 2);
    assert_ne!(incidents[0].target_id, incidents[1].target_id);
    assert_eq!(incidents[0].entity_id, incidents[1].entity_id);
}

#[tokio::test]
async fn test_close_incidents_for_entity_spans_targets() {
    let store = Arc::new(MemoryStore::new());
    store.add_target(fixtures::sla_target("appointment.pending", 30));
    store.add_target(fixtures::sla_target("appointment.pending", 60));

    let appointment_id = Uuid::new_v4();
    store.add_appointment(
        appointment_id,
        "pending",
        Utc::now() - Duration::minutes(90),
    );

    monitor_for(&store).run().await.unwrap();
    assert_eq!(store.incidents().len(), 2);

    let reconciler = IncidentReconciler::new(store.clone() as Arc<dyn AutomationStore>);
    let resolved = reconciler
        .close_incidents_for_entity("appointment.pending", &appointment_id.to_string())
        .await
        .unwrap();

    assert_eq!(resolved, 2);
    assert!(store
        .incidents()
        .iter()
        .all(|incident| incident.status == IncidentStatus::Resolved));

    // Already closed: calling again is a no-op.
    let resolved = reconciler
        .close_incidents_for_entity("appointment.pending", &appointment_id.to_string())
        .await
        .unwrap();
    assert_eq!(resolved, 0);
}

#[tokio::test]
async fn test_target_without_registered_check_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    store.add_target(fixtures::sla_target("invoice.overdue", 60));

    let outcome = monitor_for(&store).run().await.unwrap();

    assert_eq!(outcome.targets_checked, 1);
    assert_eq!(outcome.opened, 0);
    assert!(store.incidents().is_empty());
}

#[tokio::test]
async fn test_storage_error_aborts_remaining_targets() {
    let store = Arc::new(MemoryStore::new());
    store.add_target(fixtures::sla_target("appointment.pending", 60));
    store.add_target(fixtures::sla_target("chat.unanswered", 30));
    store.add_message(Uuid::new_v4(), Utc::now() - Duration::minutes(90));
    store.fail_appointment_queries.store(true, Ordering::SeqCst);

    let monitor = monitor_for(&store);

    assert!(monitor.run().await.is_err());
    assert_eq!(
        store.conversation_queries.load(Ordering::SeqCst),
        0,
        "targets after the failing one must not be evaluated this tick"
    );

    // The next tick retries everything from scratch.
    store.fail_appointment_queries.store(false, Ordering::SeqCst);
    let outcome = monitor.run().await.unwrap();
    assert_eq!(outcome.targets_checked, 2);
    assert_eq!(outcome.opened, 1);
}
