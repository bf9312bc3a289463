// SLA Breach Checks - predicates keyed by entity type

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AutomationError;
use crate::store::AutomationStore;

/// Entity type keys with built-in checks. Targets reference these by
/// name; new entity kinds are added by registering another check.
pub mod entity_types {
    pub const APPOINTMENT_PENDING: &str = "appointment.pending";
    pub const CHAT_UNANSWERED: &str = "chat.unanswered";
}

#[async_trait]
pub trait BreachCheck: Send + Sync {
    fn entity_type(&self) -> &'static str;

    /// Ids of entities currently past the threshold.
    async fn breaching_entities(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<String>, AutomationError>;
}

#[derive(Default)]
pub struct BreachCheckRegistry {
    checks: HashMap<String, Arc<dyn BreachCheck>>,
}

impl BreachCheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin(store: Arc<dyn AutomationStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PendingAppointmentCheck::new(store.clone())));
        registry.register(Arc::new(UnansweredChatCheck::new(store)));
        registry
    }

    pub fn register(&mut self, check: Arc<dyn BreachCheck>) {
        self.checks.insert(check.entity_type().to_string(), check);
    }

    pub fn get(&self, entity_type: &str) -> Option<&Arc<dyn BreachCheck>> {
        self.checks.get(entity_type)
    }
}

/// Appointments that have sat `pending` past their scheduled time for
/// longer than the target threshold.
pub struct PendingAppointmentCheck {
    store: Arc<dyn AutomationStore>,
}

impl PendingAppointmentCheck {
    pub fn new(store: Arc<dyn AutomationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BreachCheck for PendingAppointmentCheck {
    fn entity_type(&self) -> &'static str {
        entity_types::APPOINTMENT_PENDING
    }

    async fn breaching_entities(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<String>, AutomationError> {
        let ids = self
            .store
            .overdue_pending_appointments(threshold_minutes)
            .await?;
        Ok(ids.iter().map(Uuid::to_string).collect())
    }
}

/// Conversations whose most recent message has gone unanswered for
/// longer than the target threshold.
pub struct UnansweredChatCheck {
    store: Arc<dyn AutomationStore>,
}

impl UnansweredChatCheck {
    pub fn new(store: Arc<dyn AutomationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BreachCheck for UnansweredChatCheck {
    fn entity_type(&self) -> &'static str {
        entity_types::CHAT_UNANSWERED
    }

    async fn breaching_entities(
        &self,
        threshold_minutes: i32,
    ) -> Result<Vec<String>, AutomationError> {
        let ids = self
            .store
            .unanswered_conversations(threshold_minutes)
            .await?;
        Ok(ids.iter().map(Uuid::to_string).collect())
    }
}
