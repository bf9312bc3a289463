// Workflow Actions - pluggable handlers keyed by action type

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::triggers::TriggerPayload;
use crate::error::AutomationError;
use crate::notifications::{NotificationGateway, NotificationRequest};
use crate::store::AutomationStore;

/// Action type keys with built-in handlers. The registry accepts any
/// string key; unregistered types are skipped, never fatal.
pub mod action_types {
    pub const SEND_NOTIFICATION: &str = "send_notification";
    pub const UPDATE_STATUS: &str = "update_status";
}

/// What one action produced. Skips are successful results carrying a
/// reason; only handler errors fail a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Completed(Value),
    Skipped(String),
}

impl ActionOutcome {
    pub fn completed(output: Value) -> Self {
        Self::Completed(output)
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Completed(output) => output,
            Self::Skipped(reason) => json!({ "skipped": true, "reason": reason }),
        }
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        config: &Value,
        payload: &TriggerPayload,
    ) -> Result<ActionOutcome, AutomationError>;
}

/// Map from action type key to handler. New action kinds are added by
/// registration; the dispatch itself never changes.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the platform's built-in handlers.
    pub fn with_builtin(
        store: Arc<dyn AutomationStore>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(
            action_types::SEND_NOTIFICATION,
            Arc::new(SendNotificationAction::new(gateway)),
        );
        registry.register(
            action_types::UPDATE_STATUS,
            Arc::new(UpdateStatusAction::new(store)),
        );
        registry
    }

    pub fn register(&mut self, action_type: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(action_type.into(), handler);
    }

    pub async fn execute(
        &self,
        action_type: &str,
        config: &Value,
        payload: &TriggerPayload,
    ) -> Result<ActionOutcome, AutomationError> {
        match self.handlers.get(action_type) {
            Some(handler) => handler.execute(config, payload).await,
            None => {
                debug!(action_type, "no handler registered, skipping action");
                Ok(ActionOutcome::skipped(format!(
                    "Action {action_type} not implemented"
                )))
            }
        }
    }
}

/// Sends a notification through the gateway. The target user id comes
/// from the action config, falling back to the customer or user id
/// carried in the trigger payload.
pub struct SendNotificationAction {
    gateway: Arc<dyn NotificationGateway>,
}

impl SendNotificationAction {
    pub fn new(gateway: Arc<dyn NotificationGateway>) -> Self {
        Self { gateway }
    }

    fn resolve_user_id(config: &Value, payload: &TriggerPayload) -> Option<Uuid> {
        config
            .get("user_id")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
            .or_else(|| payload.uuid_field("customer_id"))
            .or_else(|| payload.uuid_field("user_id"))
    }
}

#[async_trait]
impl ActionHandler for SendNotificationAction {
    async fn execute(
        &self,
        config: &Value,
        payload: &TriggerPayload,
    ) -> Result<ActionOutcome, AutomationError> {
        let Some(user_id) = Self::resolve_user_id(config, payload) else {
            return Ok(ActionOutcome::skipped("missing target user id"));
        };

        let title = config
            .get("title")
            .and_then(Value::as_str)
            .or_else(|| payload.str_field("title"))
            .unwrap_or("Automated update")
            .to_string();
        let body = config
            .get("body")
            .and_then(Value::as_str)
            .or_else(|| payload.str_field("body"))
            .unwrap_or_default()
            .to_string();
        let category = config
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("workflow")
            .to_string();

        self.gateway
            .send_notification(NotificationRequest {
                user_id,
                title,
                body,
                category,
                metadata: payload.as_value().clone(),
            })
            .await?;

        Ok(ActionOutcome::completed(json!({ "sent": true })))
    }
}

/// Overwrites an appointment's status. Requires the appointment id from
/// the payload and the next status from the config; the write itself is
/// unconditional, matching how producers treat status edits.
pub struct UpdateStatusAction {
    store: Arc<dyn AutomationStore>,
}

impl UpdateStatusAction {
    pub fn new(store: Arc<dyn AutomationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionHandler for UpdateStatusAction {
    async fn execute(
        &self,
        config: &Value,
        payload: &TriggerPayload,
    ) -> Result<ActionOutcome, AutomationError> {
        let appointment_id = payload.uuid_field("appointment_id");
        let next_status = config.get("next_status").and_then(Value::as_str);

        let (Some(appointment_id), Some(next_status)) = (appointment_id, next_status) else {
            return Ok(ActionOutcome::skipped(
                "missing appointment_id or next_status",
            ));
        };

        self.store
            .set_appointment_status(appointment_id, next_status)
            .await?;

        Ok(ActionOutcome::completed(json!({
            "updated": true,
            "appointment_id": appointment_id,
            "status": next_status,
        })))
    }
}
