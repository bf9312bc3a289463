// Workflow Triggers - domain events that enqueue workflow runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Trigger name keys used by the platform's event producers. The set is
/// open: workflows match on the raw string, so new producers only need
/// to agree on a name.
pub mod trigger_types {
    pub const APPOINTMENT_CREATED: &str = "appointment_created";
    pub const APPOINTMENT_COMPLETED: &str = "appointment_completed";
    pub const MESSAGE_RECEIVED: &str = "message_received";
    pub const CUSTOMER_CREATED: &str = "customer_created";
}

/// A named domain event together with its payload document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub trigger_type: String,
    pub payload: Value,
}

impl Trigger {
    pub fn new(trigger_type: impl Into<String>, payload: Value) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            payload,
        }
    }

    pub fn appointment_created(
        appointment_id: Uuid,
        customer_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            trigger_types::APPOINTMENT_CREATED,
            json!({
                "appointment_id": appointment_id,
                "customer_id": customer_id,
                "scheduled_at": scheduled_at,
            }),
        )
    }

    pub fn appointment_completed(appointment_id: Uuid, customer_id: Uuid) -> Self {
        Self::new(
            trigger_types::APPOINTMENT_COMPLETED,
            json!({
                "appointment_id": appointment_id,
                "customer_id": customer_id,
            }),
        )
    }

    pub fn message_received(conversation_id: Uuid, customer_id: Uuid, sender_role: &str) -> Self {
        Self::new(
            trigger_types::MESSAGE_RECEIVED,
            json!({
                "conversation_id": conversation_id,
                "customer_id": customer_id,
                "sender_role": sender_role,
            }),
        )
    }

    pub fn customer_created(customer_id: Uuid, email: &str) -> Self {
        Self::new(
            trigger_types::CUSTOMER_CREATED,
            json!({
                "customer_id": customer_id,
                "email": email,
            }),
        )
    }
}

/// The payload snapshot a run carries: a bag of named values with
/// caller-defined shape. Accessors validate only the field they read;
/// everything else passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerPayload(Value);

impl TriggerPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Merge the trigger name into the payload so executors can recover
    /// the origin without rejoining the workflow row. Non-object
    /// payloads are replaced by an object carrying just the name.
    pub fn with_trigger_type(trigger_type: &str, payload: Value) -> Self {
        match payload {
            Value::Object(mut map) => {
                map.insert(
                    "trigger_type".to_string(),
                    Value::String(trigger_type.to_string()),
                );
                Self(Value::Object(map))
            }
            _ => Self(json!({ "trigger_type": trigger_type })),
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn uuid_field(&self, name: &str) -> Option<Uuid> {
        self.str_field(name).and_then(|raw| raw.parse().ok())
    }

    pub fn trigger_type(&self) -> Option<&str> {
        self.str_field("trigger_type")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
