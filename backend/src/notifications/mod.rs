//! Notification Gateway
//!
//! The engine hands a [`NotificationRequest`] to the gateway and moves
//! on; channel selection, user preference lookup, and delivery
//! bookkeeping all live here. Transport fan-out (SMTP/SMS/push) sits
//! behind this boundary and is owned by the delivery layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AutomationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub category: String,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Persist and dispatch one notification. Fire-and-forget from the
    /// engine's perspective; the returned id is the notification row.
    async fn send_notification(
        &self,
        request: NotificationRequest,
    ) -> Result<Uuid, AutomationError>;
}

pub struct PgNotificationGateway {
    db_pool: PgPool,
}

impl PgNotificationGateway {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn enabled_channels(&self, user_id: Uuid) -> Result<Vec<&'static str>, sqlx::Error> {
        let prefs: Option<(bool, bool, bool)> = sqlx::query_as(
            "SELECT notify_email, notify_sms, notify_push FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let mut channels = Vec::new();
        if let Some((email, sms, push)) = prefs {
            if email {
                channels.push("email");
            }
            if sms {
                channels.push("sms");
            }
            if push {
                channels.push("push");
            }
        }

        Ok(channels)
    }
}

#[async_trait]
impl NotificationGateway for PgNotificationGateway {
    async fn send_notification(
        &self,
        request: NotificationRequest,
    ) -> Result<Uuid, AutomationError> {
        let notification_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, category, title, body, status, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, 'created', $6, NOW())
            "#,
        )
        .bind(notification_id)
        .bind(request.user_id)
        .bind(&request.category)
        .bind(&request.title)
        .bind(&request.body)
        .bind(&request.metadata)
        .execute(&self.db_pool)
        .await?;

        let channels = self.enabled_channels(request.user_id).await?;
        if channels.is_empty() {
            warn!(
                user_id = %request.user_id,
                "no enabled notification channels for user"
            );
        }

        for channel in &channels {
            sqlx::query(
                "INSERT INTO notification_deliveries (id, notification_id, channel, sent_at)
                 VALUES ($1, $2, $3, NOW())",
            )
            .bind(Uuid::new_v4())
            .bind(notification_id)
            .bind(channel)
            .execute(&self.db_pool)
            .await?;
        }

        sqlx::query("UPDATE notifications SET status = 'dispatched' WHERE id = $1")
            .bind(notification_id)
            .execute(&self.db_pool)
            .await?;

        info!(
            user_id = %request.user_id,
            category = %request.category,
            channels = channels.len(),
            "notification dispatched"
        );

        Ok(notification_id)
    }
}
