//! Outbound notifications for approval requests and low stock
//!
//! Messages are posted as JSON to a configured webhook. Without a webhook
//! they are written to the log instead.

use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};

/// Webhook client
#[derive(Clone)]
pub struct WebhookClient {
    url: String,
    http_client: reqwest::Client,
}

/// Message body posted to the webhook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct WebhookErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

impl WebhookClient {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http_client: reqwest::Client::new(),
        }
    }

    pub async fn post(&self, message: &NotificationMessage) -> AppResult<()> {
        let response = self
            .http_client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| AppError::Notification(format!("Failed to reach webhook: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let error = response
                .json::<WebhookErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| status.to_string());
            Err(AppError::Notification(error))
        }
    }
}

/// Notifier used by the ledger services
#[derive(Clone)]
pub struct Notifier {
    client: Option<WebhookClient>,
    admin_recipient: String,
    low_stock_alerts: bool,
}

impl Notifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            client: config.webhook_url.clone().map(WebhookClient::new),
            admin_recipient: config.admin_recipient.clone(),
            low_stock_alerts: config.low_stock_alerts,
        }
    }

    /// A notifier that only logs
    #[cfg(test)]
    pub fn log_only(admin_recipient: &str) -> Self {
        Self {
            client: None,
            admin_recipient: admin_recipient.to_string(),
            low_stock_alerts: true,
        }
    }

    /// Deliver a message.
    ///
    /// Delivery failures are logged and swallowed: a notification never
    /// undoes a committed ledger operation.
    pub async fn send(&self, to: &str, subject: &str, body: &str) {
        let message = NotificationMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };

        match &self.client {
            Some(client) => {
                if let Err(e) = client.post(&message).await {
                    tracing::warn!(to = %message.to, subject = %message.subject, "Notification failed: {}", e);
                }
            }
            None => {
                tracing::info!(to = %message.to, subject = %message.subject, "{}", message.body);
            }
        }
    }

    /// Tell admins a staff request is waiting for a decision
    pub async fn approval_requested(&self, production_id: uuid::Uuid, action: &str) {
        let subject = format!("Production {} awaiting approval", action);
        let body = format!(
            "A staff {} request for production run {} needs an admin decision.",
            action, production_id
        );
        self.send(&self.admin_recipient, &subject, &body).await;
    }

    /// Low-stock alert for one material
    pub async fn low_stock(&self, material_name: &str, available: rust_decimal::Decimal, unit: &str) {
        if !self.low_stock_alerts {
            return;
        }
        let body = format!(
            "{} is at or below its critical level: {} {} available.",
            material_name,
            available.normalize(),
            unit
        );
        self.send(&self.admin_recipient, "Low stock", &body).await;
    }
}
