//! Outbound user notifications.
//!
//! The notification endpoint takes `{userId, subject, message}`, looks up the
//! user's email and sends a templated mail. Callers treat delivery as best
//! effort: failures are logged and never retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    pub user_id: Uuid,
    pub subject: String,
    pub message: String,
}

#[derive(Debug)]
pub enum NotifyError {
    Http(reqwest::Error),
    Status(u16),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Http(e) => write!(f, "Notification request failed: {}", e),
            NotifyError::Status(code) => write!(f, "Notification endpoint returned {}", code),
        }
    }
}

impl std::error::Error for NotifyError {}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Http(e)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: UserNotification) -> Result<(), NotifyError>;
}

/// Posts notifications to the configured endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpNotifier {
    pub fn new(endpoint: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint,
            api_key,
        }
    }

    pub fn from_config() -> Self {
        let config = crate::app_config::notify();
        Self::new(config.endpoint, config.api_key)
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: UserNotification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(&notification)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }

        log::debug!("Notification sent to user {}", notification.user_id);
        Ok(())
    }
}

/// Send and log; the outcome never affects the caller.
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: UserNotification) {
    let user_id = notification.user_id;
    if let Err(e) = notifier.notify(notification).await {
        log::error!("Failed to notify user {}: {}", user_id, e);
    }
}
