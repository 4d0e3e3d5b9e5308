use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::{bridge::BridgeError, protocol::PlayNotification};

/// Delivers transitions to the player's control endpoint.
#[async_trait]
pub trait ControlNotifier: Send + Sync {
    async fn play(&self, notification: &PlayNotification) -> Result<(), BridgeError>;

    /// Called when the desktop client stops playing. Nothing is forwarded by default;
    /// a notifier that mirrors pauses to the player overrides this.
    async fn stopped(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Posts play notifications as JSON to the player's `POST /` endpoint.
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ControlNotifier for HttpNotifier {
    async fn play(&self, notification: &PlayNotification) -> Result<(), BridgeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| BridgeError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        debug!("Control endpoint answered {} for '{}'", status, notification.id);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::DeliveryFailed(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}
