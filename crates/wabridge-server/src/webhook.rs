//! Webhook forwarding of inbound messages.
//!
//! Delivery is fire-and-forget: each POST runs on its own task, its outcome is
//! only logged, and nothing is retried.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wabridge_session::InboundMessage;

/// Display name used when the sender has none
pub const UNKNOWN_SENDER_NAME: &str = "Unknown";

/// JSON body POSTed to the webhook destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookPayload {
    pub phone: String,
    pub name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&InboundMessage> for WebhookPayload {
    fn from(msg: &InboundMessage) -> Self {
        Self {
            phone: msg.from.clone(),
            name: msg
                .notify_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SENDER_NAME.to_string()),
            message: msg.body.clone(),
            timestamp: msg.received_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookForwarder {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookForwarder {
    /// `url` of `None` turns the forwarder into a no-op
    pub fn new(url: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build webhook client: {}", e))?;

        Ok(Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
        })
    }

    pub fn destination(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Forward a message if it qualifies and a destination is set.
    ///
    /// Returns the handle of the spawned delivery so tests can wait for it;
    /// callers in the event path drop it.
    pub fn forward(&self, msg: &InboundMessage) -> Option<JoinHandle<()>> {
        if !msg.is_forwardable() {
            debug!(from = %msg.from, "Skipping webhook for own or group message");
            return None;
        }

        let url = self.url.clone()?;
        let payload = WebhookPayload::from(msg);
        let client = self.client.clone();

        Some(tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(phone = %payload.phone, "Webhook delivered");
                }
                Ok(response) => {
                    warn!(
                        phone = %payload.phone,
                        "Webhook destination answered {}",
                        response.status()
                    );
                }
                Err(e) => error!("Webhook error: {}", e),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn forwarder(url: Option<String>) -> WebhookForwarder {
        WebhookForwarder::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_forward_posts_expected_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "phone": "5511999999999@c.us",
                "name": "Ana",
                "message": "oi",
            })))
            .with_status(200)
            .create_async()
            .await;

        let forwarder = forwarder(Some(format!("{}/hook", server.url())));
        let msg = InboundMessage::new("5511999999999@c.us", "oi").with_notify_name("Ana");

        forwarder.forward(&msg).unwrap().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_name_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "name": UNKNOWN_SENDER_NAME })))
            .with_status(204)
            .create_async()
            .await;

        let forwarder = forwarder(Some(server.url()));
        let msg = InboundMessage::new("5511999999999@c.us", "oi");

        forwarder.forward(&msg).unwrap().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_group_and_own_messages_are_not_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let forwarder = forwarder(Some(server.url()));
        let group = InboundMessage::new("120363000000000000@g.us", "hola grupo");
        let own = InboundMessage::new("5511999999999@c.us", "eco").from_me();

        assert!(forwarder.forward(&group).is_none());
        assert!(forwarder.forward(&own).is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_without_destination_is_noop() {
        let forwarder = forwarder(None);
        assert!(forwarder.destination().is_none());

        let msg = InboundMessage::new("5511999999999@c.us", "oi");
        assert!(forwarder.forward(&msg).is_none());

        let blank = WebhookForwarder::new(Some("  ".to_string()), Duration::from_secs(1)).unwrap();
        assert!(blank.forward(&msg).is_none());
    }

    #[tokio::test]
    async fn test_failing_destination_does_not_surface() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(500)
            .create_async()
            .await;

        let forwarder = forwarder(Some(server.url()));
        let msg = InboundMessage::new("5511999999999@c.us", "oi");

        // the delivery task completes normally even though the destination failed
        assert!(forwarder.forward(&msg).unwrap().await.is_ok());
        mock.assert_async().await;

        let unreachable = self::forwarder(Some("http://127.0.0.1:1/hook".to_string()));
        assert!(unreachable.forward(&msg).unwrap().await.is_ok());
    }
}
