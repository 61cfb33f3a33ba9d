//! Lifecycle events pushed by the session client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::address::is_group_address;

/// Sender half handed to a session client at construction time.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiver half drained by the session manager's event pump.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Lifecycle notifications emitted by a session client
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A pairing code was issued (raw code, not yet rendered)
    Qr { code: String },
    /// Pairing accepted, session is being restored
    Authenticated,
    /// Authentication was rejected
    AuthFailure { message: Option<String> },
    /// Session is usable; `identifier` is the session's own address
    Ready { identifier: String },
    /// Session dropped
    Disconnected { reason: Option<String> },
    /// Inbound chat message
    Message(InboundMessage),
}

impl SessionEvent {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Qr { .. } => "qr",
            SessionEvent::Authenticated => "authenticated",
            SessionEvent::AuthFailure { .. } => "auth_failure",
            SessionEvent::Ready { .. } => "ready",
            SessionEvent::Disconnected { .. } => "disconnected",
            SessionEvent::Message(_) => "message",
        }
    }
}

/// A received message. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender address
    pub from: String,
    /// Sent by the session itself
    #[serde(default)]
    pub from_me: bool,
    /// Sender display name, if the network supplied one
    #[serde(default)]
    pub notify_name: Option<String>,
    pub body: String,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            from_me: false,
            notify_name: None,
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    pub fn with_notify_name(mut self, name: impl Into<String>) -> Self {
        self.notify_name = Some(name.into());
        self
    }

    pub fn from_me(mut self) -> Self {
        self.from_me = true;
        self
    }

    /// Whether the sender is a group chat
    pub fn is_group(&self) -> bool {
        is_group_address(&self.from)
    }

    /// Own messages and group traffic are never forwarded
    pub fn is_forwardable(&self) -> bool {
        !self.from_me && !self.is_group()
    }
}
