//! Session client abstraction.
//!
//! The messaging session (browser automation, network protocol, credential
//! storage) lives outside this crate. Everything here talks to it through
//! [`SessionClient`]; [`SessionFactory`] builds one and wires its event sink.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SessionResult;
use crate::event::EventSender;

/// Operations offered by a constructed session
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Start the session. Lifecycle events follow on the event sink.
    async fn initialize(&self) -> SessionResult<()>;

    /// Send a text message to a fully-qualified chat identifier
    async fn send_message(&self, chat_id: &str, body: &str) -> SessionResult<()>;

    /// Tear the session down and release its resources
    async fn destroy(&self) -> SessionResult<()>;
}

/// Builds session clients
pub trait SessionFactory: Send + Sync {
    /// Construct a client whose lifecycle events go to `events`
    fn create(&self, events: EventSender) -> SessionResult<Arc<dyn SessionClient>>;
}
