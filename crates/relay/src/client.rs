//! Contracts for the relay transport.
//!
//! The wire protocol lives outside this crate. A transport provides a
//! [`RelayConnector`] that opens connections; each connection is a
//! [`RelayClient`] handle plus a queue of [`RelayEvent`]s.

use std::sync::Arc;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::mpsc,
};

use crate::{Result, config::RelayAccountConfig};

/// A message received from the relay, as the transport saw it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Relay-assigned message id.
    pub id: Option<String>,
    /// Sender address (`@agent`, bare agent name, or `#room`).
    pub from: Option<String>,
    /// Sender display name.
    pub sender_name: Option<String>,
    /// Original recipient (our identity or a `#room`).
    pub to: Option<String>,
    pub content: Option<String>,
    /// Unix timestamp in milliseconds.
    pub timestamp: Option<i64>,
}

/// Events emitted by a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Message(InboundMessage),
    /// Liveness acknowledgment for a previous ping.
    Pong,
    /// The connection is gone. Always the last event of a connection.
    Disconnect { reason: Option<String> },
    /// Non-fatal transport error; the connection stays up.
    Error(String),
}

/// A live connection to the relay.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Our own address on the relay.
    fn identity(&self) -> &str;

    fn is_connected(&self) -> bool;

    async fn send(&self, target: &str, text: &str, reply_to: Option<&str>) -> Result<()>;

    async fn join(&self, room: &str) -> Result<()>;

    /// Send a liveness probe. Fails when the socket is already closing.
    fn ping(&self) -> Result<()>;

    /// Close the connection. The transport then emits
    /// [`RelayEvent::Disconnect`]. Safe to call more than once.
    fn disconnect(&self);
}

/// Shared handle to a live connection.
pub type ClientHandle = Arc<dyn RelayClient>;

/// A freshly opened connection: the handle and its event queue.
///
/// A closed event queue counts as a disconnect.
pub struct RelayConnection {
    pub client: ClientHandle,
    pub events: mpsc::Receiver<RelayEvent>,
}

impl std::fmt::Debug for RelayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConnection")
            .field("identity", &self.client.identity())
            .field("connected", &self.client.is_connected())
            .finish_non_exhaustive()
    }
}

/// Opens connections to the relay. Every call yields a new handle.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn connect(
        &self,
        account_id: &str,
        config: &RelayAccountConfig,
    ) -> Result<RelayConnection>;
}
