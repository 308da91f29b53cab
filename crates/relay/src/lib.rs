//! Relay channel plugin for tether.
//!
//! Keeps one long-lived connection per configured account to a chat relay,
//! joins the account's rooms, forwards inbound messages to the host and
//! sends outbound text. Dropped connections are retried with jittered
//! exponential backoff; silent connections are detected with ping/pong.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keepalive;
pub mod outbound;
pub mod plugin;
pub mod session;
pub mod state;
pub mod supervisor;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test_support;

/// Channel identifier reported on inbound events.
pub const CHANNEL_ID: &str = "relay";

pub use {
    client::{
        ClientHandle, InboundMessage, RelayClient, RelayConnection, RelayConnector, RelayEvent,
    },
    config::{
        RelayAccountConfig, RelayChannelsConfig, ResolvedAccount, list_account_ids,
        resolve_account,
    },
    error::{Error, Result},
    outbound::RelayOutbound,
    plugin::RelayPlugin,
    session::{SessionContext, SessionHandle, start_account},
    state::ConnectionRegistry,
    supervisor::SupervisorState,
};
