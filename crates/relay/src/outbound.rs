use {
    async_trait::async_trait,
    tether_channels::{ChannelOutbound, MessagingTarget, SendResult},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use tether_metrics::{counter, relay as relay_metrics};

use crate::state::ConnectionRegistry;

/// Error reported when an account has no live connection.
pub const NOT_CONNECTED: &str = "Not connected";

/// Outbound message sender for the relay.
#[derive(Clone)]
pub struct RelayOutbound {
    pub(crate) registry: ConnectionRegistry,
}

impl RelayOutbound {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ChannelOutbound for RelayOutbound {
    async fn send_text(
        &self,
        account_id: &str,
        to: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> SendResult {
        let Some(client) = self
            .registry
            .get(account_id)
            .filter(|client| client.is_connected())
        else {
            debug!(account_id, to, "relay send skipped: not connected");
            return SendResult::failed(NOT_CONNECTED);
        };

        let target = MessagingTarget::parse(to);
        match client.send(target.format(), text, reply_to).await {
            Ok(()) => {
                info!(
                    account_id,
                    to = target.format(),
                    reply_to = ?reply_to,
                    text_len = text.len(),
                    "relay outbound text sent"
                );
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::MESSAGES_SENT_TOTAL).increment(1);
                SendResult::ok()
            },
            Err(e) => {
                warn!(
                    account_id,
                    to = target.format(),
                    error = %e,
                    "relay outbound send failed"
                );
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::SEND_ERRORS_TOTAL).increment(1);
                SendResult::failed(e.to_string())
            },
        }
    }
}
