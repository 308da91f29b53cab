//! Inbound message routing.
//!
//! Turns relay messages into host [`InboundEvent`]s. A failing dispatch is
//! logged and the message dropped; it never reaches the connection loop.

use std::sync::Arc;

use {
    serde_json::{Map, Value},
    tether_channels::{ChannelEventSink, InboundEvent, MessagingTarget},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use tether_metrics::{channels as ch_metrics, counter, relay as relay_metrics};

use crate::{CHANNEL_ID, client::InboundMessage};

/// Per-connection inbound handler.
#[derive(Clone)]
pub struct InboundDispatcher {
    account_id: String,
    identity: MessagingTarget,
    sink: Option<Arc<dyn ChannelEventSink>>,
}

impl InboundDispatcher {
    pub fn new(
        account_id: &str,
        identity: &str,
        sink: Option<Arc<dyn ChannelEventSink>>,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            identity: MessagingTarget::parse(identity),
            sink,
        }
    }

    /// Build the host event for `msg`, or `None` if it should be dropped.
    pub fn normalize(&self, msg: InboundMessage) -> Option<InboundEvent> {
        let account_id = self.account_id.as_str();
        let Some(from) = msg.from.filter(|f| !f.is_empty()) else {
            debug!(account_id, "ignoring message without sender");
            return None;
        };
        let Some(text) = msg.content.filter(|c| !c.is_empty()) else {
            debug!(account_id, from, "ignoring message without content");
            return None;
        };

        let peer = MessagingTarget::parse(&from);
        if peer == self.identity {
            debug!(account_id, "skipping own echo");
            return None;
        }

        let mut metadata = Map::new();
        if let Some(ts) = msg.timestamp {
            metadata.insert("timestamp".into(), Value::from(ts));
        }
        if let Some(id) = msg.id {
            metadata.insert("message_id".into(), Value::from(id));
        }
        if let Some(name) = msg.sender_name {
            metadata.insert("sender_name".into(), Value::from(name));
        }
        if let Some(to) = msg.to {
            metadata.insert("to".into(), Value::from(to));
        }

        Some(InboundEvent {
            channel: CHANNEL_ID.to_string(),
            account_id: self.account_id.clone(),
            peer,
            text,
            metadata,
        })
    }

    /// Dispatch one inbound message. Returns whether the host accepted it.
    pub async fn handle(&self, msg: InboundMessage) -> bool {
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::MESSAGES_RECEIVED_TOTAL).increment(1);

        let Some(event) = self.normalize(msg) else {
            return false;
        };
        let Some(sink) = self.sink.as_ref() else {
            debug!(
                account_id = self.account_id,
                "no event sink configured, dropping message"
            );
            return false;
        };

        let peer = event.peer.to_string();
        match sink.dispatch(event).await {
            Ok(()) => {
                debug!(account_id = self.account_id, peer, "inbound message dispatched");
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::MESSAGES_DISPATCHED_TOTAL).increment(1);
                true
            },
            Err(e) => {
                warn!(
                    account_id = self.account_id,
                    peer,
                    error = %e,
                    "failed to dispatch inbound message"
                );
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::DISPATCH_ERRORS_TOTAL).increment(1);
                false
            },
        }
    }
}
