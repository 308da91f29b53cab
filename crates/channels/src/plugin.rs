use {anyhow::Result, async_trait::async_trait, serde::Serialize};

use crate::target::MessagingTarget;

// ── Inbound dispatch ────────────────────────────────────────────────────────

/// Normalized inbound message handed to the host runtime.
#[derive(Debug, Clone, Serialize)]
pub struct InboundEvent {
    /// Channel identifier (e.g. "relay").
    pub channel: String,
    pub account_id: String,
    /// Who sent the message.
    pub peer: MessagingTarget,
    pub text: String,
    /// Transport details: timestamp, message id, sender name, recipient.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Host dispatch runtime, implemented by the embedding process.
#[async_trait]
pub trait ChannelEventSink: Send + Sync {
    /// Hand an inbound message to the host for processing. Failures are
    /// reported back but never tear down the channel connection.
    async fn dispatch(&self, event: InboundEvent) -> Result<()>;
}

// ── Plugin surface ──────────────────────────────────────────────────────────

/// Core channel plugin trait. Each messaging platform implements this.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Channel identifier (e.g. "relay").
    fn id(&self) -> &str;

    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start an account connection.
    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()>;

    /// Stop an account connection.
    async fn stop_account(&mut self, account_id: &str) -> Result<()>;

    /// Get outbound adapter for sending messages.
    fn outbound(&self) -> Option<&dyn ChannelOutbound>;

    /// Get status adapter for health checks.
    fn status(&self) -> Option<&dyn ChannelStatus>;
}

/// Outcome of an outbound send. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct SendResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Send messages to a channel.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(
        &self,
        account_id: &str,
        to: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> SendResult;
}

/// Probe channel account health.
#[async_trait]
pub trait ChannelStatus: Send + Sync {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot>;
}

/// Channel health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelHealthSnapshot {
    pub connected: bool,
    pub account_id: String,
    pub details: Option<String>,
}
