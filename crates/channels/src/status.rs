use serde::{Deserialize, Serialize};

/// Connection state reported for a channel account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        })
    }
}

/// Point-in-time observation of an account connection. Emitted, not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusUpdate {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state,
            message: None,
        }
    }

    pub fn with_message(state: ConnectionState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: Some(message.into()),
        }
    }

    pub fn connecting(message: impl Into<String>) -> Self {
        Self::with_message(ConnectionState::Connecting, message)
    }

    pub fn connected() -> Self {
        Self::new(ConnectionState::Connected)
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::with_message(ConnectionState::Disconnected, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_message(ConnectionState::Error, message)
    }
}

/// Receiver of account status updates.
///
/// Called synchronously from connection tasks, so implementations must not
/// block and must not panic.
pub trait StatusSink: Send + Sync {
    fn update(&self, account_id: &str, status: StatusUpdate);
}

impl<F> StatusSink for F
where
    F: Fn(&str, StatusUpdate) + Send + Sync,
{
    fn update(&self, account_id: &str, status: StatusUpdate) {
        self(account_id, status);
    }
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {
    fn update(&self, _account_id: &str, _status: StatusUpdate) {}
}
