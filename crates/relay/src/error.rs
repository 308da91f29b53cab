use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The relay refused or failed the connection attempt.
    #[error("relay connect failed: {message}")]
    Connect { message: String },

    /// A call on a live connection failed (send, join, ping).
    #[error("{message}")]
    Transport { message: String },

    #[error(transparent)]
    Channel(#[from] tether_channels::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
