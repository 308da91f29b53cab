/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a channel plugin reports to the host when managing accounts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The account is configured but switched off.
    #[error("channel account {account_id} is disabled")]
    AccountDisabled { account_id: String },

    /// The account's settings could not be read.
    #[error("invalid config for channel account {account_id}: {source}")]
    InvalidConfig {
        account_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    #[must_use]
    pub fn account_disabled(account_id: impl Into<String>) -> Self {
        Self::AccountDisabled {
            account_id: account_id.into(),
        }
    }

    #[must_use]
    pub fn invalid_config(account_id: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidConfig {
            account_id: account_id.into(),
            source,
        }
    }
}
