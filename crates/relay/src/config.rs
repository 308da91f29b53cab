use std::{collections::HashMap, path::PathBuf};

use {
    serde::{Deserialize, Serialize},
    tether_channels::MessagingTarget,
};

use crate::Result;

/// Account id used when none is given.
pub const DEFAULT_ACCOUNT_ID: &str = "default";

/// Relay endpoint used when an account does not name one.
pub const DEFAULT_SERVER_URL: &str = "wss://relay.tether.chat";

/// Display name used when an account does not name one.
pub const DEFAULT_DISPLAY_NAME: &str = "tether";

/// Room joined when an account does not list any.
pub const DEFAULT_ROOM: &str = "#general";

/// Configuration for a single relay account.
///
/// Every field has a default, so a partial record deserializes into a full
/// config with only the named fields overridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayAccountConfig {
    /// Whether the account should be started.
    pub enabled: bool,

    /// Relay endpoint (e.g. "wss://relay.tether.chat").
    pub server_url: String,

    /// Display name announced to the relay.
    pub name: String,

    /// Persistent identity file. Without one the relay assigns an ephemeral
    /// identity per connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_path: Option<PathBuf>,

    /// Rooms to join after every (re)connect.
    pub rooms: Vec<String>,

    /// Join `rooms` automatically on connect.
    pub auto_join: bool,
}

impl Default for RelayAccountConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: DEFAULT_SERVER_URL.into(),
            name: DEFAULT_DISPLAY_NAME.into(),
            identity_path: None,
            rooms: vec![DEFAULT_ROOM.into()],
            auto_join: true,
        }
    }
}

impl RelayAccountConfig {
    /// Rooms to join on connect, normalized to channel targets and deduplicated.
    /// Empty when `auto_join` is off.
    pub fn join_targets(&self) -> Vec<MessagingTarget> {
        if !self.auto_join {
            return Vec::new();
        }
        let mut targets: Vec<MessagingTarget> = Vec::with_capacity(self.rooms.len());
        for room in &self.rooms {
            let room = room.trim();
            if room.is_empty() {
                continue;
            }
            let target = MessagingTarget::channel(room);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }
}

/// All relay accounts, keyed by account id.
///
/// ```toml
/// [accounts.work]
/// server_url = "wss://relay.example.com"
/// rooms = ["#ops", "#deploys"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayChannelsConfig {
    pub accounts: HashMap<String, RelayAccountConfig>,
}

impl RelayChannelsConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// An account config with its id settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub account_id: String,
    pub enabled: bool,
    pub config: RelayAccountConfig,
}

/// Look up an account, falling back to the default account.
///
/// A missing id resolves to [`DEFAULT_ACCOUNT_ID`]; an unknown id resolves to
/// the default settings under that id.
pub fn resolve_account(config: &RelayChannelsConfig, account_id: Option<&str>) -> ResolvedAccount {
    let account_id = account_id
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_ACCOUNT_ID);
    let config = config
        .accounts
        .get(account_id)
        .cloned()
        .unwrap_or_default();
    ResolvedAccount {
        account_id: account_id.to_string(),
        enabled: config.enabled,
        config,
    }
}

/// Ids of every configured account, in no particular order.
pub fn list_account_ids(config: &RelayChannelsConfig) -> Vec<String> {
    config.accounts.keys().cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_resolves_to_default_account() {
        let resolved = resolve_account(&RelayChannelsConfig::default(), None);
        assert_eq!(resolved.account_id, DEFAULT_ACCOUNT_ID);
        assert!(resolved.enabled);
        assert_eq!(resolved.config, RelayAccountConfig::default());
        assert_eq!(resolved.config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(resolved.config.rooms, vec![DEFAULT_ROOM.to_string()]);
        assert!(resolved.config.auto_join);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = RelayChannelsConfig::from_json_value(serde_json::json!({
            "accounts": {
                "work": { "name": "ops-bot", "rooms": ["#ops"] }
            }
        }))
        .unwrap();

        let resolved = resolve_account(&cfg, Some("work"));
        assert_eq!(resolved.account_id, "work");
        assert_eq!(resolved.config.name, "ops-bot");
        assert_eq!(resolved.config.rooms, vec!["#ops".to_string()]);
        // unspecified fields keep their defaults
        assert_eq!(resolved.config.server_url, DEFAULT_SERVER_URL);
        assert!(resolved.config.auto_join);
        assert!(resolved.enabled);
        assert!(resolved.config.identity_path.is_none());
    }

    #[test]
    fn unknown_account_gets_defaults_under_its_id() {
        let resolved = resolve_account(&RelayChannelsConfig::default(), Some("ghost"));
        assert_eq!(resolved.account_id, "ghost");
        assert_eq!(resolved.config, RelayAccountConfig::default());
    }

    #[test]
    fn disabled_flag_is_surfaced() {
        let cfg = RelayChannelsConfig::from_toml_str(
            r#"
            [accounts.old]
            enabled = false
            "#,
        )
        .unwrap();
        let resolved = resolve_account(&cfg, Some("old"));
        assert!(!resolved.enabled);
    }

    #[test]
    fn list_ids_of_empty_config_is_empty() {
        assert!(list_account_ids(&RelayChannelsConfig::default()).is_empty());
    }

    #[test]
    fn list_ids_returns_every_account() {
        let cfg = RelayChannelsConfig::from_toml_str(
            r##"
            [accounts.alpha]
            [accounts.beta]
            rooms = ["#b"]
            [accounts.gamma]
            auto_join = false
            "##,
        )
        .unwrap();
        let mut ids = list_account_ids(&cfg);
        ids.sort();
        assert_eq!(ids, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn toml_identity_path_is_parsed() {
        let cfg = RelayChannelsConfig::from_toml_str(
            r#"
            [accounts.main]
            identity_path = "/var/lib/tether/main.key"
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.accounts["main"].identity_path.as_deref(),
            Some(std::path::Path::new("/var/lib/tether/main.key"))
        );
    }

    #[test]
    fn join_targets_normalize_and_dedup() {
        let cfg = RelayAccountConfig {
            rooms: vec!["ops".into(), "#ops".into(), " ".into(), "#dev".into()],
            ..Default::default()
        };
        let ids: Vec<String> = cfg
            .join_targets()
            .iter()
            .map(|t| t.id().to_string())
            .collect();
        assert_eq!(ids, vec!["#ops", "#dev"]);
    }

    #[test]
    fn join_targets_empty_without_auto_join() {
        let cfg = RelayAccountConfig {
            auto_join: false,
            ..Default::default()
        };
        assert!(cfg.join_targets().is_empty());
    }
}
