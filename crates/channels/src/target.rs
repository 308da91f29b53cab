//! Peer addressing shared by channel plugins.
//!
//! A peer is either a channel (`#room`) or an agent (`@name`). The marker is
//! part of the id, so formatting a target is the identity function and
//! parsing a formatted target yields the same target back.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Leading marker of channel ids.
pub const CHANNEL_MARKER: char = '#';

/// Leading marker of agent ids.
pub const AGENT_MARKER: char = '@';

/// Whether a target names a channel or a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Channel,
    Agent,
}

/// A typed peer address. The id always carries the marker of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MessagingTarget {
    id: String,
    kind: TargetKind,
}

impl MessagingTarget {
    /// Parse a peer address. Never fails: anything that is not a channel is
    /// an agent, and a missing agent marker is added.
    pub fn parse(address: &str) -> Self {
        if address.starts_with(CHANNEL_MARKER) {
            Self {
                id: address.to_string(),
                kind: TargetKind::Channel,
            }
        } else if address.starts_with(AGENT_MARKER) {
            Self {
                id: address.to_string(),
                kind: TargetKind::Agent,
            }
        } else {
            Self {
                id: format!("{AGENT_MARKER}{address}"),
                kind: TargetKind::Agent,
            }
        }
    }

    /// Channel target for `name`, adding the channel marker when missing.
    pub fn channel(name: &str) -> Self {
        let id = if name.starts_with(CHANNEL_MARKER) {
            name.to_string()
        } else {
            format!("{CHANNEL_MARKER}{name}")
        };
        Self {
            id,
            kind: TargetKind::Channel,
        }
    }

    /// Agent target for `name`, adding the agent marker when missing.
    pub fn agent(name: &str) -> Self {
        let id = if name.starts_with(AGENT_MARKER) {
            name.to_string()
        } else {
            format!("{AGENT_MARKER}{name}")
        };
        Self {
            id,
            kind: TargetKind::Agent,
        }
    }

    /// Wire form of the target. The id already carries its marker.
    pub fn format(&self) -> &str {
        &self.id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn is_channel(&self) -> bool {
        self.kind == TargetKind::Channel
    }
}

impl fmt::Display for MessagingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl FromStr for MessagingTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for MessagingTarget {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<MessagingTarget> for String {
    fn from(value: MessagingTarget) -> Self {
        value.id
    }
}

/// Free-function form of [`MessagingTarget::parse`].
pub fn parse_target(address: &str) -> MessagingTarget {
    MessagingTarget::parse(address)
}

/// Free-function form of [`MessagingTarget::format`].
pub fn format_target(target: &MessagingTarget) -> &str {
    target.format()
}
