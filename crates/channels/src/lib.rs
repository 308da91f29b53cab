//! Channel plugin system.
//!
//! Each channel implements the ChannelPlugin trait with sub-traits for
//! outbound messaging and status, and reports inbound messages to a host
//! `ChannelEventSink` and connection changes to a `StatusSink`.

pub mod error;
pub mod plugin;
pub mod status;
pub mod target;

pub use {
    error::{Error, Result},
    plugin::{
        ChannelEventSink, ChannelHealthSnapshot, ChannelOutbound, ChannelPlugin, ChannelStatus,
        InboundEvent, SendResult,
    },
    status::{ConnectionState, NoopStatusSink, StatusSink, StatusUpdate},
    target::{MessagingTarget, TargetKind, format_target, parse_target},
};
