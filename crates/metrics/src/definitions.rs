//! Metric name and label definitions.
//!
//! Every metric recorded by tether is named here so dashboards have a single
//! place to look.

/// Channel-agnostic metrics
pub mod channels {
    /// Number of channel accounts with a live connection
    pub const CONNECTED_ACCOUNTS: &str = "tether_channel_connected_accounts";
    /// Inbound messages handed to the host runtime
    pub const MESSAGES_DISPATCHED_TOTAL: &str = "tether_channel_messages_dispatched_total";
}

/// Relay channel metrics
pub mod relay {
    /// Connect calls issued to the relay (initial and reconnect)
    pub const CONNECT_ATTEMPTS_TOTAL: &str = "tether_relay_connect_attempts_total";
    /// Connect calls that failed
    pub const CONNECT_ERRORS_TOTAL: &str = "tether_relay_connect_errors_total";
    /// Successful reconnects after a drop
    pub const RECONNECTS_TOTAL: &str = "tether_relay_reconnects_total";
    /// Accounts that exhausted their reconnect budget
    pub const GAVE_UP_TOTAL: &str = "tether_relay_gave_up_total";
    /// Backoff delay chosen before a reconnect, in seconds
    pub const BACKOFF_DELAY_SECONDS: &str = "tether_relay_backoff_delay_seconds";
    /// Connections dropped because no pong arrived in time
    pub const KEEPALIVE_TIMEOUTS_TOTAL: &str = "tether_relay_keepalive_timeouts_total";
    /// Room joins that failed
    pub const JOIN_ERRORS_TOTAL: &str = "tether_relay_join_errors_total";
    /// Inbound messages received from the relay
    pub const MESSAGES_RECEIVED_TOTAL: &str = "tether_relay_messages_received_total";
    /// Host dispatch calls that failed
    pub const DISPATCH_ERRORS_TOTAL: &str = "tether_relay_dispatch_errors_total";
    /// Outbound messages delivered
    pub const MESSAGES_SENT_TOTAL: &str = "tether_relay_messages_sent_total";
    /// Outbound sends that failed
    pub const SEND_ERRORS_TOTAL: &str = "tether_relay_send_errors_total";
}
