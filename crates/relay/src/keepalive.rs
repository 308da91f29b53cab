//! Ping/pong liveness checks for one connection.
//!
//! Every interval the monitor pings the relay. If the previous ping was not
//! answered by the next tick, the connection is considered dead and is
//! disconnected; the transport's disconnect event then drives the normal
//! reconnect path.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    tether_channels::StatusUpdate,
    tokio::{
        task::JoinHandle,
        time::{Instant, MissedTickBehavior},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use tether_metrics::{counter, relay as relay_metrics};

use crate::{
    client::{ClientHandle, RelayClient},
    state::StatusReporter,
};

/// Interval between pings.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Result of a single keepalive tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveTick {
    /// Ping sent; waiting for the pong.
    Pinged,
    /// Connection already gone.
    Closed,
    /// Previous ping was never answered.
    TimedOut,
    /// Ping refused because the socket is closing.
    PingFailed,
}

/// One keepalive step.
///
/// `pong_received` is reset to pending whenever a ping goes out.
pub fn tick(client: &dyn RelayClient, pong_received: &AtomicBool) -> KeepaliveTick {
    if !client.is_connected() {
        return KeepaliveTick::Closed;
    }
    if !pong_received.swap(false, Ordering::AcqRel) {
        return KeepaliveTick::TimedOut;
    }
    match client.ping() {
        Ok(()) => KeepaliveTick::Pinged,
        Err(_) => KeepaliveTick::PingFailed,
    }
}

/// Keepalive loop scoped to one connection handle.
///
/// Stopping (or dropping) the monitor cancels its timer.
pub struct KeepaliveMonitor {
    pong_received: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<KeepaliveTick>>,
}

impl KeepaliveMonitor {
    /// Start pinging `client` every `interval`. The monitor also stops when
    /// `parent` is cancelled.
    pub fn start(
        account_id: &str,
        client: ClientHandle,
        status: StatusReporter,
        parent: &CancellationToken,
        interval: Duration,
    ) -> Self {
        let pong_received = Arc::new(AtomicBool::new(true));
        let cancel = parent.child_token();
        let task = tokio::spawn(run(
            account_id.to_string(),
            client,
            Arc::clone(&pong_received),
            status,
            cancel.clone(),
            interval,
        ));
        Self {
            pong_received,
            cancel,
            task: Some(task),
        }
    }

    /// Record a liveness acknowledgment.
    pub fn pong(&self) {
        self.pong_received.store(true, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for KeepaliveMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    account_id: String,
    client: ClientHandle,
    pong_received: Arc<AtomicBool>,
    status: StatusReporter,
    cancel: CancellationToken,
    interval: Duration,
) -> KeepaliveTick {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(account_id, "keepalive stopped");
                return KeepaliveTick::Closed;
            },
            _ = ticker.tick() => {},
        }

        match tick(client.as_ref(), &pong_received) {
            KeepaliveTick::Pinged => {
                debug!(account_id, "keepalive ping sent");
            },
            KeepaliveTick::Closed => {
                debug!(account_id, "connection no longer live, keepalive exiting");
                return KeepaliveTick::Closed;
            },
            KeepaliveTick::TimedOut => {
                if cancel.is_cancelled() {
                    return KeepaliveTick::Closed;
                }
                warn!(
                    account_id,
                    interval_secs = interval.as_secs(),
                    "no pong since last ping, dropping connection"
                );
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::KEEPALIVE_TIMEOUTS_TOTAL).increment(1);
                status.report(StatusUpdate::error("Ping timeout"));
                client.disconnect();
                return KeepaliveTick::TimedOut;
            },
            KeepaliveTick::PingFailed => {
                debug!(account_id, "ping refused while closing, keepalive exiting");
                return KeepaliveTick::PingFailed;
            },
        }
    }
}
