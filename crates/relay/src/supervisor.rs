//! Per-account connection state machine.
//!
//! ```text
//! Connecting ──ok──▶ Connected ──disconnect──▶ Backoff ──timer──▶ Connecting
//!     │                                          ▲  │
//!     └────────────────fail──────────────────────┘  └─ceiling──▶ GaveUp
//! any state ──cancel──▶ Stopped
//! ```
//!
//! One task per account drives the loop, so at most one connect attempt or
//! one backoff timer exists per account at any time.

use std::{sync::Arc, time::Duration};

use {
    futures::future::join_all,
    tether_channels::{ChannelEventSink, StatusUpdate},
    tokio::{sync::watch, task::JoinSet},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

#[cfg(feature = "metrics")]
use tether_metrics::{counter, histogram, relay as relay_metrics};

use crate::{
    Result,
    backoff::backoff_delay,
    client::{ClientHandle, RelayConnection, RelayConnector, RelayEvent},
    config::RelayAccountConfig,
    handlers::InboundDispatcher,
    keepalive::{KEEPALIVE_INTERVAL, KeepaliveMonitor},
    state::{ConnectionRegistry, ReconnectState, SessionConnection, StatusReporter},
};

/// Consecutive failures after which an account gives up.
pub const RECONNECT_MAX_ATTEMPTS: u32 = 20;

/// Observable supervisor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Connecting,
    Connected,
    /// Waiting `delay` before the next connect; `attempt` failures so far.
    Backoff { attempt: u32, delay: Duration },
    Stopped,
    GaveUp,
}

impl SupervisorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::GaveUp)
    }
}

/// How a served connection ended.
enum Served {
    Disconnected(String),
    Stopped,
}

/// Everything a supervisor needs from its surroundings.
pub(crate) struct SupervisorParts {
    pub account_id: String,
    pub config: RelayAccountConfig,
    pub connector: Arc<dyn RelayConnector>,
    pub registry: ConnectionRegistry,
    pub event_sink: Option<Arc<dyn ChannelEventSink>>,
    pub status: StatusReporter,
    pub cancel: CancellationToken,
    pub live: SessionConnection,
}

pub(crate) struct Supervisor {
    account_id: String,
    config: RelayAccountConfig,
    connector: Arc<dyn RelayConnector>,
    registry: ConnectionRegistry,
    event_sink: Option<Arc<dyn ChannelEventSink>>,
    status: StatusReporter,
    cancel: CancellationToken,
    live: SessionConnection,
    reconnect: ReconnectState,
    state: watch::Sender<SupervisorState>,
    keepalive_interval: Duration,
    max_attempts: u32,
}

impl Supervisor {
    pub(crate) fn new(parts: SupervisorParts) -> Self {
        let (state, _) = watch::channel(SupervisorState::Idle);
        Self {
            account_id: parts.account_id,
            config: parts.config,
            connector: parts.connector,
            registry: parts.registry,
            event_sink: parts.event_sink,
            status: parts.status,
            cancel: parts.cancel,
            live: parts.live,
            reconnect: ReconnectState::default(),
            state,
            keepalive_interval: KEEPALIVE_INTERVAL,
            max_attempts: RECONNECT_MAX_ATTEMPTS,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SupervisorState) {
        self.state.send_replace(state);
    }

    /// One connect attempt. `Ok(None)` means the account was stopped while
    /// the attempt was in flight.
    pub(crate) async fn connect(&mut self) -> Result<Option<RelayConnection>> {
        self.set_state(SupervisorState::Connecting);
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::CONNECT_ATTEMPTS_TOTAL).increment(1);

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(None),
            result = self.connector.connect(&self.account_id, &self.config) => result,
        };

        match result {
            Ok(connection) if self.cancel.is_cancelled() => {
                connection.client.disconnect();
                Ok(None)
            },
            Ok(connection) => Ok(Some(connection)),
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::CONNECT_ERRORS_TOTAL).increment(1);
                Err(e)
            },
        }
    }

    /// Drive the account until it is stopped or gives up. `initial` is a
    /// connection that was already opened by the caller.
    pub(crate) async fn run(mut self, initial: Option<RelayConnection>) {
        let mut pending = initial;
        loop {
            if pending.is_none() && self.is_stopped() {
                break;
            }
            let connection = match pending.take() {
                Some(connection) => connection,
                None => match self.connect().await {
                    Ok(Some(connection)) => {
                        #[cfg(feature = "metrics")]
                        counter!(relay_metrics::RECONNECTS_TOTAL).increment(1);
                        connection
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(
                            account_id = self.account_id,
                            attempt = self.reconnect.attempt + 1,
                            error = %e,
                            "relay reconnect failed"
                        );
                        if !self.backoff(&e.to_string()).await {
                            break;
                        }
                        continue;
                    },
                },
            };

            match self.serve(connection).await {
                Served::Stopped => break,
                Served::Disconnected(reason) => {
                    if !self.backoff(&reason).await {
                        break;
                    }
                },
            }
        }

        self.reconnect.stopped = true;
        let gave_up = matches!(*self.state.borrow(), SupervisorState::GaveUp);
        if !gave_up {
            self.set_state(SupervisorState::Stopped);
        }
        info!(account_id = self.account_id, "relay supervisor exited");
    }

    /// Count a failure and wait out the backoff delay. Returns `false` when
    /// the account must not reconnect (stopped, or ceiling reached).
    async fn backoff(&mut self, reason: &str) -> bool {
        if self.is_stopped() {
            return false;
        }

        self.reconnect.attempt += 1;
        let attempt = self.reconnect.attempt;

        if attempt >= self.max_attempts {
            error!(
                account_id = self.account_id,
                attempts = attempt,
                reason,
                "relay reconnect attempts exhausted, giving up"
            );
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::GAVE_UP_TOTAL).increment(1);
            self.reconnect.stopped = true;
            self.set_state(SupervisorState::GaveUp);
            self.status.report(StatusUpdate::error(format!(
                "Gave up after {attempt} reconnect attempts: {reason}"
            )));
            return false;
        }

        let delay = backoff_delay(attempt);
        info!(
            account_id = self.account_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling relay reconnect"
        );
        #[cfg(feature = "metrics")]
        histogram!(relay_metrics::BACKOFF_DELAY_SECONDS).record(delay.as_secs_f64());
        self.set_state(SupervisorState::Backoff { attempt, delay });
        self.status.report(StatusUpdate::connecting(format!(
            "Reconnecting in {}s (attempt {attempt}/{})",
            delay.as_secs(),
            self.max_attempts
        )));

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => !self.is_stopped(),
        }
    }

    /// Whether the account is done reconnecting. Latches once cancelled.
    fn is_stopped(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.reconnect.stopped = true;
        }
        self.reconnect.stopped
    }

    /// Join configured rooms independently. Returns `false` if the account
    /// was stopped meanwhile.
    async fn join_rooms(&self, client: &ClientHandle) -> bool {
        let rooms = self.config.join_targets();
        if rooms.is_empty() {
            return !self.cancel.is_cancelled();
        }

        let joins = rooms.iter().map(|room| async move {
            (room, client.join(room.id()).await)
        });

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            results = join_all(joins) => {
                for (room, result) in results {
                    match result {
                        Ok(()) => info!(account_id = self.account_id, room = room.id(), "joined relay room"),
                        Err(e) => {
                            warn!(
                                account_id = self.account_id,
                                room = room.id(),
                                error = %e,
                                "failed to join relay room"
                            );
                            #[cfg(feature = "metrics")]
                            counter!(relay_metrics::JOIN_ERRORS_TOTAL).increment(1);
                        },
                    }
                }
                !self.cancel.is_cancelled()
            },
        }
    }

    /// Register, join, attach handlers, then pump events until the
    /// connection drops or the account is stopped.
    async fn serve(&mut self, connection: RelayConnection) -> Served {
        let RelayConnection { client, mut events } = connection;

        self.reconnect.attempt = 0;
        // The session handle must see the client before the registry does.
        self.live.set(Arc::clone(&client));
        if !self
            .registry
            .set_unless_cancelled(&self.account_id, Arc::clone(&client), &self.cancel)
        {
            self.live.clear_if_current(&client);
            client.disconnect();
            return Served::Stopped;
        }

        if !self.join_rooms(&client).await {
            self.live.clear_if_current(&client);
            client.disconnect();
            self.registry.delete_if_current(&self.account_id, &client);
            return Served::Stopped;
        }

        let dispatcher =
            InboundDispatcher::new(&self.account_id, client.identity(), self.event_sink.clone());
        let mut keepalive = KeepaliveMonitor::start(
            &self.account_id,
            Arc::clone(&client),
            self.status.clone(),
            &self.cancel,
            self.keepalive_interval,
        );
        let mut dispatches = JoinSet::new();

        self.set_state(SupervisorState::Connected);
        self.status.report(StatusUpdate::connected());
        info!(
            account_id = self.account_id,
            identity = client.identity(),
            server = self.config.server_url,
            "relay connected"
        );

        let reason = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    keepalive.stop();
                    dispatches.abort_all();
                    self.live.clear_if_current(&client);
                    client.disconnect();
                    self.registry.delete_if_current(&self.account_id, &client);
                    return Served::Stopped;
                },
                Some(_) = dispatches.join_next(), if !dispatches.is_empty() => {},
                event = events.recv() => match event {
                    Some(RelayEvent::Message(msg)) => {
                        let dispatcher = dispatcher.clone();
                        dispatches.spawn(async move {
                            dispatcher.handle(msg).await;
                        });
                    },
                    Some(RelayEvent::Pong) => keepalive.pong(),
                    Some(RelayEvent::Error(message)) => {
                        warn!(account_id = self.account_id, error = %message, "relay transport error");
                        self.status.report(StatusUpdate::error(message));
                    },
                    Some(RelayEvent::Disconnect { reason }) => {
                        break reason.unwrap_or_else(|| "connection closed".into());
                    },
                    None => break "event stream closed".to_string(),
                },
            }
        };

        keepalive.stop();
        dispatches.detach_all();
        self.live.clear_if_current(&client);
        self.registry.delete_if_current(&self.account_id, &client);
        info!(account_id = self.account_id, reason, "relay disconnected");
        self.status.report(StatusUpdate::disconnected(reason.clone()));
        Served::Disconnected(reason)
    }
}
