//! In-memory transport and host doubles shared by the relay tests.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {
    anyhow::anyhow,
    async_trait::async_trait,
    tether_channels::{
        ChannelEventSink, ConnectionState, InboundEvent, StatusSink, StatusUpdate,
    },
    tokio::sync::mpsc,
};

use crate::{
    Error, Result,
    client::{RelayClient, RelayConnection, RelayConnector, RelayEvent},
    config::RelayAccountConfig,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: String,
    pub text: String,
    pub reply_to: Option<String>,
}

pub struct FakeClient {
    identity: String,
    connected: AtomicBool,
    auto_pong: AtomicBool,
    fail_pings: AtomicBool,
    send_error: Mutex<Option<String>>,
    failing_rooms: Mutex<HashSet<String>>,
    joined: Mutex<Vec<String>>,
    join_attempts: AtomicUsize,
    sent: Mutex<Vec<SentMessage>>,
    pings: AtomicUsize,
    disconnects: AtomicUsize,
    events: mpsc::Sender<RelayEvent>,
}

impl FakeClient {
    pub fn new(identity: &str) -> (Arc<Self>, mpsc::Receiver<RelayEvent>) {
        let (events, rx) = mpsc::channel(EVENT_CAPACITY);
        let client = Arc::new(Self {
            identity: identity.to_string(),
            connected: AtomicBool::new(true),
            auto_pong: AtomicBool::new(true),
            fail_pings: AtomicBool::new(false),
            send_error: Mutex::new(None),
            failing_rooms: Mutex::new(HashSet::new()),
            joined: Mutex::new(Vec::new()),
            join_attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            pings: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            events,
        });
        (client, rx)
    }

    pub fn set_auto_pong(&self, enabled: bool) {
        self.auto_pong.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_pings(&self) {
        self.fail_pings.store(true, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, message: &str) {
        *self.send_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_rooms(&self, rooms: &[String]) {
        self.failing_rooms.lock().unwrap().extend(rooms.iter().cloned());
    }

    /// Simulate the remote side closing the connection.
    pub fn drop_connection(&self, reason: &str) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.try_send(RelayEvent::Disconnect {
                reason: Some(reason.to_string()),
            });
        }
    }

    pub async fn emit(&self, event: RelayEvent) {
        self.events.send(event).await.unwrap();
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn joined(&self) -> Vec<String> {
        self.joined.lock().unwrap().clone()
    }

    pub fn join_attempts(&self) -> usize {
        self.join_attempts.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayClient for FakeClient {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, target: &str, text: &str, reply_to: Option<&str>) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::transport("socket closed"));
        }
        if let Some(message) = self.send_error.lock().unwrap().clone() {
            return Err(Error::transport(message));
        }
        self.sent.lock().unwrap().push(SentMessage {
            target: target.to_string(),
            text: text.to_string(),
            reply_to: reply_to.map(String::from),
        });
        Ok(())
    }

    async fn join(&self, room: &str) -> Result<()> {
        self.join_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_rooms.lock().unwrap().contains(room) {
            return Err(Error::transport(format!("cannot join {room}")));
        }
        self.joined.lock().unwrap().push(room.to_string());
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        if !self.is_connected() || self.fail_pings.load(Ordering::SeqCst) {
            return Err(Error::transport("socket closing"));
        }
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.auto_pong.load(Ordering::SeqCst) {
            let _ = self.events.try_send(RelayEvent::Pong);
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.try_send(RelayEvent::Disconnect {
                reason: Some("closed by client".into()),
            });
        }
    }
}

/// Connector whose outcomes follow a simple plan: attempts numbered
/// `fail_from..fail_from + fail_count` (1-based) fail, the rest succeed.
pub struct FakeConnector {
    fail_from: usize,
    fail_count: usize,
    auto_pong: bool,
    failing_rooms: Vec<String>,
    attempts: AtomicUsize,
    clients: Mutex<Vec<Arc<FakeClient>>>,
}

impl FakeConnector {
    fn with_plan(fail_from: usize, fail_count: usize) -> Self {
        Self {
            fail_from,
            fail_count,
            auto_pong: true,
            failing_rooms: Vec::new(),
            attempts: AtomicUsize::new(0),
            clients: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy() -> Self {
        Self::with_plan(1, 0)
    }

    pub fn failing() -> Self {
        Self::with_plan(1, usize::MAX)
    }

    /// First attempt succeeds, the next `count` fail, then healthy again.
    pub fn then_fail(self, count: usize) -> Self {
        Self {
            fail_from: 2,
            fail_count: count,
            ..self
        }
    }

    pub fn with_failing_rooms(mut self, rooms: &[&str]) -> Self {
        self.failing_rooms = rooms.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn without_auto_pong(mut self) -> Self {
        self.auto_pong = false;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Clients of successful attempts, oldest first.
    pub fn clients(&self) -> Vec<Arc<FakeClient>> {
        self.clients.lock().unwrap().clone()
    }

    pub fn client(&self, index: usize) -> Arc<FakeClient> {
        Arc::clone(&self.clients.lock().unwrap()[index])
    }

    pub fn last_client(&self) -> Option<Arc<FakeClient>> {
        self.clients.lock().unwrap().last().cloned()
    }

    fn should_fail(&self, attempt: usize) -> bool {
        attempt >= self.fail_from && attempt - self.fail_from < self.fail_count
    }
}

#[async_trait]
impl RelayConnector for FakeConnector {
    async fn connect(
        &self,
        _account_id: &str,
        config: &RelayAccountConfig,
    ) -> Result<RelayConnection> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.should_fail(attempt) {
            return Err(Error::connect("connection refused"));
        }

        let (client, events) = FakeClient::new(&format!("@{}-{attempt}", config.name));
        client.set_auto_pong(self.auto_pong);
        client.fail_rooms(&self.failing_rooms);
        self.clients.lock().unwrap().push(Arc::clone(&client));
        Ok(RelayConnection { client, events })
    }
}

/// Status sink that records every update.
#[derive(Default)]
pub struct RecordingStatus {
    updates: Mutex<Vec<(String, StatusUpdate)>>,
}

impl RecordingStatus {
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|(_, update)| update.clone())
            .collect()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.updates().into_iter().map(|u| u.state).collect()
    }

    pub fn accounts(&self) -> Vec<String> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|(account_id, _)| account_id.clone())
            .collect()
    }
}

impl StatusSink for RecordingStatus {
    fn update(&self, account_id: &str, status: StatusUpdate) {
        self.updates
            .lock()
            .unwrap()
            .push((account_id.to_string(), status));
    }
}

/// Host sink that records dispatched events, or rejects them all.
#[derive(Default)]
pub struct RecordingSink {
    fail: bool,
    attempts: AtomicUsize,
    events: Mutex<Vec<InboundEvent>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<InboundEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelEventSink for RecordingSink {
    async fn dispatch(&self, event: InboundEvent) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("host rejected message"));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
