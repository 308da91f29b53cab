use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use {
    tether_channels::{StatusSink, StatusUpdate},
    tokio_util::sync::CancellationToken,
};

#[cfg(feature = "metrics")]
use tether_metrics::{channels as ch_metrics, gauge};

use crate::client::ClientHandle;

/// Live connection per account. At most one handle per account id; a
/// reconnect replaces the handle wholesale.
///
/// Cloning shares the same map.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, ClientHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `client` for `account_id`, returning the handle it replaced.
    pub fn set(&self, account_id: &str, client: ClientHandle) -> Option<ClientHandle> {
        let mut map = self.connections.write().unwrap_or_else(|e| e.into_inner());
        let previous = map.insert(account_id.to_string(), client);
        #[cfg(feature = "metrics")]
        gauge!(ch_metrics::CONNECTED_ACCOUNTS).set(map.len() as f64);
        previous
    }

    /// Like [`set`](Self::set), but refuses once `cancel` has fired.
    ///
    /// The check happens under the write lock, so a concurrent stop that
    /// cancels and then deletes can never leave a stale entry behind.
    pub fn set_unless_cancelled(
        &self,
        account_id: &str,
        client: ClientHandle,
        cancel: &CancellationToken,
    ) -> bool {
        let mut map = self.connections.write().unwrap_or_else(|e| e.into_inner());
        if cancel.is_cancelled() {
            return false;
        }
        map.insert(account_id.to_string(), client);
        #[cfg(feature = "metrics")]
        gauge!(ch_metrics::CONNECTED_ACCOUNTS).set(map.len() as f64);
        true
    }

    pub fn get(&self, account_id: &str) -> Option<ClientHandle> {
        let map = self.connections.read().unwrap_or_else(|e| e.into_inner());
        map.get(account_id).cloned()
    }

    pub fn delete(&self, account_id: &str) -> Option<ClientHandle> {
        let mut map = self.connections.write().unwrap_or_else(|e| e.into_inner());
        let removed = map.remove(account_id);
        #[cfg(feature = "metrics")]
        gauge!(ch_metrics::CONNECTED_ACCOUNTS).set(map.len() as f64);
        removed
    }

    /// Remove the entry only if it still points at `client`.
    pub fn delete_if_current(&self, account_id: &str, client: &ClientHandle) -> bool {
        let mut map = self.connections.write().unwrap_or_else(|e| e.into_inner());
        let is_current = map
            .get(account_id)
            .is_some_and(|current| Arc::ptr_eq(current, client));
        if is_current {
            map.remove(account_id);
            #[cfg(feature = "metrics")]
            gauge!(ch_metrics::CONNECTED_ACCOUNTS).set(map.len() as f64);
        }
        is_current
    }

    /// Whether the account has a handle that reports itself live.
    pub fn is_connected(&self, account_id: &str) -> bool {
        self.get(account_id).is_some_and(|c| c.is_connected())
    }

    pub fn account_ids(&self) -> Vec<String> {
        let map = self.connections.read().unwrap_or_else(|e| e.into_inner());
        map.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let map = self.connections.read().unwrap_or_else(|e| e.into_inner());
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reconnect bookkeeping for one account. Only its supervisor writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectState {
    /// Consecutive failures since the last successful connect.
    pub attempt: u32,
    pub stopped: bool,
}

/// The connection a single session currently serves, shared between its
/// supervisor and its handle. Unlike the registry it is never touched by
/// another session for the same account id.
#[derive(Clone, Default)]
pub struct SessionConnection {
    current: Arc<Mutex<Option<ClientHandle>>>,
}

impl SessionConnection {
    pub fn set(&self, client: ClientHandle) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(client);
    }

    pub fn take(&self) -> Option<ClientHandle> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Clear the slot only if it still holds `client`.
    pub fn clear_if_current(&self, client: &ClientHandle) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, client)) {
            *current = None;
        }
    }
}

/// Status sink bound to one account that goes quiet once the account is
/// stopped.
#[derive(Clone)]
pub struct StatusReporter {
    account_id: String,
    sink: Arc<dyn StatusSink>,
    cancel: CancellationToken,
}

impl StatusReporter {
    pub fn new(account_id: &str, sink: Arc<dyn StatusSink>, cancel: CancellationToken) -> Self {
        Self {
            account_id: account_id.to_string(),
            sink,
            cancel,
        }
    }

    pub fn report(&self, status: StatusUpdate) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.sink.update(&self.account_id, status);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::test_support::{FakeClient, RecordingStatus},
        tether_channels::ConnectionState,
    };

    fn handle(identity: &str) -> ClientHandle {
        let (client, _events) = FakeClient::new(identity);
        client
    }

    #[test]
    fn set_get_delete() {
        let registry = ConnectionRegistry::new();
        assert!(registry.get("a").is_none());

        let client = handle("@bot");
        assert!(registry.set("a", Arc::clone(&client)).is_none());
        assert!(Arc::ptr_eq(&registry.get("a").unwrap(), &client));
        assert!(registry.is_connected("a"));

        assert!(registry.delete("a").is_some());
        assert!(registry.get("a").is_none());
        assert!(registry.delete("a").is_none());
    }

    #[test]
    fn set_replaces_previous_handle() {
        let registry = ConnectionRegistry::new();
        let old = handle("@old");
        let new = handle("@new");
        registry.set("a", Arc::clone(&old));
        let replaced = registry.set("a", Arc::clone(&new)).unwrap();
        assert!(Arc::ptr_eq(&replaced, &old));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().identity(), "@new");
    }

    #[test]
    fn delete_if_current_ignores_stale_handles() {
        let registry = ConnectionRegistry::new();
        let old = handle("@old");
        let new = handle("@new");
        registry.set("a", Arc::clone(&new));
        assert!(!registry.delete_if_current("a", &old));
        assert!(registry.get("a").is_some());
        assert!(registry.delete_if_current("a", &new));
        assert!(registry.is_empty());
    }

    #[test]
    fn set_unless_cancelled_refuses_after_cancel() {
        let registry = ConnectionRegistry::new();
        let cancel = CancellationToken::new();
        assert!(registry.set_unless_cancelled("a", handle("@bot"), &cancel));
        registry.delete("a");
        cancel.cancel();
        assert!(!registry.set_unless_cancelled("a", handle("@bot"), &cancel));
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn dead_handle_is_not_connected() {
        let registry = ConnectionRegistry::new();
        let (client, _events) = FakeClient::new("@bot");
        registry.set("a", client.clone());
        client.drop_connection("network down");
        assert!(registry.get("a").is_some());
        assert!(!registry.is_connected("a"));
    }

    #[test]
    fn clones_share_entries() {
        let registry = ConnectionRegistry::new();
        let view = registry.clone();
        registry.set("a", handle("@bot"));
        registry.set("b", handle("@bot"));
        let mut ids = view.account_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn session_connection_clears_only_its_own_client() {
        let slot = SessionConnection::default();
        let old = handle("@old");
        let new = handle("@new");

        slot.set(Arc::clone(&new));
        slot.clear_if_current(&old);
        assert!(Arc::ptr_eq(&slot.take().unwrap(), &new));
        assert!(slot.take().is_none());

        slot.set(Arc::clone(&old));
        slot.clear_if_current(&old);
        assert!(slot.take().is_none());
    }

    #[test]
    fn reporter_goes_quiet_after_cancel() {
        let status = Arc::new(RecordingStatus::default());
        let cancel = CancellationToken::new();
        let reporter = StatusReporter::new("main", status.clone(), cancel.clone());

        reporter.report(StatusUpdate::connected());
        cancel.cancel();
        reporter.report(StatusUpdate::error("late"));

        assert_eq!(status.states(), vec![ConnectionState::Connected]);
    }
}
