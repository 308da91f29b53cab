//! Account session orchestration: the entry point that wires registry,
//! supervisor, dispatcher and keepalive together for one account.

use std::sync::Arc;

use {
    tether_channels::{ChannelEventSink, StatusSink, StatusUpdate},
    tokio::{sync::watch, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{
    Error, Result,
    client::RelayConnector,
    config::RelayAccountConfig,
    state::{ConnectionRegistry, SessionConnection, StatusReporter},
    supervisor::{Supervisor, SupervisorParts, SupervisorState},
};

/// Shared collaborators for starting account sessions.
#[derive(Clone)]
pub struct SessionContext {
    pub connector: Arc<dyn RelayConnector>,
    pub registry: ConnectionRegistry,
    pub event_sink: Option<Arc<dyn ChannelEventSink>>,
    pub status_sink: Arc<dyn StatusSink>,
    /// Cancelling this stops every session started from the context.
    pub abort: CancellationToken,
}

/// Handle to a running account session.
///
/// Dropping the handle stops the session.
pub struct SessionHandle {
    account_id: String,
    cancel: CancellationToken,
    registry: ConnectionRegistry,
    live: SessionConnection,
    state: watch::Receiver<SupervisorState>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("account_id", &self.account_id)
            .field("state", &*self.state.borrow())
            .field("stopped", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn state(&self) -> SupervisorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    /// Wait until the supervisor reaches a state matching `predicate`.
    /// Returns the last observed state if the supervisor exits first.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SupervisorState) -> bool,
    ) -> SupervisorState {
        let observed = self.state.wait_for(predicate).await.map(|state| state.clone());
        observed.unwrap_or_else(|_| self.state.borrow().clone())
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Stop the session: cancels any backoff timer and the keepalive loop,
    /// disconnects the live connection and drops it from the registry.
    ///
    /// Idempotent, and safe after the connection already dropped on its own.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        info!(account_id = self.account_id, "stopping relay account");
        self.cancel.cancel();
        if let Some(client) = self.live.take() {
            self.registry.delete_if_current(&self.account_id, &client);
            client.disconnect();
        }
    }

    /// Wait for the supervisor task to exit.
    pub async fn join(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.await {
            warn!(account_id = self.account_id, error = %e, "relay supervisor task failed");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start one account: connect, join rooms, attach the inbound dispatcher,
/// keepalive and reconnect supervisor, and hand back a stop handle.
///
/// A failure of this first connect is returned to the caller; only drops of
/// an established connection are retried.
pub async fn start_account(
    account_id: &str,
    config: RelayAccountConfig,
    ctx: &SessionContext,
) -> Result<SessionHandle> {
    let cancel = ctx.abort.child_token();
    let status = StatusReporter::new(account_id, Arc::clone(&ctx.status_sink), cancel.clone());

    info!(account_id, server = config.server_url, "starting relay account");
    status.report(StatusUpdate::connecting(format!(
        "Connecting to {}",
        config.server_url
    )));

    let live = SessionConnection::default();
    let mut supervisor = Supervisor::new(SupervisorParts {
        account_id: account_id.to_string(),
        config,
        connector: Arc::clone(&ctx.connector),
        registry: ctx.registry.clone(),
        event_sink: ctx.event_sink.clone(),
        status: status.clone(),
        cancel: cancel.clone(),
        live: live.clone(),
    });

    let connection = match supervisor.connect().await {
        Ok(Some(connection)) => connection,
        Ok(None) => return Err(Error::message("relay account start cancelled")),
        Err(e) => {
            warn!(account_id, error = %e, "initial relay connect failed");
            status.report(StatusUpdate::error(format!("Connection failed: {e}")));
            cancel.cancel();
            return Err(e);
        },
    };

    let state = supervisor.subscribe();
    let task = tokio::spawn(supervisor.run(Some(connection)));

    Ok(SessionHandle {
        account_id: account_id.to_string(),
        cancel,
        registry: ctx.registry.clone(),
        live,
        state,
        task: Some(task),
    })
}
