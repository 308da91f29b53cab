use std::{collections::HashMap, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use tether_channels::{
    ChannelEventSink, ChannelHealthSnapshot, ChannelOutbound, ChannelPlugin, ChannelStatus,
    NoopStatusSink, StatusSink,
};

use crate::{
    client::RelayConnector,
    config::{RelayAccountConfig, RelayChannelsConfig, list_account_ids, resolve_account},
    outbound::RelayOutbound,
    session::{SessionContext, SessionHandle, start_account},
    state::ConnectionRegistry,
    supervisor::SupervisorState,
};

/// Relay channel plugin.
pub struct RelayPlugin {
    connector: Arc<dyn RelayConnector>,
    registry: ConnectionRegistry,
    outbound: RelayOutbound,
    event_sink: Option<Arc<dyn ChannelEventSink>>,
    status_sink: Arc<dyn StatusSink>,
    shutdown: CancellationToken,
    sessions: HashMap<String, SessionHandle>,
}

impl RelayPlugin {
    pub fn new(connector: Arc<dyn RelayConnector>) -> Self {
        let registry = ConnectionRegistry::new();
        let outbound = RelayOutbound::new(registry.clone());
        Self {
            connector,
            registry,
            outbound,
            event_sink: None,
            status_sink: Arc::new(NoopStatusSink),
            shutdown: CancellationToken::new(),
            sessions: HashMap::new(),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn ChannelEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status_sink = sink;
        self
    }

    /// Tie every account to an external shutdown signal.
    pub fn with_shutdown(mut self, shutdown: &CancellationToken) -> Self {
        self.shutdown = shutdown.child_token();
        self
    }

    /// Get a shared reference to the outbound sender (for use outside the plugin).
    pub fn shared_outbound(&self) -> Arc<dyn ChannelOutbound> {
        Arc::new(self.outbound.clone())
    }

    /// Ids of started accounts, sorted.
    pub fn account_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn session_state(&self, account_id: &str) -> Option<SupervisorState> {
        self.sessions.get(account_id).map(SessionHandle::state)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    fn context(&self) -> SessionContext {
        SessionContext {
            connector: Arc::clone(&self.connector),
            registry: self.registry.clone(),
            event_sink: self.event_sink.clone(),
            status_sink: Arc::clone(&self.status_sink),
            abort: self.shutdown.clone(),
        }
    }

    async fn start_session(
        &mut self,
        account_id: &str,
        config: RelayAccountConfig,
    ) -> crate::Result<()> {
        if !config.enabled {
            return Err(tether_channels::Error::account_disabled(account_id).into());
        }

        if let Some(mut previous) = self.sessions.remove(account_id) {
            info!(account_id, "restarting relay account");
            previous.stop();
            previous.join().await;
        }

        let handle = start_account(account_id, config, &self.context()).await?;
        self.sessions.insert(account_id.to_string(), handle);
        Ok(())
    }

    /// Start every enabled account in `config`. Returns the ids that
    /// started; failures are logged and skipped.
    pub async fn start_configured(&mut self, config: &RelayChannelsConfig) -> Vec<String> {
        let mut ids = list_account_ids(config);
        ids.sort();

        let mut started = Vec::new();
        for id in ids {
            let resolved = resolve_account(config, Some(&id));
            if !resolved.enabled {
                info!(account_id = resolved.account_id, "relay account disabled, skipping");
                continue;
            }
            match self
                .start_session(&resolved.account_id, resolved.config)
                .await
            {
                Ok(()) => started.push(resolved.account_id),
                Err(e) => warn!(
                    account_id = resolved.account_id,
                    error = %e,
                    "failed to start relay account"
                ),
            }
        }
        started
    }

    /// Stop every account and wait for their supervisors to exit.
    pub async fn shutdown(&mut self) {
        for (_, mut handle) in self.sessions.drain() {
            handle.stop();
            handle.join().await;
        }
    }
}

#[async_trait]
impl ChannelPlugin for RelayPlugin {
    fn id(&self) -> &str {
        crate::CHANNEL_ID
    }

    fn name(&self) -> &str {
        "Relay"
    }

    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()> {
        let relay_config: RelayAccountConfig = serde_json::from_value(config)
            .map_err(|e| tether_channels::Error::invalid_config(account_id, e))?;
        Ok(self.start_session(account_id, relay_config).await?)
    }

    async fn stop_account(&mut self, account_id: &str) -> Result<()> {
        match self.sessions.remove(account_id) {
            Some(mut handle) => {
                handle.stop();
                handle.join().await;
            },
            None => warn!(account_id, "relay account not found"),
        }
        Ok(())
    }

    fn outbound(&self) -> Option<&dyn ChannelOutbound> {
        Some(&self.outbound)
    }

    fn status(&self) -> Option<&dyn ChannelStatus> {
        Some(self)
    }
}

#[async_trait]
impl ChannelStatus for RelayPlugin {
    async fn probe(&self, account_id: &str) -> Result<ChannelHealthSnapshot> {
        if let Some(client) = self
            .registry
            .get(account_id)
            .filter(|client| client.is_connected())
        {
            return Ok(ChannelHealthSnapshot {
                connected: true,
                account_id: account_id.to_string(),
                details: Some(format!("Identity: {}", client.identity())),
            });
        }

        let details = match self.session_state(account_id) {
            None => "account not started".to_string(),
            Some(SupervisorState::Backoff { attempt, delay }) => {
                format!("Reconnecting in {}s (attempt {attempt})", delay.as_secs())
            },
            Some(SupervisorState::GaveUp) => "Gave up reconnecting".to_string(),
            Some(state) => format!("{state:?}"),
        };
        Ok(ChannelHealthSnapshot {
            connected: false,
            account_id: account_id.to_string(),
            details: Some(details),
        })
    }
}
