// Hub: the single task that owns the aggregate state and the connection registry.
// Everything else reaches it through channels: records from probes, commands from
// the HTTP side. Merges and broadcasts are therefore strictly serialized.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, interval, interval_at};

use crate::aggregator::AggregateState;
use crate::models::StatusRecord;
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};

/// Requests from the HTTP side. Registry membership only changes through these.
pub enum HubCommand<C> {
    Attach { id: ConnectionId, conn: C },
    Detach(ConnectionId),
    Snapshot(oneshot::Sender<Vec<StatusRecord>>),
    Stats(oneshot::Sender<HubStats>),
}

/// Counters exposed on GET /api/stats and in the periodic "app stats" log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub clients: usize,
    pub servers: usize,
    pub merges_total: u64,
}

/// Hub channel sizes and timings.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub command_capacity: usize,
    pub send_timeout: Duration,
    pub ping_interval: Duration,
    pub stats_log_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            send_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
            stats_log_interval: Duration::from_secs(60),
        }
    }
}

/// Cheap, cloneable front door to a running hub.
pub struct HubHandle<C> {
    records: mpsc::Sender<StatusRecord>,
    commands: mpsc::Sender<HubCommand<C>>,
    next_id: Arc<AtomicU64>,
}

impl<C> Clone for HubHandle<C> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            commands: self.commands.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<C: Connection> HubHandle<C> {
    /// Fan-in channel for poll results.
    pub fn records(&self) -> mpsc::Sender<StatusRecord> {
        self.records.clone()
    }

    pub async fn submit(&self, record: StatusRecord) -> anyhow::Result<()> {
        self.records
            .send(record)
            .await
            .map_err(|_| anyhow::anyhow!("hub stopped"))
    }

    /// Hand a freshly upgraded connection to the hub; it owns it from here on.
    pub async fn attach(&self, conn: C) -> anyhow::Result<ConnectionId> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.command(HubCommand::Attach { id, conn }).await?;
        Ok(id)
    }

    pub async fn detach(&self, id: ConnectionId) -> anyhow::Result<()> {
        self.command(HubCommand::Detach(id)).await
    }

    pub async fn snapshot(&self) -> anyhow::Result<Vec<StatusRecord>> {
        let (tx, rx) = oneshot::channel();
        self.command(HubCommand::Snapshot(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn stats(&self) -> anyhow::Result<HubStats> {
        let (tx, rx) = oneshot::channel();
        self.command(HubCommand::Stats(tx)).await?;
        Ok(rx.await?)
    }

    async fn command(&self, cmd: HubCommand<C>) -> anyhow::Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("hub stopped"))
    }
}

/// State owned by the hub task.
pub struct Hub<C> {
    state: AggregateState,
    registry: ConnectionRegistry<C>,
    merges_total: u64,
}

impl<C: Connection> Hub<C> {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            state: AggregateState::new(),
            registry: ConnectionRegistry::new(send_timeout),
            merges_total: 0,
        }
    }

    /// Merge one record, then push the fresh snapshot to every client.
    pub async fn apply(&mut self, record: StatusRecord) {
        self.state.merge(record);
        self.merges_total += 1;
        if self.registry.is_empty() {
            return;
        }
        if let Some(text) = self.encode_snapshot() {
            self.registry.broadcast(text).await;
        }
    }

    pub async fn handle(&mut self, cmd: HubCommand<C>) {
        match cmd {
            HubCommand::Attach { id, conn } => {
                self.registry.attach(id, conn);
                tracing::info!(connection = %id, clients = self.registry.len(), "dashboard client attached");
                // Late joiners get the current state instead of waiting for the next merge.
                if !self.state.is_empty()
                    && let Some(text) = self.encode_snapshot()
                {
                    self.registry.send_to(id, text).await;
                }
            }
            HubCommand::Detach(id) => {
                if self.registry.detach(id).await {
                    tracing::info!(connection = %id, clients = self.registry.len(), "dashboard client detached");
                }
            }
            HubCommand::Snapshot(reply) => {
                let _ = reply.send(self.state.snapshot());
            }
            HubCommand::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            clients: self.registry.len(),
            servers: self.state.len(),
            merges_total: self.merges_total,
        }
    }

    fn encode_snapshot(&self) -> Option<Utf8Bytes> {
        match serde_json::to_string(&self.state.snapshot()) {
            Ok(json) => Some(json.into()),
            Err(e) => {
                tracing::error!(error = %e, operation = "encode_snapshot", "snapshot serialization failed");
                None
            }
        }
    }
}

/// Spawns the hub task. It runs until `shutdown_rx` fires, then closes every client.
pub fn spawn<C: Connection>(
    config: HubConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> (HubHandle<C>, tokio::task::JoinHandle<()>) {
    let (records_tx, mut records_rx) = mpsc::channel(config.command_capacity);
    let (commands_tx, mut commands_rx) = mpsc::channel(config.command_capacity);
    let handle = HubHandle {
        records: records_tx,
        commands: commands_tx,
        next_id: Arc::new(AtomicU64::new(1)),
    };

    let task = tokio::spawn(async move {
        let mut hub = Hub::<C>::new(config.send_timeout);
        // No clients exist at startup; the first heartbeat is one interval out.
        let mut ping_tick =
            interval_at(Instant::now() + config.ping_interval, config.ping_interval);
        ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(config.stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            // Records first: anything submitted before a command is sent is merged
            // before that command is handled.
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    tracing::debug!("Hub shutting down");
                    break;
                }
                Some(record) = records_rx.recv() => hub.apply(record).await,
                Some(cmd) = commands_rx.recv() => hub.handle(cmd).await,
                _ = ping_tick.tick() => hub.registry.ping_all().await,
                _ = stats_log_tick.tick() => {
                    let stats = hub.stats();
                    tracing::info!(
                        ws_clients = stats.clients,
                        servers = stats.servers,
                        merges_total = stats.merges_total,
                        "app stats"
                    );
                }
            }
        }
        hub.registry.close_all().await;
    });

    (handle, task)
}
