// Connection registry: attached dashboard clients, owned by the hub task.
// Mutated only from the hub, so it carries no lock.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use axum::extract::ws::Utf8Bytes;
use tokio::time::{Duration, timeout};

/// Identifies one attached dashboard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outbound half of a dashboard transport.
pub trait Connection: Send + 'static {
    fn send_text(&mut self, text: Utf8Bytes) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn send_ping(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Best-effort close; errors are ignored.
    fn close(self) -> impl Future<Output = ()> + Send;
}

pub struct ConnectionRegistry<C> {
    connections: HashMap<ConnectionId, C>,
    send_timeout: Duration,
}

impl<C: Connection> ConnectionRegistry<C> {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            send_timeout,
        }
    }

    pub fn attach(&mut self, id: ConnectionId, conn: C) {
        self.connections.insert(id, conn);
    }

    /// Remove and close a connection. Returns false if it was already gone.
    /// The close handshake is bounded by the send timeout; a peer that never drains
    /// its socket is simply dropped.
    pub async fn detach(&mut self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some(conn) => {
                close_bounded(self.send_timeout, id, conn).await;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Push `text` to every connection, one at a time. Connections whose push fails
    /// or times out are closed and removed. Returns the number of successful pushes.
    pub async fn broadcast(&mut self, text: Utf8Bytes) -> usize {
        let send_timeout = self.send_timeout;
        let mut failed = Vec::new();
        for (id, conn) in self.connections.iter_mut() {
            if let Err(e) = push(send_timeout, conn.send_text(text.clone())).await {
                tracing::error!(connection = %id, error = %e, "push to dashboard client failed");
                failed.push(*id);
            }
        }
        let delivered = self.connections.len() - failed.len();
        self.prune(failed).await;
        delivered
    }

    /// Push `text` to a single connection, pruning it on failure.
    pub async fn send_to(&mut self, id: ConnectionId, text: Utf8Bytes) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            return false;
        };
        match push(self.send_timeout, conn.send_text(text)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(connection = %id, error = %e, "push to dashboard client failed");
                self.prune(vec![id]).await;
                false
            }
        }
    }

    /// Heartbeat every connection; dead ones are pruned like failed pushes.
    pub async fn ping_all(&mut self) {
        let send_timeout = self.send_timeout;
        let mut failed = Vec::new();
        for (id, conn) in self.connections.iter_mut() {
            if let Err(e) = push(send_timeout, conn.send_ping()).await {
                tracing::debug!(connection = %id, error = %e, "ping failed");
                failed.push(*id);
            }
        }
        self.prune(failed).await;
    }

    pub async fn close_all(&mut self) {
        let send_timeout = self.send_timeout;
        for (id, conn) in self.connections.drain() {
            close_bounded(send_timeout, id, conn).await;
        }
    }

    async fn prune(&mut self, ids: Vec<ConnectionId>) {
        for id in ids {
            if self.detach(id).await {
                tracing::info!(connection = %id, clients = self.connections.len(), "dashboard client removed");
            }
        }
    }
}

async fn close_bounded<C: Connection>(send_timeout: Duration, id: ConnectionId, conn: C) {
    if timeout(send_timeout, conn.close()).await.is_err() {
        tracing::debug!(connection = %id, "close handshake timed out; dropping connection");
    }
}

async fn push(
    send_timeout: Duration,
    fut: impl Future<Output = anyhow::Result<()>>,
) -> anyhow::Result<()> {
    timeout(send_timeout, fut)
        .await
        .map_err(|_| anyhow::anyhow!("send timed out after {:?}", send_timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    enum TestConnection {
        Channel(mpsc::UnboundedSender<String>),
        /// Peer that never drains its socket: pushes and close never complete.
        Stalled,
    }

    impl Connection for TestConnection {
        async fn send_text(&mut self, text: Utf8Bytes) -> anyhow::Result<()> {
            match self {
                TestConnection::Channel(tx) => {
                    tx.send(text.as_str().to_string())?;
                    Ok(())
                }
                TestConnection::Stalled => std::future::pending().await,
            }
        }

        async fn send_ping(&mut self) -> anyhow::Result<()> {
            match self {
                TestConnection::Channel(tx) => {
                    anyhow::ensure!(!tx.is_closed(), "peer gone");
                    Ok(())
                }
                TestConnection::Stalled => std::future::pending().await,
            }
        }

        async fn close(self) {
            if let TestConnection::Stalled = self {
                std::future::pending::<()>().await;
            }
        }
    }

    fn conn() -> (TestConnection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TestConnection::Channel(tx), rx)
    }

    #[tokio::test]
    async fn stalled_connection_is_pruned_within_send_timeout() {
        let mut registry = ConnectionRegistry::new(Duration::from_millis(100));
        let (a, mut a_rx) = conn();
        registry.attach(ConnectionId(1), a);
        registry.attach(ConnectionId(2), TestConnection::Stalled);

        let delivered = timeout(Duration::from_secs(2), registry.broadcast("update".into()))
            .await
            .expect("broadcast must not hang on a stalled peer");
        assert_eq!(delivered, 1);
        assert!(registry.contains(ConnectionId(1)));
        assert!(!registry.contains(ConnectionId(2)));
        assert_eq!(a_rx.recv().await.as_deref(), Some("update"));

        assert_eq!(registry.broadcast("next".into()).await, 1);
        assert_eq!(a_rx.recv().await.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn close_all_does_not_hang_on_stalled_peer() {
        let mut registry = ConnectionRegistry::new(Duration::from_millis(100));
        let (a, _a_rx) = conn();
        registry.attach(ConnectionId(1), a);
        registry.attach(ConnectionId(2), TestConnection::Stalled);
        timeout(Duration::from_secs(2), registry.close_all())
            .await
            .expect("close_all must not hang on a stalled peer");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn failed_push_prunes_only_the_failing_connection() {
        let mut registry = ConnectionRegistry::new(Duration::from_secs(1));
        let (a, mut a_rx) = conn();
        let (c, c_rx) = conn();
        registry.attach(ConnectionId(1), a);
        registry.attach(ConnectionId(2), c);
        drop(c_rx);

        assert_eq!(registry.broadcast("first".into()).await, 1);
        assert!(registry.contains(ConnectionId(1)));
        assert!(!registry.contains(ConnectionId(2)));

        assert_eq!(registry.broadcast("second".into()).await, 1);
        assert_eq!(a_rx.recv().await.as_deref(), Some("first"));
        assert_eq!(a_rx.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn ping_prunes_closed_peers() {
        let mut registry = ConnectionRegistry::new(Duration::from_secs(1));
        let (a, _a_rx) = conn();
        let (b, b_rx) = conn();
        registry.attach(ConnectionId(1), a);
        registry.attach(ConnectionId(2), b);
        drop(b_rx);
        registry.ping_all().await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn detach_is_idempotent() {
        let mut registry = ConnectionRegistry::new(Duration::from_secs(1));
        let (a, _a_rx) = conn();
        registry.attach(ConnectionId(7), a);
        assert!(registry.detach(ConnectionId(7)).await);
        assert!(!registry.detach(ConnectionId(7)).await);
        assert!(registry.is_empty());
    }
}
