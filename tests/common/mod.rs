// Shared test helpers
#![allow(dead_code)]

use axum::extract::ws::Utf8Bytes;
use dhcpd_dashboard::hub::{self, HubConfig, HubHandle};
use dhcpd_dashboard::models::{Payload, PayloadValue, StatusRecord};
use dhcpd_dashboard::registry::Connection;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};

/// In-memory dashboard client: pushes land on a channel; dropping the receiver makes
/// every further push fail. `Stalled` models a peer that never drains its socket.
pub enum TestConnection {
    Channel(mpsc::UnboundedSender<String>),
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
                anyhow::ensure!(!tx.is_closed(), "client gone");
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

pub fn test_connection() -> (TestConnection, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TestConnection::Channel(tx), rx)
}

/// Running hub plus the sender that keeps it alive.
pub struct TestHub {
    pub handle: HubHandle<TestConnection>,
    pub task: tokio::task::JoinHandle<()>,
    pub shutdown_tx: oneshot::Sender<()>,
}

pub fn spawn_test_hub() -> TestHub {
    spawn_test_hub_with(HubConfig::default())
}

pub fn spawn_test_hub_with(config: HubConfig) -> TestHub {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (handle, task) = hub::spawn::<TestConnection>(config, shutdown_rx);
    TestHub {
        handle,
        task,
        shutdown_tx,
    }
}

pub fn online(id: &str, leases: u64) -> StatusRecord {
    let mut payload = Payload::new();
    payload.insert("leases".into(), PayloadValue::from(leases));
    StatusRecord::online(id.into(), payload)
}

/// Next pushed message, failing the test after two seconds.
pub async fn next_push(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for push")
        .expect("connection channel closed")
}
