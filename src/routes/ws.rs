// WebSocket dashboard endpoint. The outbound half of each socket is handed to the hub;
// this side only watches the inbound half for the client going away.

use axum::{
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::oneshot;

use super::AppState;
use crate::hub::HubHandle;
use crate::registry::Connection;

/// Outbound half of a dashboard WebSocket, owned by the hub while attached.
/// Closing or dropping it releases the matching reader task.
pub struct WsConnection {
    sink: SplitSink<WebSocket, Message>,
    closed_tx: oneshot::Sender<()>,
}

impl WsConnection {
    fn new(sink: SplitSink<WebSocket, Message>) -> (Self, oneshot::Receiver<()>) {
        let (closed_tx, closed_rx) = oneshot::channel();
        (
            Self { sink, closed_tx },
            closed_rx,
        )
    }
}

impl Connection for WsConnection {
    async fn send_text(&mut self, text: Utf8Bytes) -> anyhow::Result<()> {
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn send_ping(&mut self) -> anyhow::Result<()> {
        self.sink.send(Message::Ping(Bytes::new())).await?;
        Ok(())
    }

    async fn close(self) {
        let Self {
            mut sink,
            closed_tx,
        } = self;
        // Wake the reader before the handshake; the registry may abandon this future.
        drop(closed_tx);
        let _ = sink.close().await;
    }
}

pub(super) async fn ws_dashboard(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_failed_upgrade(|e| tracing::error!(error = %e, "Error upgrading connection"))
        .on_upgrade(move |socket| async move {
            if let Err(e) = stream_dashboard(socket, hub).await {
                tracing::info!("Dashboard stream error: {}", e);
            }
        })
}

async fn stream_dashboard(
    socket: WebSocket,
    hub: HubHandle<WsConnection>,
) -> anyhow::Result<()> {
    let (sink, inbound) = socket.split();
    let (conn, closed_rx) = WsConnection::new(sink);
    let id = hub.attach(conn).await?;
    tracing::info!(connection = %id, "Client connected to dashboard stream");

    read_until_closed(inbound, closed_rx).await;

    tracing::info!(connection = %id, "Client disconnected from dashboard stream");
    hub.detach(id).await
}

/// Drain client frames until the client closes, the socket errors, or the hub drops
/// the outbound half. Clients never send data; anything but Close is ignored.
async fn read_until_closed<S, E>(mut inbound: S, mut closed_rx: oneshot::Receiver<()>)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        tokio::select! {
            msg = inbound.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut closed_rx => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn reader_stops_when_hub_drops_connection() {
        let (closed_tx, closed_rx) = oneshot::channel::<()>();
        let inbound = stream::pending::<Result<Message, axum::Error>>();
        let reader = tokio::spawn(read_until_closed(inbound, closed_rx));
        drop(closed_tx);
        timeout(Duration::from_secs(2), reader)
            .await
            .expect("reader must stop once the outbound half is gone")
            .unwrap();
    }

    #[tokio::test]
    async fn reader_ignores_client_data_until_close() {
        let (_closed_tx, closed_rx) = oneshot::channel::<()>();
        let inbound = stream::iter(vec![
            Ok::<_, axum::Error>(Message::Text("hello".into())),
            Ok(Message::Pong(Bytes::new())),
            Ok(Message::Close(None)),
            Ok(Message::Text("after close".into())),
        ]);
        timeout(Duration::from_secs(2), read_until_closed(inbound, closed_rx))
            .await
            .expect("close frame ends the reader");
    }
}
