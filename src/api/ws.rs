// =============================================================================
// WebSocket Handler — push channel for feed updates
// =============================================================================
//
// Clients connect to `/ws` and receive:
//   1. One `{"type":"init",...}` message with the latest transactions and the
//      current statistics.
//   2. One `{"type":"transaction",...}` message per ingested transaction.
//
// Frames are produced by the broadcast hub; this task only forwards them.
// No client-to-server protocol is defined: text and binary frames are
// ignored, pings are answered. The subscriber is removed on close or error.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::app_state::AppState;

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle.
///
/// Runs two branches via `tokio::select!`:
///   1. **Push** — forward frames from the hub to the socket.
///   2. **Recv** — handle Ping/Close and detect disconnects.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let (id, mut frames) = state.feed.subscribe();
    info!(subscriber = %id, "WebSocket subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    debug!(subscriber = %id, "frame channel closed");
                    break;
                };
                if let Err(e) = sender.send(Message::Text(frame.to_string())).await {
                    debug!(subscriber = %id, error = %e, "WebSocket send failed — disconnecting");
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(subscriber = %id, error = %e, "failed to send Pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(subscriber = %id, "WebSocket Close frame received");
                        break;
                    }
                    Some(Ok(_)) => {
                        debug!(subscriber = %id, "inbound WebSocket message ignored");
                    }
                    Some(Err(e)) => {
                        warn!(subscriber = %id, error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                    None => {
                        info!(subscriber = %id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    state.feed.unsubscribe(&id);
    info!(subscriber = %id, "WebSocket connection closed — cleanup complete");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};

    use super::*;
    use crate::api::rest::router;
    use crate::config::FeedConfig;
    use crate::types::fixtures::record_at;
    use crate::types::FeedAvailability;

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn spawn_server() -> (SocketAddr, Arc<AppState>) {
        let state = Arc::new(AppState::new(
            &FeedConfig::default(),
            FeedAvailability::NotConfigured,
            None,
        ));
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        ws
    }

    async fn next_json(ws: &mut Client) -> serde_json::Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("read error");
            if let tungstenite::Message::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn wait_for_subscribers(state: &AppState, n: usize) {
        for _ in 0..200 {
            if state.feed.subscriber_count() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} subscribers, have {}", state.feed.subscriber_count());
    }

    #[tokio::test]
    async fn init_then_transaction_updates() {
        let (addr, state) = spawn_server().await;
        for n in 1..=25 {
            state.feed.add_transaction(record_at(n, 0));
        }

        let mut ws = connect(addr).await;
        let init = next_json(&mut ws).await;
        assert_eq!(init["type"], "init");
        assert_eq!(init["transactions"].as_array().unwrap().len(), 20);
        assert_eq!(init["stats"]["totalCount"], 25);

        state.feed.add_transaction(record_at(26, 0));
        let update = next_json(&mut ws).await;
        assert_eq!(update["type"], "transaction");
        assert_eq!(update["transaction"]["blockNumber"], 1_026);
        assert_eq!(update["stats"]["totalCount"], 26);
    }

    #[tokio::test]
    async fn dropped_client_does_not_affect_others() {
        let (addr, state) = spawn_server().await;

        let mut healthy = connect(addr).await;
        let _ = next_json(&mut healthy).await;
        let mut doomed = connect(addr).await;
        let _ = next_json(&mut doomed).await;
        wait_for_subscribers(&state, 2).await;

        doomed.close(None).await.unwrap();
        drop(doomed);
        wait_for_subscribers(&state, 1).await;

        state.feed.add_transaction(record_at(1, 0));
        let update = next_json(&mut healthy).await;
        assert_eq!(update["stats"]["totalCount"], 1);
    }
}
