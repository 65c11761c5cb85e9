use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};

use crate::hub::Hub;
use crate::server::AppState;

pub async fn websocket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (id, mut events) = hub.register().await;
    let (mut sink, mut stream) = socket.split();

    // Drains the hub channel into the socket. A write failure ends the task;
    // eviction follows when the channel fills or the read loop exits.
    let writer = tokio::spawn(async move {
        while let Some(payload) = events.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // The server never reads meaningful payloads; the read loop only keeps
    // the connection alive and detects the close.
    while let Some(message) = stream.next().await {
        if message.is_err() {
            break;
        }
    }

    hub.unregister(id).await;
    writer.abort();
}
