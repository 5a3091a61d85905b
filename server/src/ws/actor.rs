use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::auth::gate::Identity;
use crate::state::AppState;
use crate::ws::{protocol, ConnectionId, ConnectionSender};

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming messages, dispatches to protocol handlers
///
/// The mpsc sender is what the connection registry hands to the dispatcher,
/// so pushes never touch the socket directly.
pub async fn run_connection(socket: WebSocket, state: AppState, identity: Identity) {
    let user_id = identity.user_id.clone();
    let connection_id = ConnectionId::next();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    state.connections.register(&user_id, connection_id, tx.clone());

    tracing::info!(
        user_id = %user_id,
        name = %identity.name,
        connection_id = %connection_id,
        "WebSocket actor started"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Pong notifications from the reader loop to the ping task
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();

    let mut ping_handle = tokio::spawn(keepalive_task(
        tx.clone(),
        pong_rx,
        state.realtime.ping_interval(),
        state.realtime.pong_timeout(),
        user_id.clone(),
    ));

    // The keepalive task only returns once the peer has stopped answering
    let mut keepalive_expired = false;

    loop {
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            _ = &mut ping_handle => {
                keepalive_expired = true;
                break;
            }
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), &tx, &state, &user_id).await;
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        user_id = %user_id,
                        bytes = data.len(),
                        "Ignoring binary frame"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    if keepalive_expired {
        // Give the writer a moment to flush the 1001 close frame
        let _ = timeout(CLOSE_FLUSH_TIMEOUT, &mut writer_handle).await;
    }
    writer_handle.abort();
    ping_handle.abort();

    state.connections.unregister(&user_id, connection_id);

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        online = state.connections.is_online(&user_id),
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}

/// Ping the client on a fixed interval and close the connection with 1001
/// if a pong does not follow within `pong_timeout`.
async fn keepalive_task(
    tx: ConnectionSender,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    ping_interval: Duration,
    pong_timeout: Duration,
    user_id: String,
) {
    let mut ticker = interval(ping_interval);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        if tx.send(Message::Ping(Bytes::from_static(b"herb"))).is_err() {
            // Writer task is gone
            return;
        }

        if !matches!(timeout(pong_timeout, pong_rx.recv()).await, Ok(Some(()))) {
            tracing::warn!(user_id = %user_id, "Pong timeout, closing connection");
            let _ = tx.send(Message::Close(Some(CloseFrame {
                code: 1001,
                reason: "Pong timeout".into(),
            })));
            return;
        }
    }
}
