use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use reel_core::job::JobRequest;
use reel_core::message::ServerMessage;
use reel_pipeline::admission::reject;
use reel_pipeline::ResultChannel;

use crate::state::AppState;
use crate::ws::manager::{ChannelHandle, JobChannel};

/// How long the sender task may keep flushing after the channel closes.
const SEND_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP handler that upgrades the connection to a streaming channel.
///
/// After the upgrade the channel is registered with `ChannelManager` and
/// managed by a sender task plus the receive loop below. Each inbound
/// request runs as its own job task.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single channel after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the channel with `ChannelManager`.
///   2. Spawns a sender task that forwards queued frames to the sink.
///   3. Admits inbound requests on the current task.
///   4. Closes the channel on disconnect, which stops any running job.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Channel connected");

    let (handle, mut rx, guard) = state.channels.open(conn_id.clone()).await;
    let cancel = handle.cancel_token().clone();

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward queued frames to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let sender_cancel = cancel.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                sender_cancel.cancel();
                break;
            }
            if is_close {
                break;
            }
        }
    });

    // Receiver loop: admit inbound requests until the peer leaves.
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = stream.next() => next,
        };
        let Some(result) = next else {
            break;
        };
        match result {
            Ok(Message::Text(text)) => on_request(&state, &handle, text.as_str().as_bytes()).await,
            Ok(Message::Binary(bytes)) => on_request(&state, &handle, &bytes).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Ping(_)) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: close the channel, let the sender flush, then stop it.
    guard.close().await;
    drop(handle);
    if tokio::time::timeout(SEND_DRAIN_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    tracing::info!(conn_id = %conn_id, "Channel disconnected");
}

/// Parse one inbound frame and, if the channel is idle, start its job.
async fn on_request(state: &AppState, handle: &ChannelHandle, raw: &[u8]) {
    let request = match JobRequest::parse(raw) {
        Ok(request) => request,
        Err(e) => {
            let _ = reject(handle, None, &e).await;
            return;
        }
    };

    let key = request.key.clone().unwrap_or_default();
    let id = match state.channels.begin_job(handle.conn_id(), &key).await {
        Ok(id) => id,
        Err(e) => {
            tracing::info!(conn_id = %handle.conn_id(), key = %key, error = %e, "Job refused");
            let _ = handle
                .send(ServerMessage::rejected(request.key.as_deref(), e.to_string()))
                .await;
            return;
        }
    };

    let streams = Arc::clone(&state.streams);
    let channel = JobChannel::new(handle.clone(), Arc::clone(&state.channels), id);
    state.channels.spawn_job(async move {
        let outcome = streams.run_job(request, &channel).await;
        tracing::debug!(conn_id = %channel.conn_id(), key = %key, outcome = ?outcome, "Job task finished");
        channel.release().await;
    });
}
