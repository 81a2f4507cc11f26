//! Per-session event socket.
//!
//! `GET /ws/:session_id` upgrades to a WebSocket that streams the session's
//! progress, clarification requests, and the final report as JSON frames.
//! A result buffered before the client attached is replayed immediately on
//! connect. Inbound frames carry clarification answers back to the broker.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use tokio::sync::broadcast::error::RecvError;

use crate::types::{ClientFrame, WireEvent};
use crate::AppState;

pub async fn handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut outbound, mut inbound) = socket.split();
    let mut events = state.channels.attach(&session_id).await;

    tracing::debug!(session_id = %session_id, "websocket client attached");

    // Replay a result that completed before this client connected.
    if let Some(result) = state.channels.take_result(&session_id).await {
        if send_frame(&mut outbound, &WireEvent::Complete { result })
            .await
            .is_err()
        {
            drop(events);
            state.channels.detach(&session_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_frame(&mut outbound, &WireEvent::from(event)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session_id = %session_id,
                        skipped,
                        "websocket client lagged, progress events dropped"
                    );
                }
                Err(RecvError::Closed) => break,
            },
            message = inbound.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    handle_client_frame(&state, &session_id, &text).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // pings and binary frames are ignored
                Some(Err(e)) => {
                    tracing::debug!(session_id = %session_id, "websocket error: {e}");
                    break;
                }
            },
        }
    }

    // The receiver must be gone before detach so the channel can be released.
    drop(events);
    state.channels.detach(&session_id).await;
    tracing::debug!(session_id = %session_id, "websocket client detached");
}

async fn handle_client_frame(state: &AppState, session_id: &str, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::ClarificationResponse { text }) => {
            state.broker.submit_answer(session_id, text).await;
        }
        Err(e) => {
            tracing::debug!(session_id = %session_id, "ignoring malformed client frame: {e}");
        }
    }
}

async fn send_frame(
    outbound: &mut SplitSink<WebSocket, Message>,
    frame: &WireEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => outbound.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!("failed to serialize outbound frame: {e}");
            Ok(())
        }
    }
}
