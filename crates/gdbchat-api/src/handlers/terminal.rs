//! Live terminal WebSocket.
//!
//! Server to client: one text frame per debugger output line.
//! Client to server: each text frame is sent to the debugger as one line.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// GET /api/debugger/ws - Upgrade to the live terminal socket.
pub async fn terminal_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| terminal_stream(socket, state))
}

async fn terminal_stream(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut lines = state.engine.subscribe();
    let shutdown = state.shutdown.clone();

    debug!("terminal socket opened");
    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Ok(line) => {
                    if sender.send(Message::Text(line)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "terminal socket lagging, lines dropped");
                }
                Err(RecvError::Closed) => {
                    // The engine restarted; follow the new channel.
                    lines = state.engine.subscribe();
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(command))) => {
                    let command = command.trim_end_matches(['\r', '\n']).to_string();
                    match state.engine.send_line(&command).await {
                        Ok(()) => state
                            .logs
                            .current()
                            .info("terminal_command", &command, json!({})),
                        Err(e) => {
                            let notice = format!("[error] {}", e);
                            if sender.send(Message::Text(notice)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "terminal socket error");
                    break;
                }
            },
            _ = shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
    debug!("terminal socket closed");
}
