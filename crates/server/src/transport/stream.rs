// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bidirectional stream attach (§4.J, §6): `WS /api/v1/workers/{id}/stream`.
//! Server→client frames are `{type, timestamp, data}`; client→server frames
//! are `{type:"send", message:{...}}`, `{type:"ping"}`, or
//! `{type:"subscribe", channels:[...]}`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ac_stream::{Frame, SlowPolicy, StreamHandler, Subscriber};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::AppState;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Send { message: serde_json::Value },
    Ping,
    Subscribe { channels: Vec<String> },
}

#[derive(Debug, Serialize)]
struct OutgoingFrame<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    timestamp: i64,
    data: &'a serde_json::Value,
}

pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Ok(id) = uuid::Uuid::parse_str(&id).map(ac_core::worker::WorkerId) else {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    };

    let Some(entry) = state.get_worker(id).await else {
        return axum::http::StatusCode::NOT_FOUND.into_response();
    };

    let Some(handler) = entry.stream.read().await.clone() else {
        return axum::http::StatusCode::CONFLICT.into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, handler)).into_response()
}

async fn handle_socket(socket: WebSocket, handler: Arc<StreamHandler>) {
    let subscriber_id = uuid::Uuid::new_v4().to_string();
    let mut subscriber = handler.subscribe(subscriber_id.clone(), HashSet::new(), SlowPolicy::DropOldest);
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            frame = subscriber.recv() => {
                match frame {
                    Some(frame) => {
                        if forward_frame(&mut ws_tx, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Ping) => {
                                let pong = json!({"type": "pong", "timestamp": now_millis()});
                                if ws_tx.send(Message::Text(pong.to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                            Ok(ClientMessage::Send { message }) => {
                                let frame: Frame = serde_json::from_value(message).unwrap_or(Frame {
                                    kind: "send".to_owned(),
                                    id: None,
                                    reply_to: None,
                                    payload: serde_json::Value::Null,
                                });
                                let _ = handler.send(frame, SEND_TIMEOUT).await;
                            }
                            Ok(ClientMessage::Subscribe { channels }) => {
                                handler.unsubscribe(&subscriber_id);
                                let topics: HashSet<String> = channels.into_iter().collect();
                                subscriber = handler.subscribe(subscriber_id.clone(), topics, SlowPolicy::DropOldest);
                            }
                            Err(_) => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    handler.unsubscribe(&subscriber_id);
}

async fn forward_frame(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &Frame,
) -> Result<(), axum::Error> {
    let outgoing = OutgoingFrame { kind: &frame.kind, timestamp: now_millis(), data: &frame.payload };
    let text = serde_json::to_string(&outgoing).unwrap_or_default();
    ws_tx.send(Message::Text(text.into())).await
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
