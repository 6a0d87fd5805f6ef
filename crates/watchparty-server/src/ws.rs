use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use watchparty_core::net::messages::{
    ClaimHostResponseMsg, ClientMessage, ConnectedMsg, ControlResponseMsg, CreateRoomResponseMsg,
    HostUpdateMsg, JoinRoomResponseMsg, ServerMessage, SetVideoResponseMsg, StateResponseMsg,
    StateUpdateMsg,
};
use watchparty_core::net::protocol::{decode_client_message, encode_server_message};
use watchparty_core::playback::VideoRef;
use watchparty_core::room::{ConnectionId, normalize_room_code};

use crate::room_manager::ClientSender;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let connection_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Tell the client its id before anything else; hostId comparisons
    // on the client side depend on it.
    let hello = ServerMessage::Connected(ConnectedMsg { connection_id });
    let Ok(text) = encode_server_message(&hello) else {
        tracing::warn!("Failed to encode connection hello");
        return;
    };
    if ws_sender.send(Message::Text(text.into())).await.is_err() {
        return;
    }

    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.client_message_buffer);
    spawn_writer(ws_sender, rx);

    tracing::info!(connection_id = %connection_id, "Client connected");

    read_loop(&mut ws_receiver, &state, connection_id, &tx).await;

    // Connection gone — drop its membership wherever it was.
    let mut rooms = state.rooms.write().await;
    rooms.leave_all(connection_id, &state.rooms);
    drop(rooms);

    tracing::info!(connection_id = %connection_id, "Client disconnected");
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    connection_id: ConnectionId,
    tx: &ClientSender,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(connection_id = %connection_id, "Rate limited");
            continue;
        }

        let request = match decode_client_message(text.as_str()) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Dropping bad frame");
                continue;
            },
        };

        handle_request(state, connection_id, tx, request).await;
    }
}

async fn handle_request(
    state: &AppState,
    connection_id: ConnectionId,
    tx: &ClientSender,
    request: ClientMessage,
) {
    match request {
        ClientMessage::CreateRoom => {
            let mut rooms = state.rooms.write().await;
            let (room_id, host_secret, playback) =
                rooms.create_room(connection_id, tx.clone(), &state.rooms);
            drop(rooms);

            tracing::info!(connection_id = %connection_id, room = %room_id, "Room created");
            send_to_client(
                tx,
                connection_id,
                &ServerMessage::CreateRoomResponse(CreateRoomResponseMsg {
                    ok: true,
                    room_id: Some(room_id),
                    host_id: Some(connection_id),
                    host_secret: Some(host_secret),
                    state: Some(playback),
                    error: None,
                }),
            );
        },

        ClientMessage::JoinRoom(join) => {
            let code = normalize_room_code(&join.room_id);
            let mut rooms = state.rooms.write().await;
            match rooms.join_room(
                connection_id,
                &code,
                join.host_secret.as_deref(),
                tx.clone(),
                &state.rooms,
            ) {
                Ok(outcome) => {
                    send_to_client(
                        tx,
                        connection_id,
                        &ServerMessage::JoinRoomResponse(JoinRoomResponseMsg {
                            ok: true,
                            room_id: Some(code.clone()),
                            host_id: outcome.host_id,
                            is_host: outcome.is_host,
                            state: Some(outcome.state),
                            error: None,
                        }),
                    );
                    rooms.broadcast(
                        &code,
                        &ServerMessage::HostUpdate(HostUpdateMsg {
                            host_id: outcome.host_id,
                        }),
                    );
                    tracing::info!(connection_id = %connection_id, room = %code, "Joined room");
                },
                Err(e) => send_to_client(
                    tx,
                    connection_id,
                    &ServerMessage::JoinRoomResponse(JoinRoomResponseMsg {
                        ok: false,
                        room_id: None,
                        host_id: None,
                        is_host: false,
                        state: None,
                        error: Some(e.to_string()),
                    }),
                ),
            }
        },

        ClientMessage::ClaimHost(claim) => {
            let code = normalize_room_code(&claim.room_id);
            let mut rooms = state.rooms.write().await;
            match rooms.claim_host(connection_id, &code, &claim.host_secret) {
                Ok(host_id) => {
                    send_to_client(
                        tx,
                        connection_id,
                        &ServerMessage::ClaimHostResponse(ClaimHostResponseMsg {
                            ok: true,
                            host_id,
                            is_host: host_id == Some(connection_id),
                            error: None,
                        }),
                    );
                    rooms.broadcast(&code, &ServerMessage::HostUpdate(HostUpdateMsg { host_id }));
                    tracing::info!(connection_id = %connection_id, room = %code, "Host reclaimed");
                },
                Err(e) => send_to_client(
                    tx,
                    connection_id,
                    &ServerMessage::ClaimHostResponse(ClaimHostResponseMsg {
                        ok: false,
                        host_id: None,
                        is_host: false,
                        error: Some(e.to_string()),
                    }),
                ),
            }
        },

        ClientMessage::SetVideo(set) => {
            let code = normalize_room_code(&set.room_id);
            let mut rooms = state.rooms.write().await;
            match rooms.set_video(
                connection_id,
                &code,
                VideoRef {
                    provider: set.provider,
                    url: set.url,
                },
            ) {
                Ok(playback) => {
                    send_to_client(
                        tx,
                        connection_id,
                        &ServerMessage::SetVideoResponse(SetVideoResponseMsg {
                            ok: true,
                            error: None,
                        }),
                    );
                    rooms.broadcast(
                        &code,
                        &ServerMessage::StateUpdate(StateUpdateMsg { state: playback }),
                    );
                    tracing::info!(connection_id = %connection_id, room = %code, "Video set");
                },
                Err(e) => send_to_client(
                    tx,
                    connection_id,
                    &ServerMessage::SetVideoResponse(SetVideoResponseMsg {
                        ok: false,
                        error: Some(e.to_string()),
                    }),
                ),
            }
        },

        ClientMessage::Control(control) => {
            let code = normalize_room_code(&control.room_id);
            let mut rooms = state.rooms.write().await;
            match rooms.control(connection_id, &code, control.action, control.time) {
                Ok(playback) => {
                    send_to_client(
                        tx,
                        connection_id,
                        &ServerMessage::ControlResponse(ControlResponseMsg {
                            ok: true,
                            error: None,
                        }),
                    );
                    rooms.broadcast(
                        &code,
                        &ServerMessage::StateUpdate(StateUpdateMsg { state: playback }),
                    );
                    tracing::debug!(
                        connection_id = %connection_id,
                        room = %code,
                        action = ?control.action,
                        "Playback control applied"
                    );
                },
                Err(e) => send_to_client(
                    tx,
                    connection_id,
                    &ServerMessage::ControlResponse(ControlResponseMsg {
                        ok: false,
                        error: Some(e.to_string()),
                    }),
                ),
            }
        },

        ClientMessage::RequestState(request) => {
            let code = normalize_room_code(&request.room_id);
            let rooms = state.rooms.read().await;
            let response = match rooms.room_state(&code) {
                Ok((host_id, playback)) => ServerMessage::StateResponse(StateResponseMsg {
                    ok: true,
                    host_id,
                    state: Some(playback),
                    error: None,
                }),
                Err(e) => ServerMessage::StateResponse(StateResponseMsg {
                    ok: false,
                    host_id: None,
                    state: None,
                    error: Some(e.to_string()),
                }),
            };
            send_to_client(tx, connection_id, &response);
        },

        ClientMessage::LeaveRoom(leave) => {
            let code = normalize_room_code(&leave.room_id);
            let mut rooms = state.rooms.write().await;
            rooms.leave_room(connection_id, &code, &state.rooms);
        },
    }
}

fn send_to_client(tx: &ClientSender, connection_id: ConnectionId, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(text) => {
            if let Err(e) = tx.try_send(Utf8Bytes::from(text)) {
                tracing::debug!(
                    connection_id = %connection_id, error = %e,
                    "Failed to send to client (slow or disconnected)"
                );
            }
        },
        Err(e) => tracing::warn!(connection_id = %connection_id, error = %e, "Encode failed"),
    }
}
