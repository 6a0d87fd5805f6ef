use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use watchparty_core::net::messages::{
    ClientMessage, CreateRoomResponseMsg, JoinRoomMsg, JoinRoomResponseMsg, ServerMessage,
};
use watchparty_core::net::protocol::{decode_server_message, encode_client_message};
use watchparty_core::room::ConnectionId;

use watchparty_server::build_app;
use watchparty_server::config::{RoomsConfig, ServerConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default configuration.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server with a short empty-room TTL so lifecycle
    /// tests finish quickly.
    pub async fn with_room_ttl_ms(ttl_ms: u64) -> Self {
        let config = ServerConfig {
            rooms: RoomsConfig {
                empty_room_ttl_ms: ttl_ms,
                ..RoomsConfig::default()
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client and consume the `connected` hello.
/// Returns the stream and the server-assigned connection id.
pub async fn ws_connect(url: &str) -> (WsStream, ConnectionId) {
    let (mut stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    match read_msg(&mut stream).await {
        ServerMessage::Connected(hello) => (stream, hello.connection_id),
        other => panic!("Expected connected hello, got: {other:?}"),
    }
}

/// Send a `ClientMessage` as a JSON text frame.
pub async fn send_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let text = encode_client_message(msg).unwrap();
    stream.send(Message::Text(text.into())).await.unwrap();
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn read_msg(stream: &mut WsStream) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_server_message(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read the next ServerMessage, returning None on timeout.
pub async fn try_read_msg(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerMessage> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_server_message(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Create a room and return the successful response.
pub async fn create_room(stream: &mut WsStream) -> CreateRoomResponseMsg {
    send_msg(stream, &ClientMessage::CreateRoom).await;
    match read_msg(stream).await {
        ServerMessage::CreateRoomResponse(resp) => {
            assert!(resp.ok, "Expected successful create: {resp:?}");
            resp
        },
        other => panic!("Expected CreateRoomResponse, got: {other:?}"),
    }
}

/// Join a room (no host secret) and return the response, success or not.
pub async fn join_room(stream: &mut WsStream, room_id: &str) -> JoinRoomResponseMsg {
    send_msg(
        stream,
        &ClientMessage::JoinRoom(JoinRoomMsg {
            room_id: room_id.to_string(),
            host_secret: None,
        }),
    )
    .await;
    match read_msg(stream).await {
        ServerMessage::JoinRoomResponse(resp) => resp,
        other => panic!("Expected JoinRoomResponse, got: {other:?}"),
    }
}

/// Read the next message and assert it is a `hostUpdate`, returning the
/// announced host id.
pub async fn expect_host_update(stream: &mut WsStream) -> Option<ConnectionId> {
    match read_msg(stream).await {
        ServerMessage::HostUpdate(update) => update.host_id,
        other => panic!("Expected HostUpdate, got: {other:?}"),
    }
}

/// Read the next message and assert it is a `stateUpdate`, returning the
/// carried snapshot.
pub async fn expect_state_update(
    stream: &mut WsStream,
) -> watchparty_core::playback::PlaybackState {
    match read_msg(stream).await {
        ServerMessage::StateUpdate(update) => update.state,
        other => panic!("Expected StateUpdate, got: {other:?}"),
    }
}
