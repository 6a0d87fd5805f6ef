use serde::{Deserialize, Serialize};

use crate::playback::PlaybackState;
use crate::room::ConnectionId;

/// Host playback actions. `seek` relies on the optional `time` field of
/// [`ControlMsg`]; `play`/`pause` may carry one too (seek-and-play).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Play,
    Pause,
    Seek,
}

// ---- Client -> Server ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMsg {
    pub room_id: String,
    /// Presenting the room's secret on join reclaims host privilege.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimHostMsg {
    pub room_id: String,
    pub host_secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVideoMsg {
    pub room_id: String,
    pub provider: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMsg {
    pub room_id: String,
    pub action: ControlAction,
    /// Target position in seconds; negative values clamp to zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStateMsg {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoomMsg {
    pub room_id: String,
}

/// Every inbound request a connection can make. The `type` tag carries
/// the operation name on the wire: `{"type":"joinRoom","roomId":...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    CreateRoom,
    JoinRoom(JoinRoomMsg),
    ClaimHost(ClaimHostMsg),
    SetVideo(SetVideoMsg),
    Control(ControlMsg),
    RequestState(RequestStateMsg),
    LeaveRoom(LeaveRoomMsg),
}

// ---- Server -> Client ----

/// Sent once, immediately after the upgrade, so the client knows its own
/// connection id and can compare it against `hostId` updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMsg {
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponseMsg {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<ConnectionId>,
    /// Returned only to the creator; lets the original host reclaim the
    /// room after a reconnect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PlaybackState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponseMsg {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<ConnectionId>,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PlaybackState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimHostResponseMsg {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<ConnectionId>,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVideoResponseMsg {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponseMsg {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponseMsg {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PlaybackState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Broadcast to a room whenever host privilege moves. `hostId` is an
/// explicit null when no host remains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostUpdateMsg {
    pub host_id: Option<ConnectionId>,
}

/// Broadcast to a room on every playback mutation. Always carries a
/// freshly materialized snapshot, never a stale stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdateMsg {
    pub state: PlaybackState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Connected(ConnectedMsg),
    CreateRoomResponse(CreateRoomResponseMsg),
    JoinRoomResponse(JoinRoomResponseMsg),
    ClaimHostResponse(ClaimHostResponseMsg),
    SetVideoResponse(SetVideoResponseMsg),
    ControlResponse(ControlResponseMsg),
    StateResponse(StateResponseMsg),
    HostUpdate(HostUpdateMsg),
    StateUpdate(StateUpdateMsg),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_carry_the_operation_name() {
        let msg = ClientMessage::JoinRoom(JoinRoomMsg {
            room_id: "AB12CD".to_string(),
            host_secret: None,
        });
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"joinRoom","roomId":"AB12CD"}"#
        );

        assert_eq!(
            serde_json::to_string(&ClientMessage::CreateRoom).unwrap(),
            r#"{"type":"createRoom"}"#
        );
    }

    #[test]
    fn control_time_is_optional() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"control","roomId":"AB12CD","action":"play"}"#)
                .unwrap();
        match msg {
            ClientMessage::Control(c) => {
                assert_eq!(c.action, ControlAction::Play);
                assert!(c.time.is_none());
            },
            other => panic!("Expected Control, got: {other:?}"),
        }

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"control","roomId":"AB12CD","action":"seek","time":12.5}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Control(c) => assert_eq!(c.time, Some(12.5)),
            other => panic!("Expected Control, got: {other:?}"),
        }
    }

    #[test]
    fn host_update_serializes_missing_host_as_null() {
        let msg = ServerMessage::HostUpdate(HostUpdateMsg { host_id: None });
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"hostUpdate","hostId":null}"#
        );
    }

    #[test]
    fn error_responses_omit_payload_fields() {
        let msg = ServerMessage::JoinRoomResponse(JoinRoomResponseMsg {
            ok: false,
            room_id: None,
            host_id: None,
            is_host: false,
            state: None,
            error: Some("room_not_found".to_string()),
        });
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"joinRoomResponse","ok":false,"isHost":false,"error":"room_not_found"}"#
        );
    }
}
