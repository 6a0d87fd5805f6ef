use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use watchparty_core::net::messages::{ControlAction, HostUpdateMsg, ServerMessage};
use watchparty_core::net::protocol::encode_server_message;
use watchparty_core::playback::{PlaybackState, VideoRef};
use watchparty_core::room::{ConnectionId, generate_room_code};
use watchparty_core::time::now_ms;

use crate::state::SharedRoomManager;

/// Per-connection sender for outbound JSON frames. Bounded so a slow
/// client cannot buffer unbounded state updates.
pub type ClientSender = mpsc::Sender<Utf8Bytes>;

/// Tracks a joined connection's outbound channel.
struct ConnectedClient {
    sender: ClientSender,
}

/// Errors a room operation can report back to the requesting connection.
/// The `Display` form is the wire-level error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    RoomNotFound,
    Forbidden,
    CreateFailed,
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound => write!(f, "room_not_found"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::CreateFailed => write!(f, "create_failed"),
        }
    }
}

impl std::error::Error for RoomError {}

/// What a successful join hands back to the session coordinator.
pub struct JoinOutcome {
    pub host_id: Option<ConnectionId>,
    pub is_host: bool,
    pub state: PlaybackState,
}

/// Manages all live rooms: registry, membership, host assignment, and
/// the deferred deletion of empty rooms.
pub struct RoomManager {
    rooms: HashMap<String, RoomEntry>,
    /// Which room each connection is in. A connection belongs to at most
    /// one room; create/join paths enforce this by leaving first.
    memberships: HashMap<ConnectionId, String>,
    empty_room_ttl: Duration,
    host_claim_enabled: bool,
}

struct RoomEntry {
    host_id: Option<ConnectionId>,
    /// Minted at creation; possession reclaims host privilege.
    host_secret: String,
    /// Join order preserved; host failover picks the earliest joined.
    participants: Vec<ConnectionId>,
    connections: HashMap<ConnectionId, ConnectedClient>,
    playback: PlaybackState,
    /// Pending deletion for an empty room, aborted when someone joins.
    delete_task: Option<JoinHandle<()>>,
}

impl RoomManager {
    pub fn new(empty_room_ttl: Duration, host_claim_enabled: bool) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            empty_room_ttl,
            host_claim_enabled,
        }
    }

    /// Create a new room with the caller as host and sole participant.
    /// Returns (room code, host secret, initial snapshot).
    pub fn create_room(
        &mut self,
        conn_id: ConnectionId,
        sender: ClientSender,
        rooms: &SharedRoomManager,
    ) -> (String, String, PlaybackState) {
        self.leave_all(conn_id, rooms);

        // Codes are drawn from a space large enough that collisions are
        // negligible, but uniqueness is still checked, not hoped for.
        let code = loop {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                break code;
            }
        };

        let host_secret = Uuid::new_v4().to_string();
        let playback = PlaybackState::new(now_ms());
        let mut connections = HashMap::new();
        connections.insert(conn_id, ConnectedClient { sender });
        self.rooms.insert(
            code.clone(),
            RoomEntry {
                host_id: Some(conn_id),
                host_secret: host_secret.clone(),
                participants: vec![conn_id],
                connections,
                playback: playback.clone(),
                delete_task: None,
            },
        );
        self.memberships.insert(conn_id, code.clone());
        (code, host_secret, playback)
    }

    /// Join an existing room, leaving any previously joined room first.
    /// Cancels a pending deletion, assigns host if the room has none, and
    /// reclaims host for a caller presenting the room's secret.
    pub fn join_room(
        &mut self,
        conn_id: ConnectionId,
        code: &str,
        host_secret: Option<&str>,
        sender: ClientSender,
        rooms: &SharedRoomManager,
    ) -> Result<JoinOutcome, RoomError> {
        if !self.rooms.contains_key(code) {
            return Err(RoomError::RoomNotFound);
        }

        self.leave_all(conn_id, rooms);

        let host_claim_enabled = self.host_claim_enabled;
        let Some(entry) = self.rooms.get_mut(code) else {
            return Err(RoomError::RoomNotFound);
        };

        if let Some(task) = entry.delete_task.take() {
            task.abort();
        }

        entry.participants.push(conn_id);
        entry.connections.insert(conn_id, ConnectedClient { sender });
        self.memberships.insert(conn_id, code.to_string());

        if entry.host_id.is_none() {
            entry.host_id = Some(conn_id);
        } else if host_claim_enabled && host_secret.is_some_and(|s| s == entry.host_secret) {
            entry.host_id = Some(conn_id);
        }

        let state = entry.playback.materialized(now_ms());
        Ok(JoinOutcome {
            host_id: entry.host_id,
            is_host: entry.host_id == Some(conn_id),
            state,
        })
    }

    /// Remove a connection from a room. Reassigns host to the earliest
    /// joined remaining participant, notifies the room of a host change,
    /// and schedules deletion when the room empties. No-op for
    /// non-members.
    pub fn leave_room(&mut self, conn_id: ConnectionId, code: &str, rooms: &SharedRoomManager) {
        let Some(entry) = self.rooms.get_mut(code) else {
            return;
        };

        let before = entry.participants.len();
        entry.participants.retain(|&p| p != conn_id);
        if entry.participants.len() == before {
            return;
        }
        entry.connections.remove(&conn_id);
        self.memberships.remove(&conn_id);

        let mut host_changed = false;
        if entry.host_id == Some(conn_id) {
            entry.host_id = entry.participants.first().copied();
            host_changed = true;
        }
        let new_host = entry.host_id;
        let now_empty = entry.participants.is_empty();

        tracing::debug!(connection_id = %conn_id, room = code, "Left room");

        if host_changed && !now_empty {
            self.broadcast(
                code,
                &ServerMessage::HostUpdate(HostUpdateMsg { host_id: new_host }),
            );
        }
        if now_empty {
            self.schedule_delete(code, rooms);
        }
    }

    /// Leave whichever room (at most one) contains this connection.
    /// Used on disconnect and before any create/join.
    pub fn leave_all(&mut self, conn_id: ConnectionId, rooms: &SharedRoomManager) {
        if let Some(code) = self.memberships.get(&conn_id).cloned() {
            self.leave_room(conn_id, &code, rooms);
        }
    }

    /// Reassign host to a participant presenting the room's secret.
    pub fn claim_host(
        &mut self,
        conn_id: ConnectionId,
        code: &str,
        host_secret: &str,
    ) -> Result<Option<ConnectionId>, RoomError> {
        if !self.host_claim_enabled {
            return Err(RoomError::Forbidden);
        }
        let Some(entry) = self.rooms.get_mut(code) else {
            return Err(RoomError::RoomNotFound);
        };
        // The host must be a participant, so outsiders cannot claim.
        if host_secret != entry.host_secret || !entry.participants.contains(&conn_id) {
            return Err(RoomError::Forbidden);
        }
        entry.host_id = Some(conn_id);
        Ok(entry.host_id)
    }

    /// Replace the room's video. Host only. Resets playback to paused at
    /// zero and returns the snapshot to broadcast.
    pub fn set_video(
        &mut self,
        conn_id: ConnectionId,
        code: &str,
        video: VideoRef,
    ) -> Result<PlaybackState, RoomError> {
        let Some(entry) = self.rooms.get_mut(code) else {
            return Err(RoomError::RoomNotFound);
        };
        if entry.host_id != Some(conn_id) {
            return Err(RoomError::Forbidden);
        }
        entry.playback = PlaybackState {
            video: Some(video),
            playing: false,
            time: 0.0,
            last_update_ms: now_ms(),
        };
        Ok(entry.playback.clone())
    }

    /// Apply a host playback control (play/pause/seek) and return the
    /// snapshot to broadcast.
    pub fn control(
        &mut self,
        conn_id: ConnectionId,
        code: &str,
        action: ControlAction,
        time: Option<f64>,
    ) -> Result<PlaybackState, RoomError> {
        let Some(entry) = self.rooms.get_mut(code) else {
            return Err(RoomError::RoomNotFound);
        };
        if entry.host_id != Some(conn_id) {
            return Err(RoomError::Forbidden);
        }

        // Materialize before mutating so elapsed play time is neither
        // lost nor double-counted.
        entry.playback = entry.playback.materialized(now_ms());

        if let Some(t) = time {
            entry.playback.time = t.max(0.0);
        }
        match action {
            ControlAction::Play => entry.playback.playing = true,
            ControlAction::Pause => entry.playback.playing = false,
            ControlAction::Seek => {},
        }

        Ok(entry.playback.clone())
    }

    /// Read-only materialized view of a room: current host and live snapshot.
    pub fn room_state(
        &self,
        code: &str,
    ) -> Result<(Option<ConnectionId>, PlaybackState), RoomError> {
        let entry = self.rooms.get(code).ok_or(RoomError::RoomNotFound)?;
        Ok((entry.host_id, entry.playback.materialized(now_ms())))
    }

    /// Remove a room, but only if it is still present and still empty.
    /// The deletion timer calls this; the re-check guards against a join
    /// that happened between scheduling and firing. Returns whether the
    /// room was removed.
    pub fn delete_if_empty(&mut self, code: &str) -> bool {
        let still_empty = self
            .rooms
            .get(code)
            .is_some_and(|entry| entry.participants.is_empty());
        if still_empty {
            self.rooms.remove(code);
            tracing::info!(room = code, "Removed empty room after TTL");
        }
        still_empty
    }

    fn schedule_delete(&mut self, code: &str, rooms: &SharedRoomManager) {
        let ttl = self.empty_room_ttl;
        let Some(entry) = self.rooms.get_mut(code) else {
            return;
        };
        if let Some(task) = entry.delete_task.take() {
            task.abort();
        }
        let rooms = Arc::clone(rooms);
        let code_owned = code.to_string();
        entry.delete_task = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut mgr = rooms.write().await;
            mgr.delete_if_empty(&code_owned);
        }));
    }

    /// Broadcast a message to every connection in a room. Fire-and-forget:
    /// a slow or closed client just misses the frame.
    pub fn broadcast(&self, code: &str, msg: &ServerMessage) {
        let Some(entry) = self.rooms.get(code) else {
            return;
        };
        let text = match encode_server_message(msg) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                tracing::warn!(room = code, error = %e, "Failed to encode broadcast");
                return;
            },
        };
        for (&conn_id, client) in &entry.connections {
            if let Err(e) = client.sender.try_send(text.clone()) {
                tracing::debug!(
                    connection_id = %conn_id, room = code, error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }

    /// (room count, participant count across all rooms) for health reporting.
    pub fn stats(&self) -> (usize, usize) {
        let participants = self.rooms.values().map(|e| e.participants.len()).sum();
        (self.rooms.len(), participants)
    }

    #[cfg(test)]
    pub fn room_exists(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    #[cfg(test)]
    pub fn host_of(&self, code: &str) -> Option<ConnectionId> {
        self.rooms.get(code).and_then(|e| e.host_id)
    }

    #[cfg(test)]
    pub fn participants_of(&self, code: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(code)
            .map(|e| e.participants.clone())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn room_of(&self, conn_id: ConnectionId) -> Option<String> {
        self.memberships.get(&conn_id).cloned()
    }

    /// Rewind the snapshot stamp to simulate elapsed wall-clock time.
    #[cfg(test)]
    pub fn backdate_playback(&mut self, code: &str, ms: u64) {
        if let Some(entry) = self.rooms.get_mut(code) {
            entry.playback.last_update_ms -= ms;
        }
    }
}
