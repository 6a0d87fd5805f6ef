use serde::{Deserialize, Serialize};

/// A video reference as the client supplied it: a provider slug
/// ("youtube", "vimeo", ...) plus the raw URL. The server treats both as
/// opaque; embedding and URL normalization are client concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub provider: String,
    pub url: String,
}

/// Authoritative playback snapshot for a room.
///
/// `time` is only accurate as of `last_update_ms`; while `playing` is
/// true the real position keeps advancing with the wall clock. Call
/// [`PlaybackState::materialized`] to reconstruct the live position —
/// both before sending a snapshot to any client and before applying a
/// host mutation, so elapsed time is neither dropped nor double-counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub video: Option<VideoRef>,
    pub playing: bool,
    /// Playback position in seconds, never negative.
    pub time: f64,
    /// Wall-clock instant (Unix ms) at which `time` was last accurate.
    pub last_update_ms: u64,
}

impl PlaybackState {
    /// Default snapshot for a fresh room: no video, paused at zero.
    pub fn new(now_ms: u64) -> Self {
        Self {
            video: None,
            playing: false,
            time: 0.0,
            last_update_ms: now_ms,
        }
    }

    /// Roll the snapshot forward to `now_ms`.
    ///
    /// While playing, the position advances by the elapsed wall-clock
    /// time; while paused it is frozen. Pure: same inputs, same output.
    /// A `now_ms` behind `last_update_ms` (clock skew) clamps at the
    /// stored position rather than rewinding below zero.
    pub fn materialized(&self, now_ms: u64) -> Self {
        let time = if self.playing {
            let elapsed = (now_ms as f64 - self.last_update_ms as f64) / 1000.0;
            (self.time + elapsed).max(0.0)
        } else {
            self.time
        };
        Self {
            video: self.video.clone(),
            playing: self.playing,
            time,
            last_update_ms: now_ms,
        }
    }
}
