//! Live players (scheduled playback of library tracks).

use crate::id::{patch_reference, patch_reference_out, present, EntityId};
use serde::{Deserialize, Serialize};

/// Transport state of a live player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Playing,
    Paused,
}

/// What a player does once a queued track ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackMode {
    PlayNext,
    PauseAfter,
    Loop,
}

impl TrackMode {
    /// Cycle play-next -> pause-after -> loop -> play-next.
    pub fn next(self) -> Self {
        match self {
            TrackMode::PlayNext => TrackMode::PauseAfter,
            TrackMode::PauseAfter => TrackMode::Loop,
            TrackMode::Loop => TrackMode::PlayNext,
        }
    }
}

/// A track queued on a live player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTrack {
    /// Library track id
    pub id: u64,
    #[serde(rename = "type")]
    pub mode: TrackMode,
}

/// A live player.
///
/// `GET /player` only provides `id` and `name`; the remaining fields are
/// filled from the per-player endpoints and player-scoped events. For the
/// jingle settings the outer `None` means not yet known and `Some(None)`
/// means known to be unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PlayerState>,
    /// Tracks to play between jingles
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub jingle_count: Option<Option<u32>>,
    #[serde(
        default,
        deserialize_with = "patch_reference",
        serialize_with = "patch_reference_out",
        skip_serializing_if = "Option::is_none"
    )]
    pub jingle_playlist: Option<Option<EntityId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<PlayerTrack>>,
    /// Position within the current track, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_time: Option<f64>,
}

/// Partial update for a player.
///
/// Carried directly by `player_update`, and built from the player-scoped
/// live events (state, tracks, jingle settings, track time).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerPatch {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PlayerState>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub jingle_count: Option<Option<u32>>,
    #[serde(
        default,
        deserialize_with = "patch_reference",
        serialize_with = "patch_reference_out",
        skip_serializing_if = "Option::is_none"
    )]
    pub jingle_playlist: Option<Option<EntityId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<PlayerTrack>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_time: Option<f64>,
}

/// Per-player state gathered from the player's sub-resources.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerDetail {
    pub state: PlayerState,
    pub jingle_count: Option<u32>,
    pub jingle_playlist: Option<EntityId>,
    pub tracks: Vec<PlayerTrack>,
}

impl Player {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: None,
            jingle_count: None,
            jingle_playlist: None,
            tracks: None,
            track_time: None,
        }
    }

    pub fn merge(&mut self, patch: &PlayerPatch) {
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
        if let Some(state) = patch.state {
            self.state = Some(state);
        }
        if let Some(count) = patch.jingle_count {
            self.jingle_count = Some(count);
        }
        if let Some(ref playlist) = patch.jingle_playlist {
            self.jingle_playlist = Some(playlist.clone());
        }
        if let Some(ref tracks) = patch.tracks {
            self.tracks = Some(tracks.clone());
        }
        if let Some(time) = patch.track_time {
            self.track_time = Some(time);
        }
    }

    /// Tracks between jingles, if known and set.
    pub fn jingle_count(&self) -> Option<u32> {
        self.jingle_count.flatten()
    }

    /// Jingle playlist, if known and set.
    pub fn jingle_playlist(&self) -> Option<&EntityId> {
        self.jingle_playlist.as_ref().and_then(Option::as_ref)
    }

    /// Fill fields not yet known from a detail fetch.
    ///
    /// Fields already known came from live events that may be newer than the
    /// fetch, so they are left alone, including ones an event cleared.
    pub fn fill_missing(&mut self, detail: &PlayerDetail) {
        self.state.get_or_insert(detail.state);
        self.jingle_count.get_or_insert(detail.jingle_count);
        self.jingle_playlist
            .get_or_insert_with(|| detail.jingle_playlist.clone());
        self.tracks.get_or_insert_with(|| detail.tracks.clone());
    }
}
