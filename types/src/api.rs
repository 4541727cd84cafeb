//! API request types for the write endpoints.

use crate::id::{patch_reference, patch_reference_out, EntityId};
use crate::input::InputKind;
use crate::output::OutputKind;
use crate::player::{PlayerState, PlayerTrack, TrackMode};
use serde::{Deserialize, Serialize};

// ============================================================================
// Create requests
// ============================================================================

/// Body of `POST /audio/input`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInputRequest {
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub display_name: String,
    /// Backend device name
    pub name: String,
}

impl CreateInputRequest {
    /// Open a capture device, named after the device.
    pub fn device(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: InputKind::Device,
            display_name: name.clone(),
            name,
        }
    }
}

/// Body of `POST /audio/output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOutputRequest {
    #[serde(rename = "type")]
    pub kind: OutputKind,
    pub display_name: String,
    /// Device name, Icecast endpoint or file path depending on `kind`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CreateOutputRequest {
    pub fn device(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: OutputKind::Device,
            display_name: name.clone(),
            name: Some(name),
        }
    }
}

/// Body of `POST /audio/mixer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMixerRequest {
    pub display_name: String,
    /// Output channel count
    pub channels: u32,
}

/// Body of `POST /player`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlayerRequest {
    pub name: String,
}

/// Body of `POST /playlist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
}

// ============================================================================
// Update requests (partial; absent fields are left untouched)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// `Some(None)` clears the routed source
    #[serde(
        default,
        deserialize_with = "patch_reference",
        serialize_with = "patch_reference_out",
        skip_serializing_if = "Option::is_none"
    )]
    pub input: Option<Option<EntityId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(
        default,
        deserialize_with = "patch_reference",
        serialize_with = "patch_reference_out",
        skip_serializing_if = "Option::is_none"
    )]
    pub input: Option<Option<EntityId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub name: String,
}

/// Body of `PUT /playlist/{id}`. `tracks` replaces the whole track order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<u64>>,
}

impl PlaylistUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn reorder(tracks: impl IntoIterator<Item = u64>) -> Self {
        Self {
            tracks: Some(tracks.into_iter().collect()),
            ..Default::default()
        }
    }
}

/// Body of `PUT /library/track/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

// ============================================================================
// Library roots
// ============================================================================

/// Body of `POST /library` and `DELETE /library`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRootRequest {
    pub directory: String,
}

// ============================================================================
// Live player control
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPlayerStateRequest {
    pub state: PlayerState,
}

/// Body of `PUT /player/{id}/tracks`: parallel id and mode lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTracksRequest {
    pub tracks: Vec<u64>,
    pub types: Vec<TrackMode>,
}

impl From<&[PlayerTrack]> for SetTracksRequest {
    fn from(tracks: &[PlayerTrack]) -> Self {
        Self {
            tracks: tracks.iter().map(|t| t.id).collect(),
            types: tracks.iter().map(|t| t.mode).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JingleCountRequest {
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JinglePlaylistRequest {
    pub id: Option<EntityId>,
}
