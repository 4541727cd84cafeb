//! Mixers and their channels.

use crate::id::{
    empty_as_none, none_as_empty, patch_reference, patch_reference_out, ChannelId, EntityId,
};
use serde::{Deserialize, Serialize};

/// Channel volume assigned by the backend to a freshly added channel.
pub const DEFAULT_VOLUME: f64 = 1.0;
/// Upper bound of the channel volume slider.
pub const MAX_VOLUME: f64 = 2.0;
/// Output channel count of a new mixer when none is requested.
pub const DEFAULT_OUTPUT_CHANNELS: u32 = 2;

fn default_volume() -> f64 {
    DEFAULT_VOLUME
}

fn default_output_channels() -> u32 {
    DEFAULT_OUTPUT_CHANNELS
}

/// A mixer as listed by `GET /audio/mixer`.
///
/// The list endpoint does not carry channel lists; those are fetched per
/// mixer (see [`MixerDetail`]) and kept in a separate nested collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mixer {
    pub id: EntityId,
    pub display_name: String,
    #[serde(default = "default_output_channels")]
    pub output_channels: u32,
}

/// Partial update carried by `mixer_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerPatch {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_channels: Option<u32>,
}

impl Mixer {
    pub fn merge(&mut self, patch: &MixerPatch) {
        if let Some(ref name) = patch.display_name {
            self.display_name = name.clone();
        }
        if let Some(count) = patch.output_channels {
            self.output_channels = count;
        }
    }
}

/// Response of `GET /audio/mixer/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerDetail {
    pub id: EntityId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// One channel strip of a mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    /// Routed source; may dangle transiently after the source is removed
    #[serde(
        rename = "input",
        default,
        deserialize_with = "empty_as_none",
        serialize_with = "none_as_empty"
    )]
    pub input_id: Option<EntityId>,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

impl Channel {
    /// A channel as the backend creates it: no input, unity volume.
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            input_id: None,
            volume: DEFAULT_VOLUME,
        }
    }

    pub fn merge(&mut self, patch: &ChannelPatch) {
        if let Some(volume) = patch.volume {
            self.volume = volume;
        }
        if let Some(ref input) = patch.input_id {
            self.input_id = input.clone();
        }
    }
}

/// Payload of `mixer_channel_create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCreated {
    pub mixer: EntityId,
    pub channel: ChannelId,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(
        rename = "input",
        default,
        deserialize_with = "empty_as_none",
        serialize_with = "none_as_empty"
    )]
    pub input_id: Option<EntityId>,
}

impl ChannelCreated {
    pub fn channel(&self) -> Channel {
        Channel {
            id: self.channel,
            input_id: self.input_id.clone(),
            volume: self.volume,
        }
    }
}

/// Payload of `mixer_channel_update`: the scoping pair plus changed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPatch {
    pub mixer: EntityId,
    pub channel: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(
        rename = "input",
        default,
        deserialize_with = "patch_reference",
        serialize_with = "patch_reference_out",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_id: Option<Option<EntityId>>,
}

/// Payload of `mixer_channel_remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub mixer: EntityId,
    pub channel: ChannelId,
}
