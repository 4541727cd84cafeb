//! Audio outputs (playback devices, streams, files).

use crate::id::{empty_as_none, none_as_empty, patch_reference, patch_reference_out, EntityId};
use serde::{Deserialize, Serialize};

/// Kind of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Device,
    Icecast,
    Multiplex,
    File,
    /// Streamed to a browser over HTTP
    Browser,
}

impl OutputKind {
    /// Heading used when presenting an output of this kind.
    pub fn title(&self) -> &'static str {
        match self {
            OutputKind::Device => "Output device",
            OutputKind::Icecast => "Icecast source",
            OutputKind::Multiplex => "Multiplexed output",
            OutputKind::File => "Rolling file",
            OutputKind::Browser => "Browser stream",
        }
    }
}

/// An output as mirrored from `GET /audio/output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub id: EntityId,
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: OutputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source routed into this output (input, mixer or player)
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        serialize_with = "none_as_empty"
    )]
    pub input_id: Option<EntityId>,
}

/// Partial update carried by `output_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPatch {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "patch_reference",
        serialize_with = "patch_reference_out",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_id: Option<Option<EntityId>>,
}

impl Output {
    pub fn merge(&mut self, patch: &OutputPatch) {
        if let Some(ref name) = patch.display_name {
            self.display_name = name.clone();
        }
        if let Some(ref input) = patch.input_id {
            self.input_id = input.clone();
        }
    }
}
