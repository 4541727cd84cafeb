//! Audio inputs (capture devices).

use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// Kind of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// A local capture device
    #[default]
    Device,
}

impl InputKind {
    /// Heading used when presenting an input of this kind.
    pub fn title(&self) -> &'static str {
        match self {
            InputKind::Device => "Input device",
        }
    }
}

/// An input as mirrored from `GET /audio/input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub id: EntityId,
    /// User-facing name, editable
    pub display_name: String,
    #[serde(rename = "type", default)]
    pub kind: InputKind,
    /// Backend device name
    #[serde(default)]
    pub name: String,
}

/// Partial update carried by `input_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPatch {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Input {
    /// Shallow merge of the fields present in `patch`.
    pub fn merge(&mut self, patch: &InputPatch) {
        if let Some(ref name) = patch.display_name {
            self.display_name = name.clone();
        }
    }
}
