//! Shared types for the mixdesk audio control panel.
//!
//! This crate contains the wire model spoken with the mixing backend:
//! entity representations, partial updates, push events and request bodies.

/// Default port of the mixing backend.
pub const DEFAULT_PORT: u16 = 5000;

pub mod api;
pub mod events;
pub mod id;
pub mod input;
pub mod library;
pub mod mixer;
pub mod output;
pub mod player;

// Re-export commonly used types
pub use events::{Created, DeskEvent};
pub use id::{ChannelId, EntityId, EntityRef};
pub use input::{Input, InputKind, InputPatch};
pub use library::{BrowsePath, PlaylistSummary, PlaylistTracks, Track, TrackPage, TrackQuery};
pub use mixer::{Channel, ChannelCreated, ChannelPatch, ChannelRef, Mixer, MixerDetail, MixerPatch};
pub use output::{Output, OutputKind, OutputPatch};
pub use player::{Player, PlayerDetail, PlayerPatch, PlayerState, PlayerTrack, TrackMode};
