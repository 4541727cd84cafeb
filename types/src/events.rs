//! Push events broadcast by the backend to every connected client.

use crate::id::{empty_as_none, EntityId, EntityRef};
use crate::input::{Input, InputPatch};
use crate::mixer::{ChannelCreated, ChannelPatch, ChannelRef, Mixer, MixerPatch};
use crate::output::{Output, OutputPatch};
use crate::player::{Player, PlayerPatch, PlayerState, PlayerTrack};
use serde::{Deserialize, Serialize};

/// Payload of a `*_create` event.
///
/// Some endpoints announce a batch of new entities in one event, others a
/// single entity; both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Created<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Created<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Created::Many(items) => items,
            Created::One(item) => vec![item],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Created::Many(items) => items.len(),
            Created::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Event types that can be broadcast to all connected clients.
///
/// Mutating events carry only the identifying and changed fields of one
/// entity; nested channel events are scoped by their mixer id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DeskEvent {
    InputCreate(Created<Input>),
    InputUpdate(InputPatch),
    InputRemove(EntityRef),

    OutputCreate(Created<Output>),
    OutputUpdate(OutputPatch),
    OutputRemove(EntityRef),

    MixerCreate(Created<Mixer>),
    MixerUpdate(MixerPatch),
    MixerRemove(EntityRef),

    MixerChannelCreate(ChannelCreated),
    MixerChannelUpdate(ChannelPatch),
    MixerChannelRemove(ChannelRef),

    PlayerCreate(Created<Player>),
    PlayerUpdate(PlayerPatch),
    PlayerRemove(EntityRef),

    /// Transport state of one player changed
    #[serde(rename = "player_state")]
    PlayerStateChanged { id: EntityId, state: PlayerState },
    /// Queue of one player was replaced
    PlayerTracks {
        id: EntityId,
        tracks: Vec<PlayerTrack>,
    },
    /// `count` is null once jingles are switched off
    PlayerJingleCount {
        id: EntityId,
        #[serde(default)]
        count: Option<u32>,
    },
    PlayerJinglePlaylist {
        id: EntityId,
        #[serde(default, deserialize_with = "empty_as_none")]
        playlist: Option<EntityId>,
    },
    /// Periodic playback position, in seconds
    PlayerTrackTime { id: EntityId, time: f64 },

    /// Keep-alive
    Ping,
}

impl DeskEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DeskEvent::InputCreate(items) => format!("{} input(s) created", items.len()),
            DeskEvent::InputUpdate(patch) => format!("Input {} updated", patch.id),
            DeskEvent::InputRemove(r) => format!("Input {} removed", r.id),
            DeskEvent::OutputCreate(items) => format!("{} output(s) created", items.len()),
            DeskEvent::OutputUpdate(patch) => format!("Output {} updated", patch.id),
            DeskEvent::OutputRemove(r) => format!("Output {} removed", r.id),
            DeskEvent::MixerCreate(items) => format!("{} mixer(s) created", items.len()),
            DeskEvent::MixerUpdate(patch) => format!("Mixer {} updated", patch.id),
            DeskEvent::MixerRemove(r) => format!("Mixer {} removed", r.id),
            DeskEvent::MixerChannelCreate(c) => {
                format!("Channel {} created on mixer {}", c.channel, c.mixer)
            }
            DeskEvent::MixerChannelUpdate(p) => {
                format!("Channel {} updated on mixer {}", p.channel, p.mixer)
            }
            DeskEvent::MixerChannelRemove(r) => {
                format!("Channel {} removed from mixer {}", r.channel, r.mixer)
            }
            DeskEvent::PlayerCreate(items) => format!("{} player(s) created", items.len()),
            DeskEvent::PlayerUpdate(patch) => format!("Player {} updated", patch.id),
            DeskEvent::PlayerRemove(r) => format!("Player {} removed", r.id),
            DeskEvent::PlayerStateChanged { id, state } => {
                format!("Player {} state changed to {:?}", id, state)
            }
            DeskEvent::PlayerTracks { id, tracks } => {
                format!("Player {} queue set to {} track(s)", id, tracks.len())
            }
            DeskEvent::PlayerJingleCount { id, count: Some(count) } => {
                format!("Player {} plays a jingle every {} track(s)", id, count)
            }
            DeskEvent::PlayerJingleCount { id, count: None } => {
                format!("Player {} plays no jingles", id)
            }
            DeskEvent::PlayerJinglePlaylist { id, .. } => {
                format!("Player {} jingle playlist changed", id)
            }
            DeskEvent::PlayerTrackTime { id, time } => {
                format!("Player {} at {:.1}s", id, time)
            }
            DeskEvent::Ping => "Ping".to_string(),
        }
    }

    /// Player-scoped live events expressed as a patch of the player entity.
    pub fn player_patch(&self) -> Option<PlayerPatch> {
        let patch = match self {
            DeskEvent::PlayerUpdate(patch) => patch.clone(),
            DeskEvent::PlayerStateChanged { id, state } => PlayerPatch {
                id: id.clone(),
                state: Some(*state),
                ..Default::default()
            },
            DeskEvent::PlayerTracks { id, tracks } => PlayerPatch {
                id: id.clone(),
                tracks: Some(tracks.clone()),
                ..Default::default()
            },
            DeskEvent::PlayerJingleCount { id, count } => PlayerPatch {
                id: id.clone(),
                jingle_count: Some(*count),
                ..Default::default()
            },
            DeskEvent::PlayerJinglePlaylist { id, playlist } => PlayerPatch {
                id: id.clone(),
                jingle_playlist: Some(playlist.clone()),
                ..Default::default()
            },
            DeskEvent::PlayerTrackTime { id, time } => PlayerPatch {
                id: id.clone(),
                track_time: Some(*time),
                ..Default::default()
            },
            _ => return None,
        };
        Some(patch)
    }
}
