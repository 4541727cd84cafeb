//! Connection state and channel-based IPC between async operations and the
//! session task.

use crate::api::{ApiResult, DeleteTarget};
use crate::store::SeedTicket;
use mixdesk_types::{Channel, ChannelId, EntityId, Input, Mixer, Output, Player, PlayerDetail};

/// Messages sent from spawned fetches and gateway calls to the session task.
#[derive(Debug)]
pub(crate) enum SessionMessage {
    InputsLoaded(SeedTicket, ApiResult<Vec<Input>>),
    OutputsLoaded(SeedTicket, ApiResult<Vec<Output>>),
    MixersLoaded(SeedTicket, ApiResult<Vec<Mixer>>),
    ChannelsLoaded {
        mixer: EntityId,
        ticket: SeedTicket,
        result: ApiResult<Vec<Channel>>,
    },
    PlayersLoaded(SeedTicket, ApiResult<Vec<Player>>),
    /// Live-player detail fetched after the player appeared
    PlayerDetailLoaded {
        id: EntityId,
        result: ApiResult<PlayerDetail>,
    },

    /// Entities this client created, as confirmed by the backend
    InputsCreated(Vec<Input>),
    OutputsCreated(Vec<Output>),
    MixersCreated(Vec<Mixer>),
    ChannelAdded {
        mixer: EntityId,
        channel: ChannelId,
    },
    PlayerCreated(Player),
    /// Successful delete issued by this client
    Deleted(DeleteTarget),

    /// Re-seed every collection
    Resync,
}

/// Event stream connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected to backend
    Connected,
    /// Disconnected from backend
    Disconnected,
    /// Attempting to reconnect
    Reconnecting { attempt: u32 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Reconnecting { .. } => "Reconnecting",
        }
    }
}
