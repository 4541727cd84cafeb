//! Seams between the session and the backend.
//!
//! The session only talks to the backend through these two traits, which
//! keeps the stores testable against in-memory fakes.

use async_trait::async_trait;
use mixdesk_types::api::{
    ChannelUpdate, CreateInputRequest, CreateMixerRequest, CreateOutputRequest,
    CreatePlayerRequest, InputUpdate, MixerUpdate, OutputUpdate, PlayerUpdate,
};
use mixdesk_types::{
    Channel, ChannelId, EntityId, Input, Mixer, Output, Player, PlayerDetail,
};
use std::fmt;

use super::{ApiClient, ApiResult};

/// Read side: full listings used to seed the stores.
#[async_trait]
pub trait SeedSource: Send + Sync + 'static {
    async fn list_inputs(&self) -> ApiResult<Vec<Input>>;
    async fn list_outputs(&self) -> ApiResult<Vec<Output>>;
    async fn list_mixers(&self) -> ApiResult<Vec<Mixer>>;
    async fn mixer_channels(&self, mixer: &EntityId) -> ApiResult<Vec<Channel>>;
    async fn list_players(&self) -> ApiResult<Vec<Player>>;
    async fn player_detail(&self, player: &EntityId) -> ApiResult<PlayerDetail>;
}

/// Entity addressed by a delete call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Input(EntityId),
    Output(EntityId),
    Mixer(EntityId),
    Channel(EntityId, ChannelId),
    Player(EntityId),
}

impl fmt::Display for DeleteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteTarget::Input(id) => write!(f, "input {}", id),
            DeleteTarget::Output(id) => write!(f, "output {}", id),
            DeleteTarget::Mixer(id) => write!(f, "mixer {}", id),
            DeleteTarget::Channel(mixer, channel) => {
                write!(f, "channel {} of mixer {}", channel, mixer)
            }
            DeleteTarget::Player(id) => write!(f, "player {}", id),
        }
    }
}

/// Write side: each call is independent and issued at most once.
#[async_trait]
pub trait WriteGateway: Send + Sync + 'static {
    async fn create_input(&self, request: &CreateInputRequest) -> ApiResult<Vec<Input>>;
    async fn create_output(&self, request: &CreateOutputRequest) -> ApiResult<Vec<Output>>;
    async fn create_mixer(&self, request: &CreateMixerRequest) -> ApiResult<Vec<Mixer>>;
    async fn add_channel(&self, mixer: &EntityId) -> ApiResult<ChannelId>;
    async fn create_player(&self, request: &CreatePlayerRequest) -> ApiResult<EntityId>;

    async fn update_input(&self, id: &EntityId, update: &InputUpdate) -> ApiResult<()>;
    async fn update_output(&self, id: &EntityId, update: &OutputUpdate) -> ApiResult<()>;
    async fn update_mixer(&self, id: &EntityId, update: &MixerUpdate) -> ApiResult<()>;
    async fn update_channel(
        &self,
        mixer: &EntityId,
        channel: ChannelId,
        update: &ChannelUpdate,
    ) -> ApiResult<()>;
    async fn update_player(&self, id: &EntityId, update: &PlayerUpdate) -> ApiResult<()>;

    async fn delete(&self, target: &DeleteTarget) -> ApiResult<()>;
}

#[async_trait]
impl SeedSource for ApiClient {
    async fn list_inputs(&self) -> ApiResult<Vec<Input>> {
        ApiClient::list_inputs(self).await
    }

    async fn list_outputs(&self) -> ApiResult<Vec<Output>> {
        ApiClient::list_outputs(self).await
    }

    async fn list_mixers(&self) -> ApiResult<Vec<Mixer>> {
        ApiClient::list_mixers(self).await
    }

    async fn mixer_channels(&self, mixer: &EntityId) -> ApiResult<Vec<Channel>> {
        ApiClient::mixer_channels(self, mixer).await
    }

    async fn list_players(&self) -> ApiResult<Vec<Player>> {
        ApiClient::list_players(self).await
    }

    async fn player_detail(&self, player: &EntityId) -> ApiResult<PlayerDetail> {
        ApiClient::player_detail(self, player).await
    }
}

#[async_trait]
impl WriteGateway for ApiClient {
    async fn create_input(&self, request: &CreateInputRequest) -> ApiResult<Vec<Input>> {
        ApiClient::create_input(self, request).await
    }

    async fn create_output(&self, request: &CreateOutputRequest) -> ApiResult<Vec<Output>> {
        ApiClient::create_output(self, request).await
    }

    async fn create_mixer(&self, request: &CreateMixerRequest) -> ApiResult<Vec<Mixer>> {
        ApiClient::create_mixer(self, request).await
    }

    async fn add_channel(&self, mixer: &EntityId) -> ApiResult<ChannelId> {
        ApiClient::add_channel(self, mixer).await
    }

    async fn create_player(&self, request: &CreatePlayerRequest) -> ApiResult<EntityId> {
        ApiClient::create_player(self, request).await
    }

    async fn update_input(&self, id: &EntityId, update: &InputUpdate) -> ApiResult<()> {
        ApiClient::update_input(self, id, update).await
    }

    async fn update_output(&self, id: &EntityId, update: &OutputUpdate) -> ApiResult<()> {
        ApiClient::update_output(self, id, update).await
    }

    async fn update_mixer(&self, id: &EntityId, update: &MixerUpdate) -> ApiResult<()> {
        ApiClient::update_mixer(self, id, update).await
    }

    async fn update_channel(
        &self,
        mixer: &EntityId,
        channel: ChannelId,
        update: &ChannelUpdate,
    ) -> ApiResult<()> {
        ApiClient::update_channel(self, mixer, channel, update).await
    }

    async fn update_player(&self, id: &EntityId, update: &PlayerUpdate) -> ApiResult<()> {
        ApiClient::update_player(self, id, update).await
    }

    async fn delete(&self, target: &DeleteTarget) -> ApiResult<()> {
        match target {
            DeleteTarget::Input(id) => self.delete_input(id).await,
            DeleteTarget::Output(id) => self.delete_output(id).await,
            DeleteTarget::Mixer(id) => self.delete_mixer(id).await,
            DeleteTarget::Channel(mixer, channel) => self.delete_channel(mixer, *channel).await,
            DeleteTarget::Player(id) => self.delete_player(id).await,
        }
    }
}
