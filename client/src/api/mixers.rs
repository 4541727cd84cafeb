use mixdesk_types::api::{ChannelUpdate, CreateMixerRequest, MixerUpdate};
use mixdesk_types::{Channel, ChannelId, EntityId, Mixer, MixerDetail};
use tracing::info;

use super::*;

impl ApiClient {
    /// List all mixers, without their channels.
    pub async fn list_mixers(&self) -> ApiResult<Vec<Mixer>> {
        let mixers: Vec<Mixer> = self.get_json("/audio/mixer", "listing mixers").await?;
        info!("Loaded {} mixers", mixers.len());
        Ok(mixers)
    }

    /// Get one mixer with its channel list.
    pub async fn get_mixer(&self, id: &EntityId) -> ApiResult<MixerDetail> {
        self.get_json(&format!("/audio/mixer/{}", id), "fetching mixer")
            .await
    }

    pub async fn mixer_channels(&self, id: &EntityId) -> ApiResult<Vec<Channel>> {
        Ok(self.get_mixer(id).await?.channels)
    }

    /// Create a mixer. The backend answers with the created mixers.
    pub async fn create_mixer(&self, request: &CreateMixerRequest) -> ApiResult<Vec<Mixer>> {
        info!(
            "Creating mixer: {} ({} channels)",
            request.display_name, request.channels
        );
        let created: Vec<Mixer> = self
            .post_json("/audio/mixer", request, "creating mixer")
            .await?;
        info!("Created {} mixer(s)", created.len());
        Ok(created)
    }

    pub async fn update_mixer(&self, id: &EntityId, update: &MixerUpdate) -> ApiResult<()> {
        self.put_json(&format!("/audio/mixer/{}", id), update, "updating mixer")
            .await
    }

    pub async fn delete_mixer(&self, id: &EntityId) -> ApiResult<()> {
        info!("Deleting mixer: {}", id);
        self.delete_path(&format!("/audio/mixer/{}", id), "deleting mixer")
            .await
    }

    /// Append a channel to a mixer, returning the new channel id.
    pub async fn add_channel(&self, mixer: &EntityId) -> ApiResult<ChannelId> {
        let channel: ChannelId = self
            .post_empty(&format!("/audio/mixer/{}/channel", mixer), "adding channel")
            .await?;
        info!("Added channel {} to mixer {}", channel, mixer);
        Ok(channel)
    }

    /// Change a channel's volume or routed source.
    pub async fn update_channel(
        &self,
        mixer: &EntityId,
        channel: ChannelId,
        update: &ChannelUpdate,
    ) -> ApiResult<()> {
        self.put_json(
            &format!("/audio/mixer/{}/channel/{}", mixer, channel),
            update,
            "updating channel",
        )
        .await
    }

    pub async fn delete_channel(&self, mixer: &EntityId, channel: ChannelId) -> ApiResult<()> {
        info!("Deleting channel {} of mixer {}", channel, mixer);
        self.delete_path(
            &format!("/audio/mixer/{}/channel/{}", mixer, channel),
            "deleting channel",
        )
        .await
    }
}
