use mixdesk_types::api::{
    CreatePlayerRequest, JingleCountRequest, JinglePlaylistRequest, PlayerUpdate,
    SetPlayerStateRequest, SetTracksRequest,
};
use mixdesk_types::id::empty_as_none;
use mixdesk_types::{EntityId, Player, PlayerDetail, PlayerState, PlayerTrack};
use serde::Deserialize;
use tracing::info;

use super::*;

/// Body of `GET /player/{id}/jingle_playlist`; an empty string means none.
#[derive(Deserialize)]
struct JinglePlaylistResponse(#[serde(deserialize_with = "empty_as_none")] Option<EntityId>);

impl ApiClient {
    /// List live players (id and name only).
    pub async fn list_players(&self) -> ApiResult<Vec<Player>> {
        let players: Vec<Player> = self.get_json("/player", "listing players").await?;
        info!("Loaded {} players", players.len());
        Ok(players)
    }

    /// Create a live player, returning its id.
    pub async fn create_player(&self, request: &CreatePlayerRequest) -> ApiResult<EntityId> {
        info!("Creating player: {}", request.name);
        let id: EntityId = self
            .post_json("/player", request, "creating player")
            .await?;
        info!("Created player {}", id);
        Ok(id)
    }

    pub async fn update_player(&self, id: &EntityId, update: &PlayerUpdate) -> ApiResult<()> {
        self.put_json(&format!("/player/{}", id), update, "updating player")
            .await
    }

    pub async fn delete_player(&self, id: &EntityId) -> ApiResult<()> {
        info!("Deleting player: {}", id);
        self.delete_path(&format!("/player/{}", id), "deleting player")
            .await
    }

    pub async fn get_player_state(&self, id: &EntityId) -> ApiResult<PlayerState> {
        self.get_json(&format!("/player/{}/state", id), "fetching player state")
            .await
    }

    pub async fn get_player_tracks(&self, id: &EntityId) -> ApiResult<Vec<PlayerTrack>> {
        self.get_json(&format!("/player/{}/tracks", id), "fetching player tracks")
            .await
    }

    pub async fn get_jingle_count(&self, id: &EntityId) -> ApiResult<Option<u32>> {
        self.get_json(
            &format!("/player/{}/jingle_count", id),
            "fetching jingle count",
        )
        .await
    }

    pub async fn get_jingle_playlist(&self, id: &EntityId) -> ApiResult<Option<EntityId>> {
        let response: JinglePlaylistResponse = self
            .get_json(
                &format!("/player/{}/jingle_playlist", id),
                "fetching jingle playlist",
            )
            .await?;
        Ok(response.0)
    }

    /// Gather the live-player detail that the list endpoint leaves out.
    pub async fn player_detail(&self, id: &EntityId) -> ApiResult<PlayerDetail> {
        let (state, tracks, jingle_count, jingle_playlist) = tokio::try_join!(
            self.get_player_state(id),
            self.get_player_tracks(id),
            self.get_jingle_count(id),
            self.get_jingle_playlist(id),
        )?;
        Ok(PlayerDetail {
            state,
            jingle_count,
            jingle_playlist,
            tracks,
        })
    }

    /// Start or pause playback.
    pub async fn set_player_state(&self, id: &EntityId, state: PlayerState) -> ApiResult<()> {
        info!("Setting player {} to {:?}", id, state);
        self.put_json(
            &format!("/player/{}/state", id),
            &SetPlayerStateRequest { state },
            "setting player state",
        )
        .await
    }

    /// Replace the queue of a player.
    pub async fn set_player_tracks(&self, id: &EntityId, tracks: &[PlayerTrack]) -> ApiResult<()> {
        info!("Setting {} track(s) on player {}", tracks.len(), id);
        self.put_json(
            &format!("/player/{}/tracks", id),
            &SetTracksRequest::from(tracks),
            "setting player tracks",
        )
        .await
    }

    /// Play a jingle every `count` tracks; `None` disables jingles.
    pub async fn set_jingle_count(&self, id: &EntityId, count: Option<u32>) -> ApiResult<()> {
        self.put_json(
            &format!("/player/{}/jingle_count", id),
            &JingleCountRequest { count },
            "setting jingle count",
        )
        .await
    }

    pub async fn set_jingle_playlist(
        &self,
        id: &EntityId,
        playlist: Option<EntityId>,
    ) -> ApiResult<()> {
        self.put_json(
            &format!("/player/{}/jingle_playlist", id),
            &JinglePlaylistRequest { id: playlist },
            "setting jingle playlist",
        )
        .await
    }
}
