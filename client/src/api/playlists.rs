use mixdesk_types::api::{CreatePlaylistRequest, PlaylistUpdate};
use mixdesk_types::{PlaylistSummary, PlaylistTracks};
use tracing::{debug, info};

use super::*;

impl ApiClient {
    pub async fn list_playlists(&self) -> ApiResult<Vec<PlaylistSummary>> {
        self.get_json("/playlist", "listing playlists").await
    }

    /// Tracks of a playlist in play order.
    pub async fn get_playlist(&self, id: u64) -> ApiResult<PlaylistTracks> {
        let tracks: PlaylistTracks = self
            .get_json(&format!("/playlist/{}", id), "fetching playlist")
            .await?;
        debug!("Playlist {} has {} track(s)", id, tracks.len());
        Ok(tracks)
    }

    /// Create an empty playlist, returning its id.
    pub async fn create_playlist(&self, request: &CreatePlaylistRequest) -> ApiResult<u64> {
        info!("Creating playlist: {}", request.name);
        let id: u64 = self
            .post_json("/playlist", request, "creating playlist")
            .await?;
        info!("Created playlist {}", id);
        Ok(id)
    }

    /// Rename a playlist or replace its track order.
    pub async fn update_playlist(&self, id: u64, update: &PlaylistUpdate) -> ApiResult<()> {
        self.put_json(&format!("/playlist/{}", id), update, "updating playlist")
            .await
    }

    pub async fn delete_playlist(&self, id: u64) -> ApiResult<()> {
        info!("Deleting playlist: {}", id);
        self.delete_path(&format!("/playlist/{}", id), "deleting playlist")
            .await
    }
}
