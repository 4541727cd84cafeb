use mixdesk_types::api::{LibraryRootRequest, TrackUpdate};
use mixdesk_types::{BrowsePath, Track, TrackPage, TrackQuery};
use tracing::{debug, info};

use super::*;

/// Request path for browsing `dir`, each segment percent-encoded.
fn browse_url_path(dir: &BrowsePath) -> String {
    let mut path = String::from("/browse");
    for segment in dir.segments() {
        path.push('/');
        path.push_str(&urlencoding::encode(segment));
    }
    path
}

impl ApiClient {
    /// Search the track library.
    pub async fn search_tracks(&self, query: &TrackQuery) -> ApiResult<TrackPage> {
        let path = format!(
            "/library/track?results={}&page={}&query={}",
            query.results,
            query.page,
            urlencoding::encode(&query.query)
        );
        let page: TrackPage = self.get_json(&path, "searching tracks").await?;
        debug!(
            "Track search {:?}: {} of {} match(es)",
            query.query,
            page.tracks.len(),
            page.count
        );
        Ok(page)
    }

    pub async fn track_info(&self, id: u64) -> ApiResult<Track> {
        self.get_json(&format!("/library/track/{}/info", id), "fetching track info")
            .await
    }

    /// Correct the artist or title of a library track.
    pub async fn update_track(&self, id: u64, update: &TrackUpdate) -> ApiResult<()> {
        self.put_json(&format!("/library/track/{}", id), update, "updating track")
            .await
    }

    /// Directories scanned into the library.
    pub async fn list_library_roots(&self) -> ApiResult<Vec<String>> {
        self.get_json("/library", "listing library roots").await
    }

    pub async fn add_library_root(&self, directory: &str) -> ApiResult<()> {
        info!("Adding library root: {}", directory);
        let request = LibraryRootRequest {
            directory: directory.to_string(),
        };
        let _: bool = self
            .post_json("/library", &request, "adding library root")
            .await?;
        Ok(())
    }

    pub async fn remove_library_root(&self, directory: &str) -> ApiResult<()> {
        info!("Removing library root: {}", directory);
        let request = LibraryRootRequest {
            directory: directory.to_string(),
        };
        self.delete_json("/library", &request, "removing library root")
            .await
    }

    /// Names of the visible subdirectories of `dir` on the backend host.
    pub async fn browse(&self, dir: &BrowsePath) -> ApiResult<Vec<String>> {
        let dirs: Vec<String> = self
            .get_json(&browse_url_path(dir), "browsing directories")
            .await?;
        debug!("{} has {} subdirectories", dir, dirs.len());
        Ok(dirs)
    }
}
