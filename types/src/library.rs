//! Track library and playlists.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A library track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
    /// Length in seconds
    #[serde(default)]
    pub length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// One page of `GET /library/track` results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPage {
    /// Total number of matches across all pages
    pub count: u64,
    pub tracks: Vec<Track>,
}

/// Tracks of one playlist in play order, as `GET /playlist/{id}` returns them.
pub type PlaylistTracks = Vec<Track>;

/// Entry of `GET /playlist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: u64,
    pub name: String,
}

/// Paging parameters for `GET /library/track`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackQuery {
    pub query: String,
    pub page: u32,
    pub results: u32,
}

impl TrackQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 0,
            results: 10,
        }
    }
}

/// A directory on the backend host, as taken by `GET /browse{path}`.
///
/// Held as absolute path segments; `/` is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BrowsePath {
    segments: Vec<String>,
}

impl BrowsePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `/a/b`; empty segments are skipped.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Child directory, as listed by browsing `self`.
    pub fn join(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for BrowsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browse_path_parse_and_join() {
        let music = BrowsePath::parse("/home//dj/Music/");
        assert_eq!(music.segments(), ["home", "dj", "Music"]);
        assert_eq!(music.to_string(), "/home/dj/Music");

        let sets = music.join("Live sets");
        assert_eq!(sets.to_string(), "/home/dj/Music/Live sets");
        assert_eq!(sets.parent(), Some(music));

        assert!(BrowsePath::parse("/").is_root());
        assert_eq!(BrowsePath::root().to_string(), "/");
        assert_eq!(BrowsePath::root().parent(), None);
    }
}
