//! The mapping from playlist name to track list, and from track to a
//! fetchable URL, is an external collaborator in production (a CSV or
//! spreadsheet-backed service, signed CloudFront URLs). This module defines
//! the minimal contract the rest of the crate needs and a single concrete,
//! static-file-backed implementation sufficient to run and test the system
//! end to end.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

/// External collaborator: playlist name -> track keys -> fetchable URL.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get_playlist(&self, name: &str) -> Option<Vec<String>>;
    async fn get_track_filename(&self, track_key: &str) -> Option<String>;
    async fn get_signed_url(&self, filename: &str) -> String;
}

#[derive(Debug, Deserialize, Default)]
struct RegistryFile {
    #[serde(default)]
    playlists: HashMap<String, Vec<String>>,
    #[serde(default)]
    tracks: HashMap<String, String>,
}

/// A [`Registry`] backed by a single static YAML file. Not a reimplementation
/// of the CSV/spreadsheet-backed production registry; a minimal stand-in so
/// the rest of the crate is runnable and testable without one.
pub struct StaticRegistry {
    playlists: HashMap<String, Vec<String>>,
    tracks: HashMap<String, String>,
    base_url: String,
}

impl StaticRegistry {
    pub fn new(
        playlists: HashMap<String, Vec<String>>,
        tracks: HashMap<String, String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            playlists,
            tracks,
            base_url: base_url.into(),
        }
    }

    pub fn empty() -> Self {
        Self {
            playlists: HashMap::new(),
            tracks: HashMap::new(),
            base_url: "file://".to_string(),
        }
    }

    /// Load from a YAML file on disk. Missing file yields an empty registry
    /// (a playlist referenced before the registry file is populated is a
    /// routine, not an error condition — see the Streamer retry loop).
    pub fn load_from_path(path: impl AsRef<Path>, base_url: impl Into<String>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<RegistryFile>(&contents) {
                Ok(file) => Self::new(file.playlists, file.tracks, base_url),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "failed to parse registry file, starting empty");
                    Self::new(HashMap::new(), HashMap::new(), base_url)
                }
            },
            Err(e) => {
                warn!(error = %e, path = %path.display(), "registry file unreadable, starting empty");
                Self::new(HashMap::new(), HashMap::new(), base_url)
            }
        }
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn get_playlist(&self, name: &str) -> Option<Vec<String>> {
        self.playlists.get(name).cloned()
    }

    async fn get_track_filename(&self, track_key: &str) -> Option<String> {
        self.tracks.get(track_key).cloned()
    }

    async fn get_signed_url(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> StaticRegistry {
        let mut playlists = HashMap::new();
        playlists.insert(
            "morning".to_string(),
            vec!["track-a".to_string(), "track-b".to_string()],
        );
        let mut tracks = HashMap::new();
        tracks.insert("track-a".to_string(), "a.mp3".to_string());
        tracks.insert("track-b".to_string(), "b.mp3".to_string());
        StaticRegistry::new(playlists, tracks, "file:///music")
    }

    #[tokio::test]
    async fn test_get_playlist_known() {
        let reg = sample_registry();
        let tracks = reg.get_playlist("morning").await.unwrap();
        assert_eq!(tracks, vec!["track-a".to_string(), "track-b".to_string()]);
    }

    #[tokio::test]
    async fn test_get_playlist_unknown_returns_none() {
        let reg = sample_registry();
        assert!(reg.get_playlist("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_get_track_filename_unresolvable_returns_none() {
        let reg = sample_registry();
        assert!(reg.get_track_filename("ghost-track").await.is_none());
    }

    #[tokio::test]
    async fn test_get_signed_url_joins_base() {
        let reg = sample_registry();
        let url = reg.get_signed_url("a.mp3").await;
        assert_eq!(url, "file:///music/a.mp3");
    }

    #[tokio::test]
    async fn test_load_from_missing_path_is_empty() {
        let reg = StaticRegistry::load_from_path("/nonexistent/registry.yaml", "file:///music");
        assert!(reg.get_playlist("anything").await.is_none());
    }
}
