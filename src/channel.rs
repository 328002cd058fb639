//! A Channel is a stable, named pointer at whichever Streamer currently
//! serves the playlist it has been told to play. It owns no listener state
//! itself — listeners live in the Streamer's table — so re-pointing a
//! Channel at a new playlist is a matter of migrating entries between two
//! Streamers' tables, not copying data the Channel holds.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::streamer::{SendCommandError, Streamer, StreamerCommand, StreamerRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel has no active stream")]
    NoActiveStreamer,
}

pub struct Channel {
    name: String,
    current_playlist: RwLock<Option<String>>,
}

impl Channel {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_playlist: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_playlist(&self) -> Option<String> {
        self.current_playlist.read().clone()
    }

    /// Points this channel at `playlist`, migrating any listeners currently
    /// attached under this channel's name from the old Streamer (if any) to
    /// the new one in a single step. A no-op if `playlist` is already current.
    pub fn play_playlist(&self, playlist: &str, streamers: &StreamerRegistry) {
        let old = self.current_playlist.read().clone();
        if old.as_deref() == Some(playlist) {
            return;
        }

        let new_streamer = streamers.get_or_create(playlist);

        if let Some(old_playlist) = &old {
            // old_playlist != playlist is guaranteed here by the early return above.
            if let Some(old_streamer) = streamers.existing(old_playlist) {
                let migrated = old_streamer.take_channel_listeners(&self.name);
                if !migrated.is_empty() {
                    info!(
                        channel = %self.name,
                        from = %old_playlist,
                        to = %playlist,
                        count = migrated.len(),
                        "migrating listeners to new playlist"
                    );
                    new_streamer.attach_listeners(&self.name, migrated);
                }
            }
        }

        *self.current_playlist.write() = Some(playlist.to_string());
    }

    pub fn send_command(
        &self,
        cmd: StreamerCommand,
        streamers: &StreamerRegistry,
    ) -> Result<(), ChannelError> {
        let playlist = self
            .current_playlist
            .read()
            .clone()
            .ok_or(ChannelError::NoActiveStreamer)?;
        let streamer = streamers
            .existing(&playlist)
            .ok_or(ChannelError::NoActiveStreamer)?;
        streamer
            .send_command(cmd)
            .map_err(|SendCommandError::Closed| ChannelError::NoActiveStreamer)
    }

    /// Resolves the Streamer this channel currently points at, if any and if
    /// it is still live.
    pub fn current_streamer(&self, streamers: &StreamerRegistry) -> Option<Arc<Streamer>> {
        let playlist = self.current_playlist.read().clone()?;
        streamers.existing(&playlist)
    }
}

/// Process-wide map from channel name to its Channel, created lazily on
/// first reference and never removed except at process exit — §4.4 notes
/// that listener garbage collection operates on the Streamer's listener
/// table, not on the Channel object itself.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<Channel> {
        if let Some(existing) = self.channels.read().get(name) {
            return Arc::clone(existing);
        }
        let mut channels = self.channels.write();
        if let Some(existing) = channels.get(name) {
            return Arc::clone(existing);
        }
        let channel = Arc::new(Channel::new(name));
        channels.insert(name.to_string(), Arc::clone(&channel));
        channel
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().get(name).cloned()
    }
}
