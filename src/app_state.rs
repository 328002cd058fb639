//! Composition root. `AppState` wires the `Registry`, `StreamerRegistry`,
//! `ChannelRegistry`, `Config`, and silence buffer together so HTTP handlers
//! can close over one cloneable value instead of reaching for module-scope
//! singletons.

use std::sync::Arc;

use bytes::Bytes;

use crate::channel::ChannelRegistry;
use crate::config::Config;
use crate::registry::Registry;
use crate::silence::load_silence;
use crate::streamer::StreamerRegistry;
use crate::transcoder::TranscoderSpawner;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub channels: Arc<ChannelRegistry>,
    pub streamers: Arc<StreamerRegistry>,
    pub silence: Bytes,
}

impl AppState {
    pub fn new(config: Config, registry: Arc<dyn Registry>, spawner: Arc<dyn TranscoderSpawner>) -> Self {
        let config = Arc::new(config);
        let silence = load_silence(&config);
        let streamers = Arc::new(StreamerRegistry::new(
            registry,
            spawner,
            Arc::clone(&config),
        ));
        Self {
            config,
            channels: Arc::new(ChannelRegistry::new()),
            streamers,
            silence,
        }
    }
}
