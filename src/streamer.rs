//! A Streamer owns one playlist's transcoding pipeline and fans its output
//! out to every attached listener. At most one live Streamer exists per
//! playlist at any instant; it self-terminates after a period with no
//! listener activity and is recreated lazily on next use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::listener::{ListenerId, ListenerQueue};
use crate::registry::Registry;
use crate::transcoder::TranscoderSpawner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamerCommand {
    Next,
    Stop,
}

#[derive(Debug, thiserror::Error)]
pub enum SendCommandError {
    #[error("streamer command inbox is closed")]
    Closed,
}

type ListenerTable = HashMap<String, HashMap<ListenerId, ListenerQueue>>;

pub struct Streamer {
    playlist_name: String,
    listeners: Mutex<ListenerTable>,
    command_tx: mpsc::Sender<StreamerCommand>,
    command_rx: Mutex<Option<mpsc::Receiver<StreamerCommand>>>,
    last_listener_time: Mutex<Instant>,
    terminated: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    registry: Arc<dyn Registry>,
    spawner: Arc<dyn TranscoderSpawner>,
    config: Arc<Config>,
}

impl Streamer {
    pub fn new(
        playlist_name: impl Into<String>,
        registry: Arc<dyn Registry>,
        spawner: Arc<dyn TranscoderSpawner>,
        config: Arc<Config>,
    ) -> Arc<Self> {
        let (command_tx, command_rx) = mpsc::channel(16);
        Arc::new(Self {
            playlist_name: playlist_name.into(),
            listeners: Mutex::new(HashMap::new()),
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            last_listener_time: Mutex::new(Instant::now()),
            terminated: AtomicBool::new(false),
            task: Mutex::new(None),
            registry,
            spawner,
            config,
        })
    }

    pub fn playlist_name(&self) -> &str {
        &self.playlist_name
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Starts the supervision task. Idempotent: a second call is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        let rx = self
            .command_rx
            .lock()
            .take()
            .expect("command_rx taken exactly once, guarded by task slot above");
        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            this.supervise(rx).await;
        }));
    }

    pub fn attach_listener(&self, channel: &str, id: ListenerId, queue: ListenerQueue) {
        self.listeners
            .lock()
            .entry(channel.to_string())
            .or_default()
            .insert(id, queue);
    }

    pub fn detach_listener(&self, channel: &str, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        if let Some(set) = listeners.get_mut(channel) {
            set.remove(&id);
            if set.is_empty() {
                listeners.remove(channel);
            }
        }
    }

    /// Removes every queue attached under `channel` and returns them, for use
    /// by [`crate::channel::Channel::play_playlist`] migration.
    pub fn take_channel_listeners(&self, channel: &str) -> HashMap<ListenerId, ListenerQueue> {
        self.listeners.lock().remove(channel).unwrap_or_default()
    }

    pub fn attach_listeners(&self, channel: &str, queues: HashMap<ListenerId, ListenerQueue>) {
        if queues.is_empty() {
            return;
        }
        self.listeners
            .lock()
            .entry(channel.to_string())
            .or_default()
            .extend(queues);
    }

    pub fn send_command(&self, cmd: StreamerCommand) -> Result<(), SendCommandError> {
        self.command_tx
            .try_send(cmd)
            .map_err(|_| SendCommandError::Closed)
    }

    async fn supervise(self: Arc<Self>, mut command_rx: mpsc::Receiver<StreamerCommand>) {
        info!(playlist = %self.playlist_name, "streamer supervision task starting");
        'outer: loop {
            let track_keys = self.registry.get_playlist(&self.playlist_name).await;
            let mut track_keys = match track_keys {
                Some(keys) if !keys.is_empty() => keys,
                _ => {
                    debug!(playlist = %self.playlist_name, "playlist empty or unresolved, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };
            track_keys.shuffle(&mut rand::thread_rng());

            let mut resolved_tracks = Vec::with_capacity(track_keys.len());
            for track_key in track_keys {
                match self.registry.get_track_filename(&track_key).await {
                    Some(filename) => resolved_tracks.push((track_key, filename)),
                    None => warn!(track = %track_key, "track key unresolvable, skipping"),
                }
            }
            if resolved_tracks.is_empty() {
                debug!(playlist = %self.playlist_name, "no tracks resolved, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }

            for (track_key, filename) in resolved_tracks {
                let url = self.registry.get_signed_url(&filename).await;

                let mut transcoder = match self.spawner.spawn(&url).await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(track = %track_key, error = %e, "failed to spawn transcoder, skipping track");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let mut buf = vec![0u8; self.config.chunk_size];
                let outcome = loop {
                    match command_rx.try_recv() {
                        Ok(StreamerCommand::Stop) => break TrackOutcome::Stop,
                        Ok(StreamerCommand::Next) => break TrackOutcome::Next,
                        Err(mpsc::error::TryRecvError::Empty) => {}
                        Err(mpsc::error::TryRecvError::Disconnected) => break TrackOutcome::Stop,
                    }

                    let n = match transcoder.read_chunk(&mut buf).await {
                        Ok(0) => break TrackOutcome::EndOfTrack,
                        Ok(n) => n,
                        Err(e) => {
                            warn!(track = %track_key, error = %e, "transcoder read error, abandoning track");
                            break TrackOutcome::EndOfTrack;
                        }
                    };

                    let chunk = bytes::Bytes::copy_from_slice(&buf[..n]);
                    self.broadcast_chunk(chunk);

                    if self.is_idle() {
                        break TrackOutcome::IdleTimeout;
                    }

                    // A real transcoder's stdout read yields naturally while
                    // data is produced in real time; an in-memory test double
                    // does not, so yield explicitly to keep the runtime fair.
                    tokio::task::yield_now().await;
                };

                transcoder.kill().await;

                match outcome {
                    TrackOutcome::Stop => {
                        info!(playlist = %self.playlist_name, "streamer received stop, terminating");
                        break 'outer;
                    }
                    TrackOutcome::IdleTimeout => {
                        info!(playlist = %self.playlist_name, "streamer idle timeout, terminating");
                        break 'outer;
                    }
                    TrackOutcome::Next | TrackOutcome::EndOfTrack => continue,
                }
            }
        }
        self.terminated.store(true, Ordering::SeqCst);
    }

    fn broadcast_chunk(&self, chunk: bytes::Bytes) {
        let listeners = self.listeners.lock();
        if !listeners.is_empty() {
            *self.last_listener_time.lock() = Instant::now();
        }
        for set in listeners.values() {
            for queue in set.values() {
                queue.offer(chunk.clone());
            }
        }
    }

    fn is_idle(&self) -> bool {
        let last = *self.last_listener_time.lock();
        last.elapsed() > self.config.idle_timeout
    }
}

enum TrackOutcome {
    Stop,
    Next,
    EndOfTrack,
    IdleTimeout,
}

/// Process-wide map from playlist name to its live Streamer, with
/// create-or-reuse-or-replace-if-dead semantics under a single lock.
pub struct StreamerRegistry {
    streamers: Mutex<HashMap<String, Arc<Streamer>>>,
    registry: Arc<dyn Registry>,
    spawner: Arc<dyn TranscoderSpawner>,
    config: Arc<Config>,
}

impl StreamerRegistry {
    pub fn new(
        registry: Arc<dyn Registry>,
        spawner: Arc<dyn TranscoderSpawner>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            streamers: Mutex::new(HashMap::new()),
            registry,
            spawner,
            config,
        }
    }

    /// Returns the live Streamer for `playlist_name` if one is currently
    /// registered and has not terminated. Does not create one.
    pub fn existing(&self, playlist_name: &str) -> Option<Arc<Streamer>> {
        let streamers = self.streamers.lock();
        streamers
            .get(playlist_name)
            .filter(|s| !s.is_terminated())
            .cloned()
    }

    /// Returns the live Streamer for `playlist_name`, creating (and
    /// starting) one if none exists or the existing one has terminated.
    pub fn get_or_create(&self, playlist_name: &str) -> Arc<Streamer> {
        let mut streamers = self.streamers.lock();
        if let Some(existing) = streamers.get(playlist_name) {
            if !existing.is_terminated() {
                return Arc::clone(existing);
            }
        }
        let streamer = Streamer::new(
            playlist_name,
            Arc::clone(&self.registry),
            Arc::clone(&self.spawner),
            Arc::clone(&self.config),
        );
        streamer.start();
        streamers.insert(playlist_name.to_string(), Arc::clone(&streamer));
        streamer
    }
}
