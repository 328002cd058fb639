//! Silence buffer used to fill gaps in a listener's stream when the upstream
//! transcoder stalls.

use bytes::Bytes;
use tracing::{info, warn};

use crate::config::Config;

/// Loads the configured silence chunk once at startup. Falls back to an
/// all-zero buffer of `chunk_size` bytes if `SILENCE_PATH` is unset or
/// unreadable — a stalled upstream must never prevent a listener connection
/// from staying open, so this never fails.
pub fn load_silence(config: &Config) -> Bytes {
    if let Some(path) = &config.silence_path {
        match std::fs::read(path) {
            Ok(bytes) if !bytes.is_empty() => {
                info!(path = %path, bytes = bytes.len(), "loaded silence buffer");
                return Bytes::from(bytes);
            }
            Ok(_) => {
                warn!(path = %path, "silence file is empty, falling back to zero buffer");
            }
            Err(e) => {
                warn!(path = %path, error = %e, "could not read silence file, falling back to zero buffer");
            }
        }
    }
    Bytes::from(vec![0u8; config.chunk_size])
}
