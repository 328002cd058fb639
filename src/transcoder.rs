//! External collaborator: spawns the decode/encode subprocess (conventionally
//! `ffmpeg`) and reads its stdout as a byte stream. The process is always
//! killed and reaped, regardless of which exit path triggers it.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::warn;

/// A running transcoder: something we can read encoded bytes from, and must
/// kill and reap when we are done with it.
pub struct TranscoderProcess {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    child: Option<Child>,
}

impl TranscoderProcess {
    pub fn from_reader(reader: Box<dyn AsyncRead + Unpin + Send>) -> Self {
        Self {
            reader,
            child: None,
        }
    }

    /// Reads up to `buf.len()` bytes. A short read (fewer bytes than `buf`'s
    /// length but greater than zero) is not end-of-stream; only a zero-length
    /// read is.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf).await
    }

    /// Kills the subprocess (if any) and waits on it so it never becomes a
    /// zombie. Safe to call on a process backed by a plain reader (tests);
    /// it is then a no-op.
    pub async fn kill(mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to signal transcoder process for shutdown");
            }
            if let Err(e) = child.wait().await {
                warn!(error = %e, "failed to reap transcoder process");
            }
        }
    }
}

/// Spawns a [`TranscoderProcess`] for a given source URL. Abstracted behind a
/// trait so tests can substitute a deterministic byte source without a real
/// `ffmpeg` binary or network access.
#[async_trait]
pub trait TranscoderSpawner: Send + Sync {
    async fn spawn(&self, url: &str) -> std::io::Result<TranscoderProcess>;
}

/// Spawns a real `ffmpeg` subprocess, equivalent to:
///
/// ```text
/// ffmpeg -re -i <url> -vn -acodec libmp3lame -ar 44100 -b:a 128k -f mp3 -
/// ```
pub struct FfmpegSpawner {
    pub binary: String,
}

impl Default for FfmpegSpawner {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }
}

#[async_trait]
impl TranscoderSpawner for FfmpegSpawner {
    async fn spawn(&self, url: &str) -> std::io::Result<TranscoderProcess> {
        let mut child = Command::new(&self.binary)
            .args([
                "-re",
                "-i",
                url,
                "-vn",
                "-acodec",
                "libmp3lame",
                "-ar",
                "44100",
                "-b:a",
                "128k",
                "-f",
                "mp3",
                "-",
            ])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg child had no stdout pipe"))?;

        Ok(TranscoderProcess {
            reader: Box::new(stdout),
            child: Some(child),
        })
    }
}

/// Test doubles for [`TranscoderSpawner`]. Not gated behind `#[cfg(test)]`
/// because integration tests under `tests/` link against this crate as an
/// ordinary dependency and need it too.
pub mod test_support {
    use super::*;
    use std::io::Cursor;
    use tokio::sync::Mutex;

    /// A [`TranscoderSpawner`] that serves preset byte payloads instead of
    /// running a subprocess, keyed by call order. Every URL spawn consumes
    /// the next payload in the list; once exhausted, the last payload is
    /// repeated.
    pub struct FakeSpawner {
        payloads: Mutex<Vec<Vec<u8>>>,
        next: std::sync::atomic::AtomicUsize,
    }

    impl FakeSpawner {
        pub fn new(payloads: Vec<Vec<u8>>) -> Self {
            Self {
                payloads: Mutex::new(payloads),
                next: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TranscoderSpawner for FakeSpawner {
        async fn spawn(&self, _url: &str) -> std::io::Result<TranscoderProcess> {
            let payloads = self.payloads.lock().await;
            if payloads.is_empty() {
                return Ok(TranscoderProcess::from_reader(Box::new(Cursor::new(
                    Vec::new(),
                ))));
            }
            let idx = self
                .next
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                .min(payloads.len() - 1);
            let data = payloads[idx].clone();
            Ok(TranscoderProcess::from_reader(Box::new(Cursor::new(data))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeSpawner;
    use super::*;

    #[tokio::test]
    async fn test_fake_spawner_yields_configured_bytes() {
        let spawner = FakeSpawner::new(vec![b"hello-world".to_vec()]);
        let mut proc = spawner.spawn("ignored://url").await.unwrap();
        let mut buf = vec![0u8; 32];
        let n = proc.read_chunk(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello-world");
        // second read hits EOF
        let n2 = proc.read_chunk(&mut buf).await.unwrap();
        assert_eq!(n2, 0);
    }

    #[tokio::test]
    async fn test_kill_on_reader_backed_process_is_a_no_op() {
        let proc = TranscoderProcess::from_reader(Box::new(std::io::Cursor::new(Vec::new())));
        proc.kill().await; // must not panic or hang
    }

    #[tokio::test]
    async fn test_short_reads_are_not_eof() {
        let spawner = FakeSpawner::new(vec![vec![1, 2, 3, 4, 5]]);
        let mut proc = spawner.spawn("ignored://url").await.unwrap();
        let mut buf = vec![0u8; 2];
        let n1 = proc.read_chunk(&mut buf).await.unwrap();
        assert_eq!(n1, 2);
        let n2 = proc.read_chunk(&mut buf).await.unwrap();
        assert_eq!(n2, 2);
        let n3 = proc.read_chunk(&mut buf).await.unwrap();
        assert_eq!(n3, 1);
        let n4 = proc.read_chunk(&mut buf).await.unwrap();
        assert_eq!(n4, 0);
    }
}
