//! External decode process
//!
//! Decoding is delegated to a child process that turns a local file or a
//! remote URL into raw PCM on its stdout. The pipeline only sees the
//! [`DecodeLauncher`] seam: a byte reader plus a small control handle to
//! kill the process and poll for its exit.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::format::PcmFormat;
use crate::error::SourceError;

/// Interval between exit polls while waiting on a killed process
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Kill / wait half of a running decode process
pub trait ProcessControl: Send {
    /// Ask the process to terminate
    fn kill(&mut self) -> Result<(), SourceError>;

    /// Non-blocking exit check; `true` once the process has exited
    fn try_wait(&mut self) -> Result<bool, SourceError>;
}

/// A freshly launched decode process
pub struct DecodeHandle {
    /// Raw PCM in the requested [`PcmFormat`]
    pub output: Box<dyn Read + Send>,
    pub control: Box<dyn ProcessControl>,
}

/// Starts decode processes for a source address
pub trait DecodeLauncher: Send + Sync {
    fn launch(&self, source: &str, format: &PcmFormat) -> Result<DecodeHandle, SourceError>;
}

/// Wait up to `timeout` for the process to exit.
/// Returns `false` if it was still running at the deadline.
pub fn wait_timeout(control: &mut dyn ProcessControl, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match control.try_wait() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Exit poll failed: {}", e);
                return false;
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(WAIT_POLL_INTERVAL.min(deadline - now));
    }
}

/// Read until `buf` is full or the stream ends.
/// Returns the number of bytes read; `0` means end of stream.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize, SourceError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SourceError::Read(e.to_string())),
        }
    }
    Ok(filled)
}

/// Launches `ffmpeg` writing attenuated PCM to stdout
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    binary: PathBuf,
    gain: f32,
}

impl FfmpegLauncher {
    pub fn new(binary: impl Into<PathBuf>, gain: f32) -> Self {
        Self {
            binary: binary.into(),
            gain,
        }
    }

    /// Command-line arguments for one source
    pub fn args(&self, source: &str, format: &PcmFormat) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-nostdin".into(),
            "-i".into(),
            source.into(),
            "-filter:a".into(),
            format!("volume={}", self.gain),
            "-f".into(),
            format.sample_format().into(),
            "-acodec".into(),
            format.codec().into(),
            "-ar".into(),
            format.sample_rate.to_string(),
            "-ac".into(),
            format.channels.to_string(),
            "pipe:1".into(),
        ]
    }
}

impl Default for FfmpegLauncher {
    fn default() -> Self {
        Self::new("ffmpeg", crate::constants::DEFAULT_GAIN)
    }
}

impl DecodeLauncher for FfmpegLauncher {
    fn launch(&self, source: &str, format: &PcmFormat) -> Result<DecodeHandle, SourceError> {
        let mut child = Command::new(&self.binary)
            .args(self.args(source, format))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            // Nobody drains stderr; a full pipe would stall the decoder
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SourceError::Launch {
                target: source.to_string(),
                reason: e.to_string(),
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(SourceError::MissingOutput);
        };

        tracing::debug!(pid = child.id(), source, "Decoder launched");

        Ok(DecodeHandle {
            output: Box::new(stdout),
            control: Box::new(ChildControl { child, reaped: false }),
        })
    }
}

/// Control handle over a spawned child
struct ChildControl {
    child: Child,
    reaped: bool,
}

impl ProcessControl for ChildControl {
    fn kill(&mut self) -> Result<(), SourceError> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            // Already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(SourceError::Kill(e.to_string())),
        }
    }

    fn try_wait(&mut self) -> Result<bool, SourceError> {
        if self.reaped {
            return Ok(true);
        }
        let exited = self
            .child
            .try_wait()
            .map_err(|e| SourceError::Kill(e.to_string()))?
            .is_some();
        self.reaped = exited;
        Ok(exited)
    }
}

impl Drop for ChildControl {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.try_wait();
        }
    }
}
