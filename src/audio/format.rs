//! Raw PCM output format shared by the decoder, the frame queue and the
//! media port.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FRAME_TIME_US, DEFAULT_SAMPLE_RATE};

/// Signed little-endian PCM layout of every chunk in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Cadence of the media transport in microseconds
    pub frame_time_us: u32,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16, frame_time_us: u32) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            frame_time_us,
        }
    }

    /// Mono 16-bit at the given rate with the default 20 ms cadence
    pub fn mono16(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1, 16, DEFAULT_FRAME_TIME_US)
    }

    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    /// Frame duration in seconds
    pub fn frame_seconds(&self) -> f64 {
        self.frame_time_us as f64 / 1_000_000.0
    }

    /// Bytes in one chunk: sample_rate × frame_seconds × channels × bytes_per_sample
    pub fn chunk_size(&self) -> usize {
        let samples = self.sample_rate as u64 * self.frame_time_us as u64 / 1_000_000;
        samples as usize * self.channels as usize * self.bytes_per_sample()
    }

    /// One chunk of digital silence
    pub fn silence(&self) -> Bytes {
        Bytes::from(vec![0u8; self.chunk_size()])
    }

    /// Sample format name understood by the decoder (`s16le`)
    pub fn sample_format(&self) -> &'static str {
        "s16le"
    }

    /// Codec name understood by the decoder (`pcm_s16le`)
    pub fn codec(&self) -> &'static str {
        "pcm_s16le"
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::mono16(DEFAULT_SAMPLE_RATE)
    }
}
