//! Decode-process wrapper
//!
//! Spawns and controls the external decoder that feeds raw PCM into the
//! pipeline.

pub mod decoder;

#[cfg(test)]
pub(crate) mod testing;

pub use decoder::{DecodeHandle, DecodeLauncher, FfmpegLauncher, ProcessControl};
