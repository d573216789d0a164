//! # DTMF Jukebox
//!
//! Theme-selectable, keypad-navigable audio for live voice sessions.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     SIGNALING STACK (external)                        │
//! │   session established │ digit received │ session terminated          │
//! └───────────┬───────────────────┬─────────────────────┬────────────────┘
//!             │                   │                     │
//!             ▼                   ▼                     ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                 CallSession (session::call) - per call                │
//! │                                                                       │
//! │   ┌────────────────┐  TrackRequest  ┌──────────────────┐             │
//! │   │ MenuNavigator  │───────────────▶│ StreamDispatcher │  thread     │
//! │   │ (menu)         │                │ (stream)         │             │
//! │   └───────┬────────┘                └────────┬─────────┘             │
//! │           │ ActiveTheme                      │ start_stream          │
//! │           ▼                                  ▼                       │
//! │   ┌────────────────┐  default on EOS ┌──────────────────┐  ┌──────┐  │
//! │   │ ThemeCatalog   │◀────────────────│  AudioSupplier   │◀─│ffmpeg│  │
//! │   └────────────────┘                 │  pump thread     │  └──────┘  │
//! │                                      └────────┬─────────┘            │
//! │                                               │ push (waits if full) │
//! │                                               ▼                      │
//! │                                      ┌──────────────────┐            │
//! │                                      │   FrameQueue     │            │
//! │                                      └────────┬─────────┘            │
//! │                                               │ try_pop / silence    │
//! │                                               ▼                      │
//! │                                      ┌──────────────────┐            │
//! │                                      │    MediaPort     │            │
//! │                                      └────────┬─────────┘            │
//! └───────────────────────────────────────────────┼──────────────────────┘
//!                                                 ▼
//!                                   media transport, one frame per tick
//! ```
//!
//! Every session registers its [`session::ShutdownSignal`] in a shared
//! [`session::ShutdownRegistry`] so a process-wide interrupt can stop all
//! of them.

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod menu;
pub mod session;
pub mod stream;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default output sample rate
    pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

    /// Output is always mono
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Output is always 16-bit signed little-endian
    pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

    /// Transport cadence in microseconds (20 ms)
    pub const DEFAULT_FRAME_TIME_US: u32 = 20_000;

    /// Frame queue capacity in chunks (one second at 20 ms)
    pub const DEFAULT_BUFFER_CHUNKS: usize = 50;

    /// Volume applied to every decoded source
    pub const DEFAULT_GAIN: f32 = 0.2;

    /// Root of the theme directories and catalog files
    pub const DEFAULT_SOUND_DIR: &str = "./sound";
}
