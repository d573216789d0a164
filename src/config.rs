//! Application configuration
//!
//! Loaded from TOML (explicit path, then the platform config directory,
//! then built-in defaults) with a few environment overrides applied last.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::format::PcmFormat;
use crate::constants::*;
use crate::error::{Error, Result};

/// Environment override for the output sample rate
pub const ENV_SAMPLE_RATE: &str = "JUKEBOX_SAMPLE_RATE";
/// Environment override for the comma-separated theme list
pub const ENV_THEMES: &str = "JUKEBOX_THEMES";
/// Environment override for the sound directory
pub const ENV_SOUND_DIR: &str = "JUKEBOX_SOUND_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub catalog: CatalogConfig,
    pub pipeline: PipelineConfig,
    pub sip: SipConfig,
}

/// Decoder output format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Transport cadence in microseconds
    pub frame_time_us: u32,
    /// Volume applied by the decoder to every source
    pub gain: f32,
    pub ffmpeg_path: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            frame_time_us: DEFAULT_FRAME_TIME_US,
            gain: DEFAULT_GAIN,
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl AudioConfig {
    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            self.frame_time_us,
        )
    }
}

/// Where theme maps and tracks live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub sound_dir: PathBuf,
    /// Theme names in navigation order
    pub themes: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            sound_dir: PathBuf::from(DEFAULT_SOUND_DIR),
            themes: Vec::new(),
        }
    }
}

/// Timings and limits of the per-session workers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frame queue capacity in chunks
    pub buffer_chunks: usize,
    /// Bounded wait for a killed decoder before its handle is released
    pub stop_timeout_ms: u64,
    /// Retry delay while the frame queue is full
    pub backpressure_ms: u64,
    /// Delay after each pushed chunk
    pub pacing_ms: u64,
    /// Consecutive empty streams after which the default track is no
    /// longer re-queued. The first empty stream always falls back.
    pub fallback_retry_limit: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_chunks: DEFAULT_BUFFER_CHUNKS,
            stop_timeout_ms: 1000,
            backpressure_ms: 10,
            pacing_ms: 10,
            fallback_retry_limit: 3,
        }
    }
}

impl PipelineConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn backpressure_delay(&self) -> Duration {
        Duration::from_millis(self.backpressure_ms)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Registration details handed to the signaling stack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SipConfig {
    pub domain: String,
    pub username: String,
    pub password: String,
    pub outbound: String,
    /// Preferred codec name, e.g. "pcm_s16le"
    pub codec: String,
}

impl AppConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Explicit path, else the platform config file, else defaults;
    /// environment overrides and validation applied in every case
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => {
                    tracing::info!("Loading config from {}", path.display());
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// `<platform config dir>/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dtmf-jukebox").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn apply_env(&mut self) {
        if let Ok(rate) = std::env::var(ENV_SAMPLE_RATE) {
            match rate.parse() {
                Ok(rate) => self.audio.sample_rate = rate,
                Err(_) => tracing::warn!("Ignoring invalid {}={}", ENV_SAMPLE_RATE, rate),
            }
        }
        if let Ok(themes) = std::env::var(ENV_THEMES) {
            self.catalog.themes = parse_theme_list(&themes);
        }
        if let Ok(dir) = std::env::var(ENV_SOUND_DIR) {
            self.catalog.sound_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be non-zero".into()));
        }
        if audio.channels != 1 {
            return Err(Error::Config(format!("channels must be 1, got {}", audio.channels)));
        }
        if audio.bits_per_sample != 16 {
            return Err(Error::Config(format!(
                "bits_per_sample must be 16, got {}",
                audio.bits_per_sample
            )));
        }
        if audio.frame_time_us == 0 || audio.format().chunk_size() == 0 {
            return Err(Error::Config("frame_time_us too small for one sample".into()));
        }
        if self.pipeline.buffer_chunks == 0 {
            return Err(Error::Config("buffer_chunks must be non-zero".into()));
        }
        Ok(())
    }
}

/// Split a comma-separated theme list, dropping blanks
pub fn parse_theme_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audio.format().chunk_size(), 640);
        assert_eq!(config.pipeline.stop_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [audio]
            sample_rate = 48000

            [catalog]
            sound_dir = "/srv/sound"
            themes = ["menu1", "menu2"]
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.catalog.themes, vec!["menu1", "menu2"]);
        assert_eq!(config.pipeline.buffer_chunks, DEFAULT_BUFFER_CHUNKS);
    }

    #[test]
    fn test_rejects_stereo() {
        let mut config = AppConfig::default();
        config.audio.channels = 2;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline]\nbuffer_chunks = 20\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.pipeline.buffer_chunks, 20);
    }

    #[test]
    fn test_parse_theme_list() {
        assert_eq!(parse_theme_list(" menu1, ,menu2 "), vec!["menu1", "menu2"]);
        assert!(parse_theme_list("").is_empty());
    }
}
