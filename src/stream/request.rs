//! Track requests and source resolution

use std::fmt;
use std::path::Path;

/// Scheme prefix treated as a local file rather than a remote source
const LOCAL_SCHEME: &str = "file://";

/// Next thing to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackRequest {
    /// Track identifier resolved against the active theme's directory
    Local(String),
    /// Opaque remote address passed to the decoder unchanged
    Remote(String),
}

impl TrackRequest {
    /// Classify a catalog track identifier
    pub fn parse(track: &str) -> Self {
        if track.contains("://") && !track.starts_with(LOCAL_SCHEME) {
            Self::Remote(track.to_string())
        } else {
            let local = track.strip_prefix(LOCAL_SCHEME).unwrap_or(track);
            Self::Local(local.trim_start_matches('/').to_string())
        }
    }

    /// Concrete decoder input: `<sound_dir>/<theme>/<track>` for local tracks
    ///
    /// Leading slashes are dropped so an absolute track never replaces the
    /// theme directory.
    pub fn resolve(&self, sound_dir: &Path, theme: &str) -> String {
        match self {
            Self::Remote(url) => url.clone(),
            Self::Local(track) => sound_dir
                .join(theme)
                .join(track.trim_start_matches('/'))
                .display()
                .to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for TrackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(track) => write!(f, "{}", track),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}
