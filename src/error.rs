//! Error types for the jukebox pipeline

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode-process errors
///
/// These never leave the audio pipeline: they are logged and the session
/// degrades to silence or falls back to the default track.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to launch decoder for {target}: {reason}")]
    Launch { target: String, reason: String },

    #[error("Decoder produced no output pipe")]
    MissingOutput,

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Kill failed: {0}")]
    Kill(String),
}

/// Theme catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Theme '{theme}' map not found at {path}")]
    NotFound { theme: String, path: String },

    #[error("Theme '{theme}' map is malformed: {reason}")]
    Malformed { theme: String, reason: String },

    #[error("Theme '{theme}' has no default track")]
    MissingDefault { theme: String },

    #[error("No themes could be loaded")]
    Empty,
}

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to spawn worker: {0}")]
    WorkerSpawn(String),

    #[error("Session already terminated")]
    AlreadyTerminated,

    #[error("Shutting down, not accepting sessions")]
    ShuttingDown,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_wraps() {
        let err: Error = CatalogError::MissingDefault { theme: "menu1".into() }.into();
        assert_eq!(err.to_string(), "Catalog error: Theme 'menu1' has no default track");
    }
}
