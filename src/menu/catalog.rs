//! Theme catalog
//!
//! Each theme is a JSON map from single keypad characters (plus the
//! mandatory `default` key) to track identifiers, stored as
//! `<sound_dir>/dtmf_map_<theme>.json`. The catalog keeps the configured
//! theme order, which drives `*` / `#` navigation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

/// Key holding the theme's fallback track
pub const DEFAULT_KEY: &str = "default";

/// A named menu context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    name: String,
    keys: BTreeMap<char, String>,
    default_track: String,
}

impl Theme {
    pub fn new(
        name: impl Into<String>,
        default_track: impl Into<String>,
        keys: impl IntoIterator<Item = (char, String)>,
    ) -> Self {
        Self {
            name: name.into(),
            keys: keys.into_iter().collect(),
            default_track: default_track.into(),
        }
    }

    /// Build a theme from a decoded catalog file
    pub fn from_map(name: &str, map: HashMap<String, String>) -> Result<Self, CatalogError> {
        let mut default_track = None;
        let mut keys = BTreeMap::new();

        for (key, track) in map {
            if key == DEFAULT_KEY {
                default_track = Some(track);
                continue;
            }

            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some('*' | '#'), None) => {
                    tracing::warn!(theme = name, key = %key, "Navigation key cannot be mapped, skipping");
                }
                (Some(digit), None) => {
                    keys.insert(digit, track);
                }
                _ => {
                    tracing::warn!(theme = name, key = %key, "Ignoring multi-character key");
                }
            }
        }

        let default_track = default_track.ok_or_else(|| CatalogError::MissingDefault {
            theme: name.to_string(),
        })?;

        Ok(Self {
            name: name.to_string(),
            keys,
            default_track,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_track(&self) -> &str {
        &self.default_track
    }

    /// Track mapped to `digit`, if any
    pub fn track_for(&self, digit: char) -> Option<&str> {
        self.keys.get(&digit).map(String::as_str)
    }

    /// Mapped digits in keypad order
    pub fn digits(&self) -> impl Iterator<Item = char> + '_ {
        self.keys.keys().copied()
    }
}

/// Ordered, non-empty list of themes
#[derive(Debug, Clone)]
pub struct ThemeCatalog {
    themes: Vec<Theme>,
}

impl ThemeCatalog {
    pub fn new(themes: Vec<Theme>) -> Result<Self, CatalogError> {
        if themes.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { themes })
    }

    /// Load every named theme from `sound_dir`, dropping the ones that fail.
    /// A name listed twice is loaded once, at its first position.
    pub fn load(sound_dir: &Path, names: &[String]) -> Result<Self, CatalogError> {
        let mut themes = Vec::with_capacity(names.len());
        let mut seen = HashSet::new();

        for name in names {
            if !seen.insert(name.as_str()) {
                tracing::warn!(theme = %name, "Theme listed more than once, skipping");
                continue;
            }
            match load_theme(sound_dir, name) {
                Ok(theme) => {
                    tracing::info!(
                        theme = %name,
                        default = %theme.default_track(),
                        keys = theme.keys.len(),
                        "Loaded theme map"
                    );
                    themes.push(theme);
                }
                Err(e @ CatalogError::NotFound { .. }) => tracing::warn!("{}", e),
                Err(e) => tracing::error!("{}", e),
            }
        }

        Self::new(themes)
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// Theme at `index`, wrapped into range
    pub fn get(&self, index: usize) -> &Theme {
        &self.themes[index % self.themes.len()]
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.themes.len()
    }

    pub fn previous_index(&self, index: usize) -> usize {
        (index + self.themes.len() - 1) % self.themes.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(Theme::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Theme> {
        self.themes.iter()
    }
}

/// Path of a theme's catalog file
pub fn theme_map_path(sound_dir: &Path, theme: &str) -> PathBuf {
    sound_dir.join(format!("dtmf_map_{}.json", theme))
}

/// Load a single theme file
pub fn load_theme(sound_dir: &Path, name: &str) -> Result<Theme, CatalogError> {
    let path = theme_map_path(sound_dir, name);
    let raw = std::fs::read_to_string(&path).map_err(|_| CatalogError::NotFound {
        theme: name.to_string(),
        path: path.display().to_string(),
    })?;

    let map: HashMap<String, String> =
        serde_json::from_str(&raw).map_err(|e| CatalogError::Malformed {
            theme: name.to_string(),
            reason: e.to_string(),
        })?;

    Theme::from_map(name, map)
}
