//! Keypad navigation across themes
//!
//! `*` and `#` step backwards and forwards through the catalog (wrapping at
//! both ends) and queue the new theme's default track. Any other digit
//! queues the track it maps to in the active theme, or is ignored.

use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::menu::catalog::{Theme, ThemeCatalog};
use crate::stream::request::TrackRequest;

/// The session's current theme
///
/// Written only by the navigator; read by the dispatcher to resolve local
/// tracks and by the supplier when falling back to the default track.
#[derive(Debug)]
pub struct ActiveTheme {
    catalog: Arc<ThemeCatalog>,
    index: AtomicUsize,
}

impl ActiveTheme {
    /// Start at the first theme in the catalog
    pub fn new(catalog: Arc<ThemeCatalog>) -> Self {
        Self {
            catalog,
            index: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> &Theme {
        self.catalog.get(self.index())
    }

    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        self.get().name()
    }

    pub fn catalog(&self) -> &ThemeCatalog {
        &self.catalog
    }

    /// Step the active index and return the newly active theme
    fn step(&self, f: impl Fn(&ThemeCatalog, usize) -> usize) -> &Theme {
        let previous = self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some(f(&*self.catalog, i)))
            .unwrap_or_else(|i| i);
        self.catalog.get(f(&*self.catalog, previous))
    }
}

/// Outcome of one keypad event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Theme switched; its default track was queued
    ThemeChanged { theme: String, track: String },
    /// Mapped track queued, theme unchanged
    Play { track: String },
    /// Digit not mapped in the active theme
    Ignored { digit: char },
}

pub struct MenuNavigator {
    active: Arc<ActiveTheme>,
    requests: Sender<TrackRequest>,
}

impl MenuNavigator {
    pub fn new(active: Arc<ActiveTheme>, requests: Sender<TrackRequest>) -> Self {
        Self { active, requests }
    }

    /// Interpret one keypad digit
    pub fn handle_digit(&self, digit: char) -> MenuAction {
        tracing::info!(digit = %digit, theme = %self.active.name(), "Received DTMF");

        let action = match digit {
            '*' => {
                let theme = self.active.step(ThemeCatalog::previous_index);
                tracing::info!(theme = %theme.name(), "Changed to previous theme");
                MenuAction::ThemeChanged {
                    theme: theme.name().to_string(),
                    track: theme.default_track().to_string(),
                }
            }
            '#' => {
                let theme = self.active.step(ThemeCatalog::next_index);
                tracing::info!(theme = %theme.name(), "Changed to next theme");
                MenuAction::ThemeChanged {
                    theme: theme.name().to_string(),
                    track: theme.default_track().to_string(),
                }
            }
            _ => match self.active.get().track_for(digit) {
                Some(track) => MenuAction::Play {
                    track: track.to_string(),
                },
                None => {
                    tracing::warn!(digit = %digit, theme = %self.active.name(), "No mapping found for DTMF");
                    MenuAction::Ignored { digit }
                }
            },
        };

        match &action {
            MenuAction::ThemeChanged { track, .. } | MenuAction::Play { track } => {
                self.enqueue(track);
            }
            MenuAction::Ignored { .. } => {}
        }
        action
    }

    /// Queue the active theme's default track
    pub fn request_default(&self) {
        let track = self.active.get().default_track().to_string();
        self.enqueue(&track);
    }

    pub fn active(&self) -> &Arc<ActiveTheme> {
        &self.active
    }

    fn enqueue(&self, track: &str) {
        tracing::info!(track, "Playing file");
        if self.requests.send(TrackRequest::parse(track)).is_err() {
            tracing::debug!(track, "Request queue closed, dropping request");
        }
    }
}
