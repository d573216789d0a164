//! Account-level session owner
//!
//! Answers incoming sessions, keeps the table of live ones and performs the
//! process-wide shutdown. The switchboard registers a root signal of its
//! own so the host's main loop is stopped by the same broadcast that stops
//! every session.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::call::{CallSession, SessionResources, SessionStatus};
use crate::session::lifecycle::{SharedRegistry, ShutdownSignal};

pub struct Switchboard {
    resources: SessionResources,
    sessions: DashMap<Uuid, Arc<CallSession>>,
    root_id: Uuid,
    root: ShutdownSignal,
    /// Held for the whole of `shutdown_all`
    shutting_down: Mutex<()>,
}

impl Switchboard {
    pub fn new(resources: SessionResources) -> Self {
        let root_id = Uuid::new_v4();
        let root = ShutdownSignal::new();
        resources.registry.register(root_id, root.clone());

        tracing::info!(
            themes = ?resources.catalog.names(),
            rate = resources.format.sample_rate,
            channels = resources.format.channels,
            frame_ms = resources.format.frame_seconds() * 1000.0,
            "Switchboard ready"
        );

        Self {
            resources,
            sessions: DashMap::new(),
            root_id,
            root,
            shutting_down: Mutex::new(()),
        }
    }

    /// Create the pipeline for an incoming session
    pub fn answer(&self) -> Result<Arc<CallSession>, SessionError> {
        if self.root.is_triggered() {
            return Err(SessionError::ShuttingDown);
        }
        let session = CallSession::start(&self.resources)?;
        self.sessions.insert(session.id(), session.clone());
        Ok(session)
    }

    /// Session ended on the signaling side
    pub fn hang_up(&self, id: &Uuid) -> Result<(), SessionError> {
        match self.sessions.remove(id) {
            Some((_, session)) => session.on_terminated(),
            None => Err(SessionError::AlreadyTerminated),
        }
    }

    pub fn session(&self, id: &Uuid) -> Option<Arc<CallSession>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Raise every registered signal, then run each session's teardown.
    /// Returns how many sessions this call tore down. A concurrent caller
    /// returns only once the teardown in progress has finished.
    pub fn shutdown_all(&self) -> usize {
        let _guard = self.shutting_down.lock();
        tracing::info!("Shutting down...");
        self.resources.registry.signal_all();

        let sessions: Vec<Arc<CallSession>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.sessions.clear();

        sessions
            .iter()
            .filter(|session| session.on_terminated().is_ok())
            .count()
    }

    /// Signal the host's main loop waits on
    pub fn root_signal(&self) -> &ShutdownSignal {
        &self.root
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.resources.registry
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn statuses(&self) -> Vec<SessionStatus> {
        self.sessions.iter().map(|entry| entry.value().status()).collect()
    }
}

impl Drop for Switchboard {
    fn drop(&mut self) {
        self.resources.registry.unregister(&self.root_id);
    }
}
