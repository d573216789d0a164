//! Per-call pipeline
//!
//! A [`CallSession`] is created when a call is answered and torn down when
//! it ends. It owns the frame queue, the track request queue, the active
//! theme and two worker threads (supplier pump and dispatcher), and exposes
//! the callbacks the signaling stack drives.

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::audio::buffer::{create_shared_queue, SharedFrameQueue};
use crate::audio::format::PcmFormat;
use crate::audio::port::MediaPort;
use crate::codec::decoder::DecodeLauncher;
use crate::config::PipelineConfig;
use crate::error::SessionError;
use crate::menu::catalog::ThemeCatalog;
use crate::menu::navigator::{ActiveTheme, MenuAction, MenuNavigator};
use crate::session::lifecycle::{SharedRegistry, ShutdownSignal};
use crate::stream::dispatcher::StreamDispatcher;
use crate::stream::supplier::AudioSupplier;

/// Extra time allowed for workers to exit beyond the decoder stop timeout
const JOIN_GRACE: Duration = Duration::from_millis(500);

/// Everything a new session is built from
#[derive(Clone)]
pub struct SessionResources {
    pub catalog: Arc<ThemeCatalog>,
    pub launcher: Arc<dyn DecodeLauncher>,
    pub format: PcmFormat,
    pub pipeline: PipelineConfig,
    pub sound_dir: PathBuf,
    pub registry: SharedRegistry,
}

/// A background worker and the channel that closes when it returns
struct Worker {
    name: String,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl Worker {
    fn spawn(name: String, f: impl FnOnce() + Send + 'static) -> Result<Self, SessionError> {
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _done = done_tx;
                f();
            })
            .map_err(|e| SessionError::WorkerSpawn(e.to_string()))?;
        Ok(Self { name, handle, done })
    }

    /// Join if the worker finishes before `deadline`, otherwise detach it
    fn join_until(self, deadline: Instant) {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(worker = %self.name, "Worker did not exit in time, detaching");
            }
            _ => {
                if self.handle.join().is_err() {
                    tracing::error!(worker = %self.name, "Worker panicked");
                }
            }
        }
    }
}

/// Snapshot of a session for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub theme: String,
    pub source: Option<String>,
    pub playing: bool,
    pub queue_depth: usize,
    pub frames_served: u64,
    pub silent_frames: u64,
    pub started_at: DateTime<Utc>,
}

pub struct CallSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    format: PcmFormat,
    stop_timeout: Duration,

    queue: SharedFrameQueue,
    navigator: MenuNavigator,
    supplier: Arc<AudioSupplier>,
    port: Mutex<Option<Arc<MediaPort>>>,

    shutdown: ShutdownSignal,
    registry: SharedRegistry,
    workers: Mutex<Vec<Worker>>,
    terminated: AtomicBool,
}

impl CallSession {
    /// Build the pipeline, register the session and start its workers
    pub fn start(resources: &SessionResources) -> Result<Arc<Self>, SessionError> {
        let id = Uuid::new_v4();
        let shutdown = ShutdownSignal::new();
        let queue = create_shared_queue(resources.pipeline.buffer_chunks);
        let (requests_tx, requests_rx): (Sender<_>, Receiver<_>) = unbounded();
        let active = Arc::new(ActiveTheme::new(resources.catalog.clone()));

        let supplier = Arc::new(AudioSupplier::new(
            resources.launcher.clone(),
            resources.format,
            queue.clone(),
            requests_tx.clone(),
            active.clone(),
            resources.pipeline.clone(),
        ));
        let dispatcher = StreamDispatcher::new(
            requests_rx,
            supplier.clone(),
            active.clone(),
            resources.sound_dir.clone(),
        );

        let session = Arc::new(Self {
            id,
            started_at: Utc::now(),
            format: resources.format,
            stop_timeout: resources.pipeline.stop_timeout(),
            queue,
            navigator: MenuNavigator::new(active, requests_tx),
            supplier: supplier.clone(),
            port: Mutex::new(None),
            shutdown: shutdown.clone(),
            registry: resources.registry.clone(),
            workers: Mutex::new(Vec::with_capacity(2)),
            terminated: AtomicBool::new(false),
        });

        resources.registry.register(id, shutdown.clone());

        let short_id = id.simple().to_string()[..8].to_string();
        let spawned = Worker::spawn(format!("pump-{}", short_id), {
            let shutdown = shutdown.clone();
            move || supplier.pump_loop(&shutdown)
        })
        .and_then(|pump| {
            session.workers.lock().push(pump);
            Worker::spawn(format!("dispatch-{}", short_id), {
                let shutdown = shutdown.clone();
                move || dispatcher.run(&shutdown)
            })
        });

        match spawned {
            Ok(dispatch) => session.workers.lock().push(dispatch),
            Err(e) => {
                let _ = session.terminate();
                return Err(e);
            }
        }

        tracing::info!(session = %id, theme = %session.navigator.active().name(), "Session created");
        Ok(session)
    }

    /// Call established: queue the default track and hand out the media port
    pub fn on_established(&self) -> Arc<MediaPort> {
        tracing::info!(session = %self.id, "Session established");
        self.navigator.request_default();

        self.port
            .lock()
            .get_or_insert_with(|| Arc::new(MediaPort::new(self.queue.clone(), self.format)))
            .clone()
    }

    /// Keypad digit received
    pub fn on_digit(&self, digit: char) -> MenuAction {
        if self.is_terminated() {
            tracing::debug!(session = %self.id, digit = %digit, "Digit after termination ignored");
            return MenuAction::Ignored { digit };
        }
        self.navigator.handle_digit(digit)
    }

    /// Call ended: tear the pipeline down
    pub fn on_terminated(&self) -> Result<(), SessionError> {
        self.terminate()
    }

    fn terminate(&self) -> Result<(), SessionError> {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyTerminated);
        }
        tracing::info!(session = %self.id, "Cleaning up resources");

        self.shutdown.trigger();
        self.registry.unregister(&self.id);

        let deadline = Instant::now() + self.stop_timeout + JOIN_GRACE;
        let workers: Vec<Worker> = self.workers.lock().drain(..).collect();
        for worker in workers {
            worker.join_until(deadline);
        }

        // Workers stop the decoder on exit; this covers detached ones
        self.supplier.stop_stream();
        tracing::info!(session = %self.id, "Session terminated");
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn media_port(&self) -> Option<Arc<MediaPort>> {
        self.port.lock().clone()
    }

    pub fn active_theme(&self) -> &ActiveTheme {
        self.navigator.active()
    }

    pub fn supplier(&self) -> &AudioSupplier {
        &self.supplier
    }

    pub fn status(&self) -> SessionStatus {
        let port_stats = self
            .media_port()
            .map(|port| port.stats())
            .unwrap_or_default();

        SessionStatus {
            id: self.id,
            theme: self.navigator.active().name().to_string(),
            source: self.supplier.current_source(),
            playing: self.supplier.is_playing(),
            queue_depth: self.queue.len(),
            frames_served: port_stats.frames_served,
            silent_frames: port_stats.silent_frames,
            started_at: self.started_at,
        }
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        if !self.is_terminated() {
            let _ = self.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::{Script, ScriptedLauncher};
    use crate::menu::catalog::Theme;
    use crate::session::lifecycle::ShutdownRegistry;

    fn resources(launcher: ScriptedLauncher) -> SessionResources {
        let catalog = ThemeCatalog::new(vec![
            Theme::new("menu1", "welcome.raw", [('1', "a.raw".to_string())]),
            Theme::new("menu2", "intro.raw", [('2', "b.raw".to_string())]),
        ])
        .unwrap();
        SessionResources {
            catalog: Arc::new(catalog),
            launcher: Arc::new(launcher),
            format: PcmFormat::mono16(8000),
            pipeline: PipelineConfig {
                buffer_chunks: 8,
                stop_timeout_ms: 100,
                backpressure_ms: 2,
                pacing_ms: 1,
                fallback_retry_limit: 3,
            },
            sound_dir: PathBuf::from("sound"),
            registry: Arc::new(ShutdownRegistry::new()),
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_start_registers_and_terminate_unregisters() {
        let res = resources(ScriptedLauncher::new(Script::endless(1)));
        let session = CallSession::start(&res).unwrap();

        assert!(res.registry.contains(&session.id()));
        assert_eq!(session.active_theme().name(), "menu1");

        session.on_terminated().unwrap();
        assert!(!res.registry.contains(&session.id()));
        assert!(session.shutdown_signal().is_triggered());
        assert!(matches!(session.on_terminated(), Err(SessionError::AlreadyTerminated)));
    }

    #[test]
    fn test_established_plays_default_into_port() {
        let res = resources(ScriptedLauncher::new(Script::endless(5)));
        let session = CallSession::start(&res).unwrap();

        let port = session.on_established();
        assert!(wait_for(|| session.supplier().is_playing()));
        assert!(wait_for(|| !session.queue.is_empty()));

        let frame = port.next_frame();
        assert_eq!(frame.len(), PcmFormat::mono16(8000).chunk_size());
        assert_eq!(frame[0], 5);
        assert!(session
            .status()
            .source
            .unwrap()
            .ends_with("welcome.raw"));

        session.on_terminated().unwrap();
        assert!(!session.supplier().is_playing());
    }

    #[test]
    fn test_terminate_is_bounded_with_unresponsive_decoder() {
        let res = resources(ScriptedLauncher::new(Script::endless(1).unresponsive()));
        let session = CallSession::start(&res).unwrap();
        session.on_established();
        assert!(wait_for(|| session.supplier().is_playing()));

        let start = Instant::now();
        session.on_terminated().unwrap();
        assert!(start.elapsed() < Duration::from_millis(100) + JOIN_GRACE + Duration::from_millis(500));
        assert!(!session.supplier().is_playing());
    }

    #[test]
    fn test_registry_broadcast_stops_workers() {
        let res = resources(ScriptedLauncher::new(Script::endless(1)));
        let a = CallSession::start(&res).unwrap();
        let b = CallSession::start(&res).unwrap();
        assert_eq!(res.registry.len(), 2);

        assert_eq!(res.registry.signal_all(), 2);
        assert!(a.shutdown_signal().is_triggered());
        assert!(b.shutdown_signal().is_triggered());

        a.on_terminated().unwrap();
        b.on_terminated().unwrap();
        assert!(res.registry.is_empty());
    }
}
