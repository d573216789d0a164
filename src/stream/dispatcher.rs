//! Stream dispatcher
//!
//! Turns queued track requests into supplier restarts until the session
//! shuts down.

use crossbeam_channel::{select, Receiver};
use std::path::PathBuf;
use std::sync::Arc;

use crate::menu::navigator::ActiveTheme;
use crate::session::lifecycle::ShutdownSignal;
use crate::stream::request::TrackRequest;
use crate::stream::supplier::AudioSupplier;

pub struct StreamDispatcher {
    requests: Receiver<TrackRequest>,
    supplier: Arc<AudioSupplier>,
    active: Arc<ActiveTheme>,
    sound_dir: PathBuf,
}

impl StreamDispatcher {
    pub fn new(
        requests: Receiver<TrackRequest>,
        supplier: Arc<AudioSupplier>,
        active: Arc<ActiveTheme>,
        sound_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            requests,
            supplier,
            active,
            sound_dir: sound_dir.into(),
        }
    }

    /// Concrete decoder input for a request, using the active theme
    pub fn resolve(&self, request: &TrackRequest) -> String {
        request.resolve(&self.sound_dir, self.active.name())
    }

    /// Restart the supplier on a request's source
    pub fn dispatch(&self, request: &TrackRequest) -> bool {
        let source = self.resolve(request);
        tracing::info!(source = %source, "Preparing to stream");
        self.supplier.start_stream(&source)
    }

    /// Serve requests until `shutdown` is raised, then stop the supplier
    pub fn run(&self, shutdown: &ShutdownSignal) {
        while !shutdown.is_triggered() {
            select! {
                recv(self.requests) -> msg => match msg {
                    Ok(request) if !shutdown.is_triggered() => {
                        self.dispatch(&request);
                    }
                    Ok(_) => break,
                    Err(_) => break,
                },
                recv(shutdown.receiver()) -> _ => break,
            }
        }

        self.supplier.stop_stream();
        tracing::info!("Dispatcher exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::create_shared_queue;
    use crate::audio::format::PcmFormat;
    use crate::codec::testing::{Script, ScriptedLauncher};
    use crate::config::PipelineConfig;
    use crate::menu::catalog::{Theme, ThemeCatalog};
    use crossbeam_channel::{unbounded, Sender};
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Fixture {
        dispatcher: Arc<StreamDispatcher>,
        launcher: Arc<ScriptedLauncher>,
        supplier: Arc<AudioSupplier>,
        tx: Sender<TrackRequest>,
    }

    fn fixture() -> Fixture {
        let launcher = Arc::new(ScriptedLauncher::new(Script::endless(1)));
        let catalog = ThemeCatalog::new(vec![
            Theme::new("menu1", "welcome.raw", []),
            Theme::new("menu2", "intro.raw", []),
        ])
        .unwrap();
        let active = Arc::new(ActiveTheme::new(Arc::new(catalog)));
        let (tx, rx) = unbounded();
        let supplier = Arc::new(AudioSupplier::new(
            launcher.clone(),
            PcmFormat::mono16(8000),
            create_shared_queue(4),
            tx.clone(),
            active.clone(),
            PipelineConfig {
                stop_timeout_ms: 100,
                ..PipelineConfig::default()
            },
        ));
        let dispatcher = Arc::new(StreamDispatcher::new(rx, supplier.clone(), active, "/srv/sound"));
        Fixture {
            dispatcher,
            launcher,
            supplier,
            tx,
        }
    }

    #[test]
    fn test_resolve_local_and_remote() {
        let f = fixture();

        assert_eq!(
            f.dispatcher.resolve(&TrackRequest::parse("a.raw")),
            Path::new("/srv/sound/menu1/a.raw").display().to_string()
        );
        assert_eq!(
            f.dispatcher.resolve(&TrackRequest::parse("http://host/live")),
            "http://host/live"
        );
    }

    #[test]
    fn test_run_dispatches_and_stops_on_shutdown() {
        let f = fixture();
        let shutdown = ShutdownSignal::new();
        let worker = {
            let dispatcher = f.dispatcher.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || dispatcher.run(&shutdown))
        };

        f.tx.send(TrackRequest::parse("a.raw")).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while f.launcher.launched().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(f.supplier.is_playing());

        let start = Instant::now();
        shutdown.trigger();
        worker.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!f.supplier.is_playing());
        assert_eq!(
            f.launcher.launched(),
            vec![Path::new("/srv/sound/menu1/a.raw").display().to_string()]
        );
    }

    #[test]
    fn test_idle_dispatcher_exits_promptly() {
        let f = fixture();
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let start = Instant::now();
        f.dispatcher.run(&shutdown);
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(f.launcher.launched().is_empty());
    }
}
