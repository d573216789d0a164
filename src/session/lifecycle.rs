//! Session shutdown signals and the process-wide registry
//!
//! A [`ShutdownSignal`] is cooperative: workers check it at loop
//! boundaries, or select on [`ShutdownSignal::receiver`] next to their work
//! channel. Triggering drops the signal's only sender, so every receiver
//! wakes at once and stays ready forever after.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Per-session cancellation flag
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    triggered: AtomicBool,
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(SignalInner {
                triggered: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    /// Raise the signal. Idempotent.
    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.tx.lock().take();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Channel that becomes disconnected once the signal is raised
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.rx
    }

    /// Sleep for up to `timeout`, waking early on shutdown.
    /// Returns `true` if the signal is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_triggered(),
            _ => true,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

/// Every live session's shutdown signal, keyed by session id
#[derive(Default)]
pub struct ShutdownRegistry {
    signals: DashMap<Uuid, ShutdownSignal>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: Uuid, signal: ShutdownSignal) {
        self.signals.insert(id, signal);
    }

    pub fn unregister(&self, id: &Uuid) -> Option<ShutdownSignal> {
        self.signals.remove(id).map(|(_, signal)| signal)
    }

    /// Raise every registered signal. Returns how many were raised.
    pub fn signal_all(&self) -> usize {
        let mut count = 0;
        for entry in self.signals.iter() {
            tracing::info!(session = %entry.key(), "Setting stop event");
            entry.value().trigger();
            count += 1;
        }
        count
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.signals.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.signals.iter().map(|e| *e.key()).collect()
    }
}

/// Thread-safe handle to the registry
pub type SharedRegistry = Arc<ShutdownRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_trigger_wakes_waiter() {
        let signal = ShutdownSignal::new();

        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait_timeout(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        signal.trigger();
        assert!(waiter.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_timeout_without_trigger() {
        let signal = ShutdownSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
        signal.trigger();
        signal.trigger();
        assert!(signal.wait_timeout(Duration::from_millis(10)));
        assert!(signal.receiver().try_recv().is_err());
    }

    #[test]
    fn test_registry_signal_all() {
        let registry = ShutdownRegistry::new();
        let signals: Vec<_> = (0..3).map(|_| ShutdownSignal::new()).collect();
        for signal in &signals {
            registry.register(Uuid::new_v4(), signal.clone());
        }

        assert_eq!(registry.signal_all(), 3);
        assert!(signals.iter().all(ShutdownSignal::is_triggered));
    }

    #[test]
    fn test_registry_unregister() {
        let registry = ShutdownRegistry::new();
        let id = Uuid::new_v4();
        registry.register(id, ShutdownSignal::new());

        assert!(registry.contains(&id));
        assert!(registry.unregister(&id).is_some());
        assert!(registry.unregister(&id).is_none());
        assert!(registry.is_empty());
    }
}
