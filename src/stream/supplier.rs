//! Audio supplier
//!
//! Owns the session's decode process and keeps the frame queue topped up
//! from it. Restarting onto a new source always stops the old process and
//! clears the queue first; chunks are pushed under the same lock and only
//! when they belong to the current stream generation, so audio from two
//! sources is never interleaved.

use bytes::Bytes;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::buffer::SharedFrameQueue;
use crate::audio::format::PcmFormat;
use crate::codec::decoder::{read_chunk, wait_timeout, DecodeLauncher, ProcessControl};
use crate::config::PipelineConfig;
use crate::menu::navigator::ActiveTheme;
use crate::session::lifecycle::ShutdownSignal;
use crate::stream::request::TrackRequest;

/// Decoder output tagged with the generation it belongs to
type StreamOutput = (u64, Box<dyn Read + Send>);

/// Process-side state, guarded by one lock
struct StreamState {
    generation: u64,
    control: Option<Box<dyn ProcessControl>>,
    source: Option<String>,
}

pub struct AudioSupplier {
    launcher: Arc<dyn DecodeLauncher>,
    format: PcmFormat,
    queue: SharedFrameQueue,
    requests: Sender<TrackRequest>,
    active: Arc<ActiveTheme>,
    settings: PipelineConfig,

    state: Mutex<StreamState>,
    /// Mirror of `state.generation` readable without the lock
    generation: AtomicU64,
    stopped: AtomicBool,
    outputs_tx: Sender<StreamOutput>,
    outputs_rx: Receiver<StreamOutput>,
    empty_streams: AtomicU32,

    streams_started: AtomicU64,
    launch_failures: AtomicU64,
    chunks_pushed: AtomicU64,
    fallbacks: AtomicU64,
    forced_releases: AtomicU64,
}

impl AudioSupplier {
    pub fn new(
        launcher: Arc<dyn DecodeLauncher>,
        format: PcmFormat,
        queue: SharedFrameQueue,
        requests: Sender<TrackRequest>,
        active: Arc<ActiveTheme>,
        settings: PipelineConfig,
    ) -> Self {
        let (outputs_tx, outputs_rx) = unbounded();
        Self {
            launcher,
            format,
            queue,
            requests,
            active,
            settings,
            state: Mutex::new(StreamState {
                generation: 0,
                control: None,
                source: None,
            }),
            generation: AtomicU64::new(0),
            stopped: AtomicBool::new(true),
            outputs_tx,
            outputs_rx,
            empty_streams: AtomicU32::new(0),
            streams_started: AtomicU64::new(0),
            launch_failures: AtomicU64::new(0),
            chunks_pushed: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            forced_releases: AtomicU64::new(0),
        }
    }

    /// Stop whatever is playing, then launch a decoder for `source`.
    ///
    /// Returns `false` if the decoder could not be launched; the supplier is
    /// then idle and the transport hears silence.
    pub fn start_stream(&self, source: &str) -> bool {
        let mut state = self.state.lock();
        self.stop_locked(&mut state);

        tracing::info!(source, "Starting decoder");
        match self.launcher.launch(source, &self.format) {
            Ok(handle) => {
                state.generation += 1;
                self.generation.store(state.generation, Ordering::SeqCst);
                state.control = Some(handle.control);
                state.source = Some(source.to_string());
                // Receiver lives in `self`, so the send cannot fail
                let _ = self.outputs_tx.send((state.generation, handle.output));
                self.stopped.store(false, Ordering::SeqCst);
                self.streams_started.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                tracing::error!(source, "Error starting decoder: {}", e);
                self.launch_failures.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Stop the current decoder and drop its buffered audio. No-op when idle.
    pub fn stop_stream(&self) {
        let mut state = self.state.lock();
        self.stop_locked(&mut state);
    }

    fn stop_locked(&self, state: &mut StreamState) {
        let Some(mut control) = state.control.take() else {
            return;
        };
        let source = state.source.take().unwrap_or_default();
        tracing::info!(source = %source, "Stopping decoder");

        self.stopped.store(true, Ordering::SeqCst);
        state.generation += 1;
        self.generation.store(state.generation, Ordering::SeqCst);

        if let Err(e) = control.kill() {
            tracing::warn!(source = %source, "{}", e);
        }
        if !wait_timeout(control.as_mut(), self.settings.stop_timeout()) {
            tracing::warn!(
                source = %source,
                timeout_ms = self.settings.stop_timeout_ms,
                "Decoder did not exit in time, releasing handle"
            );
            self.forced_releases.fetch_add(1, Ordering::Relaxed);
        }
        drop(control);

        let dropped = self.queue.clear();
        tracing::info!(dropped, "Audio queue cleared");
    }

    /// Keep the frame queue filled until `shutdown` is raised
    pub fn pump_loop(&self, shutdown: &ShutdownSignal) {
        tracing::info!("Streaming audio to queue");
        let chunk_size = self.format.chunk_size();
        let mut buf = vec![0u8; chunk_size];
        let mut current: Option<StreamOutput> = None;
        let mut produced = 0usize;

        while !shutdown.is_triggered() {
            if current.is_none() {
                select! {
                    recv(self.outputs_rx) -> msg => {
                        if let Ok(next) = msg {
                            current = Some(next);
                            produced = 0;
                        }
                    }
                    recv(shutdown.receiver()) -> _ => break,
                }
                continue;
            }
            let Some((generation, output)) = current.as_mut() else {
                continue;
            };
            let generation = *generation;

            if generation != self.generation.load(Ordering::SeqCst) {
                current = None;
                continue;
            }

            // Do not read ahead of the consumer
            if self.queue.len() >= self.queue.capacity() {
                shutdown.wait_timeout(self.settings.backpressure_delay());
                continue;
            }

            let read = read_chunk(output.as_mut(), &mut buf);

            let mut state = self.state.lock();
            if state.generation != generation {
                // Restarted or stopped while reading
                current = None;
                continue;
            }

            match read {
                Ok(0) => {
                    tracing::info!("Decoder finished streaming audio, starting default track");
                    self.stop_locked(&mut state);
                    drop(state);
                    current = None;
                    self.end_of_stream(produced);
                    continue;
                }
                Ok(n) => {
                    buf[n..].fill(0);
                    if self.queue.try_push(Bytes::copy_from_slice(&buf)).is_ok() {
                        produced += 1;
                        self.chunks_pushed.fetch_add(1, Ordering::Relaxed);
                        self.empty_streams.store(0, Ordering::Relaxed);
                        tracing::trace!(
                            depth = self.queue.len(),
                            fill = self.queue.fill_level(),
                            "Buffered audio chunk"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        source = state.source.as_deref().unwrap_or_default(),
                        "Error in streaming audio: {}",
                        e
                    );
                    self.stop_locked(&mut state);
                    drop(state);
                    current = None;
                    self.end_of_stream(produced);
                    continue;
                }
            }
            drop(state);

            shutdown.wait_timeout(self.settings.pacing_delay());
        }

        self.stop_stream();
        tracing::info!("Pump loop exited");
    }

    /// Queue the active theme's default track unless empty streams keep
    /// repeating. The first empty stream always falls back.
    fn end_of_stream(&self, produced: usize) {
        if produced == 0 {
            let empty = self.empty_streams.fetch_add(1, Ordering::Relaxed) + 1;
            if empty > 1 && empty >= self.settings.fallback_retry_limit {
                tracing::error!(
                    empty_streams = empty,
                    "Streams keep ending without audio, not re-queuing default track"
                );
                return;
            }
        }

        let track = self.active.get().default_track();
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        if self.requests.send(TrackRequest::parse(track)).is_err() {
            tracing::debug!(track, "Request queue closed, dropping fallback");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().control.is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn current_source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    pub fn queue(&self) -> &SharedFrameQueue {
        &self.queue
    }

    pub fn stats(&self) -> SupplierStats {
        SupplierStats {
            streams_started: self.streams_started.load(Ordering::Relaxed),
            launch_failures: self.launch_failures.load(Ordering::Relaxed),
            chunks_pushed: self.chunks_pushed.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            forced_releases: self.forced_releases.load(Ordering::Relaxed),
        }
    }
}

/// Supplier statistics
#[derive(Debug, Clone, Default)]
pub struct SupplierStats {
    pub streams_started: u64,
    pub launch_failures: u64,
    pub chunks_pushed: u64,
    pub fallbacks: u64,
    pub forced_releases: u64,
}
