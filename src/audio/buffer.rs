//! Bounded frame queue between the decoder and the media transport
//!
//! Single producer (the audio supplier) and single consumer (the media
//! port). The producer waits when the queue is full; the consumer never
//! waits, an empty queue simply means silence.

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bounded FIFO of raw PCM chunks
pub struct FrameQueue {
    chunks: Mutex<VecDeque<Bytes>>,
    not_full: Condvar,
    capacity: usize,
    pushed: AtomicUsize,
    underrun_count: AtomicUsize,
    cleared: AtomicUsize,
    high_water: AtomicUsize,
}

impl FrameQueue {
    /// Create a new queue holding at most `capacity` chunks
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be non-zero");

        Self {
            chunks: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            capacity,
            pushed: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
            cleared: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    /// Push a chunk, waiting for room if the queue is at capacity
    pub fn push(&self, chunk: Bytes) {
        let mut chunks = self.chunks.lock();
        while chunks.len() >= self.capacity {
            self.not_full.wait(&mut chunks);
        }
        self.push_locked(&mut chunks, chunk);
    }

    /// Push without waiting. Hands the chunk back if the queue is full.
    pub fn try_push(&self, chunk: Bytes) -> Result<(), Bytes> {
        let mut chunks = self.chunks.lock();
        if chunks.len() >= self.capacity {
            return Err(chunk);
        }
        self.push_locked(&mut chunks, chunk);
        Ok(())
    }

    fn push_locked(&self, chunks: &mut VecDeque<Bytes>, chunk: Bytes) {
        chunks.push_back(chunk);
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.high_water.fetch_max(chunks.len(), Ordering::Relaxed);
    }

    /// Pop the oldest chunk. Never waits; `None` means no data (silence).
    pub fn try_pop(&self) -> Option<Bytes> {
        let chunk = self.chunks.lock().pop_front();
        match chunk {
            Some(chunk) => {
                self.not_full.notify_one();
                Some(chunk)
            }
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Discard every buffered chunk in one step. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut chunks = self.chunks.lock();
            let dropped = chunks.len();
            chunks.clear();
            dropped
        };
        self.cleared.fetch_add(dropped, Ordering::Relaxed);
        self.not_full.notify_all();
        dropped
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill level as a fraction of capacity
    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity as f32
    }

    pub fn stats(&self) -> FrameQueueStats {
        FrameQueueStats {
            depth: self.len(),
            capacity: self.capacity,
            pushed: self.pushed.load(Ordering::Relaxed),
            underruns: self.underrun_count.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
            high_water: self.high_water.load(Ordering::Relaxed),
        }
    }
}

/// Frame queue statistics
#[derive(Debug, Clone)]
pub struct FrameQueueStats {
    pub depth: usize,
    pub capacity: usize,
    pub pushed: usize,
    pub underruns: usize,
    pub cleared: usize,
    /// Deepest the queue has ever been
    pub high_water: usize,
}

/// Thread-safe handle to a frame queue
pub type SharedFrameQueue = Arc<FrameQueue>;

/// Create a new shared frame queue
pub fn create_shared_queue(capacity: usize) -> SharedFrameQueue {
    Arc::new(FrameQueue::new(capacity))
}
