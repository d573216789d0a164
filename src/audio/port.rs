//! Media-transport-facing port
//!
//! The transport calls [`MediaPort::next_frame`] once per cadence tick. The
//! call never blocks: it returns the oldest buffered chunk, or a silence
//! frame of the same size when nothing is buffered.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::audio::buffer::SharedFrameQueue;
use crate::audio::format::PcmFormat;

pub struct MediaPort {
    queue: SharedFrameQueue,
    format: PcmFormat,
    silence: Bytes,
    frames_served: AtomicU64,
    silent_frames: AtomicU64,
    frames_received: AtomicU64,
}

impl MediaPort {
    pub fn new(queue: SharedFrameQueue, format: PcmFormat) -> Self {
        Self {
            silence: format.silence(),
            queue,
            format,
            frames_served: AtomicU64::new(0),
            silent_frames: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
        }
    }

    /// Frame for the current tick: buffered audio or silence
    pub fn next_frame(&self) -> Bytes {
        self.frames_served.fetch_add(1, Ordering::Relaxed);
        match self.queue.try_pop() {
            Some(chunk) => chunk,
            None => {
                self.silent_frames.fetch_add(1, Ordering::Relaxed);
                self.silence.clone()
            }
        }
    }

    /// Inbound audio from the caller is not used
    pub fn on_frame_received(&self, _frame: &[u8]) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    pub fn frame_size(&self) -> usize {
        self.silence.len()
    }

    pub fn stats(&self) -> PortStats {
        PortStats {
            frames_served: self.frames_served.load(Ordering::Relaxed),
            silent_frames: self.silent_frames.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
        }
    }
}

/// Media port statistics
#[derive(Debug, Clone, Default)]
pub struct PortStats {
    pub frames_served: u64,
    pub silent_frames: u64,
    pub frames_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::create_shared_queue;

    #[test]
    fn test_silence_when_empty() {
        let format = PcmFormat::mono16(16000);
        let port = MediaPort::new(create_shared_queue(4), format);

        let frame = port.next_frame();
        assert_eq!(frame.len(), 640);
        assert!(frame.iter().all(|b| *b == 0));
        assert_eq!(port.stats().silent_frames, 1);
    }

    #[test]
    fn test_serves_buffered_chunk() {
        let format = PcmFormat::mono16(16000);
        let queue = create_shared_queue(4);
        let port = MediaPort::new(queue.clone(), format);

        queue.push(Bytes::from(vec![7u8; 640]));
        assert_eq!(port.next_frame()[0], 7);
        assert_eq!(port.next_frame()[0], 0);

        let stats = port.stats();
        assert_eq!(stats.frames_served, 2);
        assert_eq!(stats.silent_frames, 1);
    }
}
