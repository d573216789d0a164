//! Audio subsystem module

pub mod buffer;
pub mod format;
pub mod port;

pub use buffer::{create_shared_queue, FrameQueue, SharedFrameQueue};
pub use format::PcmFormat;
pub use port::MediaPort;
