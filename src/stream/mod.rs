//! Audio supply pipeline: track requests in, PCM chunks out

pub mod dispatcher;
pub mod request;
pub mod supplier;

pub use dispatcher::StreamDispatcher;
pub use request::TrackRequest;
pub use supplier::{AudioSupplier, SupplierStats};
