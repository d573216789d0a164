//! Session lifecycle: per-call pipelines and coordinated shutdown

pub mod call;
pub mod lifecycle;
pub mod switchboard;

pub use call::{CallSession, SessionResources, SessionStatus};
pub use lifecycle::{SharedRegistry, ShutdownRegistry, ShutdownSignal};
pub use switchboard::Switchboard;
