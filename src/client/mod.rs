//! Streaming client: connection management and result dispatch.

pub mod manager;
pub mod sink;

pub use manager::{ConnectionConfig, ConnectionManager, ManagerHandle};
pub use sink::ResultSink;
