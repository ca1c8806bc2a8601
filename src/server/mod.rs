//! Server side: recognition dispatcher and per-connection sessions.

pub mod dispatcher;
pub mod session;

pub use dispatcher::Dispatcher;
pub use session::{RecognitionSession, SessionSettings};
