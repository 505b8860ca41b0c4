//! Session engine for an interactive kernel client.
//!
//! Provides:
//! - `Session` - Send input, dispatch the kernel's reply packet by packet
//! - `Repl` - Read-evaluate-print loop over a `LineReader`
//! - Error types for connection and session failures

mod dispatch;
pub mod error;
pub mod repl;
pub mod session;

pub use error::{ConnectError, SessionError};
pub use repl::{ExitReason, LineReader, Repl};
pub use session::{InputMode, Session, Turn};
