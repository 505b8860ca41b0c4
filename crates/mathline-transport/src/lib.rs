//! Process transport for a kernel client.
//!
//! Provides:
//! - Wire frames (one JSON object per line)
//! - Launch command parsing and executable resolution
//! - `ProcessLink` - A `Link` over a kernel child process's stdio

pub mod launch;
pub mod process;
pub mod protocol;

pub use launch::{LaunchCommand, LaunchError};
pub use process::ProcessLink;
pub use protocol::{FrameError, MessageFrame, PacketFrame};
