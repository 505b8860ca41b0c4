//! Session and connection errors.

use mathline_core::{LinkError, LinkStatus, link::code};
use thiserror::Error;

/// A session failure.
///
/// Every variant except `Protocol` and `Output` leaves the session
/// disconnected.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("kernel error {}: the kernel connection has been severed", code::DEAD)]
    LinkSevered,
    #[error("kernel error {code}: {message}")]
    KernelError { code: i32, message: String },
    #[error("kernel error: {0}")]
    Protocol(String),
    #[error("kernel error: session is not connected")]
    NotConnected,
    #[error("kernel error: {0}")]
    Link(#[from] LinkError),
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

impl SessionError {
    /// Whether the link is gone after this error.
    #[must_use]
    pub const fn is_fatal_to_link(&self) -> bool {
        matches!(
            self,
            Self::LinkSevered | Self::KernelError { .. } | Self::NotConnected
        )
    }

    pub(crate) fn kernel(status: LinkStatus) -> Self {
        Self::KernelError {
            code: status.code,
            message: status.message.unwrap_or_else(|| {
                "the link reported an error without a description".to_string()
            }),
        }
    }
}

/// Connecting to the kernel failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("No link name specified for the connection")]
    NoLinkName,
    #[error("Cannot open link: {0}")]
    Open(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Cannot activate link (error {code}): {message}")]
    Activate { code: i32, message: String },
    #[error("Kernel initialization failed: {0}")]
    Initialize(#[from] SessionError),
}
