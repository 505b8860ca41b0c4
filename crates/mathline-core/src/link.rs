//! Transport primitives for a kernel connection.

use thiserror::Error;

use crate::PacketTag;

/// Link error codes reported through [`LinkStatus`].
pub mod code {
    /// No error.
    pub const OK: i32 = 0;
    /// The link died unexpectedly.
    pub const DEAD: i32 = 1;
    /// Inconsistent data was read.
    pub const BAD_DATA: i32 = 2;
    /// A get was issued out of sequence.
    pub const GET_SEQUENCE: i32 = 3;
    /// The link could not be connected.
    pub const CONNECT: i32 = 10;
    /// The other side closed the link.
    pub const CLOSED: i32 = 11;
}

/// Error state of a link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatus {
    /// Zero when the link is healthy.
    pub code: i32,
    /// Description supplied by the transport, if any.
    pub message: Option<String>,
}

impl LinkStatus {
    /// Healthy link.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            code: code::OK,
            message: None,
        }
    }

    /// Failed link with a description.
    #[must_use]
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Whether the link reports no error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code == code::OK
    }
}

/// A transport primitive failed.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Link is not connected")]
    NotConnected,
    #[error("Expected {expected} but the packet held {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Link closed")]
    Closed,
    #[error("Encode error: {0}")]
    Encode(String),
}

/// Primitive operations of an established kernel connection.
///
/// Reads operate on the current packet; `next_packet` discards whatever the
/// previous packet still held. Writes build a message that `end_message`
/// hands to the kernel.
pub trait Link {
    /// Activate the link. Returns false on failure; details via `last_error`.
    fn activate(&mut self) -> bool;

    /// Whether a packet can be fetched without blocking.
    fn is_ready(&mut self) -> bool;

    /// Push buffered outbound data. Returns false on failure.
    fn flush(&mut self) -> bool;

    /// Skip the rest of the current packet. Returns false on failure.
    fn new_packet(&mut self) -> bool;

    /// Fetch the next packet tag, discarding the unread rest of the previous one.
    ///
    /// Returns `PacketTag::Illegal` when no packet could be read.
    fn next_packet(&mut self) -> PacketTag;

    /// Read a string from the current packet.
    ///
    /// # Errors
    /// Returns error if the next item is not a string.
    fn get_string(&mut self) -> Result<String, LinkError>;

    /// Read a symbol name from the current packet.
    ///
    /// # Errors
    /// Returns error if the next item is not a symbol.
    fn get_symbol(&mut self) -> Result<String, LinkError>;

    /// Read an integer from the current packet.
    ///
    /// # Errors
    /// Returns error if the next item is not an integer.
    fn get_integer(&mut self) -> Result<i32, LinkError>;

    /// Write a function head.
    ///
    /// # Errors
    /// Returns error if the link cannot accept data.
    fn put_function(&mut self, name: &str, arity: usize) -> Result<(), LinkError>;

    /// Write a UTF-8 string.
    ///
    /// # Errors
    /// Returns error if the link cannot accept data.
    fn put_string(&mut self, text: &str) -> Result<(), LinkError>;

    /// Finish the outbound message and hand it to the kernel.
    ///
    /// # Errors
    /// Returns error if the message cannot be delivered.
    fn end_message(&mut self) -> Result<(), LinkError>;

    /// Current error state.
    fn last_error(&mut self) -> LinkStatus;

    /// Close the link. Further calls fail.
    fn close(&mut self);
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn activate(&mut self) -> bool {
        (**self).activate()
    }

    fn is_ready(&mut self) -> bool {
        (**self).is_ready()
    }

    fn flush(&mut self) -> bool {
        (**self).flush()
    }

    fn new_packet(&mut self) -> bool {
        (**self).new_packet()
    }

    fn next_packet(&mut self) -> PacketTag {
        (**self).next_packet()
    }

    fn get_string(&mut self) -> Result<String, LinkError> {
        (**self).get_string()
    }

    fn get_symbol(&mut self) -> Result<String, LinkError> {
        (**self).get_symbol()
    }

    fn get_integer(&mut self) -> Result<i32, LinkError> {
        (**self).get_integer()
    }

    fn put_function(&mut self, name: &str, arity: usize) -> Result<(), LinkError> {
        (**self).put_function(name, arity)
    }

    fn put_string(&mut self, text: &str) -> Result<(), LinkError> {
        (**self).put_string(text)
    }

    fn end_message(&mut self) -> Result<(), LinkError> {
        (**self).end_message()
    }

    fn last_error(&mut self) -> LinkStatus {
        (**self).last_error()
    }

    fn close(&mut self) {
        (**self).close();
    }
}
