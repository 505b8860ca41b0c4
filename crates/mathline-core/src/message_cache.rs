//! Pending kernel diagnostics awaiting a print-or-discard decision.

use std::{collections::VecDeque, io};

use crate::packet::{INCOMPLETE_TAG, SYNTAX_SYMBOL};

/// A diagnostic held back until the session knows whether to show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Symbol the message belongs to, e.g. `Syntax`.
    pub name: String,
    /// Message tag, e.g. `sntxi`.
    pub tag: String,
    /// Message body.
    pub text: String,
    /// Source offset of the error, back-filled by a syntax packet.
    pub position: Option<u32>,
}

impl PendingMessage {
    /// Create a message with no position.
    #[must_use]
    pub fn new(name: impl Into<String>, tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            text: text.into(),
            position: None,
        }
    }

    /// Whether this is the "incomplete expression" diagnostic.
    #[must_use]
    pub fn is_incomplete_input(&self) -> bool {
        self.name == SYNTAX_SYMBOL && self.tag == INCOMPLETE_TAG
    }

    /// Write the message, pointing at the error position within `input` when known.
    ///
    /// # Errors
    /// Returns error if the sink fails.
    pub fn render(&self, input: &str, out: &mut impl io::Write) -> io::Result<()> {
        writeln!(out, "\n{}", self.text)?;
        if let Some(position) = self.position {
            writeln!(out, "{input}")?;
            let column = usize::try_from(position)
                .unwrap_or(usize::MAX)
                .min(input.chars().count());
            writeln!(out, "{}^ Syntax Error.\n", ".".repeat(column))?;
        }
        Ok(())
    }
}

/// Ordered queue of pending messages.
///
/// Only three operations are exposed: enqueue at the back, attach a position
/// to the most recent entry, and drain from the front.
#[derive(Debug, Default)]
pub struct MessageCache {
    queue: VecDeque<PendingMessage>,
}

impl MessageCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: VecDeque::with_capacity(4),
        }
    }

    /// Queue a message behind all pending ones.
    pub fn enqueue(&mut self, message: PendingMessage) {
        tracing::trace!(name = %message.name, tag = %message.tag, "caching message");
        self.queue.push_back(message);
    }

    /// Attach a syntax position to the most recently queued message.
    ///
    /// Returns false, changing nothing, when the cache is empty.
    pub fn attach_position_to_last(&mut self, position: u32) -> bool {
        match self.queue.back_mut() {
            Some(last) => {
                last.position = Some(position);
                true
            }
            None => {
                tracing::debug!(position, "syntax position with no pending message");
                false
            }
        }
    }

    /// Remove and yield every pending message, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = PendingMessage> + '_ {
        self.queue.drain(..)
    }

    /// Number of pending messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The most recently queued message.
    #[must_use]
    pub fn last(&self) -> Option<&PendingMessage> {
        self.queue.back()
    }
}
