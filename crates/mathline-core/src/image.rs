//! Reassembly of images streamed across several display packets.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// A completed image payload (for example PostScript source).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image(Bytes);

impl Image {
    /// Raw payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload as text, if it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Consume into the underlying buffer.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An image still receiving chunks.
#[derive(Debug, Default)]
struct ImageBuilder {
    buffer: BytesMut,
}

impl ImageBuilder {
    fn append(&mut self, chunk: &str) {
        self.buffer.extend_from_slice(chunk.as_bytes());
    }

    fn finish(self) -> Image {
        Image(self.buffer.freeze())
    }
}

/// Holds at most one open image plus the queue of completed ones.
#[derive(Debug, Default)]
pub struct ImageAccumulator {
    open: Option<ImageBuilder>,
    completed: VecDeque<Image>,
}

impl ImageAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, opening a new image if none is open.
    pub fn append(&mut self, chunk: &str) {
        self.open.get_or_insert_with(ImageBuilder::default).append(chunk);
    }

    /// Append the final chunk and queue the completed image.
    ///
    /// A final chunk with no open image forms a one-chunk image.
    pub fn finish(&mut self, chunk: &str) {
        let mut builder = self.open.take().unwrap_or_default();
        builder.append(chunk);
        let image = builder.finish();
        tracing::debug!(bytes = image.len(), "image complete");
        self.completed.push_back(image);
    }

    /// Drop the image still receiving chunks, if any.
    ///
    /// Returns whether one was open.
    pub fn discard_open(&mut self) -> bool {
        match self.open.take() {
            Some(builder) => {
                tracing::debug!(bytes = builder.buffer.len(), "discarding partial image");
                true
            }
            None => false,
        }
    }

    /// Take the oldest completed image.
    pub fn pop(&mut self) -> Option<Image> {
        self.completed.pop_front()
    }

    /// Whether an image is still receiving chunks.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Number of completed images not yet taken.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.len()
    }
}
