//! Collection of images the kernel sends during a turn.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use mathline_core::{Image, Link};
use mathline_session::Session;

/// Saves completed images as `image-<n>.ps`, or just counts them.
#[derive(Debug)]
pub struct ImageSink {
    dir: Option<PathBuf>,
    received: usize,
}

impl ImageSink {
    /// Create a sink writing into `dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub fn new(dir: Option<PathBuf>) -> io::Result<Self> {
        if let Some(dir) = &dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self { dir, received: 0 })
    }

    /// Images received so far.
    #[must_use]
    pub const fn received(&self) -> usize {
        self.received
    }

    /// Take every completed image out of the session.
    pub fn collect<L: Link, W: Write>(&mut self, session: &mut Session<L, W>) {
        while let Some(image) = session.pop_image() {
            self.received += 1;
            match &self.dir {
                Some(dir) => match save(dir, self.received, &image) {
                    Ok(path) => tracing::info!(path = %path.display(), bytes = image.len(), "image saved"),
                    Err(err) => tracing::warn!(error = %err, "failed to save image"),
                },
                None => tracing::info!(
                    number = self.received,
                    bytes = image.len(),
                    "image received; pass --image-dir to save it"
                ),
            }
        }
    }
}

fn save(dir: &Path, number: usize, image: &Image) -> io::Result<PathBuf> {
    let path = dir.join(format!("image-{number}.ps"));
    std::fs::write(&path, image.as_bytes())?;
    Ok(path)
}
