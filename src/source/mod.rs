//! Frame sources: where stream workers pull frames from.

mod resize;
mod snapshot;

pub use resize::{Downscaled, downscale};
pub use snapshot::{SnapshotReader, SnapshotSource};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;

/// One decoded video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded pixels.
    pub image: DynamicImage,
    /// When the frame was acquired.
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap an image captured now.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// An open video source yielding frames in arrival order.
#[async_trait]
pub trait FrameReader: Send {
    /// Read the next frame.
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Whether each read fetches a fresh frame on demand. Such readers are
    /// paced to the stream's frame rate instead of having frames dropped.
    fn pull_based(&self) -> bool {
        false
    }
}

/// Opens readers for stream URLs.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Open `url` for reading.
    async fn open(&self, url: &str) -> Result<Box<dyn FrameReader>>;
}
