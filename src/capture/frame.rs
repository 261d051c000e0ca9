//! Frame data structures for captured screen content

use image::RgbaImage;
use std::time::Instant;

/// A captured frame covering the configured capture region
#[derive(Debug)]
pub struct CapturedFrame {
    /// RGBA pixels of the region
    pub image: RgbaImage,
    /// Absolute screen position of the frame's top-left pixel
    pub origin: (i32, i32),
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbaImage, origin: (i32, i32)) -> Self {
        Self {
            image,
            origin,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
