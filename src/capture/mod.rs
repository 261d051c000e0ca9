//! Screen Capture Layer
//!
//! Grabs the configured capture region (or the primary monitor) via `xcap`.
//! This is a read-only operation that captures pixels without any game interaction.

pub mod frame;
pub mod geometry;

use image::imageops;
use tracing::{debug, info};
use xcap::Monitor;

use crate::error::CaptureError;

pub use frame::CapturedFrame;
pub use geometry::{FieldCropper, FieldRole, Region, Roi};

/// Produces raw frames for a fixed screen area on demand
pub trait FrameSource: Send {
    /// Absolute screen position of every frame's top-left pixel
    fn origin(&self) -> (i32, i32);

    /// Size of every frame as (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Capture one frame
    fn capture(&mut self) -> Result<CapturedFrame, CaptureError>;
}

/// Monitor description for diagnostics
#[derive(Debug, Clone)]
pub struct MonitorInfo {
    pub index: usize,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

/// List all monitors known to the capture backend
pub fn list_monitors() -> Result<Vec<MonitorInfo>, CaptureError> {
    let monitors = Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
    Ok(monitors
        .iter()
        .enumerate()
        .map(|(index, m)| MonitorInfo {
            index,
            name: m.name().unwrap_or_else(|_| "Unknown".to_string()),
            x: m.x().unwrap_or(0),
            y: m.y().unwrap_or(0),
            width: m.width().unwrap_or(0),
            height: m.height().unwrap_or(0),
            is_primary: m.is_primary().unwrap_or(false),
        })
        .collect())
}

/// Screen capture of a fixed region using xcap
///
/// Monitor handles are looked up per capture so the source stays `Send`.
pub struct ScreenFrameSource {
    region: Region,
    /// Whether the region is a whole monitor (no explicit capture region)
    full_monitor: bool,
}

impl ScreenFrameSource {
    /// Capture `region`, or the whole primary monitor when `None`
    pub fn new(region: Option<Region>) -> Result<Self, CaptureError> {
        match region {
            Some(region) => {
                info!(
                    "Capture region: left={}, top={}, w={}, h={}",
                    region.left, region.top, region.width, region.height
                );
                Ok(Self { region, full_monitor: false })
            }
            None => {
                let primary = primary_monitor()?;
                let region = Region {
                    left: primary.x().map_err(backend)?,
                    top: primary.y().map_err(backend)?,
                    width: primary.width().map_err(backend)? as i32,
                    height: primary.height().map_err(backend)? as i32,
                };
                info!(
                    "No capture region configured, using primary monitor {}x{} at ({}, {})",
                    region.width, region.height, region.left, region.top
                );
                Ok(Self { region, full_monitor: true })
            }
        }
    }
}

impl FrameSource for ScreenFrameSource {
    fn origin(&self) -> (i32, i32) {
        self.region.origin()
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.region.width as u32, self.region.height as u32)
    }

    fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
        let monitor = if self.full_monitor {
            primary_monitor()?
        } else {
            Monitor::from_point(self.region.left, self.region.top)
                .map_err(|_| CaptureError::NoMonitor(self.region.left, self.region.top))?
        };

        let screen = monitor.capture_image().map_err(backend)?;
        let mon_x = monitor.x().map_err(backend)?;
        let mon_y = monitor.y().map_err(backend)?;

        // Region position inside the monitor image
        let rx = (self.region.left - mon_x).max(0) as u32;
        let ry = (self.region.top - mon_y).max(0) as u32;
        let (w, h) = self.dimensions();
        let (sw, sh) = screen.dimensions();

        if rx + w > sw || ry + h > sh {
            return Err(CaptureError::FrameTooSmall {
                frame_width: sw,
                frame_height: sh,
            });
        }

        let image = if (rx, ry, w, h) == (0, 0, sw, sh) {
            screen
        } else {
            imageops::crop_imm(&screen, rx, ry, w, h).to_image()
        };

        debug!("Captured {}x{} frame", w, h);
        Ok(CapturedFrame::new(image, self.origin()))
    }
}

fn primary_monitor() -> Result<Monitor, CaptureError> {
    Monitor::all()
        .map_err(backend)?
        .into_iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .ok_or(CaptureError::NoMonitor(0, 0))
}

fn backend(e: xcap::XCapError) -> CaptureError {
    CaptureError::Backend(e.to_string())
}
