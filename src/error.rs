//! Error taxonomy for the scan pipeline
//!
//! Only [`ConfigError`] is fatal; every other error is caught at the tick
//! boundary, reported on the event channel and the loop carries on.

use thiserror::Error;

/// Invalid or missing calibration/credentials. Fatal to session start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("capture region must have positive size, got {width}x{height}")]
    EmptyRegion { width: i64, height: i64 },
    #[error("{field} ROI has non-positive size {width}x{height}")]
    EmptyRoi {
        field: &'static str,
        width: i64,
        height: i64,
    },
    #[error("{field} ROI ({x},{y} {width}x{height}) lies outside the {frame_width}x{frame_height} frame")]
    RoiOutOfBounds {
        field: &'static str,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("no calibration data: run the calibration tool or pass --calibration")]
    MissingCalibration,
    #[error("no API token configured")]
    MissingToken,
    #[error("invalid API settings: {0}")]
    InvalidApi(String),
    #[error("failed to read calibration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid calibration file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Frame acquisition failed for one tick.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no monitor found at ({0}, {1})")]
    NoMonitor(i32, i32),
    #[error("screen capture failed: {0}")]
    Backend(String),
    #[error("captured frame {frame_width}x{frame_height} is smaller than the requested region")]
    FrameTooSmall { frame_width: u32, frame_height: u32 },
}

/// OCR engine unavailable or failed to run.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("tesseract executable not available: {0}")]
    Unavailable(String),
    #[error("tesseract failed: {0}")]
    Failed(String),
    #[error("OCR temp file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode OCR input: {0}")]
    Encode(#[from] image::ImageError),
}

/// Transport failure that survived the single built-in retry.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to {path} failed: {message}")]
    Transport { path: String, message: String },
    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("{path} returned an unreadable body: {message}")]
    Decode { path: String, message: String },
}

impl NetworkError {
    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A per-tick fault. Never aborts the session.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("calibration no longer fits the frame: {0}")]
    Crop(#[from] ConfigError),
}
