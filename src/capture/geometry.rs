//! Capture geometry and the field cropper
//!
//! Calibration stores rectangles in absolute screen coordinates. The cropper
//! relativizes them against the frame origin once at session start and then
//! cuts the same two rectangles out of every frame.

use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Absolute screen rectangle to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    /// Build a region, rejecting non-positive sizes
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Result<Self, ConfigError> {
        if width <= 0 || height <= 0 {
            return Err(ConfigError::EmptyRegion {
                width: width as i64,
                height: height as i64,
            });
        }
        Ok(Self { left, top, width, height })
    }

    pub fn origin(&self) -> (i32, i32) {
        (self.left, self.top)
    }
}

impl From<[i32; 4]> for Region {
    fn from(v: [i32; 4]) -> Self {
        Self { left: v[0], top: v[1], width: v[2], height: v[3] }
    }
}

impl From<Region> for [i32; 4] {
    fn from(r: Region) -> Self {
        [r.left, r.top, r.width, r.height]
    }
}

/// Region of interest holding one text field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Roi {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Roi {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Top-left corner relative to `origin`, widened so extreme values cannot overflow
    pub fn relative_to(&self, origin: (i32, i32)) -> (i64, i64) {
        (
            self.x as i64 - origin.0 as i64,
            self.y as i64 - origin.1 as i64,
        )
    }
}

impl From<[i32; 4]> for Roi {
    fn from(v: [i32; 4]) -> Self {
        Self { x: v[0], y: v[1], width: v[2], height: v[3] }
    }
}

impl From<Roi> for [i32; 4] {
    fn from(r: Roi) -> Self {
        [r.x, r.y, r.width, r.height]
    }
}

/// Which text field a crop belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Opponent display name (glowing stylized text)
    Name,
    /// Clan name (flat text)
    Clan,
}

impl FieldRole {
    pub fn label(&self) -> &'static str {
        match self {
            FieldRole::Name => "name",
            FieldRole::Clan => "clan",
        }
    }
}

/// A frame-relative rectangle already checked against the frame bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Relativize `roi` against `origin` and check it fits a `frame` sized buffer
    pub fn from_absolute(
        field: FieldRole,
        roi: Roi,
        origin: (i32, i32),
        frame: (u32, u32),
    ) -> Result<Self, ConfigError> {
        let (x, y) = roi.relative_to(origin);
        let (w, h) = (roi.width as i64, roi.height as i64);

        if w <= 0 || h <= 0 {
            return Err(ConfigError::EmptyRoi {
                field: field.label(),
                width: w,
                height: h,
            });
        }
        if x < 0 || y < 0 || x + w > frame.0 as i64 || y + h > frame.1 as i64 {
            return Err(ConfigError::RoiOutOfBounds {
                field: field.label(),
                x,
                y,
                width: w,
                height: h,
                frame_width: frame.0,
                frame_height: frame.1,
            });
        }

        Ok(Self {
            x: x as u32,
            y: y as u32,
            width: w as u32,
            height: h as u32,
        })
    }
}

/// Validated crop rectangles for both fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCropper {
    name: CropRect,
    clan: CropRect,
    frame: (u32, u32),
}

impl FieldCropper {
    /// Validate both absolute ROIs against a frame at `origin` of size `frame`
    pub fn new(
        origin: (i32, i32),
        frame: (u32, u32),
        roi_name: Roi,
        roi_clan: Roi,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            name: CropRect::from_absolute(FieldRole::Name, roi_name, origin, frame)?,
            clan: CropRect::from_absolute(FieldRole::Clan, roi_clan, origin, frame)?,
            frame,
        })
    }

    pub fn rect(&self, field: FieldRole) -> CropRect {
        match field {
            FieldRole::Name => self.name,
            FieldRole::Clan => self.clan,
        }
    }

    /// Cut one field out of a frame
    ///
    /// A frame that shrank since calibration (resolution change) fails the
    /// same bounds check as at session start.
    pub fn crop(&self, image: &RgbaImage, field: FieldRole) -> Result<RgbaImage, ConfigError> {
        let rect = self.rect(field);
        let (fw, fh) = image.dimensions();
        if (fw, fh) != self.frame
            && (rect.x + rect.width > fw || rect.y + rect.height > fh)
        {
            return Err(ConfigError::RoiOutOfBounds {
                field: field.label(),
                x: rect.x as i64,
                y: rect.y as i64,
                width: rect.width as i64,
                height: rect.height as i64,
                frame_width: fw,
                frame_height: fh,
            });
        }
        Ok(imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
    }
}
