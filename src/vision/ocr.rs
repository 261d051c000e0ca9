//! OCR (Optical Character Recognition) backend abstraction
//!
//! The recognizer only needs per-word text and confidence from an engine;
//! everything else (segmentation retries, normalization, scoring) lives in
//! [`super::TextRecognizer`].

use image::GrayImage;

use crate::error::RecognitionError;

/// Page segmentation strategy requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationMode {
    /// Single uniform block of text
    Block,
    /// Single text line
    SingleLine,
    /// Single word
    SingleWord,
}

impl SegmentationMode {
    /// Tesseract `--psm` value
    pub fn psm(&self) -> u8 {
        match self {
            SegmentationMode::Block => 6,
            SegmentationMode::SingleLine => 7,
            SegmentationMode::SingleWord => 8,
        }
    }
}

/// Single recognized token
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0.0 - 100.0)
    pub confidence: f32,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// An OCR engine. "No text" is an empty word list, never an error.
pub trait OcrBackend: Send + Sync {
    fn recognize(
        &self,
        image: &GrayImage,
        mode: SegmentationMode,
    ) -> Result<Vec<OcrWord>, RecognitionError>;
}
