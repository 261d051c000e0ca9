//! Vision/OCR Layer
//!
//! Turns a cropped field into `(text, confidence)`:
//! field-specific preprocessing, then several segmentation passes through an
//! [`OcrBackend`], keeping the pass with the best mean word confidence.

pub mod ocr;
pub mod preprocess;
pub mod tesseract;

use image::{GrayImage, RgbaImage};
use tracing::debug;

use crate::capture::FieldRole;
use crate::error::RecognitionError;

pub use ocr::{OcrBackend, OcrWord, SegmentationMode};
pub use preprocess::preprocess_field;
pub use tesseract::TesseractCli;

/// Text read from one field on one tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognizedField {
    /// Normalized text (trimmed, single spaces)
    pub text: String,
    /// Mean word confidence (0.0 - 100.0), 0 when nothing was read
    pub confidence: f32,
}

impl RecognizedField {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// Join words into normalized text and average their confidences
    pub fn from_words(words: &[OcrWord]) -> Self {
        let tokens: Vec<&OcrWord> = words.iter().filter(|w| !w.text.trim().is_empty()).collect();
        if tokens.is_empty() {
            return Self::default();
        }
        let joined = tokens.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
        let confidence = tokens.iter().map(|w| w.confidence).sum::<f32>() / tokens.len() as f32;
        Self {
            text: normalize_whitespace(&joined),
            confidence,
        }
    }
}

/// Name and clan readings from the same tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognizedPair {
    pub name: RecognizedField,
    pub clan: RecognizedField,
}

impl RecognizedPair {
    /// One-line summary used for `ocr` events and debug logs
    pub fn summary(&self) -> String {
        format!(
            "[{:.0}/{:.0}] name='{}' clan='{}'",
            self.name.confidence, self.clan.confidence, self.name.text, self.clan.text
        )
    }
}

/// Trim and collapse internal whitespace runs to one space
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Segmentation passes tried for a field, in order
pub fn segmentation_plan(role: FieldRole) -> &'static [SegmentationMode] {
    match role {
        // Compact field
        FieldRole::Name => &[SegmentationMode::SingleLine, SegmentationMode::SingleWord],
        // Longer field, block as fallback
        FieldRole::Clan => &[SegmentationMode::SingleLine, SegmentationMode::Block],
    }
}

/// Multi-pass text recognizer over an OCR backend
pub struct TextRecognizer {
    backend: Box<dyn OcrBackend>,
}

impl TextRecognizer {
    pub fn new(backend: Box<dyn OcrBackend>) -> Self {
        Self { backend }
    }

    /// Recognize an already preprocessed field image
    ///
    /// Every pass in the plan runs; the first pass with the highest
    /// confidence wins. Empty output is `("", 0.0)`, not an error.
    pub fn recognize(
        &self,
        image: &GrayImage,
        role: FieldRole,
    ) -> Result<RecognizedField, RecognitionError> {
        let mut best: Option<RecognizedField> = None;

        for &mode in segmentation_plan(role) {
            let words = self.backend.recognize(image, mode)?;
            let candidate = RecognizedField::from_words(&words);
            debug!(
                "{} psm {}: '{}' ({:.1})",
                role.label(),
                mode.psm(),
                candidate.text,
                candidate.confidence
            );
            let better = best
                .as_ref()
                .map_or(true, |b| candidate.confidence > b.confidence);
            if better {
                best = Some(candidate);
            }
        }

        Ok(best.unwrap_or_default())
    }

    /// Preprocess a raw crop for `role` and recognize it
    pub fn read_field(
        &self,
        crop: &RgbaImage,
        role: FieldRole,
    ) -> Result<RecognizedField, RecognitionError> {
        let binary = preprocess_field(crop, role);
        self.recognize(&binary, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Scripted backend keyed by psm, recording every call
    struct FakeOcr {
        by_psm: HashMap<u8, Vec<OcrWord>>,
        calls: Mutex<Vec<u8>>,
    }

    impl FakeOcr {
        fn new(entries: &[(SegmentationMode, Vec<OcrWord>)]) -> Self {
            Self {
                by_psm: entries.iter().map(|(m, w)| (m.psm(), w.clone())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl OcrBackend for FakeOcr {
        fn recognize(
            &self,
            _image: &GrayImage,
            mode: SegmentationMode,
        ) -> Result<Vec<OcrWord>, RecognitionError> {
            self.calls.lock().push(mode.psm());
            Ok(self.by_psm.get(&mode.psm()).cloned().unwrap_or_default())
        }
    }

    struct BrokenOcr;

    impl OcrBackend for BrokenOcr {
        fn recognize(
            &self,
            _image: &GrayImage,
            _mode: SegmentationMode,
        ) -> Result<Vec<OcrWord>, RecognitionError> {
            Err(RecognitionError::Unavailable("missing".to_string()))
        }
    }

    fn blank() -> GrayImage {
        GrayImage::from_pixel(10, 10, image::Luma([255]))
    }

    #[test]
    fn test_from_words_mean_confidence_and_spacing() {
        let words = vec![
            OcrWord::new("  Dark ", 90.0),
            OcrWord::new("Knight", 70.0),
            OcrWord::new(" ", 5.0),
        ];
        let field = RecognizedField::from_words(&words);
        assert_eq!(field.text, "Dark Knight");
        assert!((field.confidence - 80.0).abs() < 0.001);
    }

    #[test]
    fn test_from_words_empty() {
        assert_eq!(RecognizedField::from_words(&[]), RecognizedField::new("", 0.0));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \t b\n\nc  "), "a b c");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_keeps_higher_confidence_pass() {
        let backend = FakeOcr::new(&[
            (SegmentationMode::SingleLine, vec![OcrWord::new("Dark Kn1ght", 40.0)]),
            (SegmentationMode::SingleWord, vec![OcrWord::new("DarkKnight", 88.0)]),
        ]);
        let recognizer = TextRecognizer::new(Box::new(backend));
        let field = recognizer.recognize(&blank(), FieldRole::Name).unwrap();
        assert_eq!(field, RecognizedField::new("DarkKnight", 88.0));
    }

    #[test]
    fn test_first_pass_wins_ties() {
        let backend = FakeOcr::new(&[
            (SegmentationMode::SingleLine, vec![OcrWord::new("Royals", 60.0)]),
            (SegmentationMode::Block, vec![OcrWord::new("R0yals", 60.0)]),
        ]);
        let recognizer = TextRecognizer::new(Box::new(backend));
        let field = recognizer.recognize(&blank(), FieldRole::Clan).unwrap();
        assert_eq!(field.text, "Royals");
    }

    #[test]
    fn test_plans_use_two_distinct_modes() {
        for role in [FieldRole::Name, FieldRole::Clan] {
            let plan = segmentation_plan(role);
            assert!(plan.len() >= 2);
            assert_ne!(plan[0], plan[1]);
        }
    }

    #[test]
    fn test_no_text_yields_empty_field() {
        let backend = FakeOcr::new(&[]);
        let recognizer = TextRecognizer::new(Box::new(backend));
        let field = recognizer.recognize(&blank(), FieldRole::Clan).unwrap();
        assert_eq!(field, RecognizedField::default());
    }

    #[test]
    fn test_call_order_per_role() {
        let backend = std::sync::Arc::new(FakeOcr::new(&[]));

        struct Shared(std::sync::Arc<FakeOcr>);
        impl OcrBackend for Shared {
            fn recognize(
                &self,
                image: &GrayImage,
                mode: SegmentationMode,
            ) -> Result<Vec<OcrWord>, RecognitionError> {
                self.0.recognize(image, mode)
            }
        }

        let recognizer = TextRecognizer::new(Box::new(Shared(backend.clone())));
        recognizer.recognize(&blank(), FieldRole::Name).unwrap();
        recognizer.recognize(&blank(), FieldRole::Clan).unwrap();
        assert_eq!(*backend.calls.lock(), vec![7, 8, 7, 6]);
    }

    #[test]
    fn test_backend_failure_propagates() {
        let recognizer = TextRecognizer::new(Box::new(BrokenOcr));
        assert!(recognizer.recognize(&blank(), FieldRole::Name).is_err());
    }

    #[test]
    fn test_pair_summary() {
        let pair = RecognizedPair {
            name: RecognizedField::new("Max", 81.2),
            clan: RecognizedField::new("Drablibe", 64.7),
        };
        assert_eq!(pair.summary(), "[81/65] name='Max' clan='Drablibe'");
    }
}
