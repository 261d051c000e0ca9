//! Tesseract CLI backend
//!
//! Writes the preprocessed field to a temporary PNG and runs the `tesseract`
//! executable with TSV output, which carries per-word confidences.

use image::GrayImage;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

use super::ocr::{OcrBackend, OcrWord, SegmentationMode};
use crate::error::RecognitionError;

/// Tesseract invocation settings
#[derive(Debug, Clone)]
pub struct TesseractCli {
    /// Executable name or path
    pub executable: PathBuf,
    /// Traineddata language
    pub language: String,
    /// Optional `--tessdata-dir`
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            tessdata_dir: None,
        }
    }
}

impl TesseractCli {
    pub fn new(executable: PathBuf, language: String, tessdata_dir: Option<PathBuf>) -> Self {
        Self {
            executable,
            language,
            tessdata_dir,
        }
    }

    /// Check that the executable can be started
    pub fn probe(&self) -> Result<String, RecognitionError> {
        let output = Command::new(&self.executable)
            .arg("--version")
            .output()
            .map_err(|e| RecognitionError::Unavailable(format!("{}: {}", self.executable.display(), e)))?;
        let text = String::from_utf8_lossy(&output.stdout);
        let version = text.lines().next().unwrap_or("tesseract").trim().to_string();
        Ok(version)
    }
}

impl OcrBackend for TesseractCli {
    fn recognize(
        &self,
        image: &GrayImage,
        mode: SegmentationMode,
    ) -> Result<Vec<OcrWord>, RecognitionError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(vec![]);
        }

        let input = NamedTempFile::with_suffix(".png")?;
        image.save(input.path())?;

        let mut cmd = Command::new(&self.executable);
        cmd.arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg(mode.psm().to_string());
        if let Some(dir) = &self.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.arg("tsv");

        let output = cmd.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                RecognitionError::Unavailable(format!("{}: {}", self.executable.display(), e))
            }
            _ => RecognitionError::Io(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Failed(stderr.trim().to_string()));
        }

        let words = parse_tsv_words(&String::from_utf8_lossy(&output.stdout));
        debug!("Tesseract psm {}: {} words", mode.psm(), words.len());
        Ok(words)
    }
}

/// Word rows (level 5) with a non-negative confidence and non-empty text
///
/// TSV columns: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text
pub fn parse_tsv_words(tsv: &str) -> Vec<OcrWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 12 || fields[0].trim() != "5" {
                return None;
            }
            let conf: f32 = fields[10].trim().parse().ok()?;
            let text = fields[11].trim();
            if conf < 0.0 || text.is_empty() {
                return None;
            }
            Some(OcrWord::new(text, conf))
        })
        .collect()
}
