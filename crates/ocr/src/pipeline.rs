use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use iesal_core::ExtractionConfig;

use crate::extract::FieldExtractor;
use crate::hash;
use crate::normalize::{normalize, NormalizedText};
use crate::preprocess::{self, MimeHint, PreprocessedImage, RawImage};
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::{ExtractionIssue, ExtractionResult};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid extraction vocabulary: {0}")]
    Config(#[from] regex::Error),
}

/// Orchestrates: preprocess → OCR → normalize → extract.
///
/// Holds only immutable state, so one pipeline can serve concurrent calls
/// whenever its backend can.
pub struct ReceiptPipeline<R: OcrBackend> {
    recognizer: R,
    extractor: FieldExtractor,
    config: ExtractionConfig,
}

impl<R: OcrBackend> ReceiptPipeline<R> {
    pub fn new(recognizer: R, config: ExtractionConfig) -> Result<Self, PipelineError> {
        let extractor = FieldExtractor::new(&config)?;
        Ok(Self { recognizer, extractor, config })
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Process a file on disk. Only reading the file can fail.
    pub async fn process_file(&self, path: &Path) -> Result<ExtractionResult, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let hint = MimeHint::from_path(path).unwrap_or(MimeHint::Png);
        Ok(self.process_bytes(&bytes, hint))
    }

    /// Process raw image bytes (camera capture or upload).
    pub fn process_bytes(&self, data: &[u8], hint: MimeHint) -> ExtractionResult {
        let image = preprocess::preprocess(&RawImage::new(data, hint), &self.config.preprocess);

        let mut issues = Vec::new();
        if image.is_degraded() {
            issues.push(ExtractionIssue::PreprocessingDegraded);
        }

        let text = match self.recognize(&image) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("OCR returned no text");
                issues.push(ExtractionIssue::OcrUnavailable);
                String::new()
            }
            Err(e) => {
                warn!(error = %e, "OCR failed, extracting from empty text");
                issues.push(ExtractionIssue::OcrUnavailable);
                String::new()
            }
        };

        let mut result = self.extract(normalize(&text));
        issues.append(&mut result.issues);
        result.issues = issues;
        result.image_sha256 = Some(hash::image_digest(data));
        result
    }

    /// Extract from text that was already recognized elsewhere.
    pub fn process_text(&self, ocr_text: &str) -> ExtractionResult {
        self.extract(normalize(ocr_text))
    }

    fn extract(&self, text: NormalizedText) -> ExtractionResult {
        let result = self.extractor.extract(text);
        debug!(
            amount = %result.amount,
            trx_suffix = %result.trx_suffix,
            date_time = %result.date_time,
            confidence = result.confidence,
            "fields extracted"
        );
        result
    }

    /// Recognize with the configured language hint; an engine that lacks the
    /// hinted languages gets exactly one more try with none.
    fn recognize(&self, image: &PreprocessedImage) -> Result<String, OcrError> {
        let language = self.config.language_hint.as_deref().filter(|l| !l.trim().is_empty());
        match self.recognizer.recognize(image, language) {
            Err(OcrError::UnsupportedLanguage(lang)) => {
                warn!(language = %lang, "language hint rejected, retrying without one");
                self.recognizer.recognize(image, None)
            }
            other => other,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
