use std::sync::Mutex;
use thiserror::Error;

use crate::preprocess::PreprocessedImage;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR engine does not support language '{0}'")]
    UnsupportedLanguage(String),
    #[error("Tesseract not available: build with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
///
/// `language` is an engine-specific hint such as `ara+eng`; `None` lets the
/// engine use its default. Recognition has no side effects, so callers may
/// retry freely.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &PreprocessedImage, language: Option<&str>) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image: &PreprocessedImage, language: Option<&str>) -> Result<String, OcrError> {
        (**self).recognize(image, language)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string, so the extraction pipeline can be exercised
/// without Tesseract installed. Remembers the language hints it was asked for.
pub struct MockRecognizer {
    text: String,
    reject_languages: bool,
    failure: Option<OcrError>,
    calls: Mutex<Vec<Option<String>>>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reject_languages: false,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Behaves like an engine without the requested traineddata: any language
    /// hint is refused, recognition without one succeeds.
    pub fn rejecting_languages(text: impl Into<String>) -> Self {
        Self { reject_languages: true, ..Self::new(text) }
    }

    pub fn failing(error: OcrError) -> Self {
        Self { failure: Some(error), ..Self::new("") }
    }

    /// Language hints received so far, in call order.
    pub fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image: &PreprocessedImage, language: Option<&str>) -> Result<String, OcrError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(language.map(str::to_string));
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        match language {
            Some(lang) if self.reject_languages => Err(OcrError::UnsupportedLanguage(lang.to_string())),
            _ => Ok(self.text.clone()),
        }
    }
}

/// Stand-in used when the binary was built without an OCR engine.
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image: &PreprocessedImage, _language: Option<&str>) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use crate::preprocess::PreprocessedImage;
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>) -> Self {
            Self { data_path }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image: &PreprocessedImage, language: Option<&str>) -> Result<String, OcrError> {
            let lang = language.unwrap_or("eng");
            // Tesseract refuses to initialise when the traineddata for `lang` is missing.
            let mut lt = LepTess::new(self.data_path.as_deref(), lang).map_err(|e| match language {
                Some(l) => OcrError::UnsupportedLanguage(format!("{l} ({e})")),
                None => OcrError::Engine(e.to_string()),
            })?;
            let bytes = image.encoded().map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.set_image_from_mem(&bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
