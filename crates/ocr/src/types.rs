use iesal_core::Amount;
use serde::{Deserialize, Serialize};

use crate::normalize::NormalizedText;

/// A single extracted value with an associated confidence score (0.0–1.0).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedField<T> {
    pub value: T,
    /// Confidence in this extraction (0.0 = guessed, 1.0 = certain).
    pub confidence: f32,
}

impl<T> ExtractedField<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self { value, confidence: confidence.clamp(0.0, 1.0) }
    }
}

/// A recovery the pipeline made instead of failing. None of these are errors
/// from the caller's point of view; they explain why a field came back empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionIssue {
    /// The image could not be decoded; OCR ran on the untouched bytes.
    PreprocessingDegraded,
    /// The OCR backend failed or returned no text.
    OcrUnavailable,
    NoAmount,
    NoTransactionId,
    NoDateTime,
}

impl std::fmt::Display for ExtractionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionIssue::PreprocessingDegraded => write!(f, "preprocessing_degraded"),
            ExtractionIssue::OcrUnavailable => write!(f, "ocr_unavailable"),
            ExtractionIssue::NoAmount => write!(f, "no_amount"),
            ExtractionIssue::NoTransactionId => write!(f, "no_transaction_id"),
            ExtractionIssue::NoDateTime => write!(f, "no_date_time"),
        }
    }
}

/// Structured fields read off one transfer receipt.
///
/// Always well-formed: fields that could not be found keep their zero/empty
/// defaults and the reason is listed in `issues`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractionResult {
    pub amount: Amount,
    pub amount_matched: bool,
    /// Last digits of the transaction/reference number, empty if not found.
    pub trx_suffix: String,
    /// `YYYY-MM-DD HH:MM:SS`, empty if not found.
    pub date_time: String,
    /// The date-time exactly as it appeared in the text.
    pub date_time_raw: String,
    pub raw_text: NormalizedText,
    /// Aggregate confidence across all extracted fields (0.0–1.0).
    pub confidence: f32,
    /// SHA-256 of the original image bytes, when the result came from an image.
    pub image_sha256: Option<String>,
    pub issues: Vec<ExtractionIssue>,
}

impl ExtractionResult {
    /// Nothing usable was read; the user has to type the receipt in.
    pub fn needs_manual_entry(&self) -> bool {
        !self.amount_matched && self.trx_suffix.is_empty() && self.date_time.is_empty()
    }

    /// Whether the extraction is too uncertain to accept without a human look.
    pub fn needs_review(&self) -> bool {
        self.confidence < 0.7
    }

    pub fn has_issue(&self, issue: ExtractionIssue) -> bool {
        self.issues.contains(&issue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn blank() -> ExtractionResult {
        ExtractionResult {
            amount: Amount::zero(),
            amount_matched: false,
            trx_suffix: String::new(),
            date_time: String::new(),
            date_time_raw: String::new(),
            raw_text: normalize(""),
            confidence: 0.0,
            image_sha256: None,
            issues: vec![ExtractionIssue::NoAmount],
        }
    }

    #[test]
    fn extracted_field_clamps_confidence() {
        let f = ExtractedField::new("test", 1.5);
        assert_eq!(f.confidence, 1.0);
        let f = ExtractedField::new("test", -0.1);
        assert_eq!(f.confidence, 0.0);
    }

    #[test]
    fn blank_result_needs_manual_entry() {
        let r = blank();
        assert!(r.needs_manual_entry());
        assert!(r.needs_review());
        assert!(r.has_issue(ExtractionIssue::NoAmount));
        assert!(!r.has_issue(ExtractionIssue::OcrUnavailable));
    }

    #[test]
    fn any_field_avoids_manual_entry() {
        let r = ExtractionResult { trx_suffix: "5678".into(), ..blank() };
        assert!(!r.needs_manual_entry());
    }

    #[test]
    fn needs_review_threshold() {
        let r = ExtractionResult { confidence: 0.9, ..blank() };
        assert!(!r.needs_review());
    }

    #[test]
    fn serializes_issues_in_snake_case() {
        let json = serde_json::to_value(blank()).unwrap();
        assert_eq!(json["issues"][0], "no_amount");
        assert_eq!(json["raw_text"], "");
    }

    #[test]
    fn issue_display() {
        assert_eq!(ExtractionIssue::OcrUnavailable.to_string(), "ocr_unavailable");
    }
}
