use regex::Regex;
use tracing::debug;

use crate::amount::label_alternation;
use crate::types::ExtractedField;

// Separators OCR leaves between a label and the number: `Ref: 12`, `No.12`, `رقم العملية - 12`.
const LABEL_GAP: &str = r"[\s:#.\-]*";

/// Locates the transaction/reference number and keeps only its tail, which is
/// what people compare against their bank statement.
#[derive(Debug, Clone)]
pub struct TransactionIdExtractor {
    primary: Option<Regex>,
    labeled: Option<Regex>,
    fallback: Regex,
    suffix_len: usize,
}

impl TransactionIdExtractor {
    pub fn new(
        primary_labels: &[String],
        labels: &[String],
        fallback_min_digits: usize,
        suffix_len: usize,
    ) -> Result<Self, regex::Error> {
        let labeled_re = |labels: &[String]| {
            label_alternation(labels)
                .map(|alt| Regex::new(&format!(r"(?i)(?:{alt}){LABEL_GAP}([0-9]+)")))
                .transpose()
        };
        Ok(Self {
            primary: labeled_re(primary_labels)?,
            labeled: labeled_re(labels)?,
            fallback: Regex::new(&format!("[0-9]{{{},}}", fallback_min_digits.max(1)))?,
            suffix_len: suffix_len.max(1),
        })
    }

    pub fn extract(&self, text: &str) -> Option<ExtractedField<String>> {
        let (full_id, confidence) = self
            .primary
            .as_ref()
            .and_then(|re| first_capture(re, text))
            .map(|id| (id, 0.95))
            .or_else(|| self.labeled.as_ref().and_then(|re| first_capture(re, text)).map(|id| (id, 0.80)))
            .or_else(|| self.fallback.find(text).map(|m| (m.as_str(), 0.50)))?;

        debug!(full_id, "transaction number matched");
        Some(ExtractedField::new(self.suffix(full_id).to_string(), confidence))
    }

    fn suffix<'a>(&self, full_id: &'a str) -> &'a str {
        // Digit runs are ASCII, so byte offsets are char offsets.
        &full_id[full_id.len().saturating_sub(self.suffix_len)..]
    }
}

fn first_capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}
