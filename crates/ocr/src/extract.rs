use std::sync::OnceLock;

use iesal_core::{Amount, ExtractionConfig};

use crate::amount::AmountExtractor;
use crate::datetime::{extract_datetime_match, DateTimeMatch};
use crate::normalize::{normalize, NormalizedText};
use crate::trx::TransactionIdExtractor;
use crate::types::{ExtractedField, ExtractionIssue, ExtractionResult};

/// Runs the amount, transaction-number and date-time cascades over one
/// normalized text. Built once from an [`ExtractionConfig`]; holds no state
/// between calls.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    amount: AmountExtractor,
    trx: TransactionIdExtractor,
}

impl FieldExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            amount: AmountExtractor::new(&config.amount_labels, &config.amount_tiers)?,
            trx: TransactionIdExtractor::new(
                &config.trx_primary_labels,
                &config.trx_labels,
                config.trx_fallback_min_digits,
                config.trx_suffix_len,
            )?,
        })
    }

    pub fn amount(&self, text: &NormalizedText) -> Option<ExtractedField<Amount>> {
        self.amount.extract(text)
    }

    pub fn trx_suffix(&self, text: &NormalizedText) -> Option<ExtractedField<String>> {
        self.trx.extract(text)
    }

    pub fn datetime(&self, text: &NormalizedText) -> Option<ExtractedField<DateTimeMatch>> {
        extract_datetime_match(text)
    }

    /// Extract every field. Missing fields keep their defaults and are listed
    /// in `issues`; this never fails.
    pub fn extract(&self, text: NormalizedText) -> ExtractionResult {
        let amount = self.amount(&text);
        let trx = self.trx_suffix(&text);
        let date = self.datetime(&text);

        let mut issues = Vec::new();
        if amount.is_none() {
            issues.push(ExtractionIssue::NoAmount);
        }
        if trx.is_none() {
            issues.push(ExtractionIssue::NoTransactionId);
        }
        if date.is_none() {
            issues.push(ExtractionIssue::NoDateTime);
        }

        // Aggregate confidence: weighted sum of the three fields.
        let confidence = [
            (amount.as_ref().map(|f| f.confidence), 0.5f32),
            (date.as_ref().map(|f| f.confidence), 0.3),
            (trx.as_ref().map(|f| f.confidence), 0.2),
        ]
        .into_iter()
        .map(|(conf, weight)| conf.unwrap_or(0.0) * weight)
        .sum::<f32>();

        let (date_time, date_time_raw) = match date {
            Some(f) => (f.value.canonical(), f.value.raw),
            None => (String::new(), String::new()),
        };

        ExtractionResult {
            amount: amount.as_ref().map(|f| f.value).unwrap_or_default(),
            amount_matched: amount.is_some(),
            trx_suffix: trx.map(|f| f.value).unwrap_or_default(),
            date_time,
            date_time_raw,
            raw_text: text,
            confidence,
            image_sha256: None,
            issues,
        }
    }
}

fn default_extractor() -> &'static FieldExtractor {
    static EXTRACTOR: OnceLock<FieldExtractor> = OnceLock::new();
    EXTRACTOR.get_or_init(|| {
        FieldExtractor::new(&ExtractionConfig::default()).expect("default vocabulary compiles")
    })
}

// ── Single-field helpers with the default vocabulary ─────────────────────────

/// Amount and whether any tier matched; `(0, false)` when none did.
pub fn extract_amount(text: &str) -> (Amount, bool) {
    match default_extractor().amount(&normalize(text)) {
        Some(f) => (f.value, true),
        None => (Amount::zero(), false),
    }
}

/// Last four digits of the transaction number, or an empty string.
pub fn extract_trx_suffix(text: &str) -> String {
    default_extractor()
        .trx_suffix(&normalize(text))
        .map(|f| f.value)
        .unwrap_or_default()
}

/// Date-time as `YYYY-MM-DD HH:MM:SS`, or an empty string.
pub fn extract_datetime(text: &str) -> String {
    extract_datetime_match(&normalize(text))
        .map(|f| f.value.canonical())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use iesal_core::AmountTier;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const TRANSFER: &str =
        "إيصال تحويل\nالمبلغ: 2,500.00\nرقم العملية: 778812345678\n12/03/2024 09:15";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn full_transfer_receipt() {
        let ex = FieldExtractor::new(&ExtractionConfig::default()).unwrap();
        let r = ex.extract(normalize(TRANSFER));
        assert_eq!(r.amount.as_decimal(), dec("2500.00"));
        assert!(r.amount_matched);
        assert_eq!(r.trx_suffix, "5678");
        assert!(r.date_time_raw.contains("12/03/2024"));
        assert_eq!(r.date_time, "2024-03-12 09:15:00");
        assert!(r.issues.is_empty());
        assert!(!r.needs_review(), "confidence was {}", r.confidence);
        assert!(!r.raw_text.contains('\n'));
    }

    #[test]
    fn empty_text_gives_defaults() {
        let ex = FieldExtractor::new(&ExtractionConfig::default()).unwrap();
        let r = ex.extract(normalize(""));
        assert!(r.amount.is_zero());
        assert!(!r.amount_matched);
        assert_eq!(r.trx_suffix, "");
        assert_eq!(r.date_time, "");
        assert_eq!(r.confidence, 0.0);
        assert!(r.needs_manual_entry());
        assert_eq!(
            r.issues,
            vec![ExtractionIssue::NoAmount, ExtractionIssue::NoTransactionId, ExtractionIssue::NoDateTime]
        );
    }

    #[test]
    fn fields_are_independent() {
        let ex = FieldExtractor::new(&ExtractionConfig::default()).unwrap();
        let r = ex.extract(normalize("Date 15 Jan 2024 14:30"));
        // The amount falls back to the first number; the date is still read in full.
        assert!(r.amount_matched);
        assert_eq!(r.date_time, "2024-01-15 14:30:00");
        assert_eq!(r.trx_suffix, "");
        assert!(r.has_issue(ExtractionIssue::NoTransactionId));
    }

    #[test]
    fn alternate_config_changes_behavior() {
        let config = ExtractionConfig {
            amount_labels: vec!["Montant".into()],
            amount_tiers: vec![AmountTier::Labeled],
            trx_suffix_len: 6,
            ..ExtractionConfig::default()
        };
        let ex = FieldExtractor::new(&config).unwrap();
        let r = ex.extract(normalize("Montant 12,50 Ref 123456789 Amount 99.00"));
        assert_eq!(r.amount.as_decimal(), dec("12.50"));
        assert_eq!(r.trx_suffix, "456789");
    }

    // ── Default-vocabulary helpers ───────────────────────────────────────────

    #[test]
    fn helper_amount_arabic_label() {
        let (amount, matched) = extract_amount("تفاصيل\nالمبلغ: 1,234.56\nشكرا");
        assert!(matched);
        assert_eq!(amount.as_decimal(), dec("1234.56"));
    }

    #[test]
    fn helper_amount_without_decimal_marker() {
        assert_eq!(extract_amount("Amount 1500").0.as_decimal(), dec("1500"));
    }

    #[test]
    fn helper_amount_comma_decimal_with_dot_thousands() {
        assert_eq!(extract_amount("Total 1.234,56").0.as_decimal(), dec("1234.56"));
    }

    #[test]
    fn helper_amount_no_digits() {
        assert_eq!(extract_amount("no numbers at all"), (Amount::zero(), false));
    }

    #[test]
    fn helper_amount_reads_arabic_indic_digits() {
        assert_eq!(extract_amount("المبلغ: ١٬٢٥٠٫٥٠").0.as_decimal(), dec("1250.50"));
    }

    #[test]
    fn helper_trx() {
        assert_eq!(extract_trx_suffix("رقم العملية 00012345"), "2345");
        assert_eq!(extract_trx_suffix("Ref: 987"), "987");
        assert_eq!(extract_trx_suffix("nothing"), "");
    }

    #[test]
    fn helper_datetime() {
        assert_eq!(extract_datetime("15 Jan 2024 14:30"), "2024-01-15 14:30:00");
        assert_eq!(extract_datetime("2024|03|12"), "2024-03-12 00:00:00");
        assert_eq!(extract_datetime("12/03/2024 29:15"), "2024-03-12 00:00:00");
        assert_eq!(extract_datetime("none"), "");
    }
}
