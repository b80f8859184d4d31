use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Strategies for locating the amount, tried in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountTier {
    /// A number directly after a label such as `المبلغ` or `Total`.
    Labeled,
    /// Any number written with a two-digit fractional part.
    Decimal,
    /// The first run of two or more digits.
    AnyNumber,
}

impl std::fmt::Display for AmountTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmountTier::Labeled => write!(f, "labeled"),
            AmountTier::Decimal => write!(f, "decimal"),
            AmountTier::AnyNumber => write!(f, "any_number"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Luminance above this becomes white, everything else black.
    pub threshold: u8,
    /// Share of the histogram clipped from each end before the first contrast stretch.
    pub cutoff_percent: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { threshold: 200, cutoff_percent: 1.0 }
    }
}

/// Everything the receipt pipeline can be tuned with. Every field has a
/// default, so a TOML file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Passed to the OCR backend. `None` or an empty string lets the engine pick.
    pub language_hint: Option<String>,
    pub preprocess: PreprocessConfig,
    pub amount_labels: Vec<String>,
    pub amount_tiers: Vec<AmountTier>,
    /// Labels that name the transaction number unambiguously. Searched first.
    pub trx_primary_labels: Vec<String>,
    pub trx_labels: Vec<String>,
    /// Minimum length of an unlabeled digit run taken as a reference number.
    pub trx_fallback_min_digits: usize,
    pub trx_suffix_len: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            language_hint: Some("ara+eng".to_string()),
            preprocess: PreprocessConfig::default(),
            amount_labels: to_strings(&[
                "المبلغ", "المبلع", "الإجمالي", "إجمالي", "رصيد",
                "Amount", "Total", "Balance", "Value", "SAR", "AED", "USD",
            ]),
            amount_tiers: vec![AmountTier::Labeled, AmountTier::Decimal, AmountTier::AnyNumber],
            trx_primary_labels: to_strings(&["رقم العملية"]),
            trx_labels: to_strings(&[
                "Trx.", "ID", "Ref", "No", "Operation", "Sequence", "Number", "رقم", "عملية",
            ]),
            trx_fallback_min_digits: 8,
            trx_suffix_len: 4,
        }
    }
}

impl ExtractionConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: ExtractionConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trx_suffix_len == 0 {
            return Err(ConfigError::Invalid("trx_suffix_len must be at least 1".into()));
        }
        if self.trx_fallback_min_digits == 0 {
            return Err(ConfigError::Invalid("trx_fallback_min_digits must be at least 1".into()));
        }
        let cutoff = self.preprocess.cutoff_percent;
        if !(0.0..50.0).contains(&cutoff) {
            return Err(ConfigError::Invalid(format!(
                "preprocess.cutoff_percent must be in [0, 50), got {cutoff}"
            )));
        }
        if self.amount_tiers.is_empty() {
            return Err(ConfigError::Invalid("amount_tiers must not be empty".into()));
        }
        Ok(())
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
