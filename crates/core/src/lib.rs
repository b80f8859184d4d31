pub mod amount;
pub mod config;

pub use amount::Amount;
pub use config::{AmountTier, ConfigError, ExtractionConfig, PreprocessConfig};
