/// Declares a function returning a lazily compiled, process-wide regex.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}
pub(crate) use re;

pub mod amount;
pub mod datetime;
pub mod extract;
pub mod hash;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod trx;
pub mod types;

pub use amount::{parse_amount, AmountExtractor};
pub use datetime::{extract_datetime_match, DateTimeMatch, CANONICAL_FORMAT};
pub use extract::{extract_amount, extract_datetime, extract_trx_suffix, FieldExtractor};
pub use hash::{image_digest, sha256_bytes, to_hex};
pub use normalize::{normalize, NormalizedText};
pub use pipeline::{PipelineError, ReceiptPipeline};
pub use preprocess::{preprocess, MimeHint, PreprocessError, PreprocessedImage, RawImage};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, UnavailableRecognizer};
pub use trx::TransactionIdExtractor;
pub use types::{ExtractedField, ExtractionIssue, ExtractionResult};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
