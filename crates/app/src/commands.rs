use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use iesal_core::ExtractionConfig;
use iesal_ocr::{
    preprocess as preprocess_image, ExtractionResult, MimeHint, MockRecognizer, OcrBackend, RawImage,
    ReceiptPipeline, UnavailableRecognizer,
};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

// ── Configuration ─────────────────────────────────────────────────────────────

/// `--config` if given, else the per-user config file when it exists, else defaults.
/// `--lang` overrides whatever the file says.
pub fn resolve_config(explicit: Option<&Path>, lang: Option<String>) -> Result<ExtractionConfig> {
    config_from(explicit, default_config_path(), lang)
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "iesal").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn config_from(
    explicit: Option<&Path>,
    fallback: Option<PathBuf>,
    lang: Option<String>,
) -> Result<ExtractionConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => fallback.filter(|p| p.is_file()),
    };
    let mut config = match path {
        Some(p) => {
            info!(path = %p.display(), "loading extraction config");
            ExtractionConfig::load(&p).with_context(|| format!("reading config {}", p.display()))?
        }
        None => ExtractionConfig::default(),
    };
    if let Some(lang) = lang {
        config.language_hint = Some(lang).filter(|l| !l.trim().is_empty());
    }
    Ok(config)
}

// ── OCR backend ───────────────────────────────────────────────────────────────

fn backend(ocr_text: Option<&Path>) -> Result<Box<dyn OcrBackend>> {
    match ocr_text {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading OCR text {}", path.display()))?;
            Ok(Box::new(MockRecognizer::new(text)))
        }
        None => Ok(engine()),
    }
}

#[cfg(feature = "tesseract")]
fn engine() -> Box<dyn OcrBackend> {
    Box::new(iesal_ocr::TesseractRecognizer::new(None))
}

#[cfg(not(feature = "tesseract"))]
fn engine() -> Box<dyn OcrBackend> {
    warn!("built without an OCR engine; pass --ocr-text or rebuild with --features tesseract");
    Box::new(UnavailableRecognizer)
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn scan(
    config: ExtractionConfig,
    image: &Path,
    format: Option<MimeHint>,
    ocr_text: Option<&Path>,
    timeout_secs: u64,
) -> Result<()> {
    let result = scan_result(config, image, format, ocr_text, timeout_secs).await?;
    print_json(&result)
}

async fn scan_result(
    config: ExtractionConfig,
    image: &Path,
    format: Option<MimeHint>,
    ocr_text: Option<&Path>,
    timeout_secs: u64,
) -> Result<ExtractionResult> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("reading image {}", image.display()))?;
    let hint = format.or_else(|| MimeHint::from_path(image)).unwrap_or(MimeHint::Png);
    let pipeline = Arc::new(ReceiptPipeline::new(backend(ocr_text)?, config)?);

    info!(image = %image.display(), bytes = bytes.len(), "scanning receipt");
    // OCR blocks; keep it off the async workers.
    let task = tokio::task::spawn_blocking(move || pipeline.process_bytes(&bytes, hint));
    let result = tokio::time::timeout(Duration::from_secs(timeout_secs), task)
        .await
        .map_err(|_| anyhow!("receipt processing timed out after {timeout_secs}s"))?
        .context("receipt processing task failed")?;

    if !result.issues.is_empty() {
        warn!(issues = ?result.issues, "extraction incomplete");
    }
    Ok(result)
}

pub async fn parse(config: ExtractionConfig, file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await.context("reading stdin")?;
            buf
        }
    };
    let pipeline = ReceiptPipeline::new(UnavailableRecognizer, config)?;
    print_json(&pipeline.process_text(&text))
}

pub async fn preprocess(config: &ExtractionConfig, image: &Path, out: &Path) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("reading image {}", image.display()))?;
    let hint = MimeHint::from_path(image).unwrap_or(MimeHint::Png);
    let processed = preprocess_image(&RawImage::new(&bytes, hint), &config.preprocess);
    if processed.is_degraded() {
        bail!("{} is not a decodable PNG or JPEG image", image.display());
    }
    tokio::fs::write(out, processed.encoded()?)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    info!(out = %out.display(), "binarized image written");
    Ok(())
}

fn print_json(result: &ExtractionResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
