use image::{imageops, DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};
use iesal_core::PreprocessConfig;
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Declared encoding of an uploaded receipt image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeHint {
    Png,
    Jpeg,
}

impl MimeHint {
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }

    fn format(self) -> ImageFormat {
        match self {
            MimeHint::Png => ImageFormat::Png,
            MimeHint::Jpeg => ImageFormat::Jpeg,
        }
    }
}

impl std::str::FromStr for MimeHint {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" | "image/png" => Ok(MimeHint::Png),
            "jpeg" | "jpg" | "image/jpeg" | "image/jpg" => Ok(MimeHint::Jpeg),
            other => Err(format!("Unsupported image type: '{other}'")),
        }
    }
}

/// Receipt image bytes as received from the camera or an upload.
#[derive(Debug, Clone, Copy)]
pub struct RawImage<'a> {
    pub bytes: &'a [u8],
    pub hint: MimeHint,
}

impl<'a> RawImage<'a> {
    pub fn new(bytes: &'a [u8], hint: MimeHint) -> Self {
        Self { bytes, hint }
    }
}

/// What the OCR backend receives.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessedImage {
    /// Grayscale, same size as the input, every pixel 0 or 255.
    Binarized(GrayImage),
    /// The input could not be decoded; these are the caller's bytes untouched.
    Original(Vec<u8>),
}

impl PreprocessedImage {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PreprocessedImage::Original(_))
    }

    /// Bytes an engine can decode: PNG for a binarized image, the original
    /// encoding otherwise.
    pub fn encoded(&self) -> Result<Cow<'_, [u8]>, PreprocessError> {
        match self {
            PreprocessedImage::Binarized(img) => encode_as_png(img).map(Cow::Owned),
            PreprocessedImage::Original(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
        }
    }
}

/// Turn a receipt photo into a black-on-white image for OCR.
///
/// Never fails: when the bytes cannot be decoded the original is handed on
/// unmodified and OCR simply has less to work with.
pub fn preprocess(raw: &RawImage<'_>, config: &PreprocessConfig) -> PreprocessedImage {
    match decode(raw) {
        Ok(img) => PreprocessedImage::Binarized(binarize_for_ocr(&img, config)),
        Err(e) => {
            warn!(error = %e, bytes = raw.bytes.len(), "preprocessing degraded, using original image");
            PreprocessedImage::Original(raw.bytes.to_vec())
        }
    }
}

fn decode(raw: &RawImage<'_>) -> Result<DynamicImage, PreprocessError> {
    // Phones mislabel screenshots often enough that sniffing is worth a retry.
    let img = image::load_from_memory_with_format(raw.bytes, raw.hint.format())
        .or_else(|_| image::load_from_memory(raw.bytes))?;
    Ok(img)
}

/// Grayscale → auto-contrast (clipped) → sharpen → fixed threshold → auto-contrast.
pub fn binarize_for_ocr(img: &DynamicImage, config: &PreprocessConfig) -> GrayImage {
    let gray = img.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }

    let stretched = auto_contrast(&gray, config.cutoff_percent);
    let mut sharp = sharpen(&stretched);

    let threshold = config.threshold;
    for p in sharp.pixels_mut() {
        p[0] = if p[0] > threshold { 255 } else { 0 };
    }

    auto_contrast(&sharp, 0.0)
}

/// Clip `cutoff_percent` of the pixels from each end of the histogram, then
/// stretch what is left to 0..=255. Uniform images are returned unchanged.
fn auto_contrast(img: &GrayImage, cutoff_percent: f32) -> GrayImage {
    let mut histogram = [0u64; 256];
    for p in img.pixels() {
        histogram[p[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let cut = (total as f64 * f64::from(cutoff_percent) / 100.0) as u64;
    clip(&mut histogram, cut, 0..256);
    clip(&mut histogram, cut, (0..256).rev());

    let lo = histogram.iter().position(|&c| c > 0);
    let hi = histogram.iter().rposition(|&c| c > 0);
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => (lo, hi),
        _ => return img.clone(),
    };

    let range = hi - lo;
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = (i.saturating_sub(lo) * 255 / range).min(255) as u8;
    }

    ImageBuffer::from_fn(img.width(), img.height(), |x, y| Luma([lut[img.get_pixel(x, y)[0] as usize]]))
}

fn clip(histogram: &mut [u64; 256], mut cut: u64, order: impl Iterator<Item = usize>) {
    for i in order {
        if cut == 0 {
            break;
        }
        let take = cut.min(histogram[i]);
        histogram[i] -= take;
        cut -= take;
    }
}

// Normalized by its sum (16) inside `filter3x3`.
const SHARPEN_KERNEL: [f32; 9] = [-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0];

/// 3×3 sharpen. `filter3x3` leaves the one-pixel border black; it is copied
/// through from the input instead.
fn sharpen(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return img.clone();
    }

    let mut out: GrayImage = imageops::filter3x3(img, &SHARPEN_KERNEL);
    for (x, y, p) in img.enumerate_pixels() {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            out.put_pixel(x, y, *p);
        }
    }
    out
}

fn encode_as_png(img: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
