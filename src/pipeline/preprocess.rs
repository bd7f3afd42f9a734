//! Page image normalisation before transcription.
//!
//! Vision models read small or washed-out scans noticeably worse than crisp
//! ones. Every rasterised page goes through four cheap, deterministic steps:
//!
//! 1. Upscale so that both edges are at least [`MIN_EDGE`] px (Lanczos3)
//! 2. Flatten alpha onto white and drop to 3-channel RGB
//! 3. Contrast ×1.2 around the mean luminance
//! 4. Sharpness ×1.1 against a 3×3 smoothed copy
//!
//! Steps 3 and 4 use the same blend formula as the classic imaging-library
//! "enhance" filters: `out = degenerate + factor · (img − degenerate)`.
//!
//! Preprocessing is best-effort. [`prepare_for_ocr`] logs and returns the
//! untouched input if any step fails; a page is never lost to it.

use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use thiserror::Error;
use tracing::{debug, warn};

/// Minimum width and height after upscaling.
pub const MIN_EDGE: u32 = 1000;

/// Upper bound for either edge after upscaling. A 1×2000 px sliver would
/// otherwise be scaled to 1000×2_000_000.
pub const MAX_EDGE: u32 = 20_000;

const CONTRAST_FACTOR: f32 = 1.2;
const SHARPNESS_FACTOR: f32 = 1.1;

#[derive(Debug, Error)]
enum PreprocessError {
    #[error("image has zero size ({0}x{1})")]
    Empty(u32, u32),
    #[error("upscaled size {0}x{1} exceeds {MAX_EDGE} px")]
    TooLarge(u64, u64),
}

/// Normalise a page image for transcription, falling back to the original
/// on any failure.
pub fn prepare_for_ocr(image: DynamicImage) -> DynamicImage {
    match try_prepare(&image) {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!("Image preprocessing skipped: {}", e);
            image
        }
    }
}

fn try_prepare(image: &DynamicImage) -> Result<DynamicImage, PreprocessError> {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return Err(PreprocessError::Empty(w, h));
    }

    let scaled = match upscale_target(w, h)? {
        Some((nw, nh)) => {
            debug!("Upscaling {}x{} → {}x{}", w, h, nw, nh);
            image.resize_exact(nw, nh, FilterType::Lanczos3)
        }
        None => image.clone(),
    };

    let rgb = flatten_to_rgb(&scaled);
    let rgb = enhance_contrast(&rgb, CONTRAST_FACTOR);
    let rgb = enhance_sharpness(&rgb, SHARPNESS_FACTOR);
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// Target size for an image below [`MIN_EDGE`] on either side, or `None`.
///
/// The factor is `max(MIN_EDGE/w, MIN_EDGE/h)` so the aspect ratio is kept;
/// dimensions are rounded up so neither lands at 999.
fn upscale_target(w: u32, h: u32) -> Result<Option<(u32, u32)>, PreprocessError> {
    if w >= MIN_EDGE && h >= MIN_EDGE {
        return Ok(None);
    }
    let scale = f64::max(MIN_EDGE as f64 / w as f64, MIN_EDGE as f64 / h as f64);
    let nw = (w as f64 * scale).ceil() as u64;
    let nh = (h as f64 * scale).ceil() as u64;
    if nw > MAX_EDGE as u64 || nh > MAX_EDGE as u64 {
        return Err(PreprocessError::TooLarge(nw, nh));
    }
    Ok(Some((nw.max(MIN_EDGE as u64) as u32, nh.max(MIN_EDGE as u64) as u32)))
}

fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let a = px[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * a + 255.0 * (1.0 - a)).round() as u8;
        out.put_pixel(x, y, Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    out
}

fn luminance(px: &Rgb<u8>) -> u32 {
    (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000
}

fn blend_channel(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}

fn enhance_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let count = (image.width() as u64 * image.height() as u64).max(1);
    let sum: u64 = image.pixels().map(|p| luminance(p) as u64).sum();
    let mean = ((sum as f64 / count as f64) + 0.5).floor() as f32;

    let mut out = image.clone();
    for px in out.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = blend_channel(mean, *c as f32, factor);
        }
    }
    out
}

/// Smooth kernel `[[1,1,1],[1,5,1],[1,1,1]] / 13`; border pixels are kept.
fn smooth(image: &RgbImage) -> RgbImage {
    const KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for (ky, row) in KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let p = image.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for c in 0..3 {
                        acc[c] += p[c] as u32 * weight;
                    }
                }
            }
            out.put_pixel(
                x,
                y,
                Rgb([
                    ((acc[0] + 6) / 13) as u8,
                    ((acc[1] + 6) / 13) as u8,
                    ((acc[2] + 6) / 13) as u8,
                ]),
            );
        }
    }
    out
}

fn enhance_sharpness(image: &RgbImage, factor: f32) -> RgbImage {
    let degenerate = smooth(image);
    let mut out = image.clone();
    for (px, deg) in out.pixels_mut().zip(degenerate.pixels()) {
        for c in 0..3 {
            px[c] = blend_channel(deg[c] as f32, px[c] as f32, factor);
        }
    }
    out
}
