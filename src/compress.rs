//! Size-targeted JPEG compression.
//!
//! The image is resized to a fixed resolution and re-encoded at decreasing quality until the
//! encoding fits the byte budget. When even the lowest quality is too large, that encoding is
//! written anyway and the outcome says the target was missed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, ImageResult, RgbImage};
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::CompressionOutcome;

/// Settings for a compression run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    /// Image to read; any format the decoder recognises.
    pub input: PathBuf,
    /// JPEG file to write.
    pub output: PathBuf,
    /// Size budget in KiB.
    pub target_kb: u64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// First quality tried.
    pub max_quality: u8,
    /// Lowest quality tried, also used for the fallback encoding.
    pub min_quality: u8,
    /// Quality decrement between attempts.
    pub quality_step: u8,
    /// Write a noisy sample image to `input` when it does not exist.
    pub sample_if_missing: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from("3.jpg"),
            output: PathBuf::from("img4.jpg"),
            target_kb: 100,
            width: 1280,
            height: 720,
            max_quality: 95,
            min_quality: 10,
            quality_step: 5,
            sample_if_missing: false,
        }
    }
}

impl CompressOptions {
    /// Size budget in bytes.
    pub fn target_bytes(&self) -> u64 {
        self.target_kb.saturating_mul(1024)
    }

    /// `(max_quality, min_quality)` clamped to the JPEG quality range `1..=100`.
    pub fn quality_bounds(&self) -> (u8, u8) {
        (
            self.max_quality.clamp(1, 100),
            self.min_quality.clamp(1, 100),
        )
    }
}

/// Qualities tried in order: from `max` down to `min` in steps of `step`.
pub fn quality_ladder(max: u8, min: u8, step: u8) -> Vec<u8> {
    (min..=max).rev().step_by(usize::from(step.max(1))).collect()
}

/// Convert to RGB, dropping any alpha channel or palette, and resize with a Lanczos filter.
pub fn resize_to(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let rgb = image.to_rgb8();
    imageops::resize(&rgb, width, height, FilterType::Lanczos3)
}

/// Encode `image` as a baseline JPEG at `quality`.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(image)?;
    }
    Ok(buffer)
}

/// Write a `width` x `height` image of pseudo-random noise, which compresses poorly.
pub fn write_sample_image(path: &Path, width: u32, height: u32) -> Result<()> {
    let mut state: u32 = 0x2545_f491;
    let image = RgbImage::from_fn(width, height, |_, _| {
        let mut channel = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        image::Rgb([channel(), channel(), channel()])
    });

    let bytes = encode_jpeg(&image, 100)
        .with_context(|| format!("failed to encode sample image {}", path.display()))?;
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

/// Resize `options.input` and write the first JPEG encoding that fits the size budget.
pub fn compress_to_size(options: &CompressOptions) -> Result<CompressionOutcome> {
    let input = &options.input;
    if options.sample_if_missing && !input.exists() {
        info!(path = %input.display(), "input not found, writing a sample image");
        write_sample_image(input, 1920, 1080)?;
    }

    let image = ImageReader::open(input)
        .with_context(|| format!("failed to open {}", input.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read {}", input.display()))?
        .decode()
        .with_context(|| format!("failed to decode {}", input.display()))?;
    info!(
        path = %input.display(),
        width = image.width(),
        height = image.height(),
        "opened image"
    );

    let resized = resize_to(&image, options.width, options.height);
    info!(width = options.width, height = options.height, "resized image");

    let target = options.target_bytes();
    let (max_quality, min_quality) = options.quality_bounds();
    for quality in quality_ladder(max_quality, min_quality, options.quality_step) {
        let encoded = encode_jpeg(&resized, quality)
            .with_context(|| format!("failed to encode at quality {quality}"))?;
        let size = encoded.len() as u64;
        info!(quality, size_kb = %format!("{:.2}", size as f64 / 1024.0), "trying quality");

        if size <= target {
            write_output(&options.output, &encoded)?;
            info!(path = %options.output.display(), quality, "target size reached");
            return Ok(outcome(options, quality, size, true));
        }
    }

    warn!(
        min_quality,
        target_kb = options.target_kb,
        "lowest quality still exceeds the target, saving it anyway"
    );
    let encoded = encode_jpeg(&resized, min_quality)
        .with_context(|| format!("failed to encode at quality {min_quality}"))?;
    write_output(&options.output, &encoded)?;

    Ok(outcome(options, min_quality, encoded.len() as u64, false))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn outcome(
    options: &CompressOptions,
    quality: u8,
    size_bytes: u64,
    met_target: bool,
) -> CompressionOutcome {
    CompressionOutcome {
        output: options.output.clone(),
        quality,
        size_bytes,
        met_target,
        width: options.width,
        height: options.height,
    }
}
