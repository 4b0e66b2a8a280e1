//! Capture normalization: crop/scale a raw frame to the fixed submission
//! geometry, then re-encode under the configured byte ceiling.
//!
//! The crop strategy is an explicit caller input — the normalizer knows
//! nothing about user agents or device classes. Output is always raw JPEG
//! bytes at the target resolution; no data-URI prefix is attached.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the source frame is fitted into the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropStrategy {
    /// Uniform scale-to-fit, centered, black letterbox bars where the
    /// aspect ratios differ. Used for desktop captures.
    Letterbox,
    /// Aggressive background-discarding crop (distinct windows for portrait
    /// and landscape sources) followed by a fixed contrast boost, so the
    /// face fills more of the final frame. Used for mobile captures.
    FaceWeighted,
}

/// Normalization policy. Defaults are the authoritative production values:
/// 640×480 JPEG under 512 KiB, quality stepping 90 down to 40.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    pub target_width: u32,
    pub target_height: u32,
    /// Hard ceiling for the encoded output, in bytes.
    pub max_bytes: usize,
    /// JPEG quality search range, descending.
    pub quality_max: u8,
    pub quality_min: u8,
    pub quality_step: u8,
    /// Contrast boost applied by the face-weighted strategy.
    pub contrast_boost: f32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_width: 640,
            target_height: 480,
            max_bytes: 512 * 1024,
            quality_max: 90,
            quality_min: 40,
            quality_step: 10,
            contrast_boost: 12.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(
        "encoded image is {smallest} bytes at minimum quality {quality}; ceiling is {ceiling} bytes"
    )]
    SizeCeilingExceeded {
        smallest: usize,
        quality: u8,
        ceiling: usize,
    },
    #[error("image encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("source image has zero dimensions")]
    EmptySource,
}

/// Normalize a captured frame to the target geometry and encode it as JPEG
/// under the byte ceiling.
///
/// Quality descends from `quality_max` to `quality_min`; the first encoding
/// at or under `max_bytes` wins. If even the minimum quality exceeds the
/// ceiling the call fails — an oversized buffer is never returned.
pub fn normalize(
    source: &DynamicImage,
    strategy: CropStrategy,
    config: &NormalizeConfig,
) -> Result<Vec<u8>, NormalizeError> {
    if source.width() == 0 || source.height() == 0 {
        return Err(NormalizeError::EmptySource);
    }

    let framed = match strategy {
        CropStrategy::Letterbox => letterbox(source, config),
        CropStrategy::FaceWeighted => face_weighted(source, config),
    };

    encode_under_ceiling(&framed, config)
}

/// Scale-to-fit into the target box, centered on a black canvas.
fn letterbox(source: &DynamicImage, config: &NormalizeConfig) -> RgbImage {
    let (w, h) = (source.width() as f32, source.height() as f32);
    let (tw, th) = (config.target_width, config.target_height);

    let scale = (tw as f32 / w).min(th as f32 / h);
    let sw = ((w * scale).round() as u32).clamp(1, tw);
    let sh = ((h * scale).round() as u32).clamp(1, th);

    let scaled = source.resize_exact(sw, sh, FilterType::Triangle).to_rgb8();
    let mut canvas = RgbImage::from_pixel(tw, th, Rgb([0, 0, 0]));
    let x = (tw - sw) / 2;
    let y = (th - sh) / 2;
    imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
    canvas
}

/// Crop away background before scaling, with different windows for portrait
/// and landscape sources, then boost contrast.
fn face_weighted(source: &DynamicImage, config: &NormalizeConfig) -> RgbImage {
    let rgb = source.to_rgb8();
    let (w, h) = (rgb.width(), rgb.height());
    let (tw, th) = (config.target_width, config.target_height);
    let target_aspect = tw as f32 / th as f32;

    let (cx, cy, cw, ch) = if h > w {
        // Portrait: keep full width, take the 4:3 band biased toward the
        // upper part of the frame where the face sits.
        let cw = w;
        let ch = ((w as f32 / target_aspect) as u32).clamp(1, h);
        let cy = ((h - ch) as f32 * 0.33) as u32;
        (0, cy, cw, ch)
    } else {
        // Landscape: shrink the maximal 4:3 window to 70% so the side
        // background is discarded disproportionately.
        let full_cw = ((h as f32 * target_aspect) as u32).clamp(1, w);
        let cw = ((full_cw as f32 * 0.70) as u32).max(1);
        let ch = ((cw as f32 / target_aspect) as u32).clamp(1, h);
        let cx = (w - cw) / 2;
        let cy = (h - ch) / 2;
        (cx, cy, cw, ch)
    };

    let cropped = imageops::crop_imm(&rgb, cx, cy, cw, ch).to_image();
    let scaled = imageops::resize(&cropped, tw, th, FilterType::Triangle);
    imageops::contrast(&scaled, config.contrast_boost)
}

/// Encode with descending quality until the result fits the ceiling.
fn encode_under_ceiling(
    image: &RgbImage,
    config: &NormalizeConfig,
) -> Result<Vec<u8>, NormalizeError> {
    let mut quality = config.quality_max.max(config.quality_min);
    let mut smallest = usize::MAX;

    loop {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode_image(image)?;

        if buf.len() <= config.max_bytes {
            tracing::debug!(bytes = buf.len(), quality, "capture encoded under ceiling");
            return Ok(buf);
        }
        smallest = smallest.min(buf.len());

        if quality <= config.quality_min {
            return Err(NormalizeError::SizeCeilingExceeded {
                smallest,
                quality,
                ceiling: config.max_bytes,
            });
        }
        quality = quality
            .saturating_sub(config.quality_step)
            .max(config.quality_min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gradient test image so JPEG sizes are non-trivial.
    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x % 256) as u8,
                (y % 256) as u8,
                ((x + y) % 256) as u8,
            ])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).expect("output must decode as an image")
    }

    #[test]
    fn test_letterbox_output_geometry() {
        let config = NormalizeConfig::default();
        let out = normalize(&gradient(800, 600), CropStrategy::Letterbox, &config).unwrap();
        let decoded = decode(&out);
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480);
    }

    #[test]
    fn test_letterbox_mismatched_aspect_pads() {
        // A very wide source must still come out 640×480, with bars
        let config = NormalizeConfig::default();
        let out = normalize(&gradient(1600, 200), CropStrategy::Letterbox, &config).unwrap();
        let decoded = decode(&out).to_rgb8();
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480);
        // Top row lies inside the letterbox bar → near-black
        let px = decoded.get_pixel(320, 2);
        assert!(px[0] < 24 && px[1] < 24 && px[2] < 24);
    }

    #[test]
    fn test_face_weighted_portrait_geometry() {
        let config = NormalizeConfig::default();
        let out = normalize(&gradient(480, 800), CropStrategy::FaceWeighted, &config).unwrap();
        let decoded = decode(&out);
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480);
    }

    #[test]
    fn test_face_weighted_landscape_geometry() {
        let config = NormalizeConfig::default();
        let out = normalize(&gradient(1280, 720), CropStrategy::FaceWeighted, &config).unwrap();
        let decoded = decode(&out);
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480);
    }

    #[test]
    fn test_output_respects_byte_ceiling() {
        let config = NormalizeConfig::default();
        for strategy in [CropStrategy::Letterbox, CropStrategy::FaceWeighted] {
            let out = normalize(&gradient(1920, 1080), strategy, &config).unwrap();
            assert!(out.len() <= config.max_bytes);
        }
    }

    #[test]
    fn test_impossible_ceiling_fails_descriptively() {
        let config = NormalizeConfig {
            max_bytes: 64, // smaller than any JPEG header
            ..NormalizeConfig::default()
        };
        let err = normalize(&gradient(800, 600), CropStrategy::Letterbox, &config).unwrap_err();
        match err {
            NormalizeError::SizeCeilingExceeded {
                smallest,
                quality,
                ceiling,
            } => {
                assert!(smallest > 64);
                assert_eq!(quality, config.quality_min);
                assert_eq!(ceiling, 64);
            }
            other => panic!("expected SizeCeilingExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_output_is_bare_jpeg() {
        let config = NormalizeConfig::default();
        let out = normalize(&gradient(640, 480), CropStrategy::Letterbox, &config).unwrap();
        // JPEG SOI marker, not a data URI
        assert_eq!(&out[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_tiny_source_upscales() {
        let config = NormalizeConfig::default();
        let out = normalize(&gradient(64, 48), CropStrategy::Letterbox, &config).unwrap();
        let decoded = decode(&out);
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480);
    }

    #[test]
    fn test_square_source_both_strategies() {
        let config = NormalizeConfig::default();
        for strategy in [CropStrategy::Letterbox, CropStrategy::FaceWeighted] {
            let out = normalize(&gradient(500, 500), strategy, &config).unwrap();
            let decoded = decode(&out);
            assert_eq!((decoded.width(), decoded.height()), (640, 480));
        }
    }
}
