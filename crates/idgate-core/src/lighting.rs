//! Lighting statistics over one still frame.

use crate::thresholds::Thresholds;
use serde::{Deserialize, Serialize};

/// Brightness and contrast of one sampled frame.
///
/// Recomputed on a fixed interval by the capture loop; each new sample fully
/// replaces the previous one — there is no smoothing across samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingSample {
    /// Mean of the per-pixel average of the three color channels, 0–255.
    pub brightness: f32,
    /// Max minus min of that per-pixel average across the frame.
    pub contrast: f32,
}

impl LightingSample {
    /// Compute lighting statistics over a packed RGB8 buffer.
    ///
    /// Trailing bytes that do not form a whole pixel are ignored. An empty
    /// buffer yields zero brightness and zero contrast, which never
    /// satisfies the good-lighting predicate.
    pub fn from_rgb(data: &[u8]) -> Self {
        let mut sum = 0.0f64;
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut pixels = 0usize;

        for px in data.chunks_exact(3) {
            let avg = (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0;
            sum += avg as f64;
            min = min.min(avg);
            max = max.max(avg);
            pixels += 1;
        }

        if pixels == 0 {
            return Self {
                brightness: 0.0,
                contrast: 0.0,
            };
        }

        Self {
            brightness: (sum / pixels as f64) as f32,
            contrast: max - min,
        }
    }

    /// Good lighting: brightness inside the configured band and contrast at
    /// or above the minimum.
    pub fn is_good(&self, thresholds: &Thresholds) -> bool {
        self.brightness >= thresholds.min_brightness
            && self.brightness <= thresholds.max_brightness
            && self.contrast >= thresholds.min_contrast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_gray_has_no_contrast() {
        let data = vec![128u8; 300];
        let s = LightingSample::from_rgb(&data);
        assert!((s.brightness - 128.0).abs() < 1e-3);
        assert_eq!(s.contrast, 0.0);
    }

    #[test]
    fn test_half_dark_half_bright() {
        let mut data = vec![50u8; 150];
        data.extend(vec![200u8; 150]);
        let s = LightingSample::from_rgb(&data);
        assert!((s.brightness - 125.0).abs() < 1e-3);
        assert!((s.contrast - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_channel_average_per_pixel() {
        // One pixel: R=30, G=60, B=90 → avg 60
        let s = LightingSample::from_rgb(&[30, 60, 90]);
        assert!((s.brightness - 60.0).abs() < 1e-3);
        assert_eq!(s.contrast, 0.0);
    }

    #[test]
    fn test_empty_buffer() {
        let s = LightingSample::from_rgb(&[]);
        assert_eq!(s.brightness, 0.0);
        assert_eq!(s.contrast, 0.0);
        assert!(!s.is_good(&Thresholds::default()));
    }

    #[test]
    fn test_good_lighting_predicate() {
        let t = Thresholds::default();
        let good = LightingSample {
            brightness: 120.0,
            contrast: 80.0,
        };
        assert!(good.is_good(&t));

        let too_dark = LightingSample {
            brightness: 30.0,
            contrast: 80.0,
        };
        assert!(!too_dark.is_good(&t));

        let too_bright = LightingSample {
            brightness: 240.0,
            contrast: 80.0,
        };
        assert!(!too_bright.is_good(&t));

        let flat = LightingSample {
            brightness: 120.0,
            contrast: 10.0,
        };
        assert!(!flat.is_good(&t));
    }

    #[test]
    fn test_band_boundaries_inclusive() {
        let t = Thresholds::default();
        let at_min = LightingSample {
            brightness: t.min_brightness,
            contrast: t.min_contrast,
        };
        assert!(at_min.is_good(&t));
        let at_max = LightingSample {
            brightness: t.max_brightness,
            contrast: t.min_contrast,
        };
        assert!(at_max.is_good(&t));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        // 1 full pixel plus 2 stray bytes
        let s = LightingSample::from_rgb(&[90, 90, 90, 255, 255]);
        assert!((s.brightness - 90.0).abs() < 1e-3);
    }
}
