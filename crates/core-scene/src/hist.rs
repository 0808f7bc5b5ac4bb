//! 2-D HSV histograms and their comparison metric.
//!
//! Bins follow the OpenCV 8-bit HSV convention: hue in `[0, 180)`,
//! saturation in `[0, 256)`, 32 bins per channel. Histograms are
//! L1-normalized so bin values sum to 1.0 regardless of image size, which
//! keeps crops of different pixel areas comparable.

use image::RgbImage;

pub const H_BINS: usize = 32;
pub const S_BINS: usize = 32;
const H_RANGE: f32 = 180.0;
const S_RANGE: f32 = 256.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bins: Vec<f32>,
}

impl Histogram {
    /// Compute the normalized HSV histogram of an image.
    pub fn of(img: &RgbImage) -> Self {
        let mut bins = vec![0.0f32; H_BINS * S_BINS];
        for px in img.pixels() {
            let (hb, sb) = hs_bins(px.0);
            bins[hb * S_BINS + sb] += 1.0;
        }
        let total: f32 = bins.iter().sum();
        if total > 0.0 {
            for b in bins.iter_mut() {
                *b /= total;
            }
        }
        Self { bins }
    }

    /// Pearson correlation between two histograms (OpenCV `HISTCMP_CORREL`):
    /// 1.0 for identical shapes, 0.0 for uncorrelated, negative for
    /// anti-correlated.
    ///
    /// Degenerate inputs: two zero-variance histograms compare as 1.0, one
    /// zero-variance against a varying one as 0.0.
    pub fn correlation(&self, other: &Histogram) -> f64 {
        let n = self.bins.len() as f64;
        let mean_a: f64 = self.bins.iter().map(|&b| b as f64).sum::<f64>() / n;
        let mean_b: f64 = other.bins.iter().map(|&b| b as f64).sum::<f64>() / n;

        let mut cov = 0.0f64;
        let mut var_a = 0.0f64;
        let mut var_b = 0.0f64;
        for (&a, &b) in self.bins.iter().zip(other.bins.iter()) {
            let da = a as f64 - mean_a;
            let db = b as f64 - mean_b;
            cov += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        const EPS: f64 = 1e-12;
        if var_a < EPS && var_b < EPS {
            return 1.0;
        }
        if var_a < EPS || var_b < EPS {
            return 0.0;
        }
        cov / (var_a * var_b).sqrt()
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }
}

/// Map an RGB pixel to its (hue, saturation) bin pair.
fn hs_bins([r, g, b]: [u8; 3]) -> (usize, usize) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v == 0.0 { 0.0 } else { 255.0 * delta / v };

    let mut h_deg = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h_deg < 0.0 {
        h_deg += 360.0;
    }
    // 8-bit hue is degrees halved, giving the [0, 180) range.
    let h = h_deg / 2.0;

    let hb = ((h * H_BINS as f32 / H_RANGE) as usize).min(H_BINS - 1);
    let sb = ((s * S_BINS as f32 / S_RANGE) as usize).min(S_BINS - 1);
    (hb, sb)
}
