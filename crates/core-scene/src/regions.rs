//! Scene sub-region tables, rival disambiguation config, and ROI geometry.
//!
//! Rectangles are normalized `(x, y, w, h)` in `[0, 1]` relative to whatever
//! image they are applied to; the classifier applies them to the canonical
//! 400x800 frame. Per scene, the *last* region of a multi-region list is the
//! home-bar strip and is excluded from the content-region average.

use anyhow::{Result, ensure};
use image::RgbImage;
use image::imageops;
use std::collections::BTreeMap;

/// A normalized rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Region {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Crop this region out of an image. Pixel edges are truncated the same
    /// way on both axes so repeated crops of equally-sized images align.
    pub fn crop(&self, img: &RgbImage) -> RgbImage {
        let (w, h) = img.dimensions();
        let x1 = (w as f64 * self.x) as u32;
        let y1 = (h as f64 * self.y) as u32;
        let x2 = ((w as f64 * (self.x + self.w)) as u32).min(w);
        let y2 = ((h as f64 * (self.y + self.h)) as u32).min(h);
        let cw = x2.saturating_sub(x1).max(1);
        let ch = y2.saturating_sub(y1).max(1);
        imageops::crop_imm(img, x1, y1, cw, ch).to_image()
    }
}

/// Differential rule disambiguating two visually similar scenes: when this
/// scene's key region outscores the average of the other listed regions the
/// scene is boosted, otherwise penalised.
#[derive(Debug, Clone)]
pub struct Rival {
    pub rival: String,
    pub key_region: usize,
    pub other_regions: Vec<usize>,
    pub weight: f64,
}

/// Immutable per-scene configuration: sub-region hints plus rival rules.
#[derive(Debug, Clone, Default)]
pub struct SceneConfig {
    regions: BTreeMap<String, Vec<Region>>,
    rivals: BTreeMap<String, Rival>,
}

impl SceneConfig {
    /// The built-in table for the supported quest flow.
    pub fn builtin() -> Self {
        let mut regions = BTreeMap::new();
        let home_bar = Region::new(0.01, 0.91, 0.98, 0.07);

        regions.insert(
            "home".to_string(),
            vec![
                Region::new(0.01, 0.75, 0.32, 0.07),
                Region::new(0.37, 0.73, 0.26, 0.10),
                Region::new(0.66, 0.75, 0.32, 0.07),
                home_bar,
            ],
        );
        regions.insert(
            "event".to_string(),
            vec![
                Region::new(0.19, 0.59, 0.15, 0.08),
                Region::new(0.39, 0.58, 0.24, 0.12),
                Region::new(0.68, 0.59, 0.15, 0.08),
                home_bar,
            ],
        );
        regions.insert(
            "quest".to_string(),
            vec![
                Region::new(0.16, 0.57, 0.23, 0.12),
                Region::new(0.44, 0.60, 0.15, 0.08),
                Region::new(0.68, 0.59, 0.15, 0.08),
                home_bar,
            ],
        );
        regions.insert(
            "normal-quest-uijin-karyu".to_string(),
            vec![
                Region::new(0.1, 0.47, 0.35, 0.20),
                Region::new(0.52, 0.47, 0.35, 0.20),
                home_bar,
            ],
        );
        regions.insert(
            "normal-quest".to_string(),
            vec![
                Region::new(0.02, 0.12, 0.59, 0.045),
                Region::new(0.04, 0.22, 0.73, 0.07),
                Region::new(0.04, 0.352, 0.73, 0.07),
                Region::new(0.04, 0.482, 0.73, 0.07),
                Region::new(0.04, 0.612, 0.73, 0.07),
                Region::new(0.04, 0.742, 0.73, 0.07),
                home_bar,
            ],
        );
        regions.insert(
            "normal-quest-uijin".to_string(),
            vec![
                Region::new(0.02, 0.12, 0.59, 0.045),
                Region::new(0.04, 0.204, 0.73, 0.07),
                Region::new(0.08, 0.312, 0.71, 0.07),
                Region::new(0.08, 0.408, 0.71, 0.07),
                Region::new(0.08, 0.504, 0.71, 0.07),
                home_bar,
            ],
        );
        regions.insert(
            "helper-select".to_string(),
            vec![
                Region::new(0.02, 0.12, 0.46, 0.045),
                Region::new(0.14, 0.17, 0.78, 0.065),
                home_bar,
            ],
        );
        regions.insert(
            "deck-select".to_string(),
            vec![
                Region::new(0.02, 0.12, 0.46, 0.045),
                Region::new(0.06, 0.36, 0.82, 0.198),
                home_bar,
            ],
        );
        regions.insert(
            "special-reward".to_string(),
            vec![Region::new(0.18, 0.00, 0.70, 0.044)],
        );
        regions.insert("reward-next".to_string(), vec![home_bar]);

        let mut rivals = BTreeMap::new();
        rivals.insert(
            "quest".to_string(),
            Rival {
                rival: "event".to_string(),
                key_region: 0,
                other_regions: vec![1, 2],
                weight: 0.5,
            },
        );
        rivals.insert(
            "event".to_string(),
            Rival {
                rival: "quest".to_string(),
                key_region: 1,
                other_regions: vec![0, 2],
                weight: 0.5,
            },
        );

        let cfg = Self { regions, rivals };
        debug_assert!(cfg.validate().is_ok());
        cfg
    }

    /// Check that every rival rule indexes declared regions of its scene.
    pub fn validate(&self) -> Result<()> {
        for (name, rival) in &self.rivals {
            let regions = self.regions(name);
            ensure!(
                rival.key_region < regions.len(),
                "rival config for {name}: key region {} out of range",
                rival.key_region
            );
            for &idx in &rival.other_regions {
                ensure!(
                    idx < regions.len(),
                    "rival config for {name}: other region {idx} out of range"
                );
            }
        }
        Ok(())
    }

    pub fn regions(&self, scene: &str) -> &[Region] {
        self.regions.get(scene).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rivals(&self) -> impl Iterator<Item = (&str, &Rival)> {
        self.rivals.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Normalized sub-rectangle of the raw camera frame containing the phone
/// screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Roi {
    /// Calibrated for the fixed camera rig in front of the phone.
    pub const DEFAULT: Roi = Roi {
        x: 0.442,
        y: 0.432,
        w: 0.126,
        h: 0.332,
    };

    /// Convert to pixel corners `(x1, y1, x2, y2)` within a frame.
    pub fn rect_in(&self, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
        let x1 = (frame_w as f64 * self.x) as u32;
        let y1 = (frame_h as f64 * self.y) as u32;
        let x2 = ((frame_w as f64 * (self.x + self.w)) as u32).min(frame_w);
        let y2 = ((frame_h as f64 * (self.y + self.h)) as u32).min(frame_h);
        (x1, y1, x2, y2)
    }

    /// Crop the ROI out of a raw frame.
    pub fn crop(&self, frame: &RgbImage) -> RgbImage {
        let (x1, y1, x2, y2) = self.rect_in(frame.width(), frame.height());
        let cw = x2.saturating_sub(x1).max(1);
        let ch = y2.saturating_sub(y1).max(1);
        imageops::crop_imm(frame, x1, y1, cw, ch).to_image()
    }
}
