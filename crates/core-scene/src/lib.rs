//! Scene recognition: HSV histogram matching against labelled reference
//! frames, with per-scene sub-region boosting and rival-scene
//! disambiguation.
//!
//! Everything here is immutable after load and free of side effects apart
//! from logging; [`classify::scene_similarity`] is a pure function of the
//! frame and the store, so the caller owns the classification cadence.

pub mod classify;
pub mod hist;
pub mod regions;
pub mod store;

pub use classify::{SceneScore, scene_similarity};
pub use hist::Histogram;
pub use regions::{Region, Rival, Roi, SceneConfig};
pub use store::TemplateStore;

use image::RgbImage;
use image::imageops::{self, FilterType};

/// Canonical classifier input width in pixels.
pub const OUTPUT_W: u32 = 400;
/// Canonical classifier input height in pixels.
pub const OUTPUT_H: u32 = 800;

/// Resize a frame to the canonical classifier input size.
pub fn to_canonical(img: &RgbImage) -> RgbImage {
    if img.dimensions() == (OUTPUT_W, OUTPUT_H) {
        img.clone()
    } else {
        imageops::resize(img, OUTPUT_W, OUTPUT_H, FilterType::Triangle)
    }
}
