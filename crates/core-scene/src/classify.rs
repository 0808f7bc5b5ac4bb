//! Frame-against-store scoring.
//!
//! Full-frame histogram correlation plus a sub-region boost for scenes with
//! declared regions. When rival scenes both score high, a differential
//! region weight disambiguates them. Scoring is a pure function of the
//! frame, the store, and the config.

use crate::hist::Histogram;
use crate::regions::SceneConfig;
use crate::store::TemplateStore;
use image::RgbImage;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One ranked entry, with the intermediate values kept for diagnostics.
#[derive(Debug, Clone)]
pub struct SceneScore {
    pub name: String,
    pub score: f64,
    /// Best full-frame correlation across the scene's reference frames.
    pub base: f64,
    /// Best per-region correlation, parallel to the scene's declared
    /// regions; empty for scenes without regions.
    pub region_scores: Vec<f64>,
}

/// Compare a canonical frame against every scene in the store and return
/// `(scene, score)` entries sorted by score descending (name ascending on
/// exact ties, so the ranking is deterministic).
pub fn scene_similarity(
    frame: &RgbImage,
    store: &TemplateStore,
    cfg: &SceneConfig,
) -> Vec<SceneScore> {
    let frame_hist = Histogram::of(frame);
    let mut scored: BTreeMap<String, SceneScore> = BTreeMap::new();

    for name in store.scenes() {
        let full = store.full(name).unwrap_or(&[]);
        let base = best_correlation(&frame_hist, full);

        let mut region_scores = Vec::new();
        let score = if let Some(region_templates) = store.regions(name) {
            let declared = cfg.regions(name);
            for (region, templates) in declared.iter().zip(region_templates) {
                let crop_hist = Histogram::of(&region.crop(frame));
                region_scores.push(best_correlation(&crop_hist, templates));
            }
            // The trailing home-bar region is common to most scenes and
            // carries no discriminating signal, so it is excluded from the
            // content average when other regions exist.
            let content = if region_scores.len() > 1 {
                &region_scores[..region_scores.len() - 1]
            } else {
                &region_scores[..]
            };
            let avg = content.iter().sum::<f64>() / content.len() as f64;
            let diff = avg - base;
            if diff >= 0.0 {
                0.15 * base + 0.85 * avg
            } else {
                base - 0.70 * (1.0 + diff.abs()).ln()
            }
        } else {
            base
        };

        scored.insert(
            name.to_string(),
            SceneScore {
                name: name.to_string(),
                score,
                base,
                region_scores,
            },
        );
    }

    // Rival disambiguation: boost the scene whose key region dominates its
    // sibling regions, penalise it otherwise.
    for (name, rival) in cfg.rivals() {
        if !scored.contains_key(&rival.rival) {
            continue;
        }
        let Some(entry) = scored.get(name) else {
            continue;
        };
        if entry.region_scores.len() <= rival.key_region
            || rival
                .other_regions
                .iter()
                .any(|&i| i >= entry.region_scores.len())
        {
            continue;
        }
        let key = entry.region_scores[rival.key_region];
        let other = rival
            .other_regions
            .iter()
            .map(|&i| entry.region_scores[i])
            .sum::<f64>()
            / rival.other_regions.len() as f64;
        let delta = rival.weight * (key - other);
        if let Some(entry) = scored.get_mut(name) {
            entry.score += delta;
        }
    }

    let mut results: Vec<SceneScore> = scored.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    results
}

/// Best score wins across a scene's reference frames; -1 when none exist.
fn best_correlation(hist: &Histogram, templates: &[Histogram]) -> f64 {
    templates
        .iter()
        .map(|t| hist.correlation(t))
        .fold(-1.0, f64::max)
}
