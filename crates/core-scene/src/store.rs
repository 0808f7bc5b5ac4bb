//! Template store: labelled reference frames loaded from disk.
//!
//! Files are named `<scene>_<digits>.jpg` (or `.png`); the trailing index is
//! stripped to recover the scene name. Unreadable or unrecognisably named
//! files are skipped with a log line rather than failing the load; a missing
//! scene just never ranks.

use crate::hist::Histogram;
use crate::regions::SceneConfig;
use anyhow::{Context, Result};
use image::RgbImage;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Precomputed histograms per scene, immutable after load.
///
/// For every scene present in `regions`, the outer list is parallel to the
/// scene's declared region list and each inner list is parallel to
/// `full[scene]` (one histogram per reference frame).
#[derive(Debug, Default)]
pub struct TemplateStore {
    full: BTreeMap<String, Vec<Histogram>>,
    regions: BTreeMap<String, Vec<Vec<Histogram>>>,
}

impl TemplateStore {
    /// Load every template image in `dir` and precompute full-frame and
    /// per-region histograms.
    pub fn load(dir: &Path, cfg: &SceneConfig) -> Result<Self> {
        let mut raw: BTreeMap<String, Vec<RgbImage>> = BTreeMap::new();

        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("reading template dir {}", dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for path in entries {
            let Some(scene) = scene_name_of(&path) else {
                continue;
            };
            match image::open(&path) {
                Ok(img) => {
                    raw.entry(scene).or_default().push(img.to_rgb8());
                }
                Err(err) => {
                    warn!(target: "scene", file = %path.display(), %err, "template_unreadable");
                }
            }
        }

        let mut store = TemplateStore::default();
        for (name, imgs) in raw {
            let declared = cfg.regions(&name);
            if !declared.is_empty() {
                let mut per_region = Vec::with_capacity(declared.len());
                for region in declared {
                    per_region.push(
                        imgs.iter()
                            .map(|img| Histogram::of(&region.crop(img)))
                            .collect::<Vec<_>>(),
                    );
                }
                store.regions.insert(name.clone(), per_region);
            }
            info!(
                target: "scene",
                scene = name.as_str(),
                templates = imgs.len(),
                regions = declared.len(),
                "templates_loaded"
            );
            store
                .full
                .insert(name, imgs.iter().map(Histogram::of).collect());
        }
        Ok(store)
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    pub fn scenes(&self) -> impl Iterator<Item = &str> {
        self.full.keys().map(String::as_str)
    }

    pub fn full(&self, scene: &str) -> Option<&[Histogram]> {
        self.full.get(scene).map(Vec::as_slice)
    }

    pub fn regions(&self, scene: &str) -> Option<&[Vec<Histogram>]> {
        self.regions.get(scene).map(Vec::as_slice)
    }
}

/// Recover the scene name from a template path. `home_3.jpg` -> `home`;
/// anything without a trailing `_<digits>` or a supported extension is
/// rejected.
fn scene_name_of(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if ext != "jpg" && ext != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (name, index) = stem.rsplit_once('_')?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    fn write_solid(dir: &Path, name: &str, rgb: [u8; 3]) {
        let img = RgbImage::from_pixel(40, 80, Rgb(rgb));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn scene_name_parsing() {
        let ok = |s: &str| scene_name_of(&PathBuf::from(s));
        assert_eq!(ok("home_0.jpg").as_deref(), Some("home"));
        assert_eq!(ok("normal-quest-uijin_12.png").as_deref(), Some("normal-quest-uijin"));
        assert_eq!(ok("clear_ok_3.jpg").as_deref(), Some("clear_ok"));
        assert_eq!(ok("home.jpg"), None);
        assert_eq!(ok("home_.jpg"), None);
        assert_eq!(ok("home_a1.jpg"), None);
        assert_eq!(ok("home_1.txt"), None);
        assert_eq!(ok("_1.jpg"), None);
    }

    #[test]
    fn load_groups_by_scene_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        write_solid(dir.path(), "home_0.png", [200, 40, 40]);
        write_solid(dir.path(), "home_1.png", [190, 50, 40]);
        write_solid(dir.path(), "clear-ok_0.png", [40, 200, 40]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("broken_1.png"), b"not a png").unwrap();

        let cfg = SceneConfig::builtin();
        let store = TemplateStore::load(dir.path(), &cfg).unwrap();

        assert_eq!(store.full("home").map(<[_]>::len), Some(2));
        assert_eq!(store.full("clear-ok").map(<[_]>::len), Some(1));
        assert!(store.full("broken").is_none());
        assert_eq!(store.scenes().count(), 2);
    }

    #[test]
    fn region_lists_parallel_declared_regions() {
        let dir = tempfile::tempdir().unwrap();
        write_solid(dir.path(), "home_0.png", [200, 40, 40]);
        write_solid(dir.path(), "home_1.png", [60, 60, 220]);
        write_solid(dir.path(), "clear-ok_0.png", [40, 200, 40]);

        let cfg = SceneConfig::builtin();
        let store = TemplateStore::load(dir.path(), &cfg).unwrap();

        let region_hists = store.regions("home").unwrap();
        assert_eq!(region_hists.len(), cfg.regions("home").len());
        for per_region in region_hists {
            assert_eq!(per_region.len(), store.full("home").unwrap().len());
        }
        // clear-ok declares no regions, so it gets no region entry.
        assert!(store.regions("clear-ok").is_none());
    }
}
