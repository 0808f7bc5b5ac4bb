//! Screen-size calibration.
//!
//! Manual mode assigns a caller-supplied size and zeroes the cursor with a
//! corner sweep. Auto mode walks the cursor diagonally from the origin
//! until a probe spots the hamburger menu icon near the bottom-right
//! corner, then derives the screen size from the distance travelled.

use crate::transport::HidTransport;
use crate::{MOVE_DELAY, SCAN_STEP};
use anyhow::{Result, bail};
use tracing::info;

/// Upper bound on auto-scan reports before giving up.
pub const MAX_SCAN_STEPS: u32 = 500;

// The menu icon sits slightly inside the corner, so the travelled distance
// underestimates the full screen by these factors.
const MENU_X_FRACTION: f64 = 0.95;
const MENU_Y_FRACTION: f64 = 0.97;

/// Vision predicate for the auto-scan: does the current frame show the
/// hamburger menu under the cursor?
pub trait MenuProbe {
    fn menu_visible(&mut self) -> Result<bool>;
}

/// Probe that never matches; auto calibration with it always exhausts.
pub struct NullProbe;

impl MenuProbe for NullProbe {
    fn menu_visible(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Assign a known screen size and perform the visual reset to origin.
pub fn manual(hid: &mut HidTransport, w: i32, h: i32) {
    hid.set_screen_size(w, h);
    hid.reset_origin();
}

/// Step-and-probe scan from the origin. On a probe hit the screen size is
/// derived from the cursor position; on exhaustion the scan fails and the
/// caller decides (the detector then runs in manual mode only).
pub fn auto_scan(hid: &mut HidTransport, probe: &mut dyn MenuProbe) -> Result<(i32, i32)> {
    hid.reset_origin();
    for _ in 0..MAX_SCAN_STEPS {
        hid.send(0, SCAN_STEP, SCAN_STEP, MOVE_DELAY);
        if probe.menu_visible()? {
            let (cx, cy) = hid.cursor();
            let w = (cx as f64 / MENU_X_FRACTION).floor() as i32;
            let h = (cy as f64 / MENU_Y_FRACTION).floor() as i32;
            hid.set_screen_size(w, h);
            info!(target: "hid", w, h, "auto_calibrated");
            return Ok((w, h));
        }
    }
    bail!("calibration scan exhausted after {MAX_SCAN_STEPS} steps");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::RecordingSink;
    use crate::transport::Pacing;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn transport() -> HidTransport {
        let (sink, _log) = RecordingSink::new();
        HidTransport::with_rng(Box::new(sink), Pacing::disabled(), StdRng::seed_from_u64(1))
    }

    struct HitAfter(u32);

    impl MenuProbe for HitAfter {
        fn menu_visible(&mut self) -> Result<bool> {
            if self.0 == 0 {
                return Ok(true);
            }
            self.0 -= 1;
            Ok(false)
        }
    }

    #[test]
    fn manual_assigns_size_and_zeroes_cursor() {
        let mut hid = transport();
        hid.move_to(123, 45);
        manual(&mut hid, 1170, 2532);
        assert_eq!(hid.screen_size(), (1170, 2532));
        assert_eq!(hid.cursor(), (0, 0));
    }

    #[test]
    fn auto_scan_derives_size_from_travel() {
        let mut hid = transport();
        // Probe hits on the 38th report: cursor at (380, 380).
        let (w, h) = auto_scan(&mut hid, &mut HitAfter(37)).unwrap();
        assert_eq!(hid.cursor(), (380, 380));
        assert_eq!(w, (380.0_f64 / 0.95).floor() as i32);
        assert_eq!(h, (380.0_f64 / 0.97).floor() as i32);
        assert_eq!(hid.screen_size(), (w, h));
    }

    #[test]
    fn auto_scan_exhausts_without_probe_hit() {
        let mut hid = transport();
        assert!(auto_scan(&mut hid, &mut NullProbe).is_err());
        // 500 scan steps were still emitted.
        assert_eq!(hid.cursor(), (5000, 5000));
    }
}
