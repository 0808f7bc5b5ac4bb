//! The scripted gesture library.
//!
//! Each action is an atomic unit from the dispatcher's point of view: it
//! re-applies manual calibration from its arguments, sweeps the cursor back
//! to the origin, then composes transport primitives. Tap targets are
//! screen percentages, so one script drives any calibrated screen size.

use crate::calibrate;
use crate::transport::HidTransport;
use crate::{DRAG_STEPS, UI_WAIT};
use anyhow::Result;
use rand::Rng;

/// Splash animation settle time before the dismissal tap, seconds.
pub const ANIMATION_WAIT: f64 = 5.0;

/// Wait between dialog-dismissal attempts, seconds.
pub const DIALOG_WAIT: f64 = 2.0;

/// Common OK / confirm button positions on launch dialogs.
pub const DIALOG_OK_POSITIONS: &[(f64, f64)] = &[
    (0.50, 0.65),
    (0.50, 0.70),
    (0.65, 0.65),
    (0.50, 0.80),
];

/// Runtime arguments every action receives: the manual screen size in HID
/// units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidArgs {
    pub hid_w: i32,
    pub hid_h: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Calibrate,
    QuestBtClick,
    NormalBtClick,
    NormalIkuseiBtClick,
    ShojinBtClick,
    KaryuBtClick,
    SoloBtClick,
    HelperSelect,
    ShutsugekiBtClick,
    PlayTurn,
    ClearOk,
    SpecialReward,
    RewardNext,
    DismissSplash,
    DismissDialogs,
}

impl Action {
    pub const ALL: &[Action] = &[
        Action::Calibrate,
        Action::QuestBtClick,
        Action::NormalBtClick,
        Action::NormalIkuseiBtClick,
        Action::ShojinBtClick,
        Action::KaryuBtClick,
        Action::SoloBtClick,
        Action::HelperSelect,
        Action::ShutsugekiBtClick,
        Action::PlayTurn,
        Action::ClearOk,
        Action::SpecialReward,
        Action::RewardNext,
        Action::DismissSplash,
        Action::DismissDialogs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Action::Calibrate => "calibrate",
            Action::QuestBtClick => "quest_bt_click",
            Action::NormalBtClick => "normal_bt_click",
            Action::NormalIkuseiBtClick => "normal_ikusei_bt_click",
            Action::ShojinBtClick => "shojin_bt_click",
            Action::KaryuBtClick => "karyu_bt_click",
            Action::SoloBtClick => "solo_bt_click",
            Action::HelperSelect => "helper_select",
            Action::ShutsugekiBtClick => "shutsugeki_bt_click",
            Action::PlayTurn => "play_turn",
            Action::ClearOk => "clear_ok",
            Action::SpecialReward => "special_reward",
            Action::RewardNext => "reward_next",
            Action::DismissSplash => "dismiss_splash",
            Action::DismissDialogs => "dismiss_dialogs",
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.iter().copied().find(|a| a.name() == name)
    }

    /// Execute the gesture against the transport. Transport failures are
    /// already swallowed a layer down; an `Err` here means the action could
    /// not even be scripted.
    pub fn run(self, hid: &mut HidTransport, args: &HidArgs) -> Result<()> {
        calibrate::manual(hid, args.hid_w, args.hid_h);
        match self {
            Action::Calibrate => {}
            Action::QuestBtClick => hid.click_pct(0.50, 0.85),
            Action::NormalBtClick => hid.click_pct(0.50, 0.50),
            Action::NormalIkuseiBtClick => hid.click_pct(0.27, 0.72),
            Action::ShojinBtClick => {
                // The target quest sits below the fold; scroll it into view.
                for _ in 0..3 {
                    drag_pct(hid, 0.5, 0.9, 0.5, 0.3);
                    hid.wait(UI_WAIT);
                }
                hid.click_pct(0.50, 0.90);
            }
            Action::KaryuBtClick => hid.click_pct(0.50, 0.60),
            Action::SoloBtClick => hid.click_pct(0.25, 0.60),
            Action::HelperSelect => {
                for _ in 0..3 {
                    drag_pct(hid, 0.5, 0.3, 0.5, 0.9);
                    hid.wait(UI_WAIT);
                }
                drag_pct(hid, 0.5, 0.6, 0.5, 0.2);
                hid.wait(UI_WAIT);
                hid.click_pct(0.50, 0.46);
            }
            Action::ShutsugekiBtClick => hid.click_pct(0.50, 0.70),
            Action::PlayTurn => play_turn(hid),
            Action::ClearOk => {
                hid.click_pct(0.50, 0.65);
                hid.wait(UI_WAIT);
                hid.reset_origin();
                hid.click_pct(0.50, 0.78);
            }
            Action::SpecialReward => hid.click_pct(0.50, 0.50),
            Action::RewardNext => hid.click_pct(0.50, 0.999),
            Action::DismissSplash => {
                // Let the launch animation settle before the tap registers.
                hid.wait(ANIMATION_WAIT);
                hid.click_pct(0.50, 0.50);
                hid.wait(DIALOG_WAIT);
            }
            Action::DismissDialogs => {
                for &(rx, ry) in DIALOG_OK_POSITIONS {
                    hid.click_pct(rx, ry);
                    hid.wait(DIALOG_WAIT);
                }
            }
        }
        Ok(())
    }
}

fn drag_pct(hid: &mut HidTransport, x1: f64, y1: f64, x2: f64, y2: f64) {
    let (w, h) = hid.screen_size();
    hid.drag(
        (w as f64 * x1) as i32,
        (h as f64 * y1) as i32,
        (w as f64 * x2) as i32,
        (h as f64 * y2) as i32,
        DRAG_STEPS,
    );
}

/// Flick from screen center: random direction on a 30-degree grid, random
/// strength and hold time.
fn play_turn(hid: &mut HidTransport) {
    let (w, h) = hid.screen_size();
    let (angle_deg, strength, hold) = {
        let rng = hid.rng_mut();
        (
            30.0 * rng.random_range(0..12) as f64,
            rng.random_range(100..=200) as f64,
            rng.random_range(2.0..4.0),
        )
    };
    let theta = angle_deg.to_radians();
    let dx = (strength * theta.cos()).floor() as i32;
    let dy = (strength * theta.sin()).floor() as i32;
    hid.move_to(w / 2, h / 2);
    hid.flick(dx, dy, hold);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::{Post, RecordingSink};
    use crate::transport::Pacing;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::{Arc, Mutex};

    const ARGS: HidArgs = HidArgs {
        hid_w: 400,
        hid_h: 800,
    };

    fn transport() -> (HidTransport, Arc<Mutex<Vec<Post>>>) {
        let (sink, log) = RecordingSink::new();
        let hid = HidTransport::with_rng(
            Box::new(sink),
            Pacing::disabled(),
            StdRng::seed_from_u64(11),
        );
        (hid, log)
    }

    fn press_release_count(posts: &[Post]) -> (usize, usize) {
        let mut press = 0;
        let mut release = 0;
        for post in posts {
            if let Post::Single { report, .. } = post {
                if report.op == 1 {
                    press += 1;
                } else {
                    release += 1;
                }
            }
        }
        (press, release)
    }

    #[test]
    fn names_round_trip() {
        for &action in Action::ALL {
            assert_eq!(Action::from_name(action.name()), Some(action));
        }
        assert_eq!(Action::from_name("no_such_action"), None);
    }

    #[test]
    fn every_action_recalibrates_first() {
        let (mut hid, _log) = transport();
        Action::Calibrate.run(&mut hid, &ARGS).unwrap();
        assert_eq!(hid.screen_size(), (400, 800));
        assert_eq!(hid.cursor(), (0, 0));
    }

    #[test]
    fn quest_bt_click_taps_the_quest_button() {
        let (mut hid, log) = transport();
        Action::QuestBtClick.run(&mut hid, &ARGS).unwrap();
        // Tap lands at 50% x, 85% y of the calibrated screen.
        assert_eq!(hid.cursor(), (200, 680));
        let (press, release) = press_release_count(&log.lock().unwrap());
        assert_eq!((press, release), (1, 1));
    }

    #[test]
    fn reward_next_taps_the_bottom_edge() {
        let (mut hid, _log) = transport();
        Action::RewardNext.run(&mut hid, &ARGS).unwrap();
        assert_eq!(hid.cursor(), (200, (800.0 * 0.999) as i32));
    }

    #[test]
    fn shojin_scrolls_then_taps() {
        let (mut hid, log) = transport();
        Action::ShojinBtClick.run(&mut hid, &ARGS).unwrap();
        // Three drags (press+release each) plus the final tap.
        let (press, release) = press_release_count(&log.lock().unwrap());
        assert_eq!((press, release), (4, 4));
        assert_eq!(hid.cursor(), (200, 720));
    }

    #[test]
    fn clear_ok_double_taps_with_reset_between() {
        let (mut hid, log) = transport();
        Action::ClearOk.run(&mut hid, &ARGS).unwrap();
        let (press, release) = press_release_count(&log.lock().unwrap());
        assert_eq!((press, release), (2, 2));
        // Second tap happens after a fresh origin reset.
        assert_eq!(hid.cursor(), (200, (800.0 * 0.78) as i32));
    }

    #[test]
    fn play_turn_flicks_from_center_within_strength_bounds() {
        let (mut hid, log) = transport();
        Action::PlayTurn.run(&mut hid, &ARGS).unwrap();
        let (cx, cy) = hid.cursor();
        let (dx, dy) = (cx - 200, cy - 400);
        let magnitude = ((dx * dx + dy * dy) as f64).sqrt();
        // floor() perturbs each component by less than one unit.
        assert!((98.0..=202.0).contains(&magnitude), "magnitude {magnitude}");
        let (press, release) = press_release_count(&log.lock().unwrap());
        assert_eq!((press, release), (1, 1));
    }

    #[test]
    fn dismiss_splash_taps_screen_center() {
        let (mut hid, log) = transport();
        Action::DismissSplash.run(&mut hid, &ARGS).unwrap();
        let (press, release) = press_release_count(&log.lock().unwrap());
        assert_eq!((press, release), (1, 1));
        assert_eq!(hid.cursor(), (200, 400));
    }

    #[test]
    fn dismiss_dialogs_taps_every_ok_position() {
        let (mut hid, log) = transport();
        Action::DismissDialogs.run(&mut hid, &ARGS).unwrap();
        let (press, release) = press_release_count(&log.lock().unwrap());
        assert_eq!((press, release), (4, 4));
        let &(rx, ry) = DIALOG_OK_POSITIONS.last().unwrap();
        assert_eq!(
            hid.cursor(),
            ((400.0 * rx) as i32, (800.0 * ry) as i32)
        );
    }

    #[test]
    fn helper_select_ends_on_the_second_helper() {
        let (mut hid, log) = transport();
        Action::HelperSelect.run(&mut hid, &ARGS).unwrap();
        // Four drags plus one tap.
        let (press, release) = press_release_count(&log.lock().unwrap());
        assert_eq!((press, release), (5, 5));
        assert_eq!(hid.cursor(), (200, (800.0 * 0.46) as i32));
    }
}
