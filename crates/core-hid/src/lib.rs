//! HID dispatch engine: relative-cursor transport, the scripted gesture
//! library, and screen-size calibration.
//!
//! The remote injector consumes relative mouse reports only; everything
//! absolute (tap targets, drags, screen percentages) is maintained here and
//! converted to clamped deltas before hitting the wire. Delivery is
//! fire-and-forget: a lost packet is corrected by the next confirmed
//! observation, so transport errors are logged and swallowed.

pub mod actions;
pub mod calibrate;
pub mod sink;
pub mod transport;

pub use actions::{Action, HidArgs};
pub use sink::{HttpSink, Report, ReportSink};
pub use transport::{HidTransport, Pacing};

/// Inter-report delay, seconds, scaled by batch length.
pub const MOVE_DELAY: f64 = 0.13;
/// Mouse-down duration for a tap, seconds.
pub const CLICK_HOLD: f64 = 0.15;
/// Standard wait for a UI transition, seconds.
pub const UI_WAIT: f64 = 1.0;
/// Calibration scan step per report, HID units.
pub const SCAN_STEP: i32 = 10;
/// Max delta per report, both axes, HID units.
pub const MAX_DELTA: i32 = 10;
/// Sweep distance guaranteeing any corner is reached, HID units.
pub const RESET_SWEEP: i32 = 500;
/// Interpolation steps for a drag.
pub const DRAG_STEPS: u32 = 20;

// Batch shaping. Variable batch sizes and random padding keep the report
// stream from forming a fixed-size signature on the wire.
pub const BATCH_MIN: usize = 6;
pub const BATCH_MAX: usize = 14;
pub const PAD_MIN: usize = 0;
pub const PAD_MAX: usize = 32;
