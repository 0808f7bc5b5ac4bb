//! Relative-cursor transport with tracked absolute position.
//!
//! The cursor position advances by exactly the deltas that were handed to
//! the sink, never by the requested target, so the tracked `(cx, cy)` stays
//! equal to the sum of emitted deltas at all times. Motion decomposes into
//! per-report chunks clamped to [`MAX_DELTA`](crate::MAX_DELTA); chunks are
//! grouped into variable-size batches with random padding, and the
//! inter-batch delay scales with the batch length.

use crate::sink::{Report, ReportSink};
use crate::{BATCH_MAX, BATCH_MIN, CLICK_HOLD, MAX_DELTA, MOVE_DELAY, PAD_MAX, PAD_MIN, RESET_SWEEP};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::warn;

/// Default pause between tap repetitions, seconds.
pub const CLICK_INTERVAL: f64 = 0.5;

/// Wall-clock pacing for report delivery. Disabled pacing turns every sleep
/// into a no-op so gesture logic can be exercised at full speed.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    scale: f64,
}

impl Pacing {
    pub const fn real() -> Self {
        Self { scale: 1.0 }
    }

    pub const fn disabled() -> Self {
        Self { scale: 0.0 }
    }

    fn sleep(&self, secs: f64) {
        let scaled = secs * self.scale;
        if scaled > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(scaled));
        }
    }
}

/// Decompose a motion into per-report chunks whose sum is exactly
/// `(dx, dy)`, each component clamped to `MAX_DELTA`.
pub fn chunk_motion(mut dx: i32, mut dy: i32) -> Vec<(i32, i32)> {
    let mut chunks = Vec::new();
    while dx != 0 || dy != 0 {
        let sx = dx.clamp(-MAX_DELTA, MAX_DELTA);
        let sy = dy.clamp(-MAX_DELTA, MAX_DELTA);
        chunks.push((sx, sy));
        dx -= sx;
        dy -= sy;
    }
    chunks
}

/// Per-step deltas for a drag, by the integer cumulative method: step `i`
/// carries `floor(d*i/n) - floor(d*(i-1)/n)`, so the steps sum to `d`
/// exactly for any `n >= 1`.
pub fn interpolate_steps(dx: i32, dy: i32, steps: u32) -> Vec<(i32, i32)> {
    let n = steps.max(1) as i64;
    let cum = |d: i32, i: i64| (d as i64 * i).div_euclid(n);
    (1..=n)
        .map(|i| {
            (
                (cum(dx, i) - cum(dx, i - 1)) as i32,
                (cum(dy, i) - cum(dy, i - 1)) as i32,
            )
        })
        .collect()
}

pub struct HidTransport {
    sink: Box<dyn ReportSink + Send>,
    pacing: Pacing,
    rng: StdRng,
    seq: u64,
    cx: i32,
    cy: i32,
    screen_w: i32,
    screen_h: i32,
}

impl HidTransport {
    pub fn new(sink: Box<dyn ReportSink + Send>, pacing: Pacing) -> Self {
        Self::with_rng(sink, pacing, StdRng::from_os_rng())
    }

    /// Deterministic construction for tests.
    pub fn with_rng(sink: Box<dyn ReportSink + Send>, pacing: Pacing, rng: StdRng) -> Self {
        Self {
            sink,
            pacing,
            rng,
            seq: 0,
            cx: 0,
            cy: 0,
            screen_w: 0,
            screen_h: 0,
        }
    }

    pub fn cursor(&self) -> (i32, i32) {
        (self.cx, self.cy)
    }

    pub fn screen_size(&self) -> (i32, i32) {
        (self.screen_w, self.screen_h)
    }

    pub fn set_screen_size(&mut self, w: i32, h: i32) {
        self.screen_w = w;
        self.screen_h = h;
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Sleep respecting the configured pacing.
    pub fn wait(&self, secs: f64) {
        self.pacing.sleep(secs);
    }

    /// Emit one sequenced report, then sleep `delay`. Used for discrete
    /// button events; the sequence number increments per report.
    pub fn send(&mut self, op: u8, dx: i32, dy: i32, delay: f64) {
        let report = Report::new(op, dx, dy);
        let seq = self.seq;
        self.seq += 1;
        if let Err(err) = self.sink.post_single(report, seq) {
            warn!(target: "hid", %err, seq, "single_post_failed");
        }
        self.cx += dx;
        self.cy += dy;
        self.pacing.sleep(delay);
    }

    /// Post reports in random-size batches with random padding, advancing
    /// the cursor by each batch's deltas and pacing by batch length.
    fn post_in_batches(&mut self, reports: &[Report]) {
        let mut rest = reports;
        while !rest.is_empty() {
            let n = self.rng.random_range(BATCH_MIN..=BATCH_MAX).min(rest.len());
            let (batch, tail) = rest.split_at(n);
            let pad_len = self.rng.random_range(PAD_MIN..=PAD_MAX);
            if let Err(err) = self.sink.post_batch(batch, pad_len) {
                warn!(target: "hid.batch", %err, reports = batch.len(), "batch_post_failed");
            }
            for r in batch {
                self.cx += r.dx;
                self.cy += r.dy;
            }
            self.pacing.sleep(MOVE_DELAY * batch.len() as f64);
            rest = tail;
        }
    }

    /// Chunk a motion and post it under the given carrier op.
    fn emit_chunked(&mut self, op: u8, dx: i32, dy: i32) {
        let reports: Vec<Report> = chunk_motion(dx, dy)
            .into_iter()
            .map(|(sx, sy)| Report::new(op, sx, sy))
            .collect();
        self.post_in_batches(&reports);
    }

    /// Move the cursor to an absolute position, pointer up.
    pub fn move_to(&mut self, x: i32, y: i32) {
        let dx = x - self.cx;
        let dy = y - self.cy;
        self.emit_chunked(0, dx, dy);
    }

    /// Tap at an absolute position, `repeat` times.
    pub fn click(&mut self, x: i32, y: i32, repeat: u32, interval: f64) {
        self.move_to(x, y);
        for i in 0..repeat {
            self.send(1, 0, 0, CLICK_HOLD);
            self.send(0, 0, 0, 0.1);
            if i + 1 < repeat {
                self.pacing.sleep(interval);
            }
        }
    }

    /// Single tap at a screen-percentage position.
    pub fn click_pct(&mut self, rx: f64, ry: f64) {
        let x = (self.screen_w as f64 * rx) as i32;
        let y = (self.screen_h as f64 * ry) as i32;
        self.click(x, y, 1, CLICK_INTERVAL);
    }

    /// Hold the pointer down at an absolute position for `duration` seconds.
    pub fn long_press(&mut self, x: i32, y: i32, duration: f64) {
        self.move_to(x, y);
        self.send(1, 0, 0, duration);
        self.send(0, 0, 0, 0.1);
    }

    /// Drag from one absolute position to another over `steps` interpolated
    /// reports carried on the drag op.
    pub fn drag(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, steps: u32) {
        self.move_to(x1, y1);
        self.send(1, 0, 0, 0.1);
        let reports: Vec<Report> = interpolate_steps(x2 - x1, y2 - y1, steps)
            .into_iter()
            .map(|(sx, sy)| Report::new(1, sx, sy))
            .collect();
        self.post_in_batches(&reports);
        self.send(0, 0, 0, 0.1);
    }

    /// Pointer-down flick by a relative vector, holding for `hold` seconds
    /// before release. The caller picks the vector.
    pub fn flick(&mut self, dx: i32, dy: i32, hold: f64) {
        self.send(1, 0, 0, 0.1);
        self.emit_chunked(1, dx, dy);
        self.pacing.sleep(hold);
        self.send(0, 0, 0, 0.1);
    }

    /// Sweep the cursor into the top-left corner and re-zero the tracked
    /// position. The sweep overshoots on purpose; the injector pins the
    /// pointer at the screen edge.
    pub fn reset_origin(&mut self) {
        let count = (RESET_SWEEP as usize).div_ceil(100) + 1;
        let reports = vec![Report::new(0, -100, -100); count];
        let pad_len = self.rng.random_range(PAD_MIN..=PAD_MAX);
        if let Err(err) = self.sink.post_batch(&reports, pad_len) {
            warn!(target: "hid.batch", %err, "reset_post_failed");
        }
        self.cx = 0;
        self.cy = 0;
        self.pacing.sleep(MOVE_DELAY * count as f64);
    }
}
