//! Scenepilot entrypoint: the closed-loop scene detector.
//!
//! Frames flow ROI crop -> canonical resize -> classifier -> state machine,
//! with classification capped at one pass per second. Confirmed transitions
//! hand their scripted gesture to the dispatcher worker; the loop itself
//! never waits on gesture completion, so classification cadence is
//! independent of dispatch latency.

use anyhow::{Context, Result};
use clap::Parser;
use core_config::{Config, EnvOverrides};
use core_dispatch::Dispatcher;
use core_fsm::{Machine, PLAY_TURN_INTERVAL, State, TurnPacer};
use core_hid::{Action, HidArgs, HidTransport, HttpSink, Pacing};
use core_scene::{Roi, SceneConfig, SceneScore, TemplateStore, scene_similarity, to_canonical};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Minimum spacing between classification passes.
const CLASSIFY_INTERVAL: Duration = Duration::from_secs(1);

/// CLI arguments. Device settings fall back to the environment, then to the
/// config file.
#[derive(Parser, Debug)]
#[command(name = "scenepilot", version, about = "Vision-driven quest loop detector")]
struct Args {
    /// Injector device ID; empty disables HID dispatch.
    #[arg(long = "device-id", env = "DEVICE_ID", default_value = "")]
    device_id: String,
    /// HID screen width; zero disables HID dispatch.
    #[arg(long = "hid-w", env = "HID_W", default_value_t = 0)]
    hid_w: i32,
    /// HID screen height; zero disables HID dispatch.
    #[arg(long = "hid-h", env = "HID_H", default_value_t = 0)]
    hid_h: i32,
    /// Template snapshot directory (default: ./snapshots or config file).
    #[arg(long)]
    templates: Option<PathBuf>,
    /// Directory of frames to play back in place of a camera.
    #[arg(long)]
    frames: PathBuf,
    /// Playback frame rate.
    #[arg(long, default_value_t = 10.0)]
    fps: f64,
    /// Optional configuration file path (overrides discovery of `scenepilot.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

/// One queued gesture: the action plus its runtime arguments.
#[derive(Debug, Clone, Copy)]
struct ActionJob {
    action: Action,
    args: HidArgs,
}

/// Source of raw camera frames. Camera integration lives outside this
/// binary; the shipped implementation plays back a directory of stills.
trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

struct DirFrameSource {
    paths: Vec<PathBuf>,
    idx: usize,
    interval: Duration,
    last: Option<Instant>,
}

impl DirFrameSource {
    fn new(dir: &Path, fps: f64) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("reading frame dir {}", dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("jpg") | Some("jpeg") | Some("png")
                )
            })
            .collect();
        paths.sort();
        let interval = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };
        Ok(Self {
            paths,
            idx: 0,
            interval,
            last: None,
        })
    }
}

impl FrameSource for DirFrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        while self.idx < self.paths.len() {
            let path = &self.paths[self.idx];
            self.idx += 1;
            if let Some(last) = self.last {
                let elapsed = last.elapsed();
                if elapsed < self.interval {
                    std::thread::sleep(self.interval - elapsed);
                }
            }
            self.last = Some(Instant::now());
            match image::open(path) {
                Ok(img) => return Ok(Some(img.to_rgb8())),
                Err(err) => {
                    warn!(target: "runtime", file = %path.display(), %err, "frame_unreadable");
                }
            }
        }
        Ok(None)
    }
}

struct DetectorLoop {
    store: TemplateStore,
    scene_cfg: SceneConfig,
    machine: Machine,
    pacer: TurnPacer,
    dispatcher: Option<Dispatcher<ActionJob>>,
    hid_args: HidArgs,
    roi: Roi,
    last_classify: Option<Instant>,
}

impl DetectorLoop {
    fn run(&mut self, source: &mut dyn FrameSource) -> Result<()> {
        let mut frames_in_window = 0u32;
        let mut window_start = Instant::now();

        while let Some(frame) = source.next_frame()? {
            let now = Instant::now();
            frames_in_window += 1;
            if now.duration_since(window_start) >= Duration::from_secs(1) {
                debug!(target: "runtime", fps = frames_in_window, "frame_rate");
                frames_in_window = 0;
                window_start = now;
            }

            if self
                .last_classify
                .is_some_and(|t| now.duration_since(t) < CLASSIFY_INTERVAL)
            {
                continue;
            }
            self.last_classify = Some(now);
            self.classify_and_step(&frame, now);
        }
        Ok(())
    }

    fn classify_and_step(&mut self, frame: &RgbImage, now: Instant) {
        let canon = to_canonical(&self.roi.crop(frame));
        let scores = scene_similarity(&canon, &self.store, &self.scene_cfg);
        log_breakdown(&scores);

        let ranking: Vec<(String, f64)> =
            scores.iter().map(|s| (s.name.clone(), s.score)).collect();
        let outcome = self.machine.step(&ranking);
        if outcome.changed {
            info!(target: "fsm", state = %outcome.state, "state_confirmed");
            self.emit_transition_action(outcome.state, now);
        }
        self.poll_play_turn(now);
    }

    /// Fire the gesture mapped to a freshly confirmed state.
    fn emit_transition_action(&mut self, state: State, now: Instant) {
        if state == State::InPlay {
            // Periodic emission restarts from this transition.
            self.pacer.reset();
        }
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        let Some(action) = state.action_name().and_then(Action::from_name) else {
            return;
        };
        dispatcher.dispatch(ActionJob {
            action,
            args: self.hid_args,
        });
        if state == State::InPlay {
            self.pacer.mark(now);
        }
    }

    /// While in play, re-fire the flick every interval, skipping (and
    /// retrying next poll) when the worker is still busy.
    fn poll_play_turn(&mut self, now: Instant) {
        if self.machine.state() != State::InPlay {
            return;
        }
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        if !self.pacer.due(now) {
            return;
        }
        let accepted = dispatcher.dispatch_if_idle(ActionJob {
            action: Action::PlayTurn,
            args: self.hid_args,
        });
        if accepted {
            self.pacer.mark(now);
        }
    }
}

fn log_breakdown(scores: &[SceneScore]) {
    for s in scores.iter().take(3) {
        debug!(
            target: "scene",
            scene = s.name.as_str(),
            score = s.score,
            base = s.base,
            regions = ?s.region_scores,
            "score_breakdown"
        );
    }
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("scenepilot.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "scenepilot.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        Err(_err) => {
            // Global tracing subscriber already installed; drop guard so the
            // writer shuts down.
            None
        }
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn resolve_config(args: &Args) -> Result<Config> {
    let file = core_config::load_from(args.config.clone())?;
    let env = EnvOverrides::capture();
    let mut cfg = Config::resolve(&file, &env);
    if !args.device_id.is_empty() {
        cfg.device_id = args.device_id.clone();
    }
    if args.hid_w > 0 {
        cfg.hid_w = args.hid_w;
    }
    if args.hid_h > 0 {
        cfg.hid_h = args.hid_h;
    }
    if let Some(dir) = &args.templates {
        cfg.template_dir = Some(dir.clone());
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let cfg = resolve_config(&args)?;
    let scene_cfg = SceneConfig::builtin();

    let template_dir = cfg
        .template_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("snapshots"));
    let store = TemplateStore::load(&template_dir, &scene_cfg)?;
    if store.is_empty() {
        warn!(target: "runtime", dir = %template_dir.display(), "no_templates_found");
    }

    let hid_args = HidArgs {
        hid_w: cfg.hid_w,
        hid_h: cfg.hid_h,
    };
    let dispatcher = if cfg.hid_enabled() {
        info!(
            target: "runtime",
            device = cfg.device_id.as_str(),
            hid_w = cfg.hid_w,
            hid_h = cfg.hid_h,
            api = cfg.api_base.as_str(),
            "hid_enabled"
        );
        let sink = HttpSink::new(&cfg.api_base, &cfg.device_id);
        let mut hid = HidTransport::new(Box::new(sink), Pacing::real());
        Some(Dispatcher::spawn("hid-worker", move |job: ActionJob| {
            job.action.run(&mut hid, &job.args)
        })?)
    } else {
        info!(target: "runtime", "hid_disabled");
        None
    };

    let mut source = DirFrameSource::new(&args.frames, args.fps)?;
    let mut detector = DetectorLoop {
        store,
        scene_cfg,
        machine: Machine::new(),
        pacer: TurnPacer::new(PLAY_TURN_INTERVAL),
        dispatcher,
        hid_args,
        roi: Roi::DEFAULT,
        last_classify: None,
    };
    detector.run(&mut source)?;

    info!(target: "runtime", "frames_exhausted");
    Ok(())
}
