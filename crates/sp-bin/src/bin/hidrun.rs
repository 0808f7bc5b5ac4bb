//! Direct HID-action runner: fire one scripted gesture at a device without
//! the detector loop. Useful for calibration and for walking the launch
//! flow (`dismiss_splash`, `dismiss_dialogs`) by hand.

use anyhow::{Result, bail};
use clap::Parser;
use core_config::{Config, EnvOverrides};
use core_hid::{Action, HidArgs, HidTransport, HttpSink, Pacing};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hidrun", version, about = "Run one HID action directly")]
struct Args {
    /// Injector device ID.
    device_id: String,
    /// Action name, e.g. `quest_bt_click`.
    action: String,
    /// HID screen width and height; falls back to environment/config.
    #[arg(value_name = "HID_SIZE")]
    hid_size: Vec<i32>,
    /// Optional configuration file path (overrides discovery of `scenepilot.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse();
    let Some(action) = Action::from_name(&args.action) else {
        let known: Vec<&str> = Action::ALL.iter().map(|a| a.name()).collect();
        bail!("unknown action {:?}; known: {}", args.action, known.join(", "));
    };

    let file = core_config::load_from(args.config.clone())?;
    let env = EnvOverrides::capture();
    let cfg = Config::resolve(&file, &env);
    let hid_w = args.hid_size.first().copied().unwrap_or(cfg.hid_w);
    let hid_h = args.hid_size.get(1).copied().unwrap_or(cfg.hid_h);

    info!(
        target: "runtime",
        device = args.device_id.as_str(),
        action = action.name(),
        hid_w,
        hid_h,
        api = cfg.api_base.as_str(),
        "action_start"
    );

    let sink = HttpSink::new(&cfg.api_base, &args.device_id);
    let mut hid = HidTransport::new(Box::new(sink), Pacing::real());
    action.run(&mut hid, &HidArgs { hid_w, hid_h })?;

    info!(target: "runtime", action = action.name(), "action_done");
    Ok(())
}
