//! autotap entry point.
//!
//! Wires together the config layers, the adb control session, the action
//! scheduler, and the keyboard adapter, then drives the run to completion.
//!
//! # Usage
//!
//! ```text
//! autotap [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>          TOML config file (default: platform config dir)
//!       --serial <SERIAL>        adb device serial [env: AUTOTAP_SERIAL]
//!       --delay-min <MS>         Minimum delay between actions
//!       --delay-max <MS>         Maximum delay between actions (0 = no wait)
//!       --x-min/--x-max          Tap area bounds (default: full screen)
//!       --y-min/--y-max
//!       --rest-interval-min <MS> Minimum interval between rests
//!       --rest-interval-max <MS> Maximum interval between rests (0 = no rests)
//!       --rest-duration-min <MS> Minimum rest length
//!       --rest-duration-max <MS> Maximum rest length
//!       --key-event <CODE>       Repeat an Android key event instead of tapping
//!       --list-devices           List connected devices and exit
//!       --screenshot <PATH>      Save one screenshot and exit
//!       --init-config            Write the merged config to disk and exit
//! ```
//!
//! During a run: `p` pauses/resumes, `r` resumes, `q` or Ctrl-C quits.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config + CLI overrides   -- three-layer config merge
//!  └─ ControlSession::start()       -- adb shell connect/reconnect loop
//!  └─ KeyboardListener::start()     -- raw-mode key → ControlSignal
//!  └─ ActionScheduler::run()        -- the timing state machine
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use autotap_cli::application::scheduler::{ActionDispatcher, ActionScheduler, TargetSelector};
use autotap_cli::application::targets::{FixedKeySelector, RandomAreaSelector};
use autotap_cli::infrastructure::bridge::{
    capture, device, AdbShellFactory, ControlSession, SessionConfig,
};
use autotap_cli::infrastructure::keyboard::KeyboardListener;
use autotap_cli::infrastructure::storage::config::{
    load_config, save_config, ConfigOverrides,
};
use autotap_core::{NormalSampler, SessionEvent};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Humanized input automation for Android devices over adb.
#[derive(Debug, Parser)]
#[command(
    name = "autotap",
    about = "Automated taps and key events with human-like timing over adb",
    version
)]
struct Cli {
    /// TOML config file.  Defaults to the platform config directory.
    #[arg(short, long, env = "AUTOTAP_CONFIG")]
    config: Option<PathBuf>,

    /// adb device serial (`adb -s`).  Needed only with multiple devices.
    #[arg(long, env = "AUTOTAP_SERIAL")]
    serial: Option<String>,

    /// Minimum delay between actions, milliseconds.
    #[arg(long)]
    delay_min: Option<u64>,

    /// Maximum delay between actions, milliseconds (0 = no wait).
    #[arg(long)]
    delay_max: Option<u64>,

    /// Tap area: smallest X coordinate.
    #[arg(long)]
    x_min: Option<u32>,

    /// Tap area: largest X coordinate.
    #[arg(long)]
    x_max: Option<u32>,

    /// Tap area: smallest Y coordinate.
    #[arg(long)]
    y_min: Option<u32>,

    /// Tap area: largest Y coordinate.
    #[arg(long)]
    y_max: Option<u32>,

    /// Minimum interval between automatic rests, milliseconds.
    #[arg(long)]
    rest_interval_min: Option<u64>,

    /// Maximum interval between automatic rests, milliseconds (0 disables
    /// rests).
    #[arg(long)]
    rest_interval_max: Option<u64>,

    /// Minimum rest duration, milliseconds.
    #[arg(long)]
    rest_duration_min: Option<u64>,

    /// Maximum rest duration, milliseconds.
    #[arg(long)]
    rest_duration_max: Option<u64>,

    /// Repeat this Android key event instead of tapping (keycode, e.g.
    /// 23 = d-pad centre).
    #[arg(long)]
    key_event: Option<u32>,

    /// List the devices adb sees, then exit.
    #[arg(long)]
    list_devices: bool,

    /// Capture one screenshot to this file, then exit.
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Write the merged configuration to the default config file, then
    /// exit.  Useful as a starting point for hand editing.
    #[arg(long)]
    init_config: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            serial: self.serial.clone(),
            delay_min_ms: self.delay_min,
            delay_max_ms: self.delay_max,
            x_min: self.x_min,
            x_max: self.x_max,
            y_min: self.y_min,
            y_max: self.y_max,
            rest_interval_min_ms: self.rest_interval_min,
            rest_interval_max_ms: self.rest_interval_max,
            rest_duration_min_ms: self.rest_duration_min,
            rest_duration_max_ms: self.rest_duration_max,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;
    config.apply_overrides(&cli.overrides());

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.agent.log_level)),
        )
        .init();

    // ── One-shot modes ────────────────────────────────────────────────────────

    if cli.list_devices {
        let devices = device::list_devices().await.context("listing devices")?;
        if devices.is_empty() {
            println!("no devices found");
        }
        for entry in devices {
            println!("{}\t{}", entry.serial, entry.state);
        }
        return Ok(());
    }

    if let Some(path) = &cli.screenshot {
        capture::capture_to_file(config.device.serial.as_deref(), path)
            .await
            .context("capturing screenshot")?;
        return Ok(());
    }

    if cli.init_config {
        save_config(&config).context("writing config file")?;
        println!("wrote {}", autotap_cli::infrastructure::storage::config::config_file_path()?.display());
        return Ok(());
    }

    // ── The run ───────────────────────────────────────────────────────────────

    if let Some(serial) = &config.device.serial {
        match device::is_device_ready(serial).await {
            Ok(true) => {}
            Ok(false) => warn!(serial = %serial, "device not ready yet; will keep retrying"),
            Err(error) => warn!(%error, "could not enumerate devices"),
        }
    }

    let factory = Arc::new(AdbShellFactory::new(config.device.serial.clone()));
    let session = Arc::new(ControlSession::new(SessionConfig::default(), factory));
    let mut events = session.start();

    // The tap area defaults to the whole screen, which needs a connected
    // channel to ask for; explicitly configured bounds skip the wait.
    let screen = if config.needs_screen_size() {
        info!("waiting for the device channel to query the screen size");
        wait_for_connection(&mut events)
            .await
            .context("device channel closed before connecting")?;
        let size = session.screen_size().await;
        match size {
            Some(size) => info!(width = size.width, height = size.height, "device screen size"),
            None => warn!("screen size query failed; configure the tap area explicitly"),
        }
        size
    } else {
        None
    };

    let action_config = config
        .action_config(screen)
        .context("invalid configuration")?;

    // Keep narrating connectivity for the rest of the run.
    tokio::spawn(log_session_events(events));

    let (mut keyboard, signals) = KeyboardListener::start();
    info!("press p to pause/resume, r to resume, q or Ctrl-C to quit");

    let selector: Box<dyn TargetSelector> = match cli.key_event {
        Some(code) => Box::new(FixedKeySelector::new(code)),
        None => Box::new(RandomAreaSelector::new(&action_config, NormalSampler::new())),
    };
    let scheduler = ActionScheduler::new(
        action_config,
        NormalSampler::new(),
        Arc::clone(&session) as Arc<dyn ActionDispatcher>,
        selector,
    );

    scheduler.run(signals).await;

    keyboard.stop();
    session.cleanup().await;
    info!("stopped");
    Ok(())
}

/// Consumes session events until the first `Connected`.
async fn wait_for_connection(events: &mut mpsc::Receiver<SessionEvent>) -> anyhow::Result<()> {
    while let Some(event) = events.recv().await {
        log_event(event);
        if event == SessionEvent::Connected {
            return Ok(());
        }
    }
    anyhow::bail!("session ended while waiting for the device")
}

/// Logs connectivity changes for the lifetime of the run.
async fn log_session_events(mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        log_event(event);
    }
}

fn log_event(event: SessionEvent) {
    match event {
        SessionEvent::Connected => info!("adb shell connected"),
        SessionEvent::Disconnected => warn!("device connection lost; waiting to reconnect"),
        SessionEvent::Reconnecting => info!("trying to reconnect"),
    }
}
