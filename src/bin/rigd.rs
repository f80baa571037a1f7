//! rigd - gesture rig daemon
//!
//! 1. Opens the camera, the landmark backends and the actuator link
//! 2. Alternates face and hand tracking on incoming frames
//! 3. Streams pan/tilt positions to the rig
//! 4. On a held thumbs-up, shakes the rig and saves the frame
//!
//! Runs until Ctrl-C or until the camera stops producing frames.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gesture_rig::ui::{Ui, UiMode};
use gesture_rig::{
    build_detector, open_link, open_source, DetectorKind, JpegArchiver, Rig, RigConfig,
    ThreadRunner,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML, or JSON with a .json extension).
    #[arg(long, env = "RIG_CONFIG")]
    config: Option<PathBuf>,
    /// Camera override: device path, image directory or stub://name.
    #[arg(long)]
    camera: Option<String>,
    /// Serial port override (stub://name for a dry run).
    #[arg(long)]
    port: Option<String>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Startup progress style.
    #[arg(long, value_enum, default_value_t = UiMode::Auto)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = RigConfig::load(args.config.as_deref())?;
    if let Some(camera) = args.camera {
        cfg.camera.source = camera;
    }
    if let Some(port) = args.port {
        cfg.actuator.port = port;
    }
    cfg.validate()?;

    let ui = Ui::new(args.ui, std::io::stderr().is_terminal());

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }

    let link = {
        let _stage = ui.stage(&format!("opening actuator link {}", cfg.actuator.port));
        open_link(&cfg.actuator)?
    };

    let (face, hand) = {
        let _stage = ui.stage("loading landmark detectors");
        (
            build_detector(DetectorKind::Face, &cfg.face)?,
            build_detector(DetectorKind::Hand, &cfg.hand)?,
        )
    };

    let archiver = JpegArchiver::new(&cfg.capture.output_dir, cfg.capture.jpeg_quality)?;
    log::info!("captures go to {}", archiver.root().display());

    let mut rig = Rig::from_config(
        &cfg,
        face,
        hand,
        link.clone(),
        Arc::new(archiver),
        Box::new(ThreadRunner),
    );
    {
        let _stage = ui.stage("warming up detectors");
        rig.warm_up()?;
    }

    let mut source = open_source(&cfg.camera)?;
    {
        let _stage = ui.stage(&format!("opening camera {}", cfg.camera.source));
        source.connect()?;
    }

    log::info!(
        "rigd running: camera={} link={} stability={:?} cooldown={:?} display={}x{}",
        source.describe(),
        link.describe(),
        cfg.gesture.stability,
        cfg.gesture.cooldown,
        cfg.display.width,
        cfg.display.height
    );

    let stats = rig.run(source.as_mut(), &shutdown, args.max_frames);
    log::info!(
        "rigd stopped: frames={} positions={} link_errors={} triggers={}",
        stats.frames,
        stats.positions_sent,
        stats.link_errors,
        stats.triggers_accepted
    );
    Ok(())
}
