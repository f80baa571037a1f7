//! rig_demo - end-to-end synthetic run of the gesture rig
//!
//! Feeds synthetic frames through scripted detectors: the face sweeps left to
//! right while a thumbs-up is held throughout. Commands go to a dry-run link
//! and captures land in the output directory.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gesture_rig::landmarks::{INDEX_FINGER_TIP, NOSE_TIP, THUMB_BASE, THUMB_TIP};
use gesture_rig::{
    open_link, DetectorKind, FrameSource, JpegArchiver, Landmark, LandmarkSet, Rig, RigConfig,
    ScriptedDetector, StepOutcome, SyntheticConfig, SyntheticSource, ThreadRunner,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Duration of the synthetic run in seconds.
    #[arg(long, default_value_t = 14)]
    seconds: u64,
    /// Frames per second.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Output directory for captures.
    #[arg(long, default_value = "demo_captures")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let mut cfg = RigConfig::load(None)?;
    cfg.actuator.port = "stub://demo-rig".to_string();
    cfg.capture.output_dir = args.out.clone();
    cfg.validate()?;

    let total_frames = args.seconds * args.fps as u64;
    let face_frames = total_frames.div_ceil(2);
    let sweep = (0..face_frames).map(|i| {
        let x = (i as f32 + 0.5) / face_frames as f32;
        Some(LandmarkSet::from_indexed(
            468,
            &[(NOSE_TIP, Landmark::new(x, 0.4))],
            0.95,
        ))
    });
    let face = ScriptedDetector::new(DetectorKind::Face).with_script(sweep);
    let hand = ScriptedDetector::new(DetectorKind::Hand).repeating(thumbs_up());

    let link = open_link(&cfg.actuator)?;
    let archiver = JpegArchiver::new(&cfg.capture.output_dir, cfg.capture.jpeg_quality)?;
    let mut rig = Rig::from_config(
        &cfg,
        Box::new(face),
        Box::new(hand),
        link,
        Arc::new(archiver),
        Box::new(ThreadRunner),
    );

    let mut source = SyntheticSource::new(SyntheticConfig {
        label: "stub://demo-camera".to_string(),
        width: cfg.camera.width,
        height: cfg.camera.height,
        frame_limit: Some(total_frames),
    });
    source.connect()?;

    let frame_interval = Duration::from_secs_f64(1.0 / args.fps as f64);
    while let Some(frame) = source.next_frame()? {
        let started = Instant::now();
        if let StepOutcome::Gesture {
            trigger: Some(decision),
            ..
        } = rig.step(frame, started)?
        {
            log::debug!("trigger decision: {:?}", decision);
        }
        std::thread::sleep(frame_interval.saturating_sub(started.elapsed()));
    }

    // Let in-flight actuation and capture tasks finish.
    std::thread::sleep(cfg.actuator.worst_case_actuation() + Duration::from_millis(200));

    let stats = rig.stats();
    let captures = std::fs::read_dir(&cfg.capture.output_dir)?.count();
    println!(
        "demo complete: frames={} positions={} triggers={} captures in {}: {}",
        stats.frames,
        stats.positions_sent,
        stats.triggers_accepted,
        cfg.capture.output_dir.display(),
        captures
    );
    Ok(())
}

fn thumbs_up() -> LandmarkSet {
    LandmarkSet::from_indexed(
        21,
        &[
            (THUMB_TIP, Landmark::new(0.6, 0.3)),
            (THUMB_BASE, Landmark::new(0.6, 0.6)),
            (INDEX_FINGER_TIP, Landmark::new(0.5, 0.55)),
        ],
        0.9,
    )
}
