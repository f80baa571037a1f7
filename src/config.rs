use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::link::{RetryPolicy, SERIAL_TIMEOUT};

const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_DISPLAY_WIDTH: u32 = crate::mapping::DEFAULT_DISPLAY_WIDTH;
const DEFAULT_DISPLAY_HEIGHT: u32 = crate::mapping::DEFAULT_DISPLAY_HEIGHT;
const DEFAULT_STABILITY_SECS: f64 = 2.0;
const DEFAULT_COOLDOWN_SECS: f64 = 10.0;
const DEFAULT_SERIAL_PORT: &str = "stub://rig";
const DEFAULT_BAUD: u32 = 9600;
const DEFAULT_SETTLE_MS: u64 = 2000;
const DEFAULT_OPEN_ATTEMPTS: u32 = 3;
const DEFAULT_OPEN_BACKOFF_MS: u64 = 500;
const DEFAULT_WRITE_ATTEMPTS: u32 = 2;
const DEFAULT_WRITE_BACKOFF_MS: u64 = 20;
const DEFAULT_SHAKE_GAP_MS: u64 = 10;
const DEFAULT_ANIMATE_DELAY_MS: u64 = 1000;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";
const DEFAULT_MIN_CONFIDENCE: f32 = 0.7;
const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Deserialize, Default)]
struct RigConfigFile {
    camera: Option<CameraConfigFile>,
    display: Option<DisplayConfigFile>,
    gesture: Option<GestureConfigFile>,
    actuator: Option<ActuatorConfigFile>,
    detectors: Option<DetectorsConfigFile>,
    capture: Option<CaptureConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    index: Option<u32>,
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    mirror: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct GestureConfigFile {
    stability_secs: Option<f64>,
    cooldown_secs: Option<f64>,
    reset_on_miss: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ActuatorConfigFile {
    port: Option<String>,
    baud: Option<u32>,
    settle_ms: Option<u64>,
    open_attempts: Option<u32>,
    open_backoff_ms: Option<u64>,
    write_attempts: Option<u32>,
    write_backoff_ms: Option<u64>,
    shake_gap_ms: Option<u64>,
    animate_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorsConfigFile {
    face: Option<DetectorConfigFile>,
    hand: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    min_confidence: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    landmark_count: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    output_dir: Option<PathBuf>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct RigConfig {
    pub camera: CameraSettings,
    pub display: DisplaySettings,
    pub gesture: GestureSettings,
    pub actuator: ActuatorSettings,
    pub face: DetectorSettings,
    pub hand: DetectorSettings,
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device path, image directory or `stub://` label.
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Flip frames horizontally before detection.
    pub mirror: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DisplaySettings {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct GestureSettings {
    pub stability: Duration,
    pub cooldown: Duration,
    pub reset_on_miss: bool,
}

#[derive(Debug, Clone)]
pub struct ActuatorSettings {
    pub port: String,
    pub baud: u32,
    /// Wait after opening the port before the first command.
    pub settle: Duration,
    pub open_retry: RetryPolicy,
    pub write_retry: RetryPolicy,
    pub shake_gap: Duration,
    pub animate_delay: Duration,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud: DEFAULT_BAUD,
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            open_retry: RetryPolicy::new(
                DEFAULT_OPEN_ATTEMPTS,
                Duration::from_millis(DEFAULT_OPEN_BACKOFF_MS),
            ),
            write_retry: RetryPolicy::new(
                DEFAULT_WRITE_ATTEMPTS,
                Duration::from_millis(DEFAULT_WRITE_BACKOFF_MS),
            ),
            shake_gap: Duration::from_millis(DEFAULT_SHAKE_GAP_MS),
            animate_delay: Duration::from_millis(DEFAULT_ANIMATE_DELAY_MS),
        }
    }
}

impl ActuatorSettings {
    /// Longest a single SHAKE/RESET/ANIMATE sequence can take: both pauses plus
    /// three writes, each timing out on every attempt.
    pub fn worst_case_actuation(&self) -> Duration {
        let per_write = SERIAL_TIMEOUT * self.write_retry.attempts.max(1)
            + self.write_retry.max_backoff();
        self.shake_gap + self.animate_delay + per_write * 3
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub min_confidence: f32,
    pub input_width: u32,
    pub input_height: u32,
    pub landmark_count: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self::face_defaults()
    }
}

impl DetectorSettings {
    fn face_defaults() -> Self {
        Self {
            backend: DEFAULT_DETECTOR_BACKEND.to_string(),
            model_path: None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            input_width: 192,
            input_height: 192,
            landmark_count: 468,
        }
    }

    fn hand_defaults() -> Self {
        Self {
            input_width: 224,
            input_height: 224,
            landmark_count: 21,
            ..Self::face_defaults()
        }
    }

    fn from_file(file: Option<DetectorConfigFile>, defaults: Self) -> Self {
        let Some(file) = file else {
            return defaults;
        };
        Self {
            backend: file.backend.unwrap_or(defaults.backend),
            model_path: file.model_path.or(defaults.model_path),
            min_confidence: file.min_confidence.unwrap_or(defaults.min_confidence),
            input_width: file.input_width.unwrap_or(defaults.input_width),
            input_height: file.input_height.unwrap_or(defaults.input_height),
            landmark_count: file.landmark_count.unwrap_or(defaults.landmark_count),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub output_dir: PathBuf,
    pub jpeg_quality: u8,
}

impl RigConfig {
    /// Load from `path` (or `RIG_CONFIG`), apply env overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("RIG_CONFIG").ok().map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RigConfigFile) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let index = camera_file.index.unwrap_or(DEFAULT_CAMERA_INDEX);
        let camera = CameraSettings {
            source: camera_file
                .source
                .unwrap_or_else(|| format!("/dev/video{}", index)),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            mirror: camera_file.mirror.unwrap_or(true),
        };

        let display = DisplaySettings {
            width: file
                .display
                .as_ref()
                .and_then(|d| d.width)
                .unwrap_or(DEFAULT_DISPLAY_WIDTH),
            height: file
                .display
                .as_ref()
                .and_then(|d| d.height)
                .unwrap_or(DEFAULT_DISPLAY_HEIGHT),
        };

        let gesture_file = file.gesture.unwrap_or_default();
        let gesture = GestureSettings {
            stability: secs(
                "gesture.stability_secs",
                gesture_file.stability_secs.unwrap_or(DEFAULT_STABILITY_SECS),
            )?,
            cooldown: secs(
                "gesture.cooldown_secs",
                gesture_file.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS),
            )?,
            reset_on_miss: gesture_file.reset_on_miss.unwrap_or(false),
        };

        let act = file.actuator.unwrap_or_default();
        let actuator = ActuatorSettings {
            port: act
                .port
                .unwrap_or_else(|| DEFAULT_SERIAL_PORT.to_string()),
            baud: act.baud.unwrap_or(DEFAULT_BAUD),
            settle: Duration::from_millis(act.settle_ms.unwrap_or(DEFAULT_SETTLE_MS)),
            open_retry: RetryPolicy::new(
                act.open_attempts.unwrap_or(DEFAULT_OPEN_ATTEMPTS),
                Duration::from_millis(act.open_backoff_ms.unwrap_or(DEFAULT_OPEN_BACKOFF_MS)),
            ),
            write_retry: RetryPolicy::new(
                act.write_attempts.unwrap_or(DEFAULT_WRITE_ATTEMPTS),
                Duration::from_millis(act.write_backoff_ms.unwrap_or(DEFAULT_WRITE_BACKOFF_MS)),
            ),
            shake_gap: Duration::from_millis(act.shake_gap_ms.unwrap_or(DEFAULT_SHAKE_GAP_MS)),
            animate_delay: Duration::from_millis(
                act.animate_delay_ms.unwrap_or(DEFAULT_ANIMATE_DELAY_MS),
            ),
        };

        let detectors = file.detectors.unwrap_or_default();
        let face = DetectorSettings::from_file(detectors.face, DetectorSettings::face_defaults());
        let hand = DetectorSettings::from_file(detectors.hand, DetectorSettings::hand_defaults());

        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureSettings {
            output_dir: capture_file
                .output_dir
                .unwrap_or_else(|| PathBuf::from(crate::archive::DEFAULT_OUTPUT_DIR)),
            jpeg_quality: capture_file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        };

        Ok(Self {
            camera,
            display,
            gesture,
            actuator,
            face,
            hand,
            capture,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(camera) = std::env::var("RIG_CAMERA") {
            if !camera.trim().is_empty() {
                self.camera.source = camera;
            }
        }
        if let Ok(port) = std::env::var("RIG_SERIAL_PORT") {
            if !port.trim().is_empty() {
                self.actuator.port = port;
            }
        }
        if let Ok(dir) = std::env::var("RIG_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.capture.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(cooldown) = std::env::var("RIG_COOLDOWN_SECS") {
            let value: f64 = cooldown
                .trim()
                .parse()
                .map_err(|_| anyhow!("RIG_COOLDOWN_SECS must be a number of seconds"))?;
            self.gesture.cooldown = secs("RIG_COOLDOWN_SECS", value)?;
        }
        if let Ok(stability) = std::env::var("RIG_STABILITY_SECS") {
            let value: f64 = stability
                .trim()
                .parse()
                .map_err(|_| anyhow!("RIG_STABILITY_SECS must be a number of seconds"))?;
            self.gesture.stability = secs("RIG_STABILITY_SECS", value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.source.trim().is_empty() {
            return Err(anyhow!("camera source must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(anyhow!("display width and height must be greater than zero"));
        }
        for (name, det) in [("face", &self.face), ("hand", &self.hand)] {
            if !(0.0..=1.0).contains(&det.min_confidence) {
                return Err(anyhow!("detectors.{}.min_confidence must be within 0..=1", name));
            }
            if det.input_width == 0 || det.input_height == 0 || det.landmark_count == 0 {
                return Err(anyhow!("detectors.{} model dimensions must be non-zero", name));
            }
        }
        if self.actuator.port.trim().is_empty() {
            return Err(anyhow!("actuator port must not be empty"));
        }
        if self.actuator.baud == 0 {
            return Err(anyhow!("actuator baud must be greater than zero"));
        }
        if self.actuator.open_retry.attempts == 0 || self.actuator.write_retry.attempts == 0 {
            return Err(anyhow!("retry attempts must be at least 1"));
        }
        // Sequences queue on the link's sequence lock; a cooldown shorter than
        // one sequence would let that queue grow without bound.
        let worst_case = self.actuator.worst_case_actuation();
        if self.gesture.cooldown <= worst_case {
            return Err(anyhow!(
                "gesture cooldown ({:?}) must exceed the worst-case actuation time ({:?})",
                self.gesture.cooldown,
                worst_case
            ));
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(anyhow!("capture.jpeg_quality must be within 1..=100"));
        }
        Ok(())
    }
}

fn secs(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("{} must be a non-negative number of seconds", name));
    }
    Ok(Duration::from_secs_f64(value))
}

fn read_config_file(path: &Path) -> Result<RigConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_rig() -> Result<()> {
        let cfg = RigConfig::from_file(RigConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.camera.source, "/dev/video0");
        assert!(cfg.camera.mirror);
        assert_eq!((cfg.display.width, cfg.display.height), (128, 64));
        assert_eq!(cfg.gesture.stability, Duration::from_secs(2));
        assert_eq!(cfg.gesture.cooldown, Duration::from_secs(10));
        assert!(!cfg.gesture.reset_on_miss);
        assert_eq!(cfg.face.min_confidence, 0.7);
        assert_eq!(cfg.hand.landmark_count, 21);
        assert_eq!(cfg.capture.output_dir, PathBuf::from("captured_images"));
        Ok(())
    }

    #[test]
    fn camera_index_selects_device_node() -> Result<()> {
        let file: RigConfigFile = toml::from_str("[camera]\nindex = 2\n")?;
        let cfg = RigConfig::from_file(file)?;
        assert_eq!(cfg.camera.source, "/dev/video2");
        Ok(())
    }

    #[test]
    fn cooldown_must_outlast_actuation() -> Result<()> {
        let file: RigConfigFile =
            toml::from_str("[gesture]\ncooldown_secs = 0.5\n[actuator]\nanimate_delay_ms = 1000\n")?;
        let cfg = RigConfig::from_file(file)?;
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn worst_case_counts_blocked_writes() -> Result<()> {
        let cfg = RigConfig::from_file(RigConfigFile::default())?;
        // 10ms + 1s pauses, three writes of 2 x 500ms timeouts + 20ms backoff.
        assert_eq!(
            cfg.actuator.worst_case_actuation(),
            Duration::from_millis(4070)
        );

        let file: RigConfigFile = toml::from_str("[gesture]\ncooldown_secs = 1.2\n")?;
        assert!(RigConfig::from_file(file)?.validate().is_err());
        Ok(())
    }

    #[test]
    fn negative_durations_are_rejected() -> Result<()> {
        let file: RigConfigFile = toml::from_str("[gesture]\nstability_secs = -1.0\n")?;
        assert!(RigConfig::from_file(file).is_err());
        Ok(())
    }
}
