mod backend;
mod backends;

use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;

pub use backend::{DetectorKind, LandmarkDetector};
pub use backends::ScriptedDetector;

#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;

/// Build the detector backend named in `settings`.
pub fn build_detector(
    kind: DetectorKind,
    settings: &DetectorSettings,
) -> Result<Box<dyn LandmarkDetector>> {
    match settings.backend.as_str() {
        "stub" => {
            log::warn!(
                "{:?} detector uses the stub backend; no landmarks will be reported",
                kind
            );
            Ok(Box::new(
                ScriptedDetector::new(kind).with_min_confidence(settings.min_confidence),
            ))
        }
        "tract" => build_tract(kind, settings),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(kind: DetectorKind, settings: &DetectorSettings) -> Result<Box<dyn LandmarkDetector>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("{:?} detector: tract backend requires model_path", kind))?;
    let detector = TractDetector::new(
        kind,
        model_path,
        settings.input_width,
        settings.input_height,
        settings.landmark_count,
    )?
    .with_threshold(settings.min_confidence);
    Ok(Box::new(detector))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(kind: DetectorKind, _settings: &DetectorSettings) -> Result<Box<dyn LandmarkDetector>> {
    Err(anyhow!(
        "{:?} detector: tract backend requires the backend-tract feature",
        kind
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_stub_and_rejects_unknown() -> Result<()> {
        let mut settings = DetectorSettings::default();
        let detector = build_detector(DetectorKind::Hand, &settings)?;
        assert_eq!(detector.name(), "stub");
        assert_eq!(detector.kind(), DetectorKind::Hand);

        settings.backend = "mystery".to_string();
        assert!(build_detector(DetectorKind::Hand, &settings).is_err());
        Ok(())
    }
}
