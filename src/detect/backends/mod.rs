pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;
use crate::detect::backend::InferenceBackend;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

/// Backend names accepted in configuration.
pub const BACKEND_NAMES: &[&str] = &["stub", "tract"];

/// Whether the named backend loads a model artifact from disk.
pub fn requires_model(name: &str) -> bool {
    name == "tract"
}

/// Open the configured backend. Failure here is a startup error.
pub fn open_backend(settings: &DetectorSettings) -> Result<Box<dyn InferenceBackend>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        "tract" => open_tract(settings),
        other => Err(anyhow!(
            "unknown detector backend '{}' (expected one of {:?})",
            other,
            BACKEND_NAMES
        )),
    }
}

#[cfg(feature = "backend-tract")]
fn open_tract(settings: &DetectorSettings) -> Result<Box<dyn InferenceBackend>> {
    Ok(Box::new(TractBackend::new(
        &settings.model_path,
        settings.input_width,
        settings.input_height,
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn open_tract(_settings: &DetectorSettings) -> Result<Box<dyn InferenceBackend>> {
    Err(anyhow!("tract backend requires the backend-tract feature"))
}
