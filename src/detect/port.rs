use anyhow::{anyhow, Context, Result};

use crate::config::DetectorSettings;
use crate::detect::backend::InferenceBackend;
use crate::detect::backends::open_backend;
use crate::detect::result::PortReading;
use crate::ingest::{open_source, FrameSource};

/// Capability boundary over the frame source and inference resources.
///
/// A port is owned by exactly one detector loop for its whole life. `detect`
/// performs at most one frame-read attempt; when no frame is available it
/// returns an empty reading rather than waiting.
pub trait DetectionPort {
    /// Source label reported in snapshots.
    fn label(&self) -> &str;

    /// Read one frame and run inference on it.
    fn detect(&mut self) -> Result<PortReading>;

    /// Release capture and inference resources. Must be idempotent.
    fn close(&mut self);
}

impl<T: DetectionPort + ?Sized> DetectionPort for Box<T> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn detect(&mut self) -> Result<PortReading> {
        (**self).detect()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Port built from one frame source and one inference backend.
pub struct SsdPort {
    label: String,
    source: Option<Box<dyn FrameSource>>,
    backend: Option<Box<dyn InferenceBackend>>,
}

impl SsdPort {
    pub fn new(
        label: impl Into<String>,
        source: Box<dyn FrameSource>,
        backend: Box<dyn InferenceBackend>,
    ) -> Self {
        Self {
            label: label.into(),
            source: Some(source),
            backend: Some(backend),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none() && self.backend.is_none()
    }
}

impl DetectionPort for SsdPort {
    fn label(&self) -> &str {
        &self.label
    }

    fn detect(&mut self) -> Result<PortReading> {
        let (Some(source), Some(backend)) = (self.source.as_mut(), self.backend.as_mut()) else {
            return Err(anyhow!("detection port {} is closed", self.label));
        };

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(PortReading::empty(&self.label)),
            Err(err) => {
                log::warn!("frame read failed on {}: {:#}", self.label, err);
                return Ok(PortReading::empty(&self.label));
            }
        };

        let detections = match backend.infer(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("{} inference failed: {:#}", backend.name(), err);
                Vec::new()
            }
        };

        Ok(PortReading {
            source: self.label.clone(),
            detections,
            frame_width: frame.width,
            frame_height: frame.height,
        })
    }

    fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        if let Some(mut backend) = self.backend.take() {
            backend.close();
        }
    }
}

impl Drop for SsdPort {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open the source and backend named in `settings`.
///
/// Any failure here is a startup precondition failure; the source is released
/// again if the backend cannot be loaded.
pub fn open_port(settings: &DetectorSettings) -> Result<SsdPort> {
    let mut source = open_source(&settings.source)
        .with_context(|| format!("failed to open video source {}", settings.source))?;
    let mut backend = match open_backend(settings) {
        Ok(backend) => backend,
        Err(err) => {
            source.close();
            return Err(err.context(format!("failed to load {} backend", settings.backend)));
        }
    };
    if let Err(err) = backend.warm_up() {
        source.close();
        backend.close();
        return Err(err.context(format!("{} backend warm-up failed", backend.name())));
    }
    log::info!(
        "detection port open (source={}, backend={})",
        settings.source,
        backend.name()
    );
    Ok(SsdPort::new(settings.source.clone(), source, backend))
}
