use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::backends::{requires_model, BACKEND_NAMES};

const DEFAULT_SOURCE: &str = "stub://camera0";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_PATH: &str = "models/face_detector.onnx";
const DEFAULT_INTERVAL_MS: u64 = 200;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_INPUT_WIDTH: u32 = 300;
const DEFAULT_INPUT_HEIGHT: u32 = 300;
const DEFAULT_API_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STATIC_DIR: &str = "public";
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;
const DEFAULT_HEADER_READ_TIMEOUT_MS: u64 = 5_000;

/// Environment variables read by `FaceConfig::load`.
pub const ENV_KEYS: &[&str] = &[
    "FACE_CONFIG",
    "FACE_SOURCE",
    "FACE_BACKEND",
    "FACE_MODEL",
    "FACE_INTERVAL",
    "FACE_CONF",
    "FACE_INPUT_W",
    "FACE_INPUT_H",
    "FACE_ADDR",
    "FACE_STATIC",
    "FACE_SHUTDOWN_GRACE",
    "FACE_HEADER_TIMEOUT",
];

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FaceConfigFile {
    detector: Option<DetectorConfigFile>,
    api: Option<ApiConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    source: Option<String>,
    backend: Option<String>,
    model_path: Option<PathBuf>,
    interval_ms: Option<u64>,
    confidence: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ApiConfigFile {
    addr: Option<String>,
    static_dir: Option<PathBuf>,
    shutdown_grace_ms: Option<u64>,
    header_read_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FaceConfig {
    pub detector: DetectorSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// `stub://<name>`, a camera index, a network URL, or a file path.
    pub source: String,
    pub backend: String,
    pub model_path: PathBuf,
    pub interval: Duration,
    pub confidence: f32,
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            backend: DEFAULT_BACKEND.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            confidence: DEFAULT_CONFIDENCE,
            input_width: DEFAULT_INPUT_WIDTH,
            input_height: DEFAULT_INPUT_HEIGHT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub addr: String,
    /// Directory served for paths other than the API routes.
    pub static_dir: Option<PathBuf>,
    pub shutdown_grace: Duration,
    /// Connections that have not sent complete request headers by then are closed.
    pub header_read_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_API_ADDR.to_string(),
            static_dir: Some(PathBuf::from(DEFAULT_STATIC_DIR)),
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
            header_read_timeout: Duration::from_millis(DEFAULT_HEADER_READ_TIMEOUT_MS),
        }
    }
}

impl FaceConfig {
    /// Defaults, then the file named by `FACE_CONFIG`, then `FACE_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FACE_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => FaceConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FaceConfigFile) -> Self {
        let detector_defaults = DetectorSettings::default();
        let api_defaults = ApiSettings::default();
        let det = file.detector.unwrap_or_default();
        let api = file.api.unwrap_or_default();
        Self {
            detector: DetectorSettings {
                source: det.source.unwrap_or(detector_defaults.source),
                backend: det.backend.unwrap_or(detector_defaults.backend),
                model_path: det.model_path.unwrap_or(detector_defaults.model_path),
                interval: det
                    .interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(detector_defaults.interval),
                confidence: det.confidence.unwrap_or(detector_defaults.confidence),
                input_width: det.input_width.unwrap_or(detector_defaults.input_width),
                input_height: det.input_height.unwrap_or(detector_defaults.input_height),
            },
            api: ApiSettings {
                addr: api.addr.unwrap_or(api_defaults.addr),
                static_dir: api.static_dir.or(api_defaults.static_dir),
                shutdown_grace: api
                    .shutdown_grace_ms
                    .map(Duration::from_millis)
                    .unwrap_or(api_defaults.shutdown_grace),
                header_read_timeout: api
                    .header_read_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(api_defaults.header_read_timeout),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(source) = env_value("FACE_SOURCE") {
            self.detector.source = source;
        }
        if let Some(backend) = env_value("FACE_BACKEND") {
            self.detector.backend = backend;
        }
        if let Some(model) = env_value("FACE_MODEL") {
            self.detector.model_path = PathBuf::from(model);
        }
        if let Some(interval) = env_value("FACE_INTERVAL") {
            self.detector.interval = parse_duration(&interval)
                .with_context(|| format!("FACE_INTERVAL has an invalid duration: {interval}"))?;
        }
        if let Some(conf) = env_value("FACE_CONF") {
            self.detector.confidence = conf
                .parse()
                .map_err(|_| anyhow!("FACE_CONF must be a number between 0 and 1"))?;
        }
        if let Some(width) = env_value("FACE_INPUT_W") {
            self.detector.input_width = width
                .parse()
                .map_err(|_| anyhow!("FACE_INPUT_W must be a positive integer"))?;
        }
        if let Some(height) = env_value("FACE_INPUT_H") {
            self.detector.input_height = height
                .parse()
                .map_err(|_| anyhow!("FACE_INPUT_H must be a positive integer"))?;
        }
        if let Some(addr) = env_value("FACE_ADDR") {
            self.api.addr = addr;
        }
        if let Some(dir) = env_value("FACE_STATIC") {
            self.api.static_dir = Some(PathBuf::from(dir));
        }
        if let Some(grace) = env_value("FACE_SHUTDOWN_GRACE") {
            self.api.shutdown_grace = parse_duration(&grace)
                .with_context(|| format!("FACE_SHUTDOWN_GRACE has an invalid duration: {grace}"))?;
        }
        if let Some(timeout) = env_value("FACE_HEADER_TIMEOUT") {
            self.api.header_read_timeout = parse_duration(&timeout).with_context(|| {
                format!("FACE_HEADER_TIMEOUT has an invalid duration: {timeout}")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let det = &self.detector;
        if !(0.0..=1.0).contains(&det.confidence) {
            return Err(anyhow!(
                "confidence threshold must be within [0, 1], got {}",
                det.confidence
            ));
        }
        if det.interval.is_zero() {
            return Err(anyhow!("detection interval must be greater than zero"));
        }
        if det.input_width == 0 || det.input_height == 0 {
            return Err(anyhow!("model input geometry must be non-zero"));
        }
        if !BACKEND_NAMES.contains(&det.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of {:?})",
                det.backend,
                BACKEND_NAMES
            ));
        }
        if requires_model(&det.backend) && !det.model_path.is_file() {
            return Err(anyhow!(
                "model artifact not found: {} (set FACE_MODEL)",
                det.model_path.display()
            ));
        }
        if self.api.shutdown_grace.is_zero() {
            return Err(anyhow!("shutdown grace period must be greater than zero"));
        }
        if self.api.header_read_timeout.is_zero() {
            return Err(anyhow!("header read timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Parse `250ms`, `2s`, `1.5s`, `1m`, or a bare number of milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let (number, unit_nanos) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1e6)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1e9)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 60e9)
    } else {
        (value, 1e6)
    };
    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| anyhow!("'{}' is not a duration", value))?;
    let nanos = (number * unit_nanos).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return Err(anyhow!("'{}' is not a valid duration", value));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path) -> Result<FaceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    }
}
