use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use facecast::config::{FaceConfig, ENV_KEYS};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = FaceConfig::load().expect("load defaults");
    assert_eq!(cfg.detector.source, "stub://camera0");
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.detector.interval, Duration::from_millis(200));
    assert_eq!(cfg.detector.confidence, 0.5);
    assert_eq!((cfg.detector.input_width, cfg.detector.input_height), (300, 300));
    assert_eq!(cfg.api.addr, "0.0.0.0:8080");
    assert_eq!(cfg.api.static_dir, Some(PathBuf::from("public")));
    assert_eq!(cfg.api.shutdown_grace, Duration::from_secs(5));
    assert_eq!(cfg.api.header_read_timeout, Duration::from_secs(5));
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "detector": {
            "source": "stub://lobby",
            "interval_ms": 500,
            "confidence": 0.7,
            "input_width": 320,
            "input_height": 240
        },
        "api": {
            "addr": "127.0.0.1:9100",
            "static_dir": "/srv/faces",
            "shutdown_grace_ms": 2000,
            "header_read_timeout_ms": 1500
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FACE_CONFIG", file.path());
    std::env::set_var("FACE_CONF", "0.8");
    std::env::set_var("FACE_INTERVAL", "1.5s");
    std::env::set_var("FACE_HEADER_TIMEOUT", "750ms");

    let cfg = FaceConfig::load().expect("load config");
    clear_env();

    assert_eq!(cfg.detector.source, "stub://lobby");
    assert_eq!(cfg.detector.confidence, 0.8);
    assert_eq!(cfg.detector.interval, Duration::from_millis(1500));
    assert_eq!((cfg.detector.input_width, cfg.detector.input_height), (320, 240));
    assert_eq!(cfg.api.addr, "127.0.0.1:9100");
    assert_eq!(cfg.api.static_dir, Some(PathBuf::from("/srv/faces")));
    assert_eq!(cfg.api.shutdown_grace, Duration::from_secs(2));
    assert_eq!(cfg.api.header_read_timeout, Duration::from_millis(750));
}

#[test]
fn loads_toml_file_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp toml");
    let toml = r#"
[detector]
source = "stub://dock"
interval_ms = 250

[api]
addr = "127.0.0.1:0"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = FaceConfig::load_from(Some(file.path())).expect("load toml");
    assert_eq!(cfg.detector.source, "stub://dock");
    assert_eq!(cfg.detector.interval, Duration::from_millis(250));
    assert_eq!(cfg.api.addr, "127.0.0.1:0");
    assert_eq!(cfg.detector.confidence, 0.5);
}

#[test]
fn unknown_file_keys_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"detector": {"fps": 30}}"#).expect("write config");

    let err = FaceConfig::load_from(Some(file.path())).expect_err("unknown key");
    assert!(err.to_string().contains("invalid config file"));
}

#[test]
fn invalid_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FACE_CONF", "high");
    let err = FaceConfig::load().expect_err("non-numeric confidence");
    assert!(err.to_string().contains("FACE_CONF"));
    clear_env();

    std::env::set_var("FACE_CONF", "1.2");
    assert!(FaceConfig::load().is_err());
    clear_env();

    std::env::set_var("FACE_INTERVAL", "0ms");
    assert!(FaceConfig::load().is_err());
    clear_env();

    std::env::set_var("FACE_HEADER_TIMEOUT", "0s");
    let err = FaceConfig::load().expect_err("zero header timeout");
    assert!(err.to_string().contains("header read timeout"));
    clear_env();

    std::env::set_var("FACE_BACKEND", "dnn-cuda");
    let err = FaceConfig::load().expect_err("unknown backend");
    assert!(err.to_string().contains("unknown detector backend"));
    clear_env();
}

#[test]
fn tract_backend_needs_model_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FACE_BACKEND", "tract");
    std::env::set_var("FACE_MODEL", "/nonexistent/face_detector.onnx");
    let err = FaceConfig::load().expect_err("missing model");
    assert!(err.to_string().contains("model artifact not found"));

    let model = NamedTempFile::new().expect("temp model");
    std::env::set_var("FACE_MODEL", model.path());
    let cfg = FaceConfig::load().expect("model present");
    assert_eq!(cfg.detector.model_path, model.path());
    clear_env();
}
