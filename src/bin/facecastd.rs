//! facecastd - face detection snapshot daemon
//!
//! This daemon:
//! 1. Loads configuration (FACE_CONFIG file, then FACE_* environment)
//! 2. Opens the detection port on the detector thread (fatal on failure)
//! 3. Publishes one snapshot per tick to the store
//! 4. Serves /healthz, /faces and static files
//! 5. Stops both on SIGINT/SIGTERM

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use facecast::{
    open_port, ApiConfig, ApiServer, DetectorLoop, DetectorLoopConfig, FaceConfig, Shutdown,
    SnapshotStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension). Takes precedence over FACE_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Validate configuration and open the detection port, then exit.
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match args.config.as_deref() {
        Some(path) => FaceConfig::load_from(Some(path))?,
        None => FaceConfig::load()?,
    };
    log::info!(
        "facecastd {} source={} backend={} interval={:?} confidence={}",
        env!("CARGO_PKG_VERSION"),
        config.detector.source,
        config.detector.backend,
        config.detector.interval,
        config.detector.confidence
    );

    if args.check {
        let mut port = open_port(&config.detector)?;
        facecast::DetectionPort::close(&mut port);
        log::info!("configuration ok");
        return Ok(());
    }

    if let Some(dir) = &config.api.static_dir {
        if !dir.exists() {
            log::warn!("static directory {} not found, creating it", dir.display());
            std::fs::create_dir_all(dir)?;
        }
    }

    let store = SnapshotStore::new();
    let shutdown = Shutdown::new();
    shutdown.install_signal_handler()?;

    let detector_settings = config.detector.clone();
    let detector = DetectorLoop::new(
        DetectorLoopConfig::from(&config.detector),
        store.clone(),
        shutdown.clone(),
    )
    .spawn(move || open_port(&detector_settings))?;

    let api = match ApiServer::new(ApiConfig::from(&config.api), store.clone(), shutdown.clone())
        .spawn()
    {
        Ok(api) => api,
        Err(err) => {
            shutdown.trigger();
            detector.join()?;
            return Err(err);
        }
    };
    log::info!("facecastd running. api on {}", api.addr);

    let api_result = api.wait();
    // the server also stops on its own errors; make sure the detector follows
    shutdown.trigger();
    detector.join()?;
    api_result?;
    log::info!("facecastd stopped after {} snapshot(s)", store.version());
    Ok(())
}
