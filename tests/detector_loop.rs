use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use facecast::{
    open_port, ApiConfig, ApiServer, DetectionPort, DetectorLoop, DetectorLoopConfig,
    DetectorSettings, DetectorState, PortReading, RawDetection, Shutdown, SnapshotStore,
};

#[derive(Clone, Default)]
struct PortCounters {
    detects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    in_cycle: Arc<AtomicBool>,
}

struct ScriptedPort {
    counters: PortCounters,
    cycle_time: Duration,
}

impl DetectionPort for ScriptedPort {
    fn label(&self) -> &str {
        "scripted://front"
    }

    fn detect(&mut self) -> Result<PortReading> {
        self.counters.in_cycle.store(true, Ordering::SeqCst);
        std::thread::sleep(self.cycle_time);
        let n = self.counters.detects.fetch_add(1, Ordering::SeqCst);
        self.counters.in_cycle.store(false, Ordering::SeqCst);
        if n % 3 == 2 {
            return Err(anyhow!("transient read failure"));
        }
        Ok(PortReading {
            source: self.label().to_string(),
            detections: vec![
                RawDetection::new(0.95, 0.1, 0.1, 0.4, 0.5),
                RawDetection::new(0.2, 0.5, 0.5, 0.6, 0.6),
            ],
            frame_width: 320,
            frame_height: 240,
        })
    }

    fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_for(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

fn loop_config(interval_ms: u64) -> DetectorLoopConfig {
    DetectorLoopConfig {
        interval: Duration::from_millis(interval_ms),
        confidence: 0.5,
    }
}

#[test]
fn publishes_each_tick_and_closes_port_on_shutdown() {
    let store = SnapshotStore::new();
    let shutdown = Shutdown::new();
    let counters = PortCounters::default();
    let port_counters = counters.clone();

    let handle = DetectorLoop::new(loop_config(10), store.clone(), shutdown.clone())
        .spawn(move || {
            Ok(ScriptedPort {
                counters: port_counters,
                cycle_time: Duration::ZERO,
            })
        })
        .expect("spawn detector");

    assert!(wait_for(Duration::from_secs(5), || store.version() >= 4));
    assert_eq!(handle.state(), DetectorState::Running);

    let (snapshot, version) = store.get();
    assert!(version >= 4);
    assert!(snapshot.frame >= 1);
    assert_eq!(snapshot.source, "scripted://front");
    // every third tick fails and publishes an empty snapshot
    if !snapshot.detections.is_empty() {
        assert_eq!(snapshot.detections.len(), 1);
        assert_eq!(snapshot.detections[0].id, 0);
        assert_eq!((snapshot.frame_width, snapshot.frame_height), (320, 240));
    }

    shutdown.trigger();
    handle.join().expect("detector joined");
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

    // nothing is published after stop
    let stopped_at = store.version();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(store.version(), stopped_at);
}

#[test]
fn frame_numbers_increase_by_one_per_tick() {
    let store = SnapshotStore::new();
    let shutdown = Shutdown::new();
    let counters = PortCounters::default();
    let port_counters = counters.clone();

    let handle = DetectorLoop::new(loop_config(5), store.clone(), shutdown.clone())
        .spawn(move || {
            Ok(ScriptedPort {
                counters: port_counters,
                cycle_time: Duration::ZERO,
            })
        })
        .expect("spawn detector");

    assert!(wait_for(Duration::from_secs(5), || store.version() >= 3));
    shutdown.trigger();
    handle.join().expect("detector joined");

    let (snapshot, version) = store.get();
    assert_eq!(snapshot.frame, version);
    assert_eq!(counters.detects.load(Ordering::SeqCst) as u64, version);
}

#[test]
fn open_failure_is_returned_from_spawn() {
    let store = SnapshotStore::new();
    let err = DetectorLoop::new(loop_config(10), store.clone(), Shutdown::new())
        .spawn(|| -> Result<ScriptedPort> { Err(anyhow!("camera index 7 not present")) })
        .err()
        .expect("spawn must fail");
    let msg = format!("{err:#}");
    assert!(msg.contains("detector init error"));
    assert!(msg.contains("camera index 7"));
    assert_eq!(store.version(), 0);
}

#[test]
fn shutdown_before_first_tick_publishes_nothing() {
    let store = SnapshotStore::new();
    let shutdown = Shutdown::new();
    let counters = PortCounters::default();
    let port_counters = counters.clone();

    let handle = DetectorLoop::new(loop_config(10_000), store.clone(), shutdown.clone())
        .spawn(move || {
            Ok(ScriptedPort {
                counters: port_counters,
                cycle_time: Duration::ZERO,
            })
        })
        .expect("spawn detector");

    let started = Instant::now();
    shutdown.trigger();
    handle.join().expect("detector joined");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(store.version(), 0);
    assert_eq!(counters.detects.load(Ordering::SeqCst), 0);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn stub_port_runs_end_to_end() {
    let settings = DetectorSettings {
        interval: Duration::from_millis(10),
        ..DetectorSettings::default()
    };
    let store = SnapshotStore::new();
    let shutdown = Shutdown::new();
    let handle = DetectorLoop::new(
        DetectorLoopConfig::from(&settings),
        store.clone(),
        shutdown.clone(),
    )
    .spawn(move || open_port(&settings))
    .expect("spawn detector");

    assert!(wait_for(Duration::from_secs(5), || store.version() >= 2));
    shutdown.trigger();
    handle.join().expect("detector joined");

    let (snapshot, _) = store.get();
    assert_eq!(snapshot.source, "stub://camera0");
    assert_eq!((snapshot.frame_width, snapshot.frame_height), (640, 480));
    for detection in &snapshot.detections {
        assert!(detection.score >= 0.5);
        assert!(detection.bbox.x >= 0 && detection.bbox.right() <= 640);
        assert!(detection.bbox.y >= 0 && detection.bbox.bottom() <= 480);
    }
}

#[test]
fn healthz_answers_while_detector_is_mid_cycle() {
    let store = SnapshotStore::new();
    let shutdown = Shutdown::new();
    let counters = PortCounters::default();
    let port_counters = counters.clone();

    let detector = DetectorLoop::new(loop_config(1), store.clone(), shutdown.clone())
        .spawn(move || {
            Ok(ScriptedPort {
                counters: port_counters,
                cycle_time: Duration::from_millis(500),
            })
        })
        .expect("spawn detector");
    let api = ApiServer::new(
        ApiConfig {
            addr: "127.0.0.1:0".to_string(),
            ..ApiConfig::default()
        },
        store,
        shutdown.clone(),
    )
    .spawn()
    .expect("spawn api");

    assert!(wait_for(Duration::from_secs(5), || counters
        .in_cycle
        .load(Ordering::SeqCst)));

    let started = Instant::now();
    let mut stream = TcpStream::connect(api.addr).expect("connect");
    stream
        .write_all(b"GET /healthz HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
        .expect("write");
    let mut raw = String::new();
    stream.read_to_string(&mut raw).expect("read");
    assert!(raw.starts_with("HTTP/1.1 200"));
    assert!(raw.ends_with("ok"));
    assert!(started.elapsed() < Duration::from_millis(400));

    shutdown.trigger();
    api.wait().expect("api stopped");
    detector.join().expect("detector joined");
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}
