//! Fixed-cadence detector loop.
//!
//! The loop runs on its own thread and owns the detection port from open to
//! close. Each tick it reads one result from the port, filters and clamps it,
//! and publishes a new snapshot to the store. Overrun ticks are dropped so the
//! loop always works on the freshest frame instead of catching up on a backlog.
//!
//! Cancellation is observed only while waiting for the next tick; a cycle that
//! has started always publishes before the loop stops.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;

use crate::detect::{postprocess, DetectionPort, PortReading};
use crate::shutdown::Shutdown;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl DetectorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

#[derive(Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(DetectorState::Starting as u8)))
    }

    fn set(&self, state: DetectorState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    fn get(&self) -> DetectorState {
        DetectorState::from_u8(self.0.load(Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DetectorLoopConfig {
    pub interval: Duration,
    pub confidence: f32,
}

impl Default for DetectorLoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            confidence: 0.5,
        }
    }
}

impl From<&crate::config::DetectorSettings> for DetectorLoopConfig {
    fn from(settings: &crate::config::DetectorSettings) -> Self {
        Self {
            interval: settings.interval,
            confidence: settings.confidence,
        }
    }
}

pub struct DetectorLoop {
    cfg: DetectorLoopConfig,
    store: SnapshotStore,
    shutdown: Shutdown,
}

impl DetectorLoop {
    pub fn new(cfg: DetectorLoopConfig, store: SnapshotStore, shutdown: Shutdown) -> Self {
        Self {
            cfg,
            store,
            shutdown,
        }
    }

    /// Start the loop thread and open the port on it.
    ///
    /// Returns once the port is open. If `open` fails the thread exits and the
    /// error is returned here, so a caller can abort before serving anything.
    pub fn spawn<F, P>(self, open: F) -> Result<DetectorHandle>
    where
        F: FnOnce() -> Result<P> + Send + 'static,
        P: DetectionPort + 'static,
    {
        let state = StateCell::new();
        let thread_state = state.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let join = std::thread::Builder::new()
            .name("facecast-detector".into())
            .spawn(move || {
                let port = match open() {
                    Ok(port) => port,
                    Err(err) => {
                        thread_state.set(DetectorState::Stopped);
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                self.run(port, &thread_state);
            })
            .context("failed to spawn detector thread")?;

        let ready = ready_rx
            .recv()
            .map_err(|_| anyhow!("detector thread exited before opening the detection port"));
        match ready.and_then(|opened| opened) {
            Ok(()) => Ok(DetectorHandle {
                state,
                join: Some(join),
            }),
            Err(err) => {
                let _ = join.join();
                Err(err.context("detector init error"))
            }
        }
    }

    fn run<P: DetectionPort>(self, mut port: P, state: &StateCell) {
        state.set(DetectorState::Running);
        log::info!(
            "detector started (interval={:?}, source={})",
            self.cfg.interval,
            port.label()
        );

        let mut schedule = TickSchedule::new(Instant::now(), self.cfg.interval);
        let mut frame: u64 = 0;
        loop {
            if self.shutdown.wait_timeout(schedule.until_next(Instant::now())) {
                break;
            }
            frame += 1;
            let snapshot = run_cycle(&mut port, frame, self.cfg.confidence);
            log::debug!(
                "detector frame={} faces={} ({}x{})",
                frame,
                snapshot.detections.len(),
                snapshot.frame_width,
                snapshot.frame_height
            );
            self.store.set(snapshot);

            let dropped = schedule.advance(Instant::now());
            if dropped > 0 {
                log::debug!("detector overran its interval; dropped {} tick(s)", dropped);
            }
        }

        state.set(DetectorState::Stopping);
        log::info!("detector stopping after {} frame(s)", frame);
        port.close();
        state.set(DetectorState::Stopped);
    }
}

/// Handle to a running detector thread.
pub struct DetectorHandle {
    state: StateCell,
    join: Option<JoinHandle<()>>,
}

impl DetectorHandle {
    pub fn state(&self) -> DetectorState {
        self.state.get()
    }

    /// Wait for the loop to stop. The loop stops only when shutdown is triggered.
    pub fn join(mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("detector thread panicked"))?;
        }
        Ok(())
    }
}

/// One detect/post-process step. A port error is a transient empty tick.
pub(crate) fn run_cycle<P: DetectionPort + ?Sized>(
    port: &mut P,
    frame: u64,
    confidence: f32,
) -> Snapshot {
    let reading = match port.detect() {
        Ok(reading) => reading,
        Err(err) => {
            log::warn!("detector frame={} produced no reading: {:#}", frame, err);
            PortReading::empty(port.label())
        }
    };
    let detected_at = Utc::now();
    let detections = postprocess::select_detections(
        &reading.detections,
        confidence,
        reading.frame_width,
        reading.frame_height,
        detected_at,
    );
    Snapshot {
        source: reading.source,
        frame,
        frame_width: reading.frame_width,
        frame_height: reading.frame_height,
        detections,
        generated_at: Utc::now(),
    }
}

/// Fixed-interval deadlines that skip, rather than queue, missed ticks.
pub(crate) struct TickSchedule {
    next: Instant,
    interval: Duration,
}

impl TickSchedule {
    pub(crate) fn new(start: Instant, interval: Duration) -> Self {
        Self {
            next: start + interval,
            interval,
        }
    }

    pub(crate) fn until_next(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    /// Move to the first deadline after `now`. Returns how many ticks were skipped.
    pub(crate) fn advance(&mut self, now: Instant) -> u64 {
        self.next += self.interval;
        if self.next > now {
            return 0;
        }
        let interval = self.interval.as_nanos().max(1);
        let skipped = now.duration_since(self.next).as_nanos() / interval + 1;
        let jump = u64::try_from(skipped * interval).unwrap_or(u64::MAX);
        self.next += Duration::from_nanos(jump);
        u64::try_from(skipped).unwrap_or(u64::MAX)
    }
}
