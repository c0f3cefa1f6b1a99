//! Process-wide cancellation signal.
//!
//! One `Shutdown` is shared by the detector thread and the HTTP runtime. The
//! detector observes it at its timer wait (`wait_timeout`), the HTTP server as
//! its graceful-shutdown future (`wait`). Triggering is one-way.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    triggered: Mutex<bool>,
    cvar: Condvar,
    notify: Notify,
}

#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route SIGINT/SIGTERM to `trigger`. Can only be installed once per process.
    pub fn install_signal_handler(&self) -> Result<()> {
        let shutdown = self.clone();
        ctrlc::set_handler(move || {
            log::info!("shutdown signal received");
            shutdown.trigger();
        })
        .context("error setting termination signal handler")
    }

    pub fn trigger(&self) {
        let mut triggered = self.inner.triggered.lock().unwrap_or_else(|e| e.into_inner());
        if !*triggered {
            *triggered = true;
            self.inner.cvar.notify_all();
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.triggered.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block for up to `timeout`. Returns true if shutdown was triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let triggered = self.inner.triggered.lock().unwrap_or_else(|e| e.into_inner());
        let (triggered, _) = self
            .inner
            .cvar
            .wait_timeout_while(triggered, timeout, |triggered| !*triggered)
            .unwrap_or_else(|e| e.into_inner());
        *triggered
    }

    /// Resolve once shutdown has been triggered.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_timeout_elapses_without_trigger() {
        let shutdown = Shutdown::new();
        let started = Instant::now();
        assert!(!shutdown.wait_timeout(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn trigger_wakes_blocked_waiter() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            thread::spawn(move || shutdown.wait_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        assert!(waiter.join().unwrap());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn already_triggered_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.wait_timeout(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn async_wait_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let waiter = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.wait().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter finished")
            .unwrap();

        // late waiters resolve immediately
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("already triggered");
    }
}
