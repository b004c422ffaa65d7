//! Supervised fire-and-forget tasks.
//!
//! The document update and form extraction steps must never delay or fail the
//! user-facing reply, but bare `tokio::spawn` leaves them untestable and
//! unkillable. Tasks spawned here carry their own timeout, are cancelled on
//! session reset, log their outcome, and can be awaited to quiescence from
//! tests.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct BackgroundTasks {
    gate: Mutex<CancellationToken>,
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    timeout: Duration,
}

impl BackgroundTasks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            gate: Mutex::new(CancellationToken::new()),
            active: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            timeout,
        }
    }

    /// Spawn a supervised task. The caller never awaits it; the outcome is
    /// logged under `label`.
    pub async fn spawn<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let cancel = self.gate.lock().await.clone();
        let active = self.active.clone();
        let idle = self.idle.clone();
        let timeout = self.timeout;

        active.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(anyhow::anyhow!("cancelled")),
                res = tokio::time::timeout(timeout, fut) => match res {
                    Ok(inner) => inner,
                    Err(_) => Err(anyhow::anyhow!("timed out after {timeout:?}")),
                },
            };

            match outcome {
                Ok(()) => debug!(label, "Background task finished"),
                Err(e) => warn!(label, %e, "Background task failed"),
            }

            if active.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });
    }

    /// Cancel everything in flight. New tasks spawned afterwards run normally.
    pub async fn cancel_pending(&self) {
        let mut gate = self.gate.lock().await;
        gate.cancel();
        *gate = CancellationToken::new();
    }

    /// Wait until no spawned task is running. Test hook.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
