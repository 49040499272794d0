//! Keep-alive heartbeat for a bound consumer.

use crate::consumer::SessionConsumer;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, warn};

/// Periodic liveness probe bound to one consumer.
///
/// The service owns a single background task that invokes
/// [`SessionConsumer::keep_alive`] at a fixed interval, sleeping to an
/// absolute deadline between beats so the cadence does not drift with
/// callback latency. The task terminates on its own when the callback
/// fails or the consumer has been dropped; at most one task exists per
/// service instance.
///
/// The heartbeat runs outside the session's execution lock, so a consumer
/// reacting to a beat by re-entering the session cannot deadlock.
pub struct KeepAliveService {
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl KeepAliveService {
    /// Spawn a heartbeat task for the given consumer.
    ///
    /// The first beat fires immediately, subsequent beats every
    /// `interval`.
    pub fn start(consumer: Weak<dyn SessionConsumer>, interval: Duration) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(heartbeat(
            consumer,
            interval,
            Arc::clone(&stopped),
            Arc::clone(&wake),
        ));
        Self {
            stopped,
            wake,
            task,
        }
    }

    /// Request termination without waiting for the task to finish.
    ///
    /// Wakes a sleeping task immediately; safe to call from any task, any
    /// number of times. A beat already past the stop check may still
    /// complete, but no new cycle starts after this returns; use
    /// [`KeepAliveService::shutdown`] to wait that last beat out.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Stop the heartbeat and wait for its task to finish.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(err) = self.task.await
            && !err.is_cancelled()
        {
            error!(?err, "keep-alive task failed");
        }
    }

    /// Whether the background task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

async fn heartbeat(
    consumer: Weak<dyn SessionConsumer>,
    interval: Duration,
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
) {
    let mut deadline = Instant::now();
    loop {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        let Some(consumer) = consumer.upgrade() else {
            warn!("keep-alive consumer is gone, stopping heartbeat");
            break;
        };
        debug!("sending keep-alive");
        if let Err(err) = consumer.keep_alive() {
            error!(%err, "keep-alive callback failed, stopping heartbeat");
            break;
        }
        drop(consumer);

        deadline += interval;
        tokio::select! {
            _ = sleep_until(deadline) => {}
            _ = wake.notified() => break,
        }
    }
}
