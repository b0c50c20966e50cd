use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ClientError;
use crate::types::Message;

/// Fetch/deliver pair driven by the focus poller.
#[async_trait]
pub trait PollSink: Send + Sync {
    /// Fetch the latest server-side messages for the conversation.
    async fn poll_once(&self) -> Result<Vec<Message>, ClientError>;

    /// Deliver a successful poll result.
    async fn ingest(&self, batch: Vec<Message>);
}

#[derive(Debug)]
struct RunningPoll {
    stop: CancellationToken,
    _task: JoinHandle<()>,
}

/// Focus-driven polling scheduler: `idle -> active` on focus, back on blur.
///
/// While active it ticks on a fixed interval with an immediate first tick.
/// Ticks are strictly sequential, so a slow fetch can never overlap the
/// next one. Tick failures are dropped silently and the schedule continues.
/// `stop()` does not abort an in-flight fetch; its result is discarded.
#[derive(Debug)]
pub struct FocusPoller {
    interval: Duration,
    running: Mutex<Option<RunningPoll>>,
}

impl FocusPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.running.lock().expect("poller lock poisoned").is_some()
    }

    /// Transition to `active`. No-op when already active.
    pub fn start(&self, sink: Arc<dyn PollSink>) {
        let mut running = self.running.lock().expect("poller lock poisoned");
        if running.is_some() {
            debug!("focus poller already active");
            return;
        }

        let stop = CancellationToken::new();
        let task = tokio::spawn(run_loop(self.interval, stop.clone(), sink));
        *running = Some(RunningPoll { stop, _task: task });
    }

    /// Transition to `idle`. An in-flight tick completes but is ignored.
    pub fn stop(&self) {
        let mut running = self.running.lock().expect("poller lock poisoned");
        if let Some(poll) = running.take() {
            poll.stop.cancel();
        }
    }
}

impl Drop for FocusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(interval: Duration, stop: CancellationToken, sink: Arc<dyn PollSink>) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let batch = match sink.poll_once().await {
            Ok(batch) => batch,
            Err(err) => {
                debug!(error = %err, "poll tick failed, dropping");
                continue;
            }
        };

        // The scheduler may have gone idle while the fetch was in flight.
        if stop.is_cancelled() {
            break;
        }

        sink.ingest(batch).await;
    }
}
