//! Elapsed-time progress reporting for long waits.
//!
//! A [`TickerHandle`] owns a background task that ticks a [`ProgressReporter`]
//! at a fixed interval. The task runs until [`TickerHandle::stop`] cancels and
//! joins it; dropping the handle without stopping only cancels.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const LINE_WIDTH: usize = 90;

/// Receives progress updates while a wait is in flight.
pub trait ProgressReporter: Send + Sync {
    /// Called once per tick with the time elapsed since the wait started.
    fn tick(&self, elapsed: Duration);

    /// Called exactly once, from the ticker task, when the ticker stops.
    fn finish(&self) {}
}

/// Writes a single self-overwriting status line to stderr.
#[derive(Debug, Clone)]
pub struct ConsoleProgress {
    prefix: String,
}

impl ConsoleProgress {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new("     ")
    }
}

impl ProgressReporter for ConsoleProgress {
    fn tick(&self, elapsed: Duration) {
        let line = format!("{} waiting... {:.1}s", self.prefix, elapsed.as_secs_f64());
        let mut err = io::stderr().lock();
        let _ = write!(err, "{:<width$}\r", line, width = LINE_WIDTH);
        let _ = err.flush();
    }

    fn finish(&self) {
        let mut err = io::stderr().lock();
        let _ = write!(err, "{:<width$}\r", "", width = LINE_WIDTH);
        let _ = err.flush();
    }
}

/// Handle to a running progress ticker.
pub struct TickerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// Spawns the ticker on the current tokio runtime.
    ///
    /// `started_at` is the reference point for the reported elapsed time.
    pub fn start(
        reporter: Arc<dyn ProgressReporter>,
        started_at: Instant,
        interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticks.tick() => reporter.tick(started_at.elapsed()),
                }
            }
            reporter.finish();
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Cancels the ticker and waits for its task to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("progress ticker ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        ticks: AtomicUsize,
        finished: AtomicBool,
    }

    impl ProgressReporter for Counting {
        fn tick(&self, _elapsed: Duration) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }

        fn finish(&self) {
            self.finished.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn stop_joins_the_ticker() {
        let reporter = Arc::new(Counting::default());
        let handle = TickerHandle::start(
            reporter.clone(),
            Instant::now(),
            Duration::from_millis(5),
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.stop().await;

        assert!(reporter.finished.load(Ordering::SeqCst));
        let ticks = reporter.ticks.load(Ordering::SeqCst);
        assert!(ticks >= 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(reporter.ticks.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels_the_ticker() {
        let reporter = Arc::new(Counting::default());
        let handle = TickerHandle::start(
            reporter.clone(),
            Instant::now(),
            Duration::from_millis(5),
        );
        drop(handle);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(reporter.finished.load(Ordering::SeqCst));
    }
}
