//! Retention Scheduler
//!
//! Runs eviction passes on a fixed interval and, debounced, after directory
//! changes. A failed pass is logged and counted; it never stops the loop or
//! cancels future passes.

use std::future::pending;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::RetentionTarget;

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Cap handed to every eviction pass
    pub max_files: usize,
    /// Period of the unconditional pass
    pub interval: Duration,
    /// Quiet time required after the last change before a pass
    pub debounce: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_files: 10_000,
            interval: Duration::from_secs(15 * 60),
            debounce: Duration::from_secs(10),
        }
    }
}

/// What started an eviction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Periodic,
    Debounced,
}

/// Counters since the scheduler started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionStats {
    pub periodic_passes: u64,
    pub debounced_passes: u64,
    pub evicted: u64,
    pub failures: u64,
}

/// Debounce state. Changes that arrive while a pass is being awaited wait in
/// the channel and re-arm the deadline afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Debounce {
    Idle,
    Pending(Instant),
}

impl Debounce {
    fn deadline(&self) -> Option<Instant> {
        match self {
            Debounce::Idle => None,
            Debounce::Pending(deadline) => Some(*deadline),
        }
    }
}

pub struct RetentionScheduler<T> {
    target: Arc<T>,
    config: RetentionConfig,
    stats: Arc<Mutex<RetentionStats>>,
    debounce: Debounce,
}

impl<T: RetentionTarget + 'static> RetentionScheduler<T> {
    pub fn new(target: Arc<T>, config: RetentionConfig) -> Self {
        Self {
            target,
            config,
            stats: Arc::new(Mutex::new(RetentionStats::default())),
            debounce: Debounce::Idle,
        }
    }

    /// Start the loop on the current runtime.
    ///
    /// `changes` carries one `()` per directory change. When its sender side
    /// closes, the scheduler keeps running on the interval alone.
    pub fn spawn(self, changes: mpsc::Receiver<()>) -> RetentionHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stats = self.stats.clone();
        let task = tokio::spawn(self.run(changes, shutdown_rx));

        RetentionHandle {
            shutdown: shutdown_tx,
            task,
            stats,
        }
    }

    async fn run(mut self, mut changes: mpsc::Receiver<()>, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut changes_open = true;

        tracing::info!(
            max_files = self.config.max_files,
            interval_ms = self.config.interval.as_millis() as u64,
            debounce_ms = self.config.debounce.as_millis() as u64,
            "Retention scheduler started"
        );

        loop {
            let deadline = self.debounce.deadline();

            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                _ = ticker.tick() => {
                    self.run_pass(Trigger::Periodic).await;
                }

                _ = wait_until(deadline) => {
                    self.debounce = Debounce::Idle;
                    self.run_pass(Trigger::Debounced).await;
                }

                event = changes.recv(), if changes_open => match event {
                    Some(()) => {
                        self.debounce = Debounce::Pending(Instant::now() + self.config.debounce);
                    }
                    None => {
                        changes_open = false;
                        tracing::warn!("Change notifications closed; continuing with periodic eviction only");
                    }
                },
            }
        }

        tracing::info!("Retention scheduler stopped");
    }

    async fn run_pass(&self, trigger: Trigger) {
        let outcome = self.target.evict_excess(self.config.max_files).await;

        let mut stats = self.stats.lock().unwrap_or_else(|p| p.into_inner());
        match trigger {
            Trigger::Periodic => stats.periodic_passes += 1,
            Trigger::Debounced => stats.debounced_passes += 1,
        }

        match outcome {
            Ok(evicted) => {
                stats.evicted += evicted as u64;
                tracing::debug!(?trigger, evicted, "Retention pass complete");
            }
            Err(e) => {
                stats.failures += 1;
                tracing::error!(?trigger, "Retention pass failed: {}", e);
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => pending().await,
    }
}

/// Owner of a running scheduler. Dropping it also stops the loop.
pub struct RetentionHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    stats: Arc<Mutex<RetentionStats>>,
}

impl RetentionHandle {
    pub fn stats(&self) -> RetentionStats {
        *self.stats.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Stop the loop and wait for an in-flight pass to finish.
    pub async fn shutdown(self) {
        let RetentionHandle { shutdown, task, .. } = self;
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            tracing::warn!("Retention task ended abnormally: {}", e);
        }
    }
}
