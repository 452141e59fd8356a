//! Source manager: owns the per-source scheduler tasks.
//!
//! The manager is a two-state machine. `start` moves `Stopped -> Running`
//! by spawning one [`SourceScheduler`] task per source; `stop` moves
//! `Running -> Stopped` by signalling cancellation and awaiting every task.
//! Repeating either call in its target state is a no-op.
//!
//! Dropping a running manager also cancels the schedulers, because they
//! treat a closed cancellation channel as a stop request.

use std::collections::BTreeMap;
use std::sync::Arc;

use firewatch_types::{Source, SourceStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::detector::Detector;
use crate::hub::BroadcastHub;
use crate::scheduler::{SourceScheduler, SourceStats};

/// Lifecycle state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No scheduler tasks exist.
    Stopped,
    /// One scheduler task per source is running.
    Running,
}

/// Stats retained for one source across the last run.
#[derive(Debug)]
struct TrackedSource {
    source: Source,
    stats: Arc<SourceStats>,
}

/// Owner of the scheduler set.
pub struct SourceManager {
    detector: Arc<dyn Detector>,
    config: SchedulerConfig,
    state: ManagerState,
    cancel: Option<watch::Sender<bool>>,
    tasks: BTreeMap<String, JoinHandle<()>>,
    tracked: Vec<TrackedSource>,
}

impl SourceManager {
    /// Create a stopped manager that will poll sources with `detector`.
    pub fn new(detector: Arc<dyn Detector>, config: SchedulerConfig) -> Self {
        Self {
            detector,
            config,
            state: ManagerState::Stopped,
            cancel: None,
            tasks: BTreeMap::new(),
            tracked: Vec::new(),
        }
    }

    /// Spawn one scheduler per source, keyed by source id.
    ///
    /// Returns `false` without doing anything if already running. Must be
    /// called from within a Tokio runtime.
    pub fn start(&mut self, sources: &[Source], hub: &Arc<BroadcastHub>) -> bool {
        if self.state == ManagerState::Running {
            info!("Source manager already running, ignoring start");
            return false;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.tracked.clear();

        for source in sources {
            let scheduler = SourceScheduler::new(
                source.clone(),
                Arc::clone(&self.detector),
                Arc::clone(hub),
                self.config,
            );
            let tracked = TrackedSource {
                source: source.clone(),
                stats: scheduler.stats(),
            };
            let handle = tokio::spawn(scheduler.run(cancel_rx.clone()));
            if let Some(previous) = self.tasks.insert(source.id().to_owned(), handle) {
                // Registry ids are unique; a caller passing duplicates keeps
                // only the last scheduler for that id.
                warn!(camera_id = %source.id(), "Duplicate source id, replacing scheduler");
                previous.abort();
                match self.tracked.iter_mut().find(|t| t.source.id() == source.id()) {
                    Some(slot) => *slot = tracked,
                    None => self.tracked.push(tracked),
                }
            } else {
                self.tracked.push(tracked);
            }
        }

        self.cancel = Some(cancel_tx);
        self.state = ManagerState::Running;
        info!(schedulers = self.tasks.len(), "Source manager started");
        true
    }

    /// Cancel every scheduler and wait for all of them to finish.
    ///
    /// Safe to call when stopped (no-op). Callers sharing the manager
    /// behind a lock should use [`begin_stop`](Self::begin_stop) instead so
    /// the lock is not held while schedulers unwind.
    pub async fn stop(&mut self) {
        self.begin_stop().join().await;
    }

    /// Signal cancellation and detach the scheduler tasks.
    ///
    /// The manager is `Stopped` as soon as this returns; awaiting the
    /// returned [`PendingStop`] waits for the tasks to terminate.
    pub fn begin_stop(&mut self) -> PendingStop {
        self.state = ManagerState::Stopped;

        if let Some(cancel) = self.cancel.take() {
            cancel.send_replace(true);
        }

        PendingStop {
            tasks: std::mem::take(&mut self.tasks),
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ManagerState {
        self.state
    }

    /// Whether schedulers are running.
    pub fn is_running(&self) -> bool {
        self.state == ManagerState::Running
    }

    /// Ids of the sources that currently have a scheduler task.
    pub fn scheduler_ids(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    /// Per-source counters from the current or most recent run, in start
    /// order.
    pub fn status(&self) -> Vec<SourceStatus> {
        self.tracked
            .iter()
            .map(|t| {
                let monitoring = self
                    .tasks
                    .get(t.source.id())
                    .is_some_and(|handle| !handle.is_finished());
                t.stats.to_status(&t.source, monitoring)
            })
            .collect()
    }
}

/// Scheduler tasks that have been told to stop but may still be running.
#[derive(Debug)]
#[must_use = "dropping a PendingStop does not wait for the schedulers"]
pub struct PendingStop {
    tasks: BTreeMap<String, JoinHandle<()>>,
}

impl PendingStop {
    /// Number of tasks being waited on.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether there is nothing to wait for.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait until every detached scheduler task has terminated.
    pub async fn join(self) {
        if self.tasks.is_empty() {
            return;
        }

        let count = self.tasks.len();
        for (source_id, handle) in self.tasks {
            match handle.await {
                Err(e) if e.is_panic() => {
                    warn!(camera_id = %source_id, "Source scheduler panicked: {e}");
                }
                _ => {}
            }
        }
        info!(schedulers = count, "Source manager stopped");
    }
}

impl std::fmt::Debug for SourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceManager")
            .field("state", &self.state)
            .field("schedulers", &self.tasks.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
