use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::clock::{Clock, SystemClock};
use super::service::{ConductService, ConductServiceError, RecomputeSummary};
use super::store::ConductStore;

/// Background scheduler for full-roster recomputation.
///
/// One loop per worker: the first tick fires immediately, so starting the
/// worker also refreshes every classification. Ticks overlapping a batch
/// still in flight are skipped, and `stop` waits for the batch in progress
/// to finish before returning.
pub struct RecomputeWorker<S, C = SystemClock> {
    service: Arc<ConductService<S, C>>,
    stats: Arc<WorkerStats>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S, C> RecomputeWorker<S, C>
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    pub fn new(service: Arc<ConductService<S, C>>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            service,
            stats: Arc::new(WorkerStats::default()),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    pub fn start(&self, every: Duration) -> Result<(), WorkerError> {
        if self
            .stats
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WorkerError::AlreadyStarted);
        }
        // Reset the flag from any previous stop so the loop can be restarted.
        self.shutdown.send_replace(false);

        let mut shutdown = self.shutdown.subscribe();
        let service = Arc::clone(&self.service);
        let stats = Arc::clone(&self.stats);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        let stop = match changed {
                            Ok(()) => *shutdown.borrow(),
                            Err(_) => true,
                        };
                        if stop {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let service = Arc::clone(&service);
                        let stats = Arc::clone(&stats);
                        let batch = tokio::task::spawn_blocking(move || {
                            run_batch(service.as_ref(), &stats)
                        });
                        if let Err(error) = batch.await {
                            error!(%error, "recomputation batch panicked");
                        }
                    }
                }
            }
            stats.running.store(false, Ordering::SeqCst);
            info!("recomputation worker stopped");
        });
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!(interval_secs = every.as_secs(), "recomputation worker started");
        Ok(())
    }

    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            warn!("stop requested but the recomputation worker is not running");
            return;
        };
        if let Err(error) = handle.await {
            error!(%error, "recomputation worker did not stop cleanly");
        }
    }

    /// Runs one batch on the caller's thread, outside the schedule. Shares
    /// the in-flight latch with the loop, so a scheduled batch mid-run makes
    /// this return `RunInFlight` instead of doubling up.
    pub fn force_run(&self) -> Result<RecomputeSummary, WorkerError> {
        run_batch(self.service.as_ref(), &self.stats)
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            running: self.stats.running.load(Ordering::SeqCst),
            in_flight: self.stats.in_flight.load(Ordering::SeqCst),
            run_count: self.stats.run_count.load(Ordering::SeqCst),
            last_run_at: *self
                .stats
                .last_run_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            last_run_updated: self.stats.last_run_updated.load(Ordering::SeqCst),
            last_run_errors: self.stats.last_run_errors.load(Ordering::SeqCst),
        }
    }
}

fn run_batch<S, C>(
    service: &ConductService<S, C>,
    stats: &WorkerStats,
) -> Result<RecomputeSummary, WorkerError>
where
    S: ConductStore,
    C: Clock,
{
    if stats
        .in_flight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("recomputation batch already in flight; skipping this run");
        return Err(WorkerError::RunInFlight);
    }

    let outcome = service.recompute_all();
    stats.run_count.fetch_add(1, Ordering::SeqCst);
    *stats
        .last_run_at
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(service.current_time());

    let result = match outcome {
        Ok(summary) => {
            stats
                .last_run_updated
                .store(summary.updated as u64, Ordering::SeqCst);
            stats
                .last_run_errors
                .store(summary.errors as u64, Ordering::SeqCst);
            Ok(summary)
        }
        Err(error) => {
            stats.last_run_updated.store(0, Ordering::SeqCst);
            stats.last_run_errors.store(1, Ordering::SeqCst);
            error!(%error, "scheduled recomputation failed");
            Err(WorkerError::Recompute(error))
        }
    };
    stats.in_flight.store(false, Ordering::SeqCst);
    result
}

#[derive(Default)]
struct WorkerStats {
    running: AtomicBool,
    in_flight: AtomicBool,
    run_count: AtomicU64,
    last_run_updated: AtomicU64,
    last_run_errors: AtomicU64,
    last_run_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time snapshot of the worker for operators.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorkerStatus {
    pub running: bool,
    pub in_flight: bool,
    pub run_count: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_updated: u64,
    pub last_run_errors: u64,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("recomputation worker already started")]
    AlreadyStarted,
    #[error("a recomputation batch is already in flight")]
    RunInFlight,
    #[error(transparent)]
    Recompute(#[from] ConductServiceError),
}
