//! Background job coordination for trade rebuilds.
//!
//! A fixed pool of workers drains a shared queue. At most one rebuild per
//! run is queued or running at any time; duplicate enqueues while a run is
//! in flight are dropped.

use crate::analytics::AnalyticsRouter;
use crate::db::Repository;
use crate::rebuild::TradeRebuilder;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

pub struct JobCoordinator {
    tx: mpsc::UnboundedSender<String>,
    inflight: Arc<Mutex<HashSet<String>>>,
    cancels: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

impl JobCoordinator {
    /// Start `workers` rebuild workers against the given pool and return
    /// the coordinator handle used to enqueue and cancel jobs.
    pub fn spawn(pool: SqlitePool, workers: usize) -> Arc<JobCoordinator> {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let inflight: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        let cancels: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        for worker_id in 0..workers.max(1) {
            tokio::spawn(worker_loop(
                worker_id,
                rx.clone(),
                pool.clone(),
                inflight.clone(),
                cancels.clone(),
            ));
        }

        Arc::new(JobCoordinator {
            tx,
            inflight,
            cancels,
        })
    }

    /// Queue a rebuild for the run. Returns false when a rebuild for the
    /// same run is already queued or running.
    pub fn enqueue(&self, run_id: &str) -> bool {
        {
            let mut inflight = self.inflight.lock().unwrap();
            if !inflight.insert(run_id.to_string()) {
                info!(run_id = %run_id, "rebuild already in flight, dropping duplicate");
                return false;
            }
        }
        self.cancels
            .lock()
            .unwrap()
            .insert(run_id.to_string(), Arc::new(AtomicBool::new(false)));

        if self.tx.send(run_id.to_string()).is_err() {
            warn!(run_id = %run_id, "rebuild queue is closed, dropping job");
            self.inflight.lock().unwrap().remove(run_id);
            self.cancels.lock().unwrap().remove(run_id);
            return false;
        }
        info!(run_id = %run_id, "rebuild enqueued");
        true
    }

    /// Request cancellation of the run's in-flight rebuild. Returns false
    /// when no rebuild is queued or running for the run.
    pub fn cancel(&self, run_id: &str) -> bool {
        let cancels = self.cancels.lock().unwrap();
        match cancels.get(run_id) {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                info!(run_id = %run_id, "rebuild cancellation requested");
                true
            }
            None => false,
        }
    }

    /// True while a rebuild for the run is queued or running.
    pub fn is_inflight(&self, run_id: &str) -> bool {
        self.inflight.lock().unwrap().contains(run_id)
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>,
    pool: SqlitePool,
    inflight: Arc<Mutex<HashSet<String>>>,
    cancels: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
) {
    loop {
        let run_id = {
            let mut guard = rx.lock().await;
            match guard.recv().await {
                Some(run_id) => run_id,
                None => break,
            }
        };

        let cancel = cancels
            .lock()
            .unwrap()
            .get(&run_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        // Each job gets its own store handle.
        let repo = Arc::new(Repository::new(pool.clone()));
        let router = Arc::new(AnalyticsRouter::new(repo.clone()));
        let rebuilder = TradeRebuilder::new(repo.clone(), router);

        run_with_retry(worker_id, &rebuilder, &run_id, &cancel).await;

        if cancel.load(Ordering::Relaxed) {
            match repo.mark_run_canceled_if_running(&run_id).await {
                Ok(true) => info!(run_id = %run_id, "run marked canceled"),
                Ok(false) => {}
                Err(e) => warn!(run_id = %run_id, error = %e, "failed to mark run canceled"),
            }
        }

        inflight.lock().unwrap().remove(&run_id);
        cancels.lock().unwrap().remove(&run_id);
    }
    info!(worker_id, "rebuild worker stopped");
}

/// Run the rebuild, retrying transient store failures with exponential
/// backoff. Non-transient failures and exhausted retries abandon the job.
async fn run_with_retry(
    worker_id: usize,
    rebuilder: &TradeRebuilder,
    run_id: &str,
    cancel: &AtomicBool,
) {
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(INITIAL_BACKOFF)
        .with_multiplier(2.0)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(None)
        .build();

    for attempt in 1..=MAX_ATTEMPTS {
        match rebuilder.rebuild_trades_for_run(run_id, cancel).await {
            Ok(count) => {
                info!(worker_id, run_id = %run_id, trades = count, "rebuild job finished");
                return;
            }
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                let delay = backoff.next_backoff().unwrap_or(INITIAL_BACKOFF);
                warn!(
                    worker_id,
                    run_id = %run_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient rebuild failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(worker_id, run_id = %run_id, attempt, error = %e, "rebuild job abandoned");
                return;
            }
        }
    }
}
