use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::JobStore;

enum Command {
    Schedule { job_id: Uuid, due: Instant },
    Shutdown,
}

/// Cheap handle for registering delayed removals.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SchedulerHandle {
    /// Register removal of `job_id` after `delay`. Scheduling the same job
    /// again before its entry fires replaces the pending entry.
    pub fn schedule_removal(&self, job_id: Uuid, delay: Duration) {
        let due = Instant::now() + delay;
        if self
            .tx
            .send(Command::Schedule { job_id, due })
            .is_err()
        {
            warn!(job_id = %job_id, "scheduler stopped, removal not registered");
        }
    }
}

/// Delayed job eviction.
///
/// A single task owns a priority queue of (due-time, job-id) entries and
/// sleeps until the earliest one, waking early when a new entry arrives.
/// Due entries are dispatched one at a time in due order; the removal
/// itself runs on a spawned task so a slow directory deletion cannot stall
/// later entries.
pub struct CleanupScheduler {
    handle: SchedulerHandle,
    task: JoinHandle<()>,
}

impl CleanupScheduler {
    pub fn spawn(store: JobStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, rx));
        Self {
            handle: SchedulerHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stop accepting new entries, fire every still-pending entry once
    /// (first-due-first), and wait for the dispatched removals.
    pub async fn shutdown(self) {
        let _ = self.handle.tx.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "scheduler task did not shut down cleanly");
        }
    }
}

async fn run(store: JobStore, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut heap: BinaryHeap<Reverse<(Instant, Uuid)>> = BinaryHeap::new();
    // Latest due time per job: re-scheduling replaces, and superseded heap
    // entries are skipped when they surface.
    let mut latest: HashMap<Uuid, Instant> = HashMap::new();
    let mut removals = JoinSet::new();

    loop {
        let next_due = heap.peek().map(|Reverse((due, _))| *due);
        let sleep_target = next_due.unwrap_or_else(Instant::now);

        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Schedule { job_id, due }) => {
                    latest.insert(job_id, due);
                    heap.push(Reverse((due, job_id)));
                    debug!(job_id = %job_id, "removal scheduled");
                }
                Some(Command::Shutdown) | None => break,
            },
            _ = time::sleep_until(sleep_target), if next_due.is_some() => {
                fire_due(&mut heap, &mut latest, &store, &mut removals, Instant::now());
            }
        }

        while removals.try_join_next().is_some() {}
    }

    if !latest.is_empty() {
        info!(pending = latest.len(), "scheduler shutting down, firing pending removals");
    }
    // Heap pops in due order; stale entries fall out via the latest map.
    while let Some(Reverse((due, job_id))) = heap.pop() {
        if latest.get(&job_id) == Some(&due) {
            latest.remove(&job_id);
            dispatch_removal(&store, &mut removals, job_id);
        }
    }
    while removals.join_next().await.is_some() {}
}

fn fire_due(
    heap: &mut BinaryHeap<Reverse<(Instant, Uuid)>>,
    latest: &mut HashMap<Uuid, Instant>,
    store: &JobStore,
    removals: &mut JoinSet<()>,
    now: Instant,
) {
    while let Some(Reverse((due, job_id))) = heap.peek().copied() {
        if due > now {
            break;
        }
        heap.pop();
        if latest.get(&job_id) == Some(&due) {
            latest.remove(&job_id);
            dispatch_removal(store, removals, job_id);
        } else {
            debug!(job_id = %job_id, "skipping superseded removal entry");
        }
    }
}

fn dispatch_removal(store: &JobStore, removals: &mut JoinSet<()>, job_id: Uuid) {
    info!(job_id = %job_id, "removal due");
    let store = store.clone();
    removals.spawn(async move {
        store.remove_job(job_id).await;
    });
}
