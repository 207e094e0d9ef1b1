use std::time::Duration;

use uuid::Uuid;
use vodserve_jobs::{CleanupScheduler, JobStore};

fn paused_store(name: &str) -> JobStore {
    JobStore::new(
        std::env::temp_dir().join(format!("vs_reaper_{name}_{}", std::process::id())),
    )
}

/// Wait until the job disappears from the store, driving the paused clock
/// forward in small steps so spawned tasks get to run.
async fn wait_removed(store: &JobStore, id: Uuid) {
    for _ in 0..1000 {
        if store.status(id).await.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} was never removed");
}

#[tokio::test(start_paused = true)]
async fn removal_fires_after_delay() {
    let store = paused_store("fires");
    let scheduler = CleanupScheduler::spawn(store.clone());

    let job = store.create_job().await;
    scheduler
        .handle()
        .schedule_removal(job.id, Duration::from_secs(15 * 60));

    // Not yet due.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(store.status(job.id).await.is_some());

    tokio::time::advance(Duration::from_secs(15 * 60)).await;
    wait_removed(&store, job.id).await;
    assert!(store.list().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn reschedule_replaces_pending_entry() {
    let store = paused_store("replace");
    let scheduler = CleanupScheduler::spawn(store.clone());

    let job = store.create_job().await;
    let handle = scheduler.handle();
    handle.schedule_removal(job.id, Duration::from_secs(15 * 60));
    handle.schedule_removal(job.id, Duration::from_secs(30 * 60));
    // Let the scheduler ingest both entries before time moves.
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Past the first (superseded) due time: nothing fires.
    tokio::time::advance(Duration::from_secs(16 * 60)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.status(job.id).await.is_some());

    // Past the replacement's due time: exactly one removal runs.
    tokio::time::advance(Duration::from_secs(15 * 60)).await;
    wait_removed(&store, job.id).await;
}

#[tokio::test(start_paused = true)]
async fn multiple_jobs_fire_in_due_order() {
    let store = paused_store("order");
    let scheduler = CleanupScheduler::spawn(store.clone());

    let early = store.create_job().await;
    let late = store.create_job().await;
    let handle = scheduler.handle();
    handle.schedule_removal(late.id, Duration::from_secs(20 * 60));
    handle.schedule_removal(early.id, Duration::from_secs(10 * 60));
    tokio::time::sleep(Duration::from_millis(10)).await;

    tokio::time::advance(Duration::from_secs(11 * 60)).await;
    wait_removed(&store, early.id).await;
    assert!(store.status(late.id).await.is_some());

    tokio::time::advance(Duration::from_secs(10 * 60)).await;
    wait_removed(&store, late.id).await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_fires_pending_entries_once() {
    let store = paused_store("shutdown");
    let scheduler = CleanupScheduler::spawn(store.clone());

    let job = store.create_job().await;
    scheduler
        .handle()
        .schedule_removal(job.id, Duration::from_secs(3600));
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The delay has not elapsed, but pending entries still run once.
    scheduler.shutdown().await;
    assert!(store.status(job.id).await.is_none());
}
