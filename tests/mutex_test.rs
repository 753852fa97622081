//! Integration tests for the async mutex.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use workq::AsyncMutex;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn critical_sections_never_overlap() {
    let mutex = Arc::new(AsyncMutex::new());
    // Updated with a split load/store so overlapping sections would lose
    // increments.
    let counter = Arc::new(AtomicUsize::new(0));
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let mutex = Arc::clone(&mutex);
        let counter = Arc::clone(&counter);
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                mutex
                    .run_exclusive(|| async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);

                        let value = counter.load(Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        counter.store(value + 1, Ordering::SeqCst);

                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 16 * 25);
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn returns_the_section_value() {
    let mutex = AsyncMutex::new();
    let value = mutex.run_exclusive(|| async { 6 * 7 }).await;
    assert_eq!(value, 42);
}

#[tokio::test]
async fn errors_propagate_and_release_the_permit() {
    let mutex = AsyncMutex::new();

    let result: anyhow::Result<()> = mutex
        .run_exclusive(|| async { Err(anyhow::anyhow!("section failed")) })
        .await;
    assert_eq!(result.unwrap_err().to_string(), "section failed");
    assert!(!mutex.is_locked());

    let next = mutex.run_exclusive(|| async { "ok" }).await;
    assert_eq!(next, "ok");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panics_propagate_and_release_the_permit() {
    let mutex = Arc::new(AsyncMutex::new());

    let panicking = {
        let mutex = Arc::clone(&mutex);
        tokio::spawn(async move {
            mutex
                .run_exclusive(|| async {
                    panic!("inside critical section");
                })
                .await
        })
    };
    let err = panicking.await.unwrap_err();
    assert!(err.is_panic());

    assert!(!mutex.is_locked());
    let value = tokio::time::timeout(
        Duration::from_secs(1),
        mutex.run_exclusive(|| async { 1 }),
    )
    .await
    .expect("permit should have been released");
    assert_eq!(value, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn try_run_exclusive_skips_when_held() {
    let mutex = Arc::new(AsyncMutex::new());
    let (entered_tx, entered_rx) = oneshot::channel::<()>();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let holder = {
        let mutex = Arc::clone(&mutex);
        tokio::spawn(async move {
            mutex
                .run_exclusive(|| async move {
                    entered_tx.send(()).unwrap();
                    release_rx.await.unwrap();
                })
                .await
        })
    };

    entered_rx.await.unwrap();
    assert!(mutex.is_locked());
    assert!(mutex.try_run_exclusive(|| async { 1 }).await.is_none());

    release_tx.send(()).unwrap();
    holder.await.unwrap();
    assert_eq!(mutex.try_run_exclusive(|| async { 2 }).await, Some(2));
}
