//! Concurrency tests for the detector pool.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use detector_pool::{DetectionContext, Pool};

mod common;
use common::{mock_factory, MockState};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_create_exactly_pool_size() {
    let state = Arc::new(MockState::default());
    let pool = Pool::builder(mock_factory(Arc::clone(&state), Duration::from_millis(5)))
        .pool_size(4)
        .heartbeat_interval(Duration::from_secs(3600))
        .build()
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let lease = pool.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
            lease.transport().serial
        }));
    }

    let mut serials = HashSet::new();
    for task in tasks {
        serials.insert(task.await.unwrap());
    }

    assert_eq!(MockState::count(&state.factory_calls), 4);
    assert!(serials.len() <= 4);
    let status = pool.status();
    assert_eq!(status.live, 4);
    assert_eq!(status.idle, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sustained_detection_load() {
    let state = Arc::new(MockState::default());
    let pool = Pool::builder(mock_factory(Arc::clone(&state), Duration::ZERO))
        .pool_size(8)
        .heartbeat_interval(Duration::from_millis(5))
        .build()
        .unwrap();

    let concurrency = 20;
    let requests_per_task = 50;

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let mut blocked = 0;
            for _ in 0..requests_per_task {
                let mut ctx = DetectionContext::new();
                let (_req, rsp) = pool.detect(&mut ctx).await.unwrap();
                if rsp.is_blocked() {
                    blocked += 1;
                }
            }
            blocked
        }));
    }

    let mut blocked = 0;
    for task in tasks {
        blocked += task.await.unwrap();
    }

    assert_eq!(blocked, concurrency * requests_per_task);
    assert_eq!(MockState::count(&state.factory_calls), 8);

    // heartbeats and checkouts interleave without losing connections
    assert_eq!(pool.status().live, 8);
    pool.close().await;
    assert_eq!(MockState::count(&state.closed), 8);
}
