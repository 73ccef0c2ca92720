// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn runs_closure_and_returns_value() {
    let pool = BlockingPool::new(2);
    let result = pool.run(|| 21 * 2).await.unwrap();
    assert_eq!(result, 42);
}

#[tokio::test]
async fn capacity_is_at_least_one() {
    let pool = BlockingPool::new(0);
    assert_eq!(pool.capacity(), 1);
    assert_eq!(pool.run(|| 1).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrency_is_bounded_by_capacity() {
    let pool = BlockingPool::new(2);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            pool.run(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn clones_share_permits() {
    let pool = BlockingPool::new(3);
    let clone = pool.clone();
    assert_eq!(clone.capacity(), 3);
    assert_eq!(clone.run(|| "ok").await.unwrap(), "ok");
}
