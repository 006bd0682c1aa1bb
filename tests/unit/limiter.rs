//! Unit tests for the admission limiter

use asana_extractor::cancel::Cancellation;
use asana_extractor::client::{AdmissionLimiter, LimiterError, RateBudget, RequestClass};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn limiter(rpm: u32, reads: usize, writes: usize) -> Arc<AdmissionLimiter> {
    Arc::new(AdmissionLimiter::new(RateBudget::new(rpm, reads, writes)).unwrap())
}

#[tokio::test]
async fn test_acquire_beyond_read_ceiling_blocks_until_release() {
    let limiter = limiter(6_000, 3, 1);
    let cancel = Cancellation::shared();

    for _ in 0..3 {
        limiter.acquire(RequestClass::Read, &cancel).await.unwrap();
    }
    assert_eq!(limiter.in_flight(), (3, 0));

    let waiter = {
        let limiter = Arc::clone(&limiter);
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move { limiter.acquire(RequestClass::Read, &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiter.is_finished());
    assert_eq!(limiter.in_flight(), (3, 0));

    limiter.release(RequestClass::Read);
    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
    assert_eq!(limiter.in_flight(), (3, 0));
}

#[tokio::test]
async fn test_release_wakes_exactly_one_waiter() {
    let limiter = limiter(6_000, 1, 1);
    let cancel = Cancellation::shared();
    limiter.acquire(RequestClass::Write, &cancel).await.unwrap();

    let mut waiters = Vec::new();
    for _ in 0..2 {
        let limiter = Arc::clone(&limiter);
        let cancel = Arc::clone(&cancel);
        waiters.push(tokio::spawn(async move {
            limiter.acquire(RequestClass::Write, &cancel).await
        }));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    limiter.release(RequestClass::Write);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let finished = waiters.iter().filter(|w| w.is_finished()).count();
    assert_eq!(finished, 1);
    assert_eq!(limiter.in_flight(), (0, 1));

    cancel.cancel();
    for waiter in waiters {
        let _ = waiter.await.unwrap();
    }
}

#[tokio::test]
async fn test_write_ceiling_independent_of_reads() {
    let limiter = limiter(6_000, 1, 2);
    let cancel = Cancellation::new();

    limiter.acquire(RequestClass::Read, &cancel).await.unwrap();
    limiter.acquire(RequestClass::Write, &cancel).await.unwrap();
    limiter.acquire(RequestClass::Write, &cancel).await.unwrap();

    assert_eq!(limiter.in_flight(), (1, 2));
}

#[tokio::test]
async fn test_cancel_while_waiting_for_slot_leaves_counters() {
    let limiter = limiter(6_000, 1, 1);
    let cancel = Cancellation::shared();
    limiter.acquire(RequestClass::Read, &cancel).await.unwrap();

    let waiter = {
        let limiter = Arc::clone(&limiter);
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move { limiter.acquire(RequestClass::Read, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result, Err(LimiterError::Cancelled));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(limiter.in_flight(), (1, 0));
}

#[tokio::test]
async fn test_cancel_while_waiting_for_rate_token() {
    // One request per minute: the second acquire waits on the bucket.
    let limiter = limiter(1, 10, 10);
    let cancel = Cancellation::shared();
    limiter.acquire(RequestClass::Read, &cancel).await.unwrap();
    limiter.release(RequestClass::Read);

    let waiter = {
        let limiter = Arc::clone(&limiter);
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move { limiter.acquire(RequestClass::Read, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, Err(LimiterError::Cancelled));
    assert_eq!(limiter.in_flight(), (0, 0));
}

#[tokio::test]
async fn test_guard_releases_on_every_exit_path() {
    let limiter = limiter(6_000, 2, 2);
    let cancel = Cancellation::new();

    async fn failing(limiter: &AdmissionLimiter, cancel: &Cancellation) -> Result<(), &'static str> {
        let _guard = limiter.admit(RequestClass::Read, cancel).await.map_err(|_| "admit")?;
        Err("request failed")
    }

    assert!(failing(&limiter, &cancel).await.is_err());
    assert_eq!(limiter.in_flight(), (0, 0));

    {
        let guard = limiter.admit(RequestClass::Write, &cancel).await.unwrap();
        assert_eq!(guard.class(), RequestClass::Write);
        assert_eq!(limiter.in_flight(), (0, 1));
    }
    assert_eq!(limiter.in_flight(), (0, 0));
}
