//! Unit tests for backoff computation and Retry-After parsing

use asana_extractor::client::backoff::{compute_backoff, parse_retry_after};
use asana_extractor::client::RetryPolicy;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use std::time::{Duration, SystemTime};

fn policy() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(60))
}

#[test]
fn test_backoff_within_jitter_bounds() {
    let policy = policy();
    for attempt in 0..10u32 {
        let nominal = Duration::from_secs(1).as_secs_f64() * 2f64.powi(attempt as i32);
        let low = (nominal * 0.75).min(60.0);
        let high = (nominal * 1.25).min(60.0);

        for _ in 0..200 {
            let delay = compute_backoff(attempt, &policy, None).as_secs_f64();
            assert!(
                delay >= low - 1e-9 && delay <= high + 1e-9,
                "attempt {attempt}: {delay} not in [{low}, {high}]"
            );
        }
    }
}

#[test]
fn test_backoff_never_exceeds_max() {
    let policy = policy();
    for attempt in [6, 7, 20, 63, 64, 1_000, u32::MAX] {
        assert!(compute_backoff(attempt, &policy, None) <= Duration::from_secs(60));
    }
}

#[test]
fn test_server_hint_returned_verbatim() {
    let policy = policy();
    let hint = Duration::from_secs(120);
    for attempt in [0, 3, 50] {
        assert_eq!(compute_backoff(attempt, &policy, Some(hint)), hint);
    }
}

#[test]
fn test_zero_hint_falls_back_to_computation() {
    let delay = compute_backoff(0, &policy(), Some(Duration::ZERO));
    assert!(delay >= Duration::from_millis(750));
    assert!(delay <= Duration::from_millis(1250));
}

#[test]
fn test_parse_retry_after_seconds() {
    let mut headers = HeaderMap::new();
    headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
    assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(30)));
}

#[test]
fn test_parse_retry_after_http_date() {
    let future = SystemTime::now() + Duration::from_secs(90);
    let mut headers = HeaderMap::new();
    headers.insert(
        RETRY_AFTER,
        HeaderValue::from_str(&httpdate::fmt_http_date(future)).unwrap(),
    );

    let parsed = parse_retry_after(&headers).unwrap();
    assert!(parsed > Duration::from_secs(80));
    assert!(parsed <= Duration::from_secs(90));
}

#[test]
fn test_parse_retry_after_unusable_values() {
    for value in ["0", "abc", "Wed, 21 Oct 2015 07:28:00 GMT"] {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static(value));
        assert_eq!(parse_retry_after(&headers), None, "value {value:?}");
    }
    assert_eq!(parse_retry_after(&HeaderMap::new()), None);
}
