// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry engine with exponential backoff + jitter for backend calls.
//
// Classifies errors into Transient (auto-retry) and Permanent (give up). Only
// transient errors trigger automatic retries, and every retry loop is bounded.

use std::future::Future;
use std::time::Duration;

use reslide_core::error::ReslideError;
use reslide_core::types::ErrorClass;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry: the error is permanent.
    GiveUp(ErrorClass),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Classify a `ReslideError` into an `ErrorClass` for retry decisions.
pub fn classify_error(err: &ReslideError) -> ErrorClass {
    match err {
        // Transient: network, timeout, overloaded services
        ReslideError::Timeout(_) => ErrorClass::Transient,
        ReslideError::Backend { detail, .. } => classify_detail(detail),
        ReslideError::BackendStatus { status, .. } => classify_status(*status),

        // Permanent: bad input, bad config, local failures
        ReslideError::Extraction(_)
        | ReslideError::Inpaint(_)
        | ReslideError::Recursion(_)
        | ReslideError::Style(_)
        | ReslideError::ImageLoad { .. }
        | ReslideError::Image(_)
        | ReslideError::Render(_)
        | ReslideError::Document(_)
        | ReslideError::Config(_)
        | ReslideError::NoProvider(_)
        | ReslideError::Serialization(_) => ErrorClass::Permanent,

        // IO errors depend on the kind
        ReslideError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::Interrupted => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        },
    }
}

/// 408, 429 and 5xx are worth another attempt; other statuses are not.
fn classify_status(status: u16) -> ErrorClass {
    match status {
        408 | 429 | 500..=599 => ErrorClass::Transient,
        _ => ErrorClass::Permanent,
    }
}

/// Classify a transport error detail string.
fn classify_detail(detail: &str) -> ErrorClass {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("broken pipe")
        || lower.contains("error sending request")
    {
        return ErrorClass::Transient;
    }

    if lower.contains("decode")
        || lower.contains("invalid")
        || lower.contains("unsupported")
        || lower.contains("missing field")
    {
        return ErrorClass::Permanent;
    }

    // Default to transient (retry first, give up later)
    ErrorClass::Transient
}

/// Decide whether to retry based on the error class and attempt count.
pub fn should_retry(err: &ReslideError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match classify_error(err) {
        ErrorClass::Permanent => {
            info!("permanent error, not retrying");
            RetryDecision::GiveUp(ErrorClass::Permanent)
        }
        ErrorClass::Transient => {
            if attempt >= config.max_retries {
                warn!(attempt, max = config.max_retries, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt, config);
                debug!(attempt, delay_ms = delay.as_millis(), "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or exhausts its retries.
///
/// The last error is returned unchanged when the loop gives up.
pub async fn with_retry<T, F, Fut>(service: &str, config: &RetryConfig, mut op: F) -> Result<T, ReslideError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReslideError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => match should_retry(&err, attempt, config) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(service, attempt, error = %err, "backend call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(err),
            },
        }
    }
}

/// Compute exponential backoff delay with jitter.
///
/// delay = min(base * 2^attempt + jitter, max_delay)
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
    let capped_ms = total_ms.min(config.max_delay.as_millis() as u64);
    Duration::from_millis(capped_ms)
}

/// Deterministic jitter in [0, base) spread by a multiplicative hash.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn timeout_is_transient() {
        let err = ReslideError::Timeout("layout poll".into());
        assert_eq!(classify_error(&err), ErrorClass::Transient);
        let err = ReslideError::backend("ocr", "operation timed out");
        assert_eq!(classify_error(&err), ErrorClass::Transient);
    }

    #[test]
    fn status_codes_split_by_class() {
        let status = |status| ReslideError::BackendStatus {
            service: "ocr".into(),
            status,
            body: String::new(),
        };
        assert_eq!(classify_error(&status(503)), ErrorClass::Transient);
        assert_eq!(classify_error(&status(429)), ErrorClass::Transient);
        assert_eq!(classify_error(&status(400)), ErrorClass::Permanent);
        assert_eq!(classify_error(&status(401)), ErrorClass::Permanent);
    }

    #[test]
    fn retry_respects_max() {
        let config = RetryConfig::with_max_retries(3);
        let err = ReslideError::backend("layout", "connection refused");
        assert!(matches!(should_retry(&err, 0, &config), RetryDecision::RetryAfter(_)));
        assert!(matches!(should_retry(&err, 3, &config), RetryDecision::Exhausted));
    }

    #[test]
    fn permanent_error_never_retries() {
        let config = RetryConfig::default();
        let err = ReslideError::Config("no base url".into());
        assert!(matches!(
            should_retry(&err, 0, &config),
            RetryDecision::GiveUp(ErrorClass::Permanent)
        ));
    }

    #[test]
    fn delay_increases_with_attempts() {
        let config = RetryConfig::default();
        let d0 = compute_delay(0, &config);
        let d1 = compute_delay(1, &config);
        let d2 = compute_delay(2, &config);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert!(compute_delay(20, &config) <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = with_retry("ocr", &fast(), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ReslideError::Timeout("ocr".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_loop_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = with_retry("ocr", &fast(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ReslideError::Timeout("ocr".into()))
            }
        })
        .await;
        assert!(matches!(result, Err(ReslideError::Timeout(_))));
        // first attempt + max_retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
