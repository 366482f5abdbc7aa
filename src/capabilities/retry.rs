use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::CapabilityResult;

/// Retries a capability call with exponential backoff. Only transient
/// failures (rate limits, timeouts) are retried; everything else surfaces
/// immediately.
pub async fn with_backoff<T, F, Fut>(
    op_name: &str,
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> CapabilityResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CapabilityResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < max_attempts.max(1) => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                warn!(
                    "{} attempt {}/{} failed ({}), retrying in {:?}",
                    op_name,
                    attempt + 1,
                    max_attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Convenience used by components that carry millisecond config values.
pub async fn with_backoff_ms<T, F, Fut>(
    op_name: &str,
    max_attempts: u32,
    base_delay_ms: u64,
    op: F,
) -> CapabilityResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CapabilityResult<T>>,
{
    with_backoff(op_name, max_attempts, Duration::from_millis(base_delay_ms), op).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CapabilityError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("test", 3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CapabilityError::RateLimited("slow down".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn structural_errors_surface_immediately() {
        let calls = AtomicU32::new(0);
        let result: CapabilityResult<()> = with_backoff("test", 5, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::MalformedOutput("bad json".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: CapabilityResult<()> = with_backoff("test", 3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::Timeout("upstream".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
