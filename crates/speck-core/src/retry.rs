//! Retry policy and helpers for device operations.
//!
//! Two consumers share this module. The connectivity manager drives its
//! scan-and-connect loop from a [`RetryPolicy`] directly, asking for the
//! delay between attempts; its default policy retries forever, because an
//! absent device is the normal state while hardware is unplugged or still
//! enumerating. One-shot operations wrap themselves in [`with_retry`] with a
//! bounded policy instead.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use speck_core::{RetryPolicy, with_retry, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! let policy = RetryPolicy::limited(3).initial_delay(Duration::from_millis(50));
//!
//! let result = with_retry(&policy, "delete_sample", || async {
//!     // Your device operation here
//!     Ok::<_, Error>(true)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, or `None` to retry forever.
    pub max_attempts: Option<u32>,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
    /// Backoff multiplier (1.0 = constant delay, 2.0 = double each time).
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy bounded to the given number of attempts.
    pub fn limited(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..Default::default()
        }
    }

    /// A policy with a constant delay, no backoff, no jitter.
    ///
    /// Useful in tests and for devices with a known settle time.
    pub fn fixed_delay(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// A bounded policy for quick, time-sensitive operations.
    pub fn quick() -> Self {
        Self {
            max_attempts: Some(3),
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    // ==================== Builder Methods ====================

    /// Set the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Retry forever.
    #[must_use]
    pub fn unlimited(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Check the policy for nonsensical settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_attempts` is zero, the
    /// multiplier is below 1.0, or the initial delay exceeds the cap.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == Some(0) {
            return Err(Error::invalid_config("max_attempts must be at least 1"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(Error::invalid_config(format!(
                "backoff_multiplier {} must be at least 1.0",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(Error::invalid_config(format!(
                "initial_delay {:?} exceeds max_delay {:?}",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Whether the given number of completed attempts exhausts the policy.
    #[must_use]
    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Calculate the delay to wait after the given 0-based attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            let jitter_factor = 1.0 + (rand::rng().random::<f64>() * 0.25);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Execute an async operation under a bounded retry policy.
///
/// Retries retryable errors until the operation succeeds or the policy's
/// `max_attempts` is spent; the last error is returned when all attempts
/// fail. An unbounded policy makes this loop forever on persistent failure,
/// so pass one only where that is intended.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation_name: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }

                attempt += 1;
                if policy.attempts_exhausted(attempt) {
                    warn!("{} failed after {} attempts: {}", operation_name, attempt, e);
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempt - 1);
                debug!(
                    "{} failed (attempt {}), retrying in {:?}: {}",
                    operation_name, attempt, delay, e
                );
                sleep(delay).await;
            }
        }
    }
}

/// Check if an error is retryable.
fn is_retryable(error: &Error) -> bool {
    match error {
        // An absent device usually shows up eventually
        Error::ScanFailed(_) => true,
        // Timeouts are usually transient
        Error::Timeout { .. } => true,
        // Handshake failures are often transient (device still booting)
        Error::ConnectionFailed { .. } => true,
        // A missed ping may be a one-off
        Error::Unresponsive => true,
        // I/O errors might be transient
        Error::Io(_) => true,
        // Corrupt data will not improve by re-reading
        Error::InvalidData(_) => false,
        // Reconnect first
        Error::NotConnected => false,
        // Cancelled is deliberate
        Error::Cancelled => false,
        // Fix the configuration and restart
        Error::InvalidConfig(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_policy_is_unlimited() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, None);
        assert!(!policy.attempts_exhausted(1_000_000));
        assert!(policy.jitter);
    }

    #[test]
    fn test_limited_policy_exhausts() {
        let policy = RetryPolicy::limited(3);
        assert!(!policy.attempts_exhausted(2));
        assert!(policy.attempts_exhausted(3));
        assert!(policy.attempts_exhausted(4));
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy {
            max_attempts: Some(5),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_fixed_delay_policy() {
        let policy = RetryPolicy::fixed_delay(Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_millis(250));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::quick().validate().is_ok());

        let zero_attempts = RetryPolicy::default().max_attempts(0);
        assert!(matches!(
            zero_attempts.validate(),
            Err(Error::InvalidConfig(_))
        ));

        let shrinking = RetryPolicy::default().backoff_multiplier(0.5);
        assert!(shrinking.validate().is_err());

        let inverted = RetryPolicy::default()
            .initial_delay(Duration::from_secs(60))
            .max_delay(Duration::from_secs(1));
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&Error::no_device_found()));
        assert!(is_retryable(&Error::Unresponsive));
        assert!(is_retryable(&Error::timeout("ping", Duration::from_secs(1))));
        assert!(!is_retryable(&Error::Cancelled));
        assert!(!is_retryable(&Error::InvalidData("garbage".to_string())));
        assert!(!is_retryable(&Error::invalid_config("bad")));
    }

    #[tokio::test]
    async fn test_with_retry_immediate_success() {
        let policy = RetryPolicy::limited(3);
        let result = with_retry(&policy, "test", || async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_retry_eventual_success() {
        let policy = RetryPolicy::limited(5).initial_delay(Duration::from_millis(1));

        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&policy, "test", || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(Error::no_device_found())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_attempts() {
        let policy = RetryPolicy::limited(3)
            .initial_delay(Duration::from_millis(1))
            .jitter(false);

        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&policy, "test", || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(Error::no_device_found())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_error() {
        let policy = RetryPolicy::limited(3);
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&policy, "test", || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(Error::Cancelled)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn delay_never_exceeds_cap_plus_jitter(attempt in 0u32..64) {
                let policy = RetryPolicy {
                    max_attempts: None,
                    initial_delay: Duration::from_millis(100),
                    max_delay: Duration::from_secs(30),
                    backoff_multiplier: 2.0,
                    jitter: true,
                };
                let delay = policy.delay_for_attempt(attempt);
                // Cap plus the maximum 25% jitter
                prop_assert!(delay <= Duration::from_secs_f64(30.0 * 1.25));
            }
        }
    }
}
