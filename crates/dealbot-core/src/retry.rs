//! Timeout, retry, and back-off policy applied at every external call site.
//!
//! [`CallPolicy::run`] bounds each attempt with a timeout and repeats the
//! operation while the failure classifies as [`ErrorKind::Transient`].
//! Timeouts count as transient. Everything else is returned on first sight.

use std::future::Future;
use std::time::Duration;

use crate::error::{Classify, ErrorKind};

const MAX_DELAY_MS: u64 = 30_000;

/// Per-call-site policy. `max_attempts` counts the first try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl CallPolicy {
    #[must_use]
    pub fn new(timeout: Duration, max_attempts: u32, backoff_base_ms: u64) -> Self {
        Self {
            timeout,
            max_attempts,
            backoff_base_ms,
        }
    }

    /// Single attempt, no back-off.
    #[must_use]
    pub fn once(timeout: Duration) -> Self {
        Self::new(timeout, 1, 0)
    }

    /// Runs `operation` under this policy.
    ///
    /// Back-off before retry `n` (1-based) is `backoff_base_ms × 2ⁿ⁻¹ ± 25 %`,
    /// capped at 30 s.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Timeout`] when the final attempt timed out, or
    /// [`CallError::Failed`] carrying the operation's last error.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &'static str,
        mut operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let failure = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => CallError::Failed(err),
                Err(_) => CallError::Timeout {
                    label,
                    timeout: self.timeout,
                },
            };

            if !failure.is_transient() || attempt >= max_attempts {
                return Err(failure);
            }

            let delay_ms = backoff_delay_ms(self.backoff_base_ms, attempt);
            tracing::warn!(
                call = label,
                attempt,
                max_attempts,
                delay_ms,
                error = %failure,
                "transient failure, retrying after back-off"
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    if base_ms == 0 {
        return 0;
    }
    let computed = base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    jittered
}

/// Outcome of a call that exhausted its policy.
#[derive(Debug)]
pub enum CallError<E> {
    Timeout {
        label: &'static str,
        timeout: Duration,
    },
    Failed(E),
}

impl<E> CallError<E> {
    /// Returns the inner error, if the call failed rather than timed out.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallError::Failed(e) => Some(e),
            CallError::Timeout { .. } => None,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }
}

impl<E: Classify> Classify for CallError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            CallError::Timeout { .. } => ErrorKind::Transient,
            CallError::Failed(e) => e.kind(),
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Timeout { label, timeout } => {
                write!(f, "{label} timed out after {} ms", timeout.as_millis())
            }
            CallError::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CallError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Failed(e) => Some(e),
            CallError::Timeout { .. } => None,
        }
    }
}
