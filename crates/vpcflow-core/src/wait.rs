//! Status polling with capped exponential backoff and cancellation
//!
//! Provider-side transitions (stack creation, peering handshakes) are observed
//! by polling. Each wait is bounded by a timeout and aborts as soon as the
//! run's cancellation token fires.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vpcflow_config::Backoff;

/// Configuration for one wait
#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Maximum total time to wait before timing out
    pub timeout: Duration,
}

impl WaitConfig {
    pub fn new(backoff: &Backoff, timeout: Duration) -> Self {
        Self {
            initial_delay: Duration::from_millis(backoff.initial_delay_ms),
            max_delay: Duration::from_millis(backoff.max_delay_ms),
            multiplier: backoff.multiplier,
            timeout,
        }
    }

    /// Delay after the given (zero-based) attempt, capped at `max_delay`.
    ///
    /// Multipliers below 1.0 (or NaN) are treated as 1.0.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = if self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let factor = multiplier.powi(attempt.min(64) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

/// Why a wait ended without the condition being met
#[derive(Debug, Clone, PartialEq)]
pub enum WaitError<S, E> {
    /// The timeout elapsed; `last` is the most recent pending observation
    Timeout {
        waited: Duration,
        attempts: u32,
        last: Option<S>,
    },
    Cancelled,
    /// The check itself failed
    Check(E),
}

/// Poll `check` until it breaks.
///
/// `check` returns `ControlFlow::Break(value)` when the condition is met and
/// `ControlFlow::Continue(observation)` to keep waiting. The last observation
/// is reported on timeout.
pub async fn poll_until<T, S, E, F, Fut>(
    config: &WaitConfig,
    cancel: &CancellationToken,
    resource_name: &str,
    mut check: F,
) -> Result<T, WaitError<S, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ControlFlow<T, S>, E>>,
    S: std::fmt::Debug,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }

        let observed = match check().await.map_err(WaitError::Check)? {
            ControlFlow::Break(value) => {
                debug!(resource = %resource_name, attempts = attempts + 1, "Wait finished");
                return Ok(value);
            }
            ControlFlow::Continue(observed) => observed,
        };
        debug!(resource = %resource_name, attempt = attempts + 1, status = ?observed, "Not ready");

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(WaitError::Timeout {
                waited: elapsed,
                attempts: attempts + 1,
                last: Some(observed),
            });
        }

        let delay = config
            .delay_for_attempt(attempts)
            .min(config.timeout - elapsed);
        attempts += 1;

        tokio::select! {
            _ = sleep(delay) => {}
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
        }
    }
}
