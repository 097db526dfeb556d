//! Fixed-interval retry with an attempt budget derived from a deadline.
//!
//! The interactive flow waits for the brAIn service to answer by retrying a
//! probe every `interval` until `timeout` worth of intervals has been spent.
//! The loop itself knows nothing about HTTP or about tokio: the attempt is a
//! closure and the wait between attempts goes through the [`Pause`] trait.
//!
//! # Budget
//!
//! For a timeout `T` and interval `I`, at most `⌈T / I⌉` attempts are made.
//! With the defaults (`T = 10s`, `I = 2s`) that is 5 attempts and 4 pauses;
//! no pause follows the last attempt.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// How long to keep retrying and how long to wait between attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    timeout: Duration,
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            bail!("retry interval must be > 0");
        }
        if timeout.is_zero() {
            bail!("retry timeout must be > 0");
        }
        Ok(Self { timeout, interval })
    }

    /// `⌈timeout / interval⌉`, never less than one.
    pub fn max_attempts(&self) -> u32 {
        let attempts = self.timeout.as_nanos().div_ceil(self.interval.as_nanos());
        attempts.clamp(1, u128::from(u32::MAX)) as u32
    }
}

/// Suspends the retry loop between attempts.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of [`retry_until`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryOutcome {
    pub succeeded: bool,
    pub attempts: u32,
}

/// Call `attempt` until it returns `true` or the policy's budget is spent.
///
/// `attempt` receives the 1-based attempt number. Once it returns `true`
/// no further attempt is issued.
pub async fn retry_until<F, Fut>(
    policy: &RetryPolicy,
    pause: &dyn Pause,
    mut attempt: F,
) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let max = policy.max_attempts();

    for n in 1..=max {
        if attempt(n).await {
            return RetryOutcome {
                succeeded: true,
                attempts: n,
            };
        }
        if n < max {
            pause.pause(policy.interval).await;
        }
    }

    RetryOutcome {
        succeeded: false,
        attempts: max,
    }
}
