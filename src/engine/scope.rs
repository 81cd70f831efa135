//! Per-operation cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StreamError;

/// A cancellable, deadline-bound window for one engine operation.
///
/// Each scope starts its own clock when created, so concurrent operations on
/// the same client never share a deadline. Dropping the scope cancels it;
/// [`cancel`](Self::cancel) releases it early.
#[derive(Debug)]
pub struct RequestScope {
    token: CancellationToken,
    deadline: Instant,
    timeout: Duration,
}

impl RequestScope {
    /// Start a scope that expires `timeout` from now.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| far_future(now));
        Self {
            token: CancellationToken::new(),
            deadline,
            timeout,
        }
    }

    /// Cancel the operation. Calling this more than once has no further
    /// effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The instant after which guarded futures fail with
    /// [`StreamError::TimedOut`].
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The timeout this scope was created with.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A token that is cancelled together with this scope, for observing
    /// its release after the scope has been moved.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Run `future` until it completes, the scope is cancelled, or the
    /// deadline passes.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Cancelled` if the scope is cancelled first, and
    /// `StreamError::TimedOut` if the deadline passes first. Cancellation
    /// wins when both have already happened.
    pub async fn guard<F: Future>(&self, future: F) -> Result<F::Output, StreamError> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(StreamError::Cancelled),
            () = tokio::time::sleep_until(self.deadline) => Err(StreamError::TimedOut {
                seconds: self.timeout.as_secs(),
            }),
            output = future => Ok(output),
        }
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            debug!("releasing request scope");
        }
        self.token.cancel();
    }
}

/// Roughly thirty years ahead, for timeouts too large to represent.
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86_400 * 365 * 30)
}
