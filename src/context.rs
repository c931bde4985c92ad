use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::OctobeError;

/// Cancellation and deadline scope for every call a scheme makes.
///
/// Cancelling the token (or passing the deadline) resolves the in-flight call with
/// `OctobeError::Cancelled` / `OctobeError::DeadlineExceeded` and asks the driver to abort the
/// running statement.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled through an existing token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Child context: cancelled with its parent, cancellable on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Tighten the deadline to `timeout` from now. An earlier existing deadline wins.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fails fast if the context is already done.
    pub(crate) fn check(&self) -> Result<(), OctobeError> {
        if self.token.is_cancelled() {
            return Err(OctobeError::Cancelled);
        }
        if self.deadline.is_some_and(|at| at <= Instant::now()) {
            return Err(OctobeError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` until it completes or the context ends; `on_abort` runs only in the latter case.
    pub(crate) async fn bound<F, T, A>(&self, fut: F, on_abort: A) -> Result<T, OctobeError>
    where
        F: Future<Output = Result<T, OctobeError>>,
        A: FnOnce(),
    {
        self.check()?;
        let outcome = tokio::select! {
            biased;
            () = self.token.cancelled() => Err(OctobeError::Cancelled),
            () = expire(self.deadline) => Err(OctobeError::DeadlineExceeded),
            res = fut => return res,
        };
        on_abort();
        outcome
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test(flavor = "current_thread")]
    async fn completes_when_not_cancelled() {
        let ctx = Context::background();
        let res = ctx.bound(async { Ok::<_, OctobeError>(7) }, || {}).await;
        assert_eq!(res.ok(), Some(7));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancelled_before_start_fails_fast() {
        let ctx = Context::background();
        ctx.cancel();
        let aborted = AtomicBool::new(false);
        let res = ctx
            .bound(async { Ok::<_, OctobeError>(()) }, || {
                aborted.store(true, Ordering::SeqCst);
            })
            .await;
        assert!(res.is_err_and(|e| e.is(ErrorKind::Cancelled)));
        assert!(!aborted.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn deadline_aborts_in_flight_work() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let aborted = AtomicBool::new(false);
        let res = ctx
            .bound(
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, OctobeError>(())
                },
                || aborted.store(true, Ordering::SeqCst),
            )
            .await;
        assert!(res.is_err_and(|e| e.is(ErrorKind::DeadlineExceeded)));
        assert!(aborted.load(Ordering::SeqCst));
    }

    #[test]
    fn earlier_deadline_wins() {
        let soon = Instant::now() + Duration::from_secs(1);
        let ctx = Context::background()
            .with_deadline(soon)
            .with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(soon));
    }

    #[test]
    fn child_follows_parent() {
        let parent = Context::background();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
