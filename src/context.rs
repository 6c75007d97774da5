use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CollectError, Result};

/// Cancellation signal plus optional deadline shared by everything taking
/// part in one collection cycle.
#[derive(Debug, Clone, Default)]
pub struct ScrapeContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ScrapeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// A context cancelled whenever this one is, which can also be cancelled
    /// on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Like [`child`](Self::child) but with a deadline no later than `deadline`.
    pub fn child_with_deadline(&self, deadline: Instant) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Checks the signal without suspending.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(CollectError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(CollectError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Runs `fut` until it completes, the context is cancelled, or the
    /// deadline passes, whichever happens first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CollectError::Cancelled),
            _ = deadline => Err(CollectError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
