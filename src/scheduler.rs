use std::future::Future;
use tokio::task::JoinSet;

use crate::context::ScrapeContext;
use crate::error::{CollectError, Result};

/// Runs `worker` once per organization, all concurrently, and waits for every
/// task to finish. The first error is returned; as soon as it is seen the
/// shared context is cancelled so the remaining workers stop at their next
/// suspension point. Errors after the first are logged and dropped.
pub async fn for_each_organization<F, Fut>(
    ctx: &ScrapeContext,
    organizations: &[String],
    worker: F,
) -> Result<()>
where
    F: Fn(ScrapeContext, String) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let group = ctx.child();
    let mut tasks = JoinSet::new();
    for org in organizations {
        let fut = worker(group.clone(), org.clone());
        let org = org.clone();
        tasks.spawn(async move { (org, fut.await) });
    }

    let mut first_err: Option<CollectError> = None;
    while let Some(joined) = tasks.join_next().await {
        let (org, res) = match joined {
            Ok(out) => out,
            Err(e) => ("<unknown>".to_string(), Err(CollectError::WorkerPanicked(e.to_string()))),
        };
        let Err(e) = res else {
            continue;
        };
        if first_err.is_none() {
            tracing::debug!("organization {org} failed, cancelling siblings: {e}");
            group.cancel();
            first_err = Some(e);
        } else if !e.is_cancellation() {
            tracing::warn!("organization {org} also failed: {e}");
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
