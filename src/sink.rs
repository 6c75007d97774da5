use tokio::sync::mpsc;

use crate::context::ScrapeContext;
use crate::error::{CollectError, Result};
use crate::models::Sample;

/// Default channel capacity between scrapers and the sample consumer.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Producer side of the bounded sample channel. Cheap to clone; every worker
/// gets its own handle.
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: mpsc::Sender<Sample>,
}

impl SampleSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Sample>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Waits for room in the channel unless the context fires first. A closed
    /// consumer ends the send immediately.
    pub async fn send(&self, ctx: &ScrapeContext, sample: Sample) -> Result<()> {
        ctx.guard(self.tx.send(sample))
            .await?
            .map_err(|_| CollectError::SinkClosed)
    }

    pub async fn send_all(
        &self,
        ctx: &ScrapeContext,
        samples: impl IntoIterator<Item = Sample>,
    ) -> Result<()> {
        for sample in samples {
            self.send(ctx, sample).await?;
        }
        Ok(())
    }
}

/// Drains a receiver until every producer handle is dropped.
pub async fn drain(mut rx: mpsc::Receiver<Sample>) -> Vec<Sample> {
    let mut samples = Vec::new();
    while let Some(sample) = rx.recv().await {
        samples.push(sample);
    }
    samples
}
