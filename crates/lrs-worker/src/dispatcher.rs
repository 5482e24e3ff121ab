use std::sync::Arc;
use std::time::Duration;

use lrs_domain::{IngestError, IngestResult, ProcessorInvoker, StatementQueue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Hard cap on messages per queue fetch, matching the queue's own receive
/// limit.
pub const MAX_BATCH_SIZE: usize = 10;

/// Outcome of one poll: how many messages were leased and handed off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub messages_received: usize,
}

#[derive(Debug, Clone)]
pub struct PollDispatcherConfig {
    /// Messages requested per fetch; clamped to [`MAX_BATCH_SIZE`].
    pub batch_size: usize,
    /// Lease duration for each fetched message.
    pub visibility_timeout: Duration,
    /// Delay between polls when running under [`PollDispatcher::run`].
    pub poll_interval: Duration,
}

impl Default for PollDispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            visibility_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Leases message batches from the queue and fans each message out as an
/// independent, fire-and-forget processor invocation.
///
/// The dispatcher waits only for invocation *acceptance*, never for
/// processing to complete, so its own execution time is bounded regardless of
/// downstream persistence latency. It never sees per-message outcomes; an
/// un-acknowledged message simply reappears after its lease expires.
pub struct PollDispatcher {
    queue: Arc<dyn StatementQueue>,
    invoker: Arc<dyn ProcessorInvoker>,
    batch_size: usize,
    visibility_timeout: Duration,
    poll_interval: Duration,
}

impl PollDispatcher {
    pub fn new(
        queue: Arc<dyn StatementQueue>,
        invoker: Arc<dyn ProcessorInvoker>,
        config: PollDispatcherConfig,
    ) -> Self {
        Self {
            queue,
            invoker,
            batch_size: config.batch_size.min(MAX_BATCH_SIZE),
            visibility_timeout: config.visibility_timeout,
            poll_interval: config.poll_interval,
        }
    }

    /// One scheduling trigger: fetch a batch and submit every message.
    ///
    /// Each message in the batch gets exactly one submission attempt even if
    /// an earlier submission is rejected; a `Dispatch` error is returned only
    /// after the whole batch has been attempted.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> IngestResult<PollSummary> {
        let messages = self
            .queue
            .receive(self.batch_size, self.visibility_timeout)
            .await?;

        if messages.is_empty() {
            debug!("no messages in batch");
            return Ok(PollSummary {
                messages_received: 0,
            });
        }

        let received = messages.len();
        debug!(message_count = received, "received message batch");

        let mut rejected = 0usize;
        for message in messages {
            if let Err(e) = self.invoker.invoke(message).await {
                error!(error = %e, "processor invocation rejected");
                rejected += 1;
            }
        }

        if rejected > 0 {
            return Err(IngestError::Dispatch(anyhow::anyhow!(
                "{rejected} of {received} invocations rejected"
            )));
        }

        debug!(messages_received = received, "batch dispatched");
        Ok(PollSummary {
            messages_received: received,
        })
    }

    /// Poll on an interval until cancellation.
    ///
    /// Poll errors are logged and the loop continues after a short pause;
    /// one bad poll must not take the pipeline down.
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        debug!(
            batch_size = self.batch_size,
            poll_interval_secs = self.poll_interval.as_secs(),
            "starting poll dispatcher"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("received shutdown signal, stopping poll dispatcher");
                    break;
                }
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(summary) if summary.messages_received > 0 => {
                            debug!(messages_received = summary.messages_received, "poll complete");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(error = %e, "error polling queue");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }

        debug!("poll dispatcher stopped gracefully");
        Ok(())
    }
}
