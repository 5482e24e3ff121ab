use std::time::Duration;

use async_trait::async_trait;

use crate::error::IngestResult;
use crate::types::QueueMessage;

/// The statement queue, seen through its lease/delete protocol.
///
/// Infrastructure (e.g. lrs-sqs) implements this trait; the pipeline never
/// sees the underlying transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StatementQueue: Send + Sync {
    /// Lease up to `max_messages` messages, each hidden from other consumers
    /// for `visibility_timeout`. An empty batch is not an error.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> IngestResult<Vec<QueueMessage>>;

    /// Delete (acknowledge) the message whose lease the receipt handle proves.
    /// Fails once the handle is used or the lease has expired.
    async fn delete(&self, receipt_handle: &str) -> IngestResult<()>;
}
