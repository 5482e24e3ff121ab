use async_trait::async_trait;

use crate::error::IngestResult;
use crate::types::QueueMessage;

/// Fan-out seam between the poll dispatcher and message processing.
///
/// `invoke` returns once the invocation has been accepted; completion is
/// never awaited and no processing outcome flows back to the dispatcher.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProcessorInvoker: Send + Sync {
    async fn invoke(&self, message: QueueMessage) -> IngestResult<()>;
}
