use async_trait::async_trait;

use crate::error::IngestResult;
use crate::types::{InvocationContext, StatementPayload};

/// Write-authorization check, called before any persistence attempt.
///
/// A failure is terminal for the current attempt; the message itself may
/// still come back through queue redelivery.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WriteAuthGate: Send + Sync {
    async fn verify_write(
        &self,
        ctx: &InvocationContext,
        statement: &StatementPayload,
    ) -> IngestResult<()>;
}
