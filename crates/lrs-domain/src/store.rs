use async_trait::async_trait;

use crate::error::IngestResult;
use crate::types::{InvocationContext, PersistedStatement, StatementPayload};

/// Persistence boundary for one statement format.
///
/// Safe to call once per message per attempt; the store owns the persisted
/// statement afterwards. Deduplication across redeliveries, if any, is the
/// store's concern.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StatementStore: Send + Sync {
    async fn save(
        &self,
        ctx: &InvocationContext,
        statement: &StatementPayload,
    ) -> IngestResult<PersistedStatement>;
}
