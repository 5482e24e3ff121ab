use std::sync::Arc;

use lrs_domain::{
    classify, FormatTag, IngestError, IngestResult, InvocationContext, PersistedStatement,
    QueueMessage, StatementPayload, StatementQueue, StatementStore, WriteAuthGate,
};
use tracing::{debug, error, info, instrument, warn};

/// Processes one leased queue message end to end.
///
/// Flow:
/// 1. Parse the message body as a statement payload
/// 2. Classify the payload's wire format
/// 3. Verify write authorization
/// 4. Save through the store selected by format
/// 5. Delete the message by its receipt handle
///
/// Every failure leaves the message un-acknowledged; lease expiry and queue
/// redelivery are the only retry mechanism. Attempts are stateless and
/// independent across messages.
pub struct MessageProcessor {
    queue: Arc<dyn StatementQueue>,
    auth_gate: Arc<dyn WriteAuthGate>,
    xapi_store: Arc<dyn StatementStore>,
    caliper_store: Arc<dyn StatementStore>,
}

impl MessageProcessor {
    pub fn new(
        queue: Arc<dyn StatementQueue>,
        auth_gate: Arc<dyn WriteAuthGate>,
        xapi_store: Arc<dyn StatementStore>,
        caliper_store: Arc<dyn StatementStore>,
    ) -> Self {
        Self {
            queue,
            auth_gate,
            xapi_store,
            caliper_store,
        }
    }

    fn store_for(&self, format: FormatTag) -> &Arc<dyn StatementStore> {
        match format {
            FormatTag::Xapi => &self.xapi_store,
            FormatTag::Caliper => &self.caliper_store,
        }
    }

    #[instrument(skip(self, message, ctx), fields(invocation_id = %ctx.invocation_id, body_size = message.body.len()))]
    pub async fn process(
        &self,
        message: QueueMessage,
        ctx: &InvocationContext,
    ) -> IngestResult<PersistedStatement> {
        let payload = parse_statement(&message.body)?;

        let format = classify(&payload)?;
        debug!(format = %format, "classified statement");

        self.auth_gate.verify_write(ctx, &payload).await?;

        let persisted = self.store_for(format).save(ctx, &payload).await?;
        info!(uuid = %persisted.uuid, format = %format, "statement persisted");

        // Persistence and deletion are not atomic: if this delete fails the
        // message is redelivered and the statement may be persisted twice.
        if let Err(e) = self.queue.delete(&message.receipt_handle).await {
            error!(
                uuid = %persisted.uuid,
                error = %e,
                "statement persisted but acknowledgment failed; redelivery will reprocess it"
            );
            return Err(e);
        }

        debug!(uuid = %persisted.uuid, "message acknowledged");
        Ok(persisted)
    }
}

/// Decode a message body into a statement payload.
///
/// A body that parses as JSON but is not an object cannot carry either field
/// set, so it fails classification rather than parsing.
fn parse_statement(body: &[u8]) -> IngestResult<StatementPayload> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "message body is not well formed JSON");
        IngestError::Parse(e.to_string())
    })?;

    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => {
            warn!(kind = json_kind(&other), "message body is not a JSON object");
            Err(IngestError::Classification)
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use lrs_domain::{
        MockStatementQueue, MockStatementStore, MockWriteAuthGate, PersistedStatement,
    };
    use uuid::Uuid;

    fn message(body: &str) -> QueueMessage {
        QueueMessage {
            body: Bytes::copy_from_slice(body.as_bytes()),
            receipt_handle: "rh-1".to_string(),
        }
    }

    fn context() -> InvocationContext {
        InvocationContext {
            function_name: "statement-ingest".to_string(),
            log_group_name: "/ingest/statement-ingest".to_string(),
            log_stream_name: "stream".to_string(),
            invocation_id: "inv-1".to_string(),
        }
    }

    const XAPI_BODY: &str =
        r#"{"id":"1","actor":"a","verb":"v","object":"o","timestamp":"t"}"#;
    const CALIPER_BODY: &str =
        r#"{"id":"1","@context":"x","eventTime":"t","actor":"a","object":"o"}"#;

    fn persisted(format: FormatTag) -> PersistedStatement {
        PersistedStatement {
            uuid: Uuid::new_v4(),
            format,
        }
    }

    #[tokio::test]
    async fn test_xapi_message_is_saved_and_acknowledged() {
        // Arrange
        let mut mock_queue = MockStatementQueue::new();
        let mut mock_gate = MockWriteAuthGate::new();
        let mut mock_xapi = MockStatementStore::new();
        let mock_caliper = MockStatementStore::new();

        mock_gate
            .expect_verify_write()
            .times(1)
            .returning(|_, _| Ok(()));
        mock_xapi
            .expect_save()
            .withf(|_, statement| statement.get("verb").is_some())
            .times(1)
            .returning(|_, _| Ok(persisted(FormatTag::Xapi)));
        mock_queue
            .expect_delete()
            .withf(|handle| handle == "rh-1")
            .times(1)
            .returning(|_| Ok(()));

        let processor = MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(mock_xapi),
            Arc::new(mock_caliper),
        );

        // Act
        let result = processor.process(message(XAPI_BODY), &context()).await;

        // Assert
        assert_eq!(result.unwrap().format, FormatTag::Xapi);
    }

    #[tokio::test]
    async fn test_caliper_message_routes_to_caliper_store() {
        let mut mock_queue = MockStatementQueue::new();
        let mut mock_gate = MockWriteAuthGate::new();
        let mock_xapi = MockStatementStore::new();
        let mut mock_caliper = MockStatementStore::new();

        mock_gate
            .expect_verify_write()
            .times(1)
            .returning(|_, _| Ok(()));
        mock_caliper
            .expect_save()
            .times(1)
            .returning(|_, _| Ok(persisted(FormatTag::Caliper)));
        mock_queue.expect_delete().times(1).returning(|_| Ok(()));

        let processor = MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(mock_xapi),
            Arc::new(mock_caliper),
        );

        let result = processor.process(message(CALIPER_BODY), &context()).await;

        assert_eq!(result.unwrap().format, FormatTag::Caliper);
    }

    #[tokio::test]
    async fn test_unclassifiable_message_skips_auth_store_and_delete() {
        // No expectations on gate, stores, or delete: any call panics the mock.
        let mock_queue = MockStatementQueue::new();
        let mock_gate = MockWriteAuthGate::new();
        let mock_xapi = MockStatementStore::new();
        let mock_caliper = MockStatementStore::new();

        let processor = MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(mock_xapi),
            Arc::new(mock_caliper),
        );

        let result = processor
            .process(message(r#"{"foo":"bar"}"#), &context())
            .await;

        assert!(matches!(result, Err(IngestError::Classification)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_parse_error() {
        let mock_queue = MockStatementQueue::new();
        let mock_gate = MockWriteAuthGate::new();
        let mock_xapi = MockStatementStore::new();
        let mock_caliper = MockStatementStore::new();

        let processor = MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(mock_xapi),
            Arc::new(mock_caliper),
        );

        let result = processor.process(message("not json"), &context()).await;

        assert!(matches!(result, Err(IngestError::Parse(_))));
    }

    #[tokio::test]
    async fn test_auth_failure_blocks_store_and_delete() {
        let mock_queue = MockStatementQueue::new();
        let mut mock_gate = MockWriteAuthGate::new();
        let mock_xapi = MockStatementStore::new();
        let mock_caliper = MockStatementStore::new();

        mock_gate
            .expect_verify_write()
            .times(1)
            .returning(|_, _| Err(IngestError::Auth("unknown caller".to_string())));

        let processor = MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(mock_xapi),
            Arc::new(mock_caliper),
        );

        let result = processor.process(message(XAPI_BODY), &context()).await;

        assert!(matches!(result, Err(IngestError::Auth(_))));
    }

    #[tokio::test]
    async fn test_store_failure_leaves_message_unacknowledged() {
        let mock_queue = MockStatementQueue::new();
        let mut mock_gate = MockWriteAuthGate::new();
        let mut mock_xapi = MockStatementStore::new();
        let mock_caliper = MockStatementStore::new();

        mock_gate
            .expect_verify_write()
            .times(1)
            .returning(|_, _| Ok(()));
        mock_xapi
            .expect_save()
            .times(1)
            .returning(|_, _| Err(IngestError::store(Some(500), "db down")));

        let processor = MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(mock_xapi),
            Arc::new(mock_caliper),
        );

        let result = processor.process(message(XAPI_BODY), &context()).await;

        match result {
            Err(IngestError::Store { code, msg }) => {
                assert_eq!(code, 500);
                assert_eq!(msg, "db down");
            }
            other => panic!("expected store error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_failure_after_save_surfaces_as_delete_error() {
        let mut mock_queue = MockStatementQueue::new();
        let mut mock_gate = MockWriteAuthGate::new();
        let mut mock_xapi = MockStatementStore::new();
        let mock_caliper = MockStatementStore::new();

        mock_gate
            .expect_verify_write()
            .times(1)
            .returning(|_, _| Ok(()));
        mock_xapi
            .expect_save()
            .times(1)
            .returning(|_, _| Ok(persisted(FormatTag::Xapi)));
        mock_queue
            .expect_delete()
            .times(1)
            .returning(|_| Err(IngestError::Delete(anyhow::anyhow!("lease expired"))));

        let processor = MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(mock_xapi),
            Arc::new(mock_caliper),
        );

        let result = processor.process(message(XAPI_BODY), &context()).await;

        assert!(matches!(result, Err(IngestError::Delete(_))));
    }
}
