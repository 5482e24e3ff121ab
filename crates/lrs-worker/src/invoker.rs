use std::sync::Arc;

use async_trait::async_trait;
use lrs_domain::{
    IngestError, IngestResult, InvocationContext, ProcessorInvoker, QueueMessage,
};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::processor::MessageProcessor;

/// Semaphore-bounded, fire-and-forget processor invocations.
///
/// Acquiring a permit is the acceptance step: `invoke` suspends while all
/// permits are in flight, which bounds concurrent processors without the
/// dispatcher ever waiting on processing itself. The spawned task owns the
/// permit and one fresh invocation context for the attempt.
pub struct TaskInvoker {
    processor: Arc<MessageProcessor>,
    context: InvocationContext,
    permits: Arc<Semaphore>,
}

impl TaskInvoker {
    /// `context` is the template identity; each invocation gets a copy with
    /// its own invocation id.
    pub fn new(
        processor: Arc<MessageProcessor>,
        context: InvocationContext,
        max_in_flight: usize,
    ) -> Self {
        Self {
            processor,
            context,
            permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }
}

#[async_trait]
impl ProcessorInvoker for TaskInvoker {
    async fn invoke(&self, message: QueueMessage) -> IngestResult<()> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| IngestError::Dispatch(anyhow::anyhow!(e)))?;

        let processor = Arc::clone(&self.processor);
        let ctx = self.context.with_invocation_id(Uuid::new_v4().to_string());

        tokio::spawn(async move {
            let _permit = permit;
            match processor.process(message, &ctx).await {
                Ok(persisted) => {
                    debug!(
                        invocation_id = %ctx.invocation_id,
                        uuid = %persisted.uuid,
                        "message processed"
                    );
                }
                Err(e) => {
                    warn!(
                        invocation_id = %ctx.invocation_id,
                        error = %e,
                        "message processing failed; lease expiry will redeliver"
                    );
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use lrs_domain::{
        FormatTag, MockStatementQueue, MockStatementStore, MockWriteAuthGate,
        PersistedStatement, StatementPayload, StatementStore,
    };
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    const XAPI_BODY: &[u8] = br#"{"id":"1","actor":"a","verb":"v","object":"o","timestamp":"t"}"#;

    fn message() -> QueueMessage {
        QueueMessage {
            body: Bytes::from_static(XAPI_BODY),
            receipt_handle: "rh-1".to_string(),
        }
    }

    fn template_context() -> InvocationContext {
        InvocationContext {
            function_name: "statement-ingest".to_string(),
            log_group_name: "/ingest/statement-ingest".to_string(),
            log_stream_name: "stream".to_string(),
            invocation_id: String::new(),
        }
    }

    fn persisted() -> PersistedStatement {
        PersistedStatement {
            uuid: Uuid::new_v4(),
            format: FormatTag::Xapi,
        }
    }

    /// Store that parks the first save until released, to pin a permit.
    struct StallingStore {
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl StatementStore for StallingStore {
        async fn save(
            &self,
            _ctx: &InvocationContext,
            _statement: &StatementPayload,
        ) -> IngestResult<PersistedStatement> {
            let rx = self.release.lock().unwrap().take();
            if let Some(rx) = rx {
                let _ = rx.await;
            }
            Ok(persisted())
        }
    }

    #[tokio::test]
    async fn test_invoke_accepts_and_processes_in_background() {
        let mut mock_queue = MockStatementQueue::new();
        let mut mock_gate = MockWriteAuthGate::new();
        let mut mock_xapi = MockStatementStore::new();
        let mock_caliper = MockStatementStore::new();

        mock_gate
            .expect_verify_write()
            // The template context must arrive with a fresh invocation id.
            .withf(|ctx, _| !ctx.invocation_id.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));
        mock_xapi
            .expect_save()
            .times(1)
            .returning(|_, _| Ok(persisted()));

        let (done_tx, done_rx) = oneshot::channel::<()>();
        let done_tx = Mutex::new(Some(done_tx));
        mock_queue.expect_delete().times(1).returning(move |_| {
            if let Some(tx) = done_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            Ok(())
        });

        let processor = Arc::new(MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(mock_xapi),
            Arc::new(mock_caliper),
        ));
        let invoker = TaskInvoker::new(processor, template_context(), 4);

        invoker.invoke(message()).await.unwrap();

        // The delete is the last step of processing; waiting on it proves the
        // spawned invocation ran to completion.
        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .expect("processing did not complete")
            .unwrap();
    }

    #[tokio::test]
    async fn test_acceptance_waits_for_a_free_permit() {
        let mut mock_queue = MockStatementQueue::new();
        let mut mock_gate = MockWriteAuthGate::new();
        let mock_caliper = MockStatementStore::new();

        mock_gate.expect_verify_write().returning(|_, _| Ok(()));
        mock_queue.expect_delete().returning(|_| Ok(()));

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let stalling_store = StallingStore {
            release: Mutex::new(Some(release_rx)),
        };

        let processor = Arc::new(MessageProcessor::new(
            Arc::new(mock_queue),
            Arc::new(mock_gate),
            Arc::new(stalling_store),
            Arc::new(mock_caliper),
        ));
        let invoker = Arc::new(TaskInvoker::new(processor, template_context(), 1));

        // First invocation is accepted, then parks inside save holding the
        // only permit.
        invoker.invoke(message()).await.unwrap();

        // Second submission cannot be accepted while the permit is held.
        let blocked = {
            let invoker = Arc::clone(&invoker);
            tokio::spawn(async move { invoker.invoke(message()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        // Releasing the first invocation frees the permit.
        release_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("second submission was never accepted")
            .unwrap()
            .unwrap();
    }
}
