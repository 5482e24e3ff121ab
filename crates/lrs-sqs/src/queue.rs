use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lrs_domain::{IngestError, IngestResult, QueueMessage, StatementQueue};
use tracing::{debug, info, warn};

/// SQS-backed statement queue.
///
/// Maps the lease/delete protocol onto `ReceiveMessage` (visibility timeout
/// as the lease window) and `DeleteMessage` (receipt handle as the lease
/// credential).
pub struct SqsStatementQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsStatementQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }

    /// Build a queue client from the ambient AWS credential chain.
    pub async fn from_env(queue_url: String) -> Self {
        info!(queue_url = %queue_url, "connecting to SQS");
        let config =
            aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_sqs::Client::new(&config), queue_url)
    }
}

#[async_trait]
impl StatementQueue for SqsStatementQueue {
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> IngestResult<Vec<QueueMessage>> {
        // SQS caps a single receive at 10 messages.
        let max_messages = max_messages.min(10) as i32;

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .visibility_timeout(visibility_timeout.as_secs() as i32)
            .send()
            .await
            .map_err(|e| IngestError::Dispatch(anyhow::anyhow!(e)))?;

        let mut messages = Vec::new();
        for message in output.messages() {
            match (message.body(), message.receipt_handle()) {
                (Some(body), Some(receipt_handle)) => messages.push(QueueMessage {
                    body: Bytes::copy_from_slice(body.as_bytes()),
                    receipt_handle: receipt_handle.to_string(),
                }),
                _ => {
                    warn!(
                        message_id = ?message.message_id(),
                        "skipping message without body or receipt handle"
                    );
                }
            }
        }

        debug!(message_count = messages.len(), "received SQS batch");
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> IngestResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| IngestError::Delete(anyhow::anyhow!(e)))?;
        Ok(())
    }
}

// Unit tests would need a live SQS endpoint to construct real receive
// responses; this adapter is exercised by the pipeline's integration tests
// through the StatementQueue trait instead.
