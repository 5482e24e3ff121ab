use async_trait::async_trait;
use lrs_domain::{
    IngestError, IngestResult, InvocationContext, StatementPayload, WriteAuthGate,
};
use tracing::{debug, instrument, warn};

use crate::client::PostgresClient;

/// Credential check against the `write_credentials` table.
///
/// A caller may write statements when a row for its function name exists with
/// writes enabled. Any lookup failure is an auth failure: the gate never
/// fails open.
#[derive(Clone)]
pub struct PostgresWriteAuthGate {
    client: PostgresClient,
}

impl PostgresWriteAuthGate {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WriteAuthGate for PostgresWriteAuthGate {
    #[instrument(skip(self, _statement), fields(function_name = %ctx.function_name))]
    async fn verify_write(
        &self,
        ctx: &InvocationContext,
        _statement: &StatementPayload,
    ) -> IngestResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(|e| IngestError::Auth(format!("failed to acquire connection: {e}")))?;

        let row = conn
            .query_opt(
                "SELECT write_enabled FROM write_credentials WHERE caller_name = $1",
                &[&ctx.function_name],
            )
            .await
            .map_err(|e| IngestError::Auth(format!("credential lookup failed: {e}")))?;

        match row {
            Some(row) if row.get::<_, bool>(0) => {
                debug!("write credentials verified");
                Ok(())
            }
            Some(_) => {
                warn!("caller has writes disabled");
                Err(IngestError::Auth(format!(
                    "writes disabled for caller: {}",
                    ctx.function_name
                )))
            }
            None => {
                warn!("caller has no write credentials");
                Err(IngestError::Auth(format!(
                    "no credentials for caller: {}",
                    ctx.function_name
                )))
            }
        }
    }
}
