use async_trait::async_trait;
use chrono::Utc;
use lrs_domain::{
    FormatTag, IngestError, IngestResult, InvocationContext, PersistedStatement,
    StatementPayload, StatementStore,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::client::PostgresClient;

/// PostgreSQL store for xAPI statements.
///
/// Each save creates one `xapi_statements` row keyed by a generated uuid,
/// with the full payload as JSONB. A duplicate source statement id maps to a
/// 409 store error; the unique index is the only deduplication in the system.
#[derive(Clone)]
pub struct PostgresXapiStore {
    client: PostgresClient,
}

impl PostgresXapiStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatementStore for PostgresXapiStore {
    #[instrument(skip(self, statement), fields(function_name = %ctx.function_name, invocation_id = %ctx.invocation_id))]
    async fn save(
        &self,
        ctx: &InvocationContext,
        statement: &StatementPayload,
    ) -> IngestResult<PersistedStatement> {
        let conn = self.client.get_connection().await.map_err(|e| {
            IngestError::store(Some(500), format!("failed to acquire connection: {e}"))
        })?;

        let uuid = Uuid::new_v4();
        let statement_id = statement
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let payload = serde_json::Value::Object(statement.clone());
        let received_at = Utc::now();

        let result = conn
            .execute(
                "INSERT INTO xapi_statements (uuid, statement_id, payload, received_at)
                 VALUES ($1, $2, $3, $4)",
                &[&uuid, &statement_id, &payload, &received_at],
            )
            .await;

        if let Err(e) = result {
            if let Some(db_err) = e.as_db_error() {
                // 23505 is unique_violation: this statement id was already stored
                if db_err.code().code() == "23505" {
                    return Err(IngestError::store(
                        Some(409),
                        format!("xAPI statement already exists: {statement_id}"),
                    ));
                }
            }
            return Err(IngestError::store(Some(500), e.to_string()));
        }

        debug!(uuid = %uuid, statement_id = %statement_id, "stored xAPI statement");

        Ok(PersistedStatement {
            uuid,
            format: FormatTag::Xapi,
        })
    }
}
