use async_trait::async_trait;
use chrono::Utc;
use lrs_domain::{
    FormatTag, IngestError, IngestResult, InvocationContext, PersistedStatement,
    StatementPayload, StatementStore,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::client::PostgresClient;

/// PostgreSQL store for Caliper event statements.
#[derive(Clone)]
pub struct PostgresCaliperStore {
    client: PostgresClient,
}

impl PostgresCaliperStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatementStore for PostgresCaliperStore {
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
        let event_id = statement
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let event_time = statement
            .get("eventTime")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let payload = serde_json::Value::Object(statement.clone());
        let received_at = Utc::now();

        let result = conn
            .execute(
                "INSERT INTO caliper_events (uuid, event_id, event_time, payload, received_at)
                 VALUES ($1, $2, $3, $4, $5)",
                &[&uuid, &event_id, &event_time, &payload, &received_at],
            )
            .await;

        if let Err(e) = result {
            if let Some(db_err) = e.as_db_error() {
                if db_err.code().code() == "23505" {
                    return Err(IngestError::store(
                        Some(409),
                        format!("Caliper event already exists: {event_id}"),
                    ));
                }
            }
            return Err(IngestError::store(Some(500), e.to_string()));
        }

        debug!(uuid = %uuid, event_id = %event_id, "stored Caliper event");

        Ok(PersistedStatement {
            uuid,
            format: FormatTag::Caliper,
        })
    }
}
