use std::sync::Arc;

use lrs_domain::{
    classify, FormatTag, IngestError, IngestResult, InvocationContext, ResponseEnvelope,
    StatementPayload, StatementStore, WriteAuthGate,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

/// A synchronous ingest request: either an already-structured document or a
/// raw JSON-encoded string still to be decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IngestRequest {
    Raw(String),
    Document(serde_json::Value),
}

/// The non-queued ingest path.
///
/// Runs the same auth/classify/persist sequence as the queue pipeline, inline,
/// and folds every outcome into a [`ResponseEnvelope`]; nothing escapes the
/// handler boundary. The queue is never involved.
pub struct StatementIngestHandler {
    auth_gate: Arc<dyn WriteAuthGate>,
    xapi_store: Arc<dyn StatementStore>,
    caliper_store: Arc<dyn StatementStore>,
}

impl StatementIngestHandler {
    pub fn new(
        auth_gate: Arc<dyn WriteAuthGate>,
        xapi_store: Arc<dyn StatementStore>,
        caliper_store: Arc<dyn StatementStore>,
    ) -> Self {
        Self {
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

    #[instrument(skip(self, request, ctx), fields(invocation_id = %ctx.invocation_id))]
    pub async fn handle(
        &self,
        request: IngestRequest,
        ctx: &InvocationContext,
    ) -> ResponseEnvelope {
        let payload = match decode_request(request) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "rejecting malformed request");
                return ResponseEnvelope::failure(ctx, &e);
            }
        };

        if let Err(e) = self.auth_gate.verify_write(ctx, &payload).await {
            warn!(error = %e, "authentication failed");
            return ResponseEnvelope::failure(ctx, &e);
        }

        let format = match classify(&payload) {
            Ok(format) => format,
            Err(e) => {
                warn!(error = %e, "statement did not classify");
                return ResponseEnvelope::failure(ctx, &e);
            }
        };

        match self.store_for(format).save(ctx, &payload).await {
            Ok(persisted) => {
                let msg = format!(
                    "{} statement processing successful with uuid: {}",
                    format, persisted.uuid
                );
                info!(uuid = %persisted.uuid, format = %format, "statement persisted");
                ResponseEnvelope::success(ctx, 201, msg)
            }
            Err(e) => {
                warn!(error = %e, format = %format, "error during save");
                ResponseEnvelope::failure(ctx, &e)
            }
        }
    }
}

fn decode_request(request: IngestRequest) -> IngestResult<StatementPayload> {
    let value = match request {
        IngestRequest::Document(value) => value,
        IngestRequest::Raw(raw) => {
            serde_json::from_str(&raw).map_err(|e| IngestError::Parse(e.to_string()))?
        }
    };

    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(IngestError::Parse(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
