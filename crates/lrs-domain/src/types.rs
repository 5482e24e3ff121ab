use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IngestError;

/// A statement payload as it arrives off the wire: a JSON object whose shape
/// decides its format. Simple map type for now - can evolve to newtypes later
pub type StatementPayload = serde_json::Map<String, serde_json::Value>;

/// A message leased from the ingest queue.
///
/// The receipt handle is a one-time credential for the current lease; it is
/// required to delete the message and stops working once the lease (visibility
/// window) expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: Bytes,
    pub receipt_handle: String,
}

/// Wire format of a classified statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Xapi,
    Caliper,
}

impl FormatTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Xapi => "XAPI",
            FormatTag::Caliper => "Caliper",
        }
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-invocation identity threaded through to the auth gate and the
/// response envelope. Opaque to the pipeline itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub function_name: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub invocation_id: String,
}

impl InvocationContext {
    /// Copy of this context stamped with a fresh invocation id.
    pub fn with_invocation_id(&self, invocation_id: String) -> Self {
        Self {
            invocation_id,
            ..self.clone()
        }
    }
}

/// Result of a successful store save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedStatement {
    pub uuid: Uuid,
    pub format: FormatTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestOutcome {
    Success,
    Failed,
}

/// The uniform response body of the synchronous ingest path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub log_group_name: String,
    pub log_stream_name: String,
    pub function_name: String,
    pub invokeid: String,
    pub result: IngestOutcome,
    pub code: i32,
    pub msg: String,
}

impl ResponseEnvelope {
    pub fn success(ctx: &InvocationContext, code: i32, msg: String) -> Self {
        Self::build(ctx, IngestOutcome::Success, code, msg)
    }

    pub fn failure(ctx: &InvocationContext, error: &IngestError) -> Self {
        Self::build(
            ctx,
            IngestOutcome::Failed,
            error.status_code(),
            error.to_string(),
        )
    }

    fn build(ctx: &InvocationContext, result: IngestOutcome, code: i32, msg: String) -> Self {
        Self {
            log_group_name: ctx.log_group_name.clone(),
            log_stream_name: ctx.log_stream_name.clone(),
            function_name: ctx.function_name.clone(),
            invokeid: ctx.invocation_id.clone(),
            result,
            code,
            msg,
        }
    }
}
