use thiserror::Error;

/// Closed error taxonomy for one statement's processing attempt.
///
/// Display strings double as the `msg` field of the synchronous response
/// envelope, so they stay fixed; diagnostic detail lives in the variant
/// payloads and is logged, not returned to callers.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The message body or request was not decodable as a JSON document.
    #[error("Request not a well formed JSON")]
    Parse(String),

    /// The payload matched neither the xAPI nor the Caliper field set.
    #[error("Statement not in xAPI or Caliper format")]
    Classification,

    /// The caller is not authorized to write statements.
    #[error("Authentication Failed. Check your credentials")]
    Auth(String),

    /// A statement store adapter refused or failed the save.
    #[error("{msg}")]
    Store { code: i32, msg: String },

    /// Acknowledgment (delete) failed after a successful save.
    #[error("Failed to acknowledge message: {0}")]
    Delete(#[source] anyhow::Error),

    /// Batch fetch or fan-out submission failed.
    #[error("Message dispatch failed: {0}")]
    Dispatch(#[source] anyhow::Error),
}

impl IngestError {
    /// Store error with the adapter-reported code, defaulting to 400 when the
    /// adapter gives none.
    pub fn store(code: Option<i32>, msg: impl Into<String>) -> Self {
        IngestError::Store {
            code: code.unwrap_or(400),
            msg: msg.into(),
        }
    }

    /// Numeric status for the response envelope.
    pub fn status_code(&self) -> i32 {
        match self {
            IngestError::Parse(_) => 400,
            IngestError::Classification => 400,
            IngestError::Auth(_) => 401,
            IngestError::Store { code, .. } => *code,
            IngestError::Delete(_) => 500,
            IngestError::Dispatch(_) => 500,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_defaults_to_400() {
        let err = IngestError::store(None, "save rejected");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "save rejected");
    }

    #[test]
    fn test_store_error_keeps_adapter_code() {
        let err = IngestError::store(Some(500), "db down");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(IngestError::Parse("bad".to_string()).status_code(), 400);
        assert_eq!(IngestError::Classification.status_code(), 400);
        assert_eq!(IngestError::Auth("no row".to_string()).status_code(), 401);
    }

    #[test]
    fn test_display_strings_are_fixed() {
        assert_eq!(
            IngestError::Parse("line 1 column 2".to_string()).to_string(),
            "Request not a well formed JSON"
        );
        assert_eq!(
            IngestError::Auth("unknown caller".to_string()).to_string(),
            "Authentication Failed. Check your credentials"
        );
    }
}
