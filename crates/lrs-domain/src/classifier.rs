use crate::error::{IngestError, IngestResult};
use crate::types::{FormatTag, StatementPayload};

/// Classification rules, in decision order.
///
/// The two field sets are not disjoint: a payload can satisfy both. Caliper is
/// checked first as a fixed policy, so an ambiguous payload always classifies
/// as Caliper.
const RULES: [(&[&str], FormatTag); 2] = [
    (
        &["id", "@context", "eventTime", "actor", "object"],
        FormatTag::Caliper,
    ),
    (
        &["id", "actor", "verb", "object", "timestamp"],
        FormatTag::Xapi,
    ),
];

/// Determine the wire format of a statement payload from field presence.
///
/// Pure and synchronous; the returned tag is fixed for the remainder of the
/// processing attempt.
pub fn classify(payload: &StatementPayload) -> IngestResult<FormatTag> {
    for (fields, tag) in RULES {
        if fields.iter().all(|field| payload.contains_key(*field)) {
            return Ok(tag);
        }
    }
    Err(IngestError::Classification)
}
