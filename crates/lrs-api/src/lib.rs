pub mod handler;

pub use handler::{IngestRequest, StatementIngestHandler};
