pub mod auth;
pub mod classifier;
pub mod error;
pub mod invoker;
pub mod queue;
pub mod store;
pub mod types;

pub use auth::*;
pub use classifier::classify;
pub use error::{IngestError, IngestResult};
pub use invoker::*;
pub use queue::*;
pub use store::*;
pub use types::*;
