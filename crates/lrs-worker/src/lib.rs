pub mod dispatcher;
pub mod invoker;
pub mod processor;

pub use dispatcher::{PollDispatcher, PollDispatcherConfig, PollSummary, MAX_BATCH_SIZE};
pub use invoker::TaskInvoker;
pub use processor::MessageProcessor;
