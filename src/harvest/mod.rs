pub mod dispatcher;
pub mod error;
pub mod page;
pub mod pipeline;
pub mod task;

// Re-export common types
pub use dispatcher::{Dispatcher, IndexRange, Report};
pub use error::JobError;
pub use pipeline::{Pipeline, PipelineSettings};
pub use task::{Job, JobResult, JobStatus};
