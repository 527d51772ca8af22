mod context;
mod data_queue;
mod queue;

pub use context::{JobWorkerContext, job_failed};
pub use data_queue::process_data_queue_job;
pub use queue::enqueue_job;
