//! Job scheduling for BuildIt CI/CD.
//!
//! Two tiers, both queue-driven rather than a shared in-process
//! scheduler: the pipeline dispatcher (C6) turns one pipeline submission
//! into a tree of stage/job reports and job-queue messages; the job
//! executor (C7) turns one job-queue message into a container run.

pub mod dispatcher;
pub mod executor;

pub use dispatcher::{Dispatcher, DispatcherError};
pub use executor::{JobExecutor, JobExecutorError};
