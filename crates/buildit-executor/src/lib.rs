//! The container execution driver (C8): pulls an image, creates a
//! container running a job's shell commands, starts it, waits for exit,
//! retrieves its logs, and removes it.
//!
//! A single backend (Docker, via `bollard`) is provided, matching the
//! original implementation — Kubernetes is the worker pool controller's
//! concern (C9), not the job executor's.

pub mod docker;

pub use buildit_core::executor::{ContainerResult, Executor, JobSpec};
pub use docker::DockerExecutor;
