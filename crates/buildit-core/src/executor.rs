//! The `Executor` trait: the container lifecycle contract the job
//! executor (C7) drives and the container driver (C8) implements.
//!
//! Deliberately low-level and string-keyed (container ids, not typed
//! handles) — it mirrors the original implementation's single-backend
//! Docker API wrapper rather than a multi-backend job-scheduling
//! abstraction, because C8 is specified as exactly that: pull, create,
//! start, wait, get logs, delete.

use async_trait::async_trait;

use crate::Result;

/// Everything the driver needs to create a container for one job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Image to pull and run.
    pub image: String,
    /// Shell commands to run in order, joined with `" && "` and wrapped
    /// in a single `sh -c` invocation by the driver. Includes the
    /// repository checkout preamble; see `buildit_scheduler::executor`.
    pub commands: Vec<String>,
}

/// The outcome of waiting on a finished container.
#[derive(Debug, Clone, Copy)]
pub struct ContainerResult {
    pub exit_code: i64,
}

impl ContainerResult {
    pub fn succeeded(self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Name of this driver, for logging.
    fn name(&self) -> &'static str;

    /// Pull `spec.image`, draining the progress stream.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Create a container running `spec.commands` under `sh -c`, then
    /// rename it to `<prefix>_<containerId>`. Returns the container id.
    async fn create_container(&self, prefix: &str, spec: &JobSpec) -> Result<String>;

    /// Start a created container.
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Block until the container exits. An exit code other than 0 is
    /// still returned successfully (as `ContainerResult`); callers decide
    /// how to treat it. Only transport/engine failures are `Err`.
    async fn wait_container(&self, container_id: &str) -> Result<ContainerResult>;

    /// Merged stdout+stderr captured during the run, with no
    /// timestamps prefixed.
    async fn container_logs(&self, container_id: &str) -> Result<Vec<u8>>;

    /// Force-remove a container. Idempotent with respect to a container
    /// that is already gone.
    async fn delete_container(&self, container_id: &str) -> Result<()>;
}
