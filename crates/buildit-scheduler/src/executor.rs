//! The job executor (C7): consumes one job-queue message, waits for its
//! sibling dependencies to finish, runs the job in a container, archives
//! its logs, and records the outcome.
//!
//! Grounded on the original implementation's
//! `executor/containers/docker/api.go` (`initContainer`/
//! `handlePostExecution`/`executeJob`/`Execute`) — with the known
//! copy-paste bug in its success branch *not* reproduced: on success this
//! only updates the `JobReport`; on failure it still cascades to the
//! owning `StageReport`/`PipelineReport` immediately, matching the
//! original's failure branch.

use std::time::Duration;

use buildit_cache::Waitboard;
use buildit_core::executor::{Executor, JobSpec};
use buildit_core::queue::JobQueueMessage;
use buildit_core::report::Status;
use buildit_core::Error as CoreError;
use buildit_db::ReportRepo;
use buildit_storage::LogSink;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JobExecutorError {
    #[error(transparent)]
    Db(#[from] buildit_db::DbError),

    #[error(transparent)]
    Cache(#[from] buildit_cache::CacheError),

    #[error(transparent)]
    Storage(#[from] buildit_storage::StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("job run failed ({run}); log upload also failed: {upload}")]
    RunAndUploadFailed {
        run: Box<JobExecutorError>,
        upload: Box<JobExecutorError>,
    },
}

pub type JobExecutorResult<T> = std::result::Result<T, JobExecutorError>;

const DEPENDENCY_POLL_BACKOFF: Duration = Duration::from_secs(10);

/// Result of gating on a job's sibling dependencies.
#[derive(Debug, PartialEq, Eq)]
enum DependencyOutcome {
    /// Every dependency reached SUCCESS; the job may run.
    Ready,
    /// At least one dependency reached FAILED or CANCELED; this job is
    /// cancelled without ever running a container.
    Canceled,
}

/// Decide whether a set of dependency statuses is settled, and if so how:
/// `None` means at least one dependency is still PENDING or unregistered,
/// so the caller should keep polling. Any FAILED/CANCELED dependency
/// short-circuits to `Canceled` even if others are still pending — the
/// job can never reach SUCCESS once one sibling it depends on has, so
/// there's no reason to wait out the rest.
fn resolve_dependency_outcome(statuses: &[Option<Status>]) -> Option<DependencyOutcome> {
    if statuses
        .iter()
        .any(|s| matches!(s, Some(Status::Failed) | Some(Status::Canceled)))
    {
        return Some(DependencyOutcome::Canceled);
    }
    if statuses.iter().all(|s| *s == Some(Status::Success)) {
        return Some(DependencyOutcome::Ready);
    }
    None
}

pub struct JobExecutor {
    reports: Box<dyn ReportRepo>,
    waitboard: Waitboard,
    storage: LogSink,
    driver: Box<dyn Executor>,
}

impl JobExecutor {
    pub fn new(
        reports: Box<dyn ReportRepo>,
        waitboard: Waitboard,
        storage: LogSink,
        driver: Box<dyn Executor>,
    ) -> Self {
        Self {
            reports,
            waitboard,
            storage,
            driver,
        }
    }

    /// Look up one dependency's current status via the waitboard, or
    /// `None` if it hasn't registered itself (or its job row) yet.
    async fn dependency_status(&self, dep: &Uuid) -> JobExecutorResult<Option<Status>> {
        match self.waitboard.get(&dep.to_string()).await {
            Ok(job_id) => {
                let job_id: i64 = job_id
                    .parse()
                    .map_err(|_| CoreError::Internal(format!("non-numeric job id for {dep}")))?;
                Ok(Some(self.reports.get_job_status(job_id).await?))
            }
            Err(buildit_cache::CacheError::Miss(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Block until every dependency UUID resolves (via the waitboard) to
    /// a terminal job status. `Ready` means every dependency reached
    /// SUCCESS; `Canceled` means at least one reached FAILED or CANCELED,
    /// so this job must not run either (invariant: a job downstream of a
    /// failed sibling never reaches SUCCESS). A dependency that hasn't
    /// registered itself on the waitboard yet, or whose status is still
    /// PENDING, is treated as "not done yet" — this polls indefinitely
    /// rather than erroring, per the component's design.
    async fn wait_for_dependencies(
        &self,
        dependencies: &[Uuid],
    ) -> JobExecutorResult<DependencyOutcome> {
        loop {
            let mut statuses = Vec::with_capacity(dependencies.len());
            for dep in dependencies {
                statuses.push(self.dependency_status(dep).await?);
            }
            if let Some(outcome) = resolve_dependency_outcome(&statuses) {
                return Ok(outcome);
            }
            tokio::time::sleep(DEPENDENCY_POLL_BACKOFF).await;
        }
    }

    /// Process one job-queue message end to end.
    pub async fn run(&self, msg: JobQueueMessage) -> JobExecutorResult<()> {
        let dependencies = msg.dependency.get(&msg.id).cloned().unwrap_or_default();
        if let DependencyOutcome::Canceled = self.wait_for_dependencies(&dependencies).await? {
            // A sibling this job depends on already ended FAILED or
            // CANCELED; that sibling's own failure already cascaded the
            // owning stage/pipeline to FAILED, so this job only needs to
            // record its own terminal status.
            self.reports
                .update_job_status_and_end_time(msg.job_id, None, Status::Canceled)
                .await?;
            return Ok(());
        }

        self.waitboard
            .set(&msg.id.to_string(), &msg.job_id.to_string(), 0)
            .await?;

        let job = &msg.message.job;
        let repository = &msg.message.repository;

        let mut commands = vec![
            format!(
                "git clone --no-checkout {} /tmp/repo",
                repository.url
            ),
            "cd /tmp/repo".to_string(),
            format!("git checkout {}", repository.commit_hash),
        ];
        commands.extend(job.script.value.iter().cloned());

        let spec = JobSpec {
            image: job.image.value.clone(),
            commands,
        };

        let (container_id, run_err) = self.run_container(&spec).await;

        let upload_err = if let Some(id) = &container_id {
            self.archive_logs(id).await.err()
        } else {
            None
        };

        let status = if run_err.is_some() {
            Status::Failed
        } else {
            Status::Success
        };
        self.reports
            .update_job_status_and_end_time(msg.job_id, container_id.as_deref(), status)
            .await?;

        if status == Status::Failed {
            // The original implementation cascades a job failure to its
            // owning stage and pipeline immediately, rather than waiting
            // for the dispatcher's level fan-in (which never observes a
            // failure that happens after it already moved on).
            self.reports
                .update_stage_status_and_end_time(msg.stage_id, Status::Failed)
                .await?;
            self.reports
                .update_pipeline_status_and_end_time(msg.pipeline_id, Status::Failed)
                .await?;
        }

        match (run_err, upload_err) {
            (Some(run), Some(upload)) => Err(JobExecutorError::RunAndUploadFailed {
                run: Box::new(run),
                upload: Box::new(upload),
            }),
            (Some(run), None) => Err(run),
            (None, Some(upload)) => Err(upload),
            (None, None) => Ok(()),
        }
    }

    /// Pull, create, start, and wait on a container. Returns the
    /// container id if one was created (even if a later step failed) and
    /// the first error encountered, if any.
    async fn run_container(
        &self,
        spec: &JobSpec,
    ) -> (Option<String>, Option<JobExecutorError>) {
        if let Err(err) = self.driver.pull_image(&spec.image).await {
            return (None, Some(err.into()));
        }

        let container_id = match self.driver.create_container("pipeline", spec).await {
            Ok(id) => id,
            Err(err) => return (None, Some(err.into())),
        };

        if let Err(err) = self.driver.start_container(&container_id).await {
            return (Some(container_id), Some(err.into()));
        }

        match self.driver.wait_container(&container_id).await {
            Ok(result) if result.succeeded() => (Some(container_id), None),
            Ok(result) => (
                Some(container_id),
                Some(
                    CoreError::ExecutionFailed(format!(
                        "container exited with non-zero status: {}",
                        result.exit_code
                    ))
                    .into(),
                ),
            ),
            Err(err) => (Some(container_id), Some(err.into())),
        }
    }

    /// Retrieve a finished container's logs, upload them, and force-
    /// remove the container. Removal failure is logged but never
    /// surfaced — cleanup is best-effort.
    async fn archive_logs(&self, container_id: &str) -> JobExecutorResult<()> {
        let logs = self.driver.container_logs(container_id).await?;
        let object_name = LogSink::object_name_for_container(container_id);
        let upload_result = self.storage.upload_logs(&object_name, logs).await;

        if let Err(err) = self.driver.delete_container(container_id).await {
            tracing::warn!(%container_id, error = %err, "failed to remove container after archiving logs");
        }

        upload_result.map_err(JobExecutorError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_dependencies_is_immediately_ready() {
        assert_eq!(resolve_dependency_outcome(&[]), Some(DependencyOutcome::Ready));
    }

    #[test]
    fn all_success_is_ready() {
        let statuses = [Some(Status::Success), Some(Status::Success)];
        assert_eq!(resolve_dependency_outcome(&statuses), Some(DependencyOutcome::Ready));
    }

    #[test]
    fn any_pending_or_unregistered_keeps_polling() {
        assert_eq!(resolve_dependency_outcome(&[Some(Status::Pending)]), None);
        assert_eq!(resolve_dependency_outcome(&[None]), None);
        assert_eq!(
            resolve_dependency_outcome(&[Some(Status::Success), Some(Status::Pending)]),
            None
        );
    }

    #[test]
    fn a_failed_dependency_cancels_even_if_others_still_pending() {
        let statuses = [Some(Status::Failed), Some(Status::Pending)];
        assert_eq!(
            resolve_dependency_outcome(&statuses),
            Some(DependencyOutcome::Canceled)
        );
    }

    #[test]
    fn a_canceled_dependency_cancels_too() {
        let statuses = [Some(Status::Success), Some(Status::Canceled)];
        assert_eq!(
            resolve_dependency_outcome(&statuses),
            Some(DependencyOutcome::Canceled)
        );
    }
}
