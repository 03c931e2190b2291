//! Wire shapes carried over the queue fabric (C5): the pipeline queue
//! submission the dispatcher consumes, and the job queue unit the
//! executor consumes. Shared between `buildit-api` (produces pipeline
//! queue messages), `buildit-scheduler` (consumes pipeline queue
//! messages, produces and consumes job queue messages), so they live
//! here rather than duplicated per crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::{JobConfiguration, PipelineConfiguration};

/// A source repository reference: where to clone from and what to check
/// out, carried alongside the pipeline/job payload on every queue
/// message so the executor can reconstruct the checkout commands without
/// a second round trip to the report store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub url: String,
    pub commit_hash: String,
}

/// Body of a pipeline-queue message: one pipeline submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSubmission {
    pub pipeline: PipelineConfiguration,
    pub repository: RepositoryRef,
}

/// A pipeline-queue message: `{ id, message: { pipeline, repository } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineQueueMessage {
    pub id: Uuid,
    pub message: PipelineSubmission,
}

/// Body of a job-queue message: one job to run, plus the repository it
/// runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    pub job: JobConfiguration,
    pub repository: RepositoryRef,
}

/// A job-queue message: `{ id, pipelineId, stageId, jobId, dependency,
/// message: { job, repository } }`. `dependency` is the whole stage's
/// job-execution-UUID dependency map (not just this job's own entry) —
/// the executor looks its own `id` up in it to find what to wait for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobQueueMessage {
    pub id: Uuid,
    pub pipeline_id: i64,
    pub stage_id: i64,
    pub job_id: i64,
    pub dependency: HashMap<Uuid, Vec<Uuid>>,
    pub message: JobSubmission,
}
