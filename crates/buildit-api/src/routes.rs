//! The HTTP façade (§6.1): five endpoints wrapping pipeline submission,
//! filtered report queries, and waitboard-resolved status lookups.

use std::collections::HashMap;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use buildit_core::pipeline::PipelineConfiguration;
use buildit_core::queue::{PipelineQueueMessage, PipelineSubmission, RepositoryRef};
use buildit_core::report::{ReportResponseBody, Status};
use buildit_db::Filter;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/execute/local", post(execute_local))
        .route("/report/local", post(report_local))
        .route("/report/local/query", post(report_local_query))
        .route("/status", post(status))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "success": true }))
}

#[derive(Debug, Deserialize)]
struct RepositoryInput {
    url: String,
    #[serde(rename = "commitHash")]
    commit_hash: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteLocalRequest {
    /// The already-parsed pipeline document (§6.2 is parsed upstream of
    /// this façade — see §1's scope note on the CLI caller — by the same
    /// `buildit_config::pipeline::parse` this crate exposes as a
    /// library, so `SourceSpan`s survive the trip over the wire).
    pipeline: PipelineConfiguration,
    repository: RepositoryInput,
}

async fn execute_local(
    State(state): State<AppState>,
    Json(body): Json<ExecuteLocalRequest>,
) -> Result<Json<Value>, ApiError> {
    let pipeline = body.pipeline;
    buildit_config::pipeline::validate(&pipeline)?;
    // Fail the submission up front on a cyclic plan, rather than leaving
    // it to surface only once the dispatcher picks the message up.
    buildit_config::pipeline::plan(&pipeline)?;

    let execution_id = Uuid::new_v4();
    let msg = PipelineQueueMessage {
        id: execution_id,
        message: PipelineSubmission {
            pipeline,
            repository: RepositoryRef {
                url: body.repository.url,
                commit_hash: body.repository.commit_hash,
            },
        },
    };

    state.queue.publish(&state.pipeline_queue_name, &msg).await?;

    Ok(Json(json!({
        "success": true,
        "executionId": execution_id,
    })))
}

#[derive(Debug, Deserialize)]
struct ReportRepositoryInput {
    url: String,
    #[serde(rename = "commitHash")]
    commit_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportLocalRequest {
    repository: ReportRepositoryInput,
    #[serde(rename = "ipAddress")]
    ip_address: String,
}

fn pipeline_filter(repository: &ReportRepositoryInput, ip_address: &str) -> Filter {
    let mut filter = Filter::new();
    filter.insert("repository".to_string(), repository.url.clone());
    if let Some(commit_hash) = &repository.commit_hash {
        filter.insert("commit_hash".to_string(), commit_hash.clone());
    }
    filter.insert("ip_address".to_string(), ip_address.to_string());
    filter
}

async fn report_local(
    State(state): State<AppState>,
    Json(body): Json<ReportLocalRequest>,
) -> Result<Json<Vec<ReportResponseBody>>, ApiError> {
    let filter = pipeline_filter(&body.repository, &body.ip_address);
    let pipelines = state.reports.query_pipelines(&filter).await?;
    Ok(Json(pipelines.iter().map(ReportResponseBody::from).collect()))
}

#[derive(Debug, Deserialize)]
struct ReportQueryRequest {
    repository: ReportRepositoryInput,
    #[serde(rename = "ipAddress")]
    ip_address: String,
    #[serde(rename = "pipelineName")]
    pipeline_name: Option<String>,
    #[serde(rename = "stageName")]
    stage_name: Option<String>,
    #[serde(rename = "jobName")]
    job_name: Option<String>,
}

/// The deepest non-empty of `jobName`/`stageName`/`pipelineName` chooses
/// which table is reported: job beats stage beats pipeline (§6.1). At
/// every level the result stays scoped to the parent resolved from
/// `repository`/`ipAddress`/`pipelineName` — a stage or job query never
/// floats free across pipelines that merely happen to share a stage or
/// job name (S6).
async fn report_local_query(
    State(state): State<AppState>,
    Json(body): Json<ReportQueryRequest>,
) -> Result<Json<Vec<ReportResponseBody>>, ApiError> {
    let mut pipeline_filter = pipeline_filter(&body.repository, &body.ip_address);
    if let Some(pipeline_name) = &body.pipeline_name {
        pipeline_filter.insert("name".to_string(), pipeline_name.clone());
    }
    let pipelines = state.reports.query_pipelines(&pipeline_filter).await?;

    if body.stage_name.is_none() && body.job_name.is_none() {
        return Ok(Json(pipelines.iter().map(ReportResponseBody::from).collect()));
    }

    let mut stages = Vec::new();
    for pipeline in &pipelines {
        let mut filter = Filter::new();
        filter.insert("pipeline_id".to_string(), pipeline.pipeline_id.to_string());
        if let Some(stage_name) = &body.stage_name {
            filter.insert("name".to_string(), stage_name.clone());
        }
        stages.extend(state.reports.query_stages(&filter).await?);
    }

    if body.job_name.is_none() {
        return Ok(Json(stages.iter().map(ReportResponseBody::from).collect()));
    }

    let job_name = body.job_name.as_ref().expect("checked above");
    let mut jobs = Vec::new();
    for stage in &stages {
        let mut filter = Filter::new();
        filter.insert("stage_id".to_string(), stage.stage_id.to_string());
        filter.insert("name".to_string(), job_name.clone());
        jobs.extend(state.reports.query_jobs(&filter).await?);
    }
    Ok(Json(jobs.iter().map(ReportResponseBody::from).collect()))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    #[serde(rename = "executionId")]
    execution_id: Uuid,
}

#[derive(Debug, Serialize)]
struct JobStatusView {
    #[serde(rename = "jobId")]
    job_id: i64,
    name: String,
    status: Status,
}

#[derive(Debug, Serialize)]
struct StageStatusView {
    #[serde(rename = "stageId")]
    stage_id: i64,
    name: String,
    status: Status,
    jobs: Vec<JobStatusView>,
}

/// The pipeline-level view returned by `/status` — distinct from
/// `ReportResponseBody`, which §3.6 reserves for `/report*`: S5/§6.1
/// require `{ pipelineId, name, status, stageOrder }`, not the
/// report-list shape's `id`/`startTime`/`endTime`.
#[derive(Debug, Serialize)]
struct PipelineStatusView {
    #[serde(rename = "pipelineId")]
    pipeline_id: i64,
    name: String,
    status: Status,
    #[serde(rename = "stageOrder")]
    stage_order: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    pipeline: PipelineStatusView,
    stages: HashMap<String, StageStatusView>,
}

async fn status(
    State(state): State<AppState>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let pipeline_id: i64 = state
        .waitboard
        .get(&body.execution_id.to_string())
        .await?
        .parse()
        .map_err(|_| ApiError::Internal("waitboard entry does not name a valid pipeline id".to_string()))?;

    let mut pipeline_filter = Filter::new();
    pipeline_filter.insert("pipeline_id".to_string(), pipeline_id.to_string());
    let pipeline = state
        .reports
        .query_pipelines(&pipeline_filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound(format!("no pipeline found with ID {pipeline_id}")))?;

    let mut stage_filter = Filter::new();
    stage_filter.insert("pipeline_id".to_string(), pipeline_id.to_string());
    let stages = state.reports.query_stages(&stage_filter).await?;

    let mut stage_views = HashMap::with_capacity(stages.len());
    for stage in &stages {
        let mut job_filter = Filter::new();
        job_filter.insert("stage_id".to_string(), stage.stage_id.to_string());
        let jobs = state.reports.query_jobs(&job_filter).await?;

        stage_views.insert(
            stage.name.clone(),
            StageStatusView {
                stage_id: stage.stage_id,
                name: stage.name.clone(),
                status: stage.status,
                jobs: jobs
                    .iter()
                    .map(|j| JobStatusView {
                        job_id: j.job_id,
                        name: j.name.clone(),
                        status: j.status,
                    })
                    .collect(),
            },
        );
    }

    Ok(Json(StatusResponse {
        pipeline: PipelineStatusView {
            pipeline_id: pipeline.pipeline_id,
            name: pipeline.name.clone(),
            status: pipeline.status,
            stage_order: pipeline.stage_order.clone(),
        },
        stages: stage_views,
    }))
}
