//! The report store (C2): Pipeline/Stage/Job lifecycle records, their
//! status transitions, and filtered queries.
//!
//! Grounded on `pipeline.rs`'s trait + `Pg*Repo` pattern, generalised from
//! a UUID-keyed, tenant-scoped schema to the plain auto-increment integer
//! ids the original implementation's SQL schema uses (see
//! `buildit_core::report`).

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use buildit_core::report::{JobReport, PipelineReport, Status, StageReport};
use chrono::Utc;
use sqlx::{FromRow, PgPool, Row};

use crate::{DbError, DbResult};

/// An equality-constraint filter: column name -> value. Keys are sorted
/// before being rendered into SQL so the generated query string (and
/// therefore any query-plan cache) is stable regardless of caller
/// iteration order.
pub type Filter = BTreeMap<String, String>;

#[derive(Debug, FromRow)]
struct PipelineRow {
    pipeline_id: i64,
    repository: String,
    commit_hash: String,
    ip_address: String,
    name: String,
    stage_order: String,
    status: String,
    start_time: chrono::DateTime<Utc>,
    end_time: Option<chrono::DateTime<Utc>>,
}

impl TryFrom<PipelineRow> for PipelineReport {
    type Error = DbError;

    fn try_from(r: PipelineRow) -> DbResult<Self> {
        Ok(PipelineReport {
            pipeline_id: r.pipeline_id,
            repository: r.repository,
            commit_hash: r.commit_hash,
            ip_address: r.ip_address,
            name: r.name,
            stage_order: r.stage_order,
            status: Status::from_str(&r.status).map_err(DbError::Internal)?,
            start_time: r.start_time,
            end_time: r.end_time,
        })
    }
}

#[derive(Debug, FromRow)]
struct StageRow {
    stage_id: i64,
    pipeline_id: i64,
    name: String,
    status: String,
    start_time: chrono::DateTime<Utc>,
    end_time: Option<chrono::DateTime<Utc>>,
}

impl TryFrom<StageRow> for StageReport {
    type Error = DbError;

    fn try_from(r: StageRow) -> DbResult<Self> {
        Ok(StageReport {
            stage_id: r.stage_id,
            pipeline_id: r.pipeline_id,
            name: r.name,
            status: Status::from_str(&r.status).map_err(DbError::Internal)?,
            start_time: r.start_time,
            end_time: r.end_time,
        })
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    job_id: i64,
    stage_id: i64,
    name: String,
    image: String,
    script: String,
    status: String,
    start_time: chrono::DateTime<Utc>,
    end_time: Option<chrono::DateTime<Utc>>,
    container_id: Option<String>,
}

impl TryFrom<JobRow> for JobReport {
    type Error = DbError;

    fn try_from(r: JobRow) -> DbResult<Self> {
        Ok(JobReport {
            job_id: r.job_id,
            stage_id: r.stage_id,
            name: r.name,
            image: r.image,
            script: r.script,
            status: Status::from_str(&r.status).map_err(DbError::Internal)?,
            start_time: r.start_time,
            end_time: r.end_time,
            container_id: r.container_id,
        })
    }
}

#[async_trait]
pub trait ReportRepo: Send + Sync {
    async fn create_pipeline(
        &self,
        repository: &str,
        commit_hash: &str,
        ip_address: &str,
        name: &str,
        stage_order: &str,
    ) -> DbResult<i64>;
    async fn create_stage(&self, pipeline_id: i64, name: &str) -> DbResult<i64>;
    async fn create_job(
        &self,
        stage_id: i64,
        name: &str,
        image: &str,
        script: &str,
    ) -> DbResult<i64>;

    async fn update_pipeline_status_and_end_time(
        &self,
        pipeline_id: i64,
        status: Status,
    ) -> DbResult<()>;
    async fn update_stage_status_and_end_time(&self, stage_id: i64, status: Status) -> DbResult<()>;
    async fn update_job_status_and_end_time(
        &self,
        job_id: i64,
        container_id: Option<&str>,
        status: Status,
    ) -> DbResult<()>;

    async fn query_pipelines(&self, filter: &Filter) -> DbResult<Vec<PipelineReport>>;
    async fn query_stages(&self, filter: &Filter) -> DbResult<Vec<StageReport>>;
    async fn query_jobs(&self, filter: &Filter) -> DbResult<Vec<JobReport>>;

    async fn get_job_status(&self, job_id: i64) -> DbResult<Status>;
}

pub struct PgReportRepo {
    pool: PgPool,
}

impl PgReportRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PIPELINE_COLUMNS: &[&str] = &[
    "pipeline_id",
    "repository",
    "commit_hash",
    "ip_address",
    "name",
    "stage_order",
    "status",
];
const STAGE_COLUMNS: &[&str] = &["stage_id", "pipeline_id", "name", "status"];
const JOB_COLUMNS: &[&str] = &["job_id", "stage_id", "name", "image", "status", "container_id"];

/// Build `SELECT * FROM <table> [WHERE col1 = $1 AND col2 = $2 ...]
/// ORDER BY start_time ASC`, with filter keys sorted for a stable query
/// string and rejecting any column not in the table's whitelist.
fn build_query(table: &str, allowed: &[&str], filter: &Filter) -> DbResult<(String, Vec<String>)> {
    let mut sql = format!("SELECT * FROM {table}");
    let mut values = Vec::with_capacity(filter.len());
    if !filter.is_empty() {
        let mut clauses = Vec::with_capacity(filter.len());
        for (i, (col, val)) in filter.iter().enumerate() {
            if !allowed.contains(&col.as_str()) {
                return Err(DbError::InvalidFilter(col.clone()));
            }
            clauses.push(format!("{col} = ${}", i + 1));
            values.push(val.clone());
        }
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY start_time ASC");
    Ok((sql, values))
}

#[async_trait]
impl ReportRepo for PgReportRepo {
    async fn create_pipeline(
        &self,
        repository: &str,
        commit_hash: &str,
        ip_address: &str,
        name: &str,
        stage_order: &str,
    ) -> DbResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO pipelines (repository, commit_hash, ip_address, name, stage_order, status, start_time)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING pipeline_id
            "#,
        )
        .bind(repository)
        .bind(commit_hash)
        .bind(ip_address)
        .bind(name)
        .bind(stage_order)
        .bind(Status::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("pipeline_id")?)
    }

    async fn create_stage(&self, pipeline_id: i64, name: &str) -> DbResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO stages (pipeline_id, name, status, start_time)
            VALUES ($1, $2, $3, NOW())
            RETURNING stage_id
            "#,
        )
        .bind(pipeline_id)
        .bind(name)
        .bind(Status::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("stage_id")?)
    }

    async fn create_job(
        &self,
        stage_id: i64,
        name: &str,
        image: &str,
        script: &str,
    ) -> DbResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO jobs (stage_id, name, image, script, status, start_time)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING job_id
            "#,
        )
        .bind(stage_id)
        .bind(name)
        .bind(image)
        .bind(script)
        .bind(Status::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("job_id")?)
    }

    async fn update_pipeline_status_and_end_time(
        &self,
        pipeline_id: i64,
        status: Status,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE pipelines SET status = $2, end_time = NOW() WHERE pipeline_id = $1",
        )
        .bind(pipeline_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!(
                "no pipeline found with ID {pipeline_id}"
            )));
        }
        Ok(())
    }

    async fn update_stage_status_and_end_time(&self, stage_id: i64, status: Status) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE stages SET status = $2, end_time = NOW() WHERE stage_id = $1",
        )
        .bind(stage_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!(
                "no stage found with ID {stage_id}"
            )));
        }
        Ok(())
    }

    async fn update_job_status_and_end_time(
        &self,
        job_id: i64,
        container_id: Option<&str>,
        status: Status,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE jobs SET container_id = COALESCE($2, container_id), status = $3, end_time = NOW() WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(container_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("no job found with ID {job_id}")));
        }
        Ok(())
    }

    async fn query_pipelines(&self, filter: &Filter) -> DbResult<Vec<PipelineReport>> {
        let (sql, values) = build_query("pipelines", PIPELINE_COLUMNS, filter)?;
        let mut query = sqlx::query_as::<_, PipelineRow>(&sql);
        for v in &values {
            query = query.bind(v);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(PipelineReport::try_from).collect()
    }

    async fn query_stages(&self, filter: &Filter) -> DbResult<Vec<StageReport>> {
        let (sql, values) = build_query("stages", STAGE_COLUMNS, filter)?;
        let mut query = sqlx::query_as::<_, StageRow>(&sql);
        for v in &values {
            query = query.bind(v);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(StageReport::try_from).collect()
    }

    async fn query_jobs(&self, filter: &Filter) -> DbResult<Vec<JobReport>> {
        let (sql, values) = build_query("jobs", JOB_COLUMNS, filter)?;
        let mut query = sqlx::query_as::<_, JobRow>(&sql);
        for v in &values {
            query = query.bind(v);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(JobReport::try_from).collect()
    }

    async fn get_job_status(&self, job_id: i64) -> DbResult<Status> {
        let row = sqlx::query("SELECT status FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("no job found with ID {job_id}")))?;
        let status: String = row.try_get("status")?;
        Status::from_str(&status).map_err(DbError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_query_sorts_filter_keys_deterministically() {
        let mut filter = Filter::new();
        filter.insert("name".to_string(), "build".to_string());
        filter.insert("pipeline_id".to_string(), "1".to_string());
        let (sql, values) = build_query("stages", STAGE_COLUMNS, &filter).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM stages WHERE name = $1 AND pipeline_id = $2 ORDER BY start_time ASC"
        );
        assert_eq!(values, vec!["build".to_string(), "1".to_string()]);
    }

    #[test]
    fn build_query_rejects_unknown_column() {
        let mut filter = Filter::new();
        filter.insert("evil; drop table".to_string(), "x".to_string());
        let err = build_query("stages", STAGE_COLUMNS, &filter).unwrap_err();
        assert!(matches!(err, DbError::InvalidFilter(_)));
    }
}
