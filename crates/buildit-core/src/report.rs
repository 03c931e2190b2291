//! The report model: the persisted lifecycle record of a pipeline, a
//! stage, or a job, and the status state machine shared by the report
//! store (C2), the dispatcher (C6), and the job executor (C7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a pipeline, stage, or job report.
///
/// `Pending` is the only non-terminal state; every other variant is
/// sticky once reached (the report store never transitions a terminal
/// report back to `Pending` or between terminal states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pending,
    Success,
    Failed,
    Canceled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
            Status::Canceled => "CANCELED",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Status::Pending),
            "SUCCESS" => Ok(Status::Success),
            "FAILED" => Ok(Status::Failed),
            "CANCELED" => Ok(Status::Canceled),
            other => Err(format!("unrecognised status '{other}'")),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted pipeline execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub pipeline_id: i64,
    pub repository: String,
    pub commit_hash: String,
    pub ip_address: String,
    pub name: String,
    /// Comma-joined `stageOrder`, matching the original's denormalised
    /// column.
    pub stage_order: String,
    pub status: Status,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A persisted stage execution record, owned by exactly one
/// `PipelineReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage_id: i64,
    pub pipeline_id: i64,
    pub name: String,
    pub status: Status,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A persisted job execution record, owned by exactly one `StageReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: i64,
    pub stage_id: i64,
    pub name: String,
    pub image: String,
    /// Script commands joined with `" && "`, matching the original's
    /// denormalised column.
    pub script: String,
    pub status: Status,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub container_id: Option<String>,
}

/// The uniform shape returned to HTTP callers for any of the three report
/// kinds, replacing the original's untyped JSON responses (see
/// SPEC_FULL.md §3.6 / distilled spec §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponseBody {
    pub id: i64,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Status,
}

impl From<&PipelineReport> for ReportResponseBody {
    fn from(r: &PipelineReport) -> Self {
        Self {
            id: r.pipeline_id,
            name: r.name.clone(),
            start_time: r.start_time,
            end_time: r.end_time,
            status: r.status,
        }
    }
}

impl From<&StageReport> for ReportResponseBody {
    fn from(r: &StageReport) -> Self {
        Self {
            id: r.stage_id,
            name: r.name.clone(),
            start_time: r.start_time,
            end_time: r.end_time,
            status: r.status,
        }
    }
}

impl From<&JobReport> for ReportResponseBody {
    fn from(r: &JobReport) -> Self {
        Self {
            id: r.job_id,
            name: r.name.clone(),
            start_time: r.start_time,
            end_time: r.end_time,
            status: r.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!Status::Pending.is_terminal());
        assert!(Status::Success.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(Status::Canceled.is_terminal());
    }
}
