//! The pipeline configuration model: the shape of a submitted pipeline
//! document after parsing, the source-span metadata attached to each
//! recognised field, and the execution plan computed from it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A `(line, column)` position in the document a `PipelineConfiguration`
/// was parsed from. Both are 1-indexed, matching the convention of the
/// YAML node positions this mirrors. `{0, 0}` stands for "no position
/// available" (e.g. errors about a wholly empty document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
}

impl SourceSpan {
    pub const ZERO: SourceSpan = SourceSpan { line: 0, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A parsed value together with the position it was parsed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: SourceSpan,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: SourceSpan) -> Self {
        Self { value, span }
    }
}

/// Top-level pipeline metadata (the `pipeline:` key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: Spanned<String>,
}

/// A single job definition (one entry of the `jobs:` sequence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfiguration {
    pub name: Spanned<String>,
    pub stage: Spanned<String>,
    pub image: Spanned<String>,
    /// Ordered shell commands to run inside the container.
    pub script: Spanned<Vec<String>>,
    /// Sibling job names this job depends on (the `needs:` key).
    /// `None` when the key was absent; an explicit empty list is
    /// represented as `Some(Spanned(vec![], span))`.
    pub dependencies: Option<Spanned<Vec<String>>>,
}

impl JobConfiguration {
    pub fn depends_on(&self) -> &[String] {
        self.dependencies
            .as_ref()
            .map(|d| d.value.as_slice())
            .unwrap_or(&[])
    }
}

/// The fully parsed pipeline document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    pub version: Spanned<String>,
    pub pipeline_info: PipelineInfo,
    /// Declared stage order (the `stages:` sequence, in document order).
    pub stage_order: Spanned<Vec<String>>,
    /// stage name -> (job name -> job), preserving the document's job
    /// order within each stage via `Vec` iteration where it matters.
    pub stages: HashMap<String, Vec<JobConfiguration>>,
}

impl PipelineConfiguration {
    /// All jobs belonging to `stage`, in document order, or an empty
    /// slice if the stage has no jobs (which `validate` rejects).
    pub fn jobs_in_stage(&self, stage: &str) -> &[JobConfiguration] {
        self.stages
            .get(stage)
            .map(|j| j.as_slice())
            .unwrap_or(&[])
    }

    pub fn job(&self, stage: &str, name: &str) -> Option<&JobConfiguration> {
        self.jobs_in_stage(stage).iter().find(|j| j.name.value == name)
    }
}

/// A maximal set of jobs within a stage that share no dependency edges
/// between them; all jobs in a level may run concurrently.
pub type Level = Vec<String>;

/// The topologically-levelled execution plan for a `PipelineConfiguration`,
/// computed by Kahn's algorithm (see `buildit_config::pipeline::plan`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// stage name -> ordered list of levels.
    pub stage_levels: HashMap<String, Vec<Level>>,
}

impl ExecutionPlan {
    pub fn levels_for(&self, stage: &str) -> &[Level] {
        self.stage_levels
            .get(stage)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }
}
