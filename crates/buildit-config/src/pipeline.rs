//! Parse, validate, and plan a pipeline document (C1).
//!
//! `parse` combines the distilled spec's `Parse` and `Validate` operations
//! into one pass over the scanned document: the ordered invariant checks
//! in §4.1 run directly against the scan, and a `PipelineConfiguration` is
//! only ever constructed once every check has passed, so the type never
//! has to represent a "parsed but invalid" intermediate state. `validate`
//! re-runs the same invariants against an already-built configuration,
//! for callers that construct one another way (tests, round-trips).

use std::collections::{HashMap, HashSet};

use buildit_core::pipeline::{
    ExecutionPlan, JobConfiguration, Level, PipelineConfiguration, PipelineInfo, SourceSpan,
};

use crate::error::{ConfigError, ConfigResult};
use crate::span::{self, Scanned, ScannedJob};

fn looks_numeric(s: &str) -> bool {
    !s.trim().is_empty() && s.trim().parse::<f64>().is_ok()
}

fn require_non_numeric_name(value: &str, span: SourceSpan, what: &str) -> ConfigResult<()> {
    if value.is_empty() || looks_numeric(value) {
        return Err(ConfigError::new(
            format!("{what} must be a non-empty string"),
            span,
        ));
    }
    Ok(())
}

/// Parse and validate a pipeline document in one pass, per SPEC_FULL.md
/// §4.1's ordered invariants.
pub fn parse(document: &str) -> ConfigResult<PipelineConfiguration> {
    let scanned = span::scan(document);
    build(&scanned)
}

fn build(scanned: &Scanned) -> ConfigResult<PipelineConfiguration> {
    // 1. version present and equal to "v0".
    let version = match &scanned.version {
        None => return Err(ConfigError::at_zero("missing key 'version'")),
        Some(v) if v.value != "v0" => {
            return Err(ConfigError::new(
                format!("unsupported version '{}': expected 'v0'", v.value),
                v.span,
            ));
        }
        Some(v) => v.clone(),
    };

    // 2. pipeline.name present and non-empty, not numeric-looking.
    let pipeline_key_span = scanned
        .pipeline_key_span
        .ok_or_else(|| ConfigError::at_zero("missing key 'pipeline'"))?;
    let name = scanned
        .pipeline_name
        .clone()
        .ok_or_else(|| ConfigError::new("missing key 'name'", pipeline_key_span))?;
    require_non_numeric_name(&name.value, name.span, "pipeline name")?;
    let pipeline_info = PipelineInfo { name };

    // 3. stages present and non-empty; each stage name unique.
    let stages_key_span = scanned.stages_key_span.unwrap_or(SourceSpan::ZERO);
    let stage_order = match &scanned.stages {
        None => return Err(ConfigError::new("missing key 'stages'", SourceSpan::ZERO)),
        Some(s) if s.value.is_empty() => {
            return Err(ConfigError::new("missing key 'stages'", stages_key_span));
        }
        Some(s) => s.clone(),
    };
    {
        let mut seen = HashSet::new();
        for name in &stage_order.value {
            require_non_numeric_name(name, stages_key_span, "stage name")?;
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::new(
                    format!("duplicate stage name '{name}'"),
                    stages_key_span,
                ));
            }
        }
    }

    // 4. Each job: name, stage membership, uniqueness, image, script,
    //    and sibling-only dependencies.
    let jobs_key_span = scanned.jobs_key_span.unwrap_or(SourceSpan::ZERO);
    let mut stages: HashMap<String, Vec<JobConfiguration>> = HashMap::new();
    let mut seen_stage_job: HashSet<(String, String)> = HashSet::new();

    for raw in &scanned.jobs {
        let job = build_job(raw, &stage_order.value, jobs_key_span, &mut seen_stage_job)?;
        stages.entry(job.stage.value.clone()).or_default().push(job);
    }

    for stage_name in &stage_order.value {
        if !stages.contains_key(stage_name) || stages[stage_name].is_empty() {
            return Err(ConfigError::new(
                format!("stage '{stage_name}' has no jobs"),
                stages_key_span,
            ));
        }
    }

    // sibling-only dependency check, now that all stages are assembled.
    for jobs in stages.values() {
        let names: HashSet<&str> = jobs.iter().map(|j| j.name.value.as_str()).collect();
        for job in jobs {
            if let Some(deps) = &job.dependencies {
                for dep in &deps.value {
                    if !names.contains(dep.as_str()) {
                        return Err(ConfigError::new("dependency job not exist", deps.span));
                    }
                }
            }
        }
    }

    Ok(PipelineConfiguration {
        version,
        pipeline_info,
        stage_order,
        stages,
    })
}

fn build_job(
    raw: &ScannedJob,
    declared_stages: &[String],
    jobs_key_span: SourceSpan,
    seen_stage_job: &mut HashSet<(String, String)>,
) -> ConfigResult<JobConfiguration> {
    let name = raw
        .name
        .clone()
        .ok_or_else(|| ConfigError::new("missing key 'name'", jobs_key_span))?;
    require_non_numeric_name(&name.value, name.span, "job name")?;

    let stage = raw
        .stage
        .clone()
        .ok_or_else(|| ConfigError::new("missing key 'stage'", name.span))?;
    if !declared_stages.iter().any(|s| s == &stage.value) {
        return Err(ConfigError::new(
            format!("stage '{}' must be defined in stages", stage.value),
            stage.span,
        ));
    }

    let key = (stage.value.clone(), name.value.clone());
    if !seen_stage_job.insert(key) {
        return Err(ConfigError::new(
            "duplicated job name within a stage",
            name.span,
        ));
    }

    let image = raw
        .image
        .clone()
        .ok_or_else(|| ConfigError::new("missing key 'image'", name.span))?;
    if image.value.is_empty() {
        return Err(ConfigError::new(
            format!("job '{}' image must be a non-empty string", name.value),
            image.span,
        ));
    }

    let script = raw
        .script
        .clone()
        .ok_or_else(|| ConfigError::new("missing key 'script'", name.span))?;
    if script.value.is_empty() {
        return Err(ConfigError::new(
            format!(
                "job '{}' script must have at least one command",
                name.value
            ),
            script.span,
        ));
    }

    Ok(JobConfiguration {
        name,
        stage,
        image,
        script,
        dependencies: raw.needs.clone(),
    })
}

/// Re-check §4.1's invariants against an already-built configuration.
pub fn validate(cfg: &PipelineConfiguration) -> ConfigResult<()> {
    if cfg.version.value != "v0" {
        return Err(ConfigError::new(
            format!("unsupported version '{}': expected 'v0'", cfg.version.value),
            cfg.version.span,
        ));
    }
    require_non_numeric_name(
        &cfg.pipeline_info.name.value,
        cfg.pipeline_info.name.span,
        "pipeline name",
    )?;
    if cfg.stage_order.value.is_empty() {
        return Err(ConfigError::new("missing key 'stages'", cfg.stage_order.span));
    }
    let mut seen_stage_job: HashSet<(String, String)> = HashSet::new();
    for stage_name in &cfg.stage_order.value {
        let jobs = cfg.jobs_in_stage(stage_name);
        if jobs.is_empty() {
            return Err(ConfigError::new(
                format!("stage '{stage_name}' has no jobs"),
                cfg.stage_order.span,
            ));
        }
        let names: HashSet<&str> = jobs.iter().map(|j| j.name.value.as_str()).collect();
        for job in jobs {
            let key = (stage_name.clone(), job.name.value.clone());
            if !seen_stage_job.insert(key) {
                return Err(ConfigError::new(
                    "duplicated job name within a stage",
                    job.name.span,
                ));
            }
            if let Some(deps) = &job.dependencies {
                for dep in &deps.value {
                    if !names.contains(dep.as_str()) {
                        return Err(ConfigError::new("dependency job not exist", deps.span));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Compute the topologically-levelled execution plan for every stage,
/// via Kahn's algorithm (§4.1).
pub fn plan(cfg: &PipelineConfiguration) -> ConfigResult<ExecutionPlan> {
    let mut stage_levels = HashMap::new();
    for stage_name in &cfg.stage_order.value {
        let jobs = cfg.jobs_in_stage(stage_name);
        let levels = plan_stage(jobs)?;
        stage_levels.insert(stage_name.clone(), levels);
    }
    Ok(ExecutionPlan { stage_levels })
}

fn plan_stage(jobs: &[JobConfiguration]) -> ConfigResult<Vec<Level>> {
    let by_name: HashMap<&str, &JobConfiguration> =
        jobs.iter().map(|j| (j.name.value.as_str(), j)).collect();

    let mut indegree: HashMap<&str, usize> =
        jobs.iter().map(|j| (j.name.value.as_str(), 0)).collect();
    let mut children: HashMap<&str, Vec<&str>> = jobs
        .iter()
        .map(|j| (j.name.value.as_str(), Vec::new()))
        .collect();
    for job in jobs {
        for dep in job.depends_on() {
            *indegree.get_mut(job.name.value.as_str()).unwrap() += 1;
            children.get_mut(dep.as_str()).unwrap().push(job.name.value.as_str());
        }
    }

    let mut remaining: HashSet<&str> = jobs.iter().map(|j| j.name.value.as_str()).collect();
    let mut levels = Vec::new();

    while !remaining.is_empty() {
        let mut level: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|n| indegree[n] == 0)
            .collect();
        level.sort_unstable();

        if level.is_empty() {
            let cycle = trace_cycle(&remaining, &by_name)
                .map_err(|e| ConfigError::new(e.to_string(), SourceSpan::ZERO))?;
            let head = &by_name[cycle[0].as_str()];
            return Err(ConfigError::new(
                format!("cyclic dependencies detected: {}", cycle.join(" -> ")),
                head.name.span,
            ));
        }

        for n in &level {
            remaining.remove(n);
        }
        for n in &level {
            for c in &children[n] {
                if let Some(d) = indegree.get_mut(c) {
                    *d -= 1;
                }
            }
        }

        levels.push(level.into_iter().map(str::to_string).collect());
    }

    Ok(levels)
}

/// DFS from the lexicographically smallest job still lacking a level,
/// following dependency edges and always preferring the smallest
/// remaining dependency — deterministic regardless of map iteration
/// order. The first re-visited node closes the cycle; an inability to
/// find one means the caller's precondition (an empty level with jobs
/// still remaining) didn't hold, which cannot happen.
fn trace_cycle(
    remaining: &HashSet<&str>,
    by_name: &HashMap<&str, &JobConfiguration>,
) -> buildit_core::Result<Vec<String>> {
    let start = *remaining
        .iter()
        .min()
        .ok_or_else(|| buildit_core::Error::Internal("internal: empty cycle".to_string()))?;

    let mut path: Vec<&str> = Vec::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    let mut current = start;

    loop {
        if let Some(&idx) = index_of.get(current) {
            let mut cycle: Vec<String> = path[idx..].iter().map(|s| s.to_string()).collect();
            cycle.push(current.to_string());
            return Ok(cycle);
        }
        index_of.insert(current, path.len());
        path.push(current);

        let job = by_name
            .get(current)
            .ok_or_else(|| buildit_core::Error::Internal("internal: empty cycle".to_string()))?;
        let next = job
            .depends_on()
            .iter()
            .map(String::as_str)
            .filter(|d| remaining.contains(d))
            .min();
        match next {
            Some(n) => current = n,
            None => {
                return Err(buildit_core::Error::Internal(
                    "internal: empty cycle".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(stages: &str, jobs: &str) -> String {
        format!("version: v0\npipeline:\n  name: demo\nstages:\n{stages}\njobs:\n{jobs}")
    }

    #[test]
    fn s1_linear_single_job_plan() {
        let d = doc(
            "  - build",
            "  - name: compile\n    stage: build\n    image: alpine\n    script: [echo hi]\n",
        );
        let cfg = parse(&d).expect("parses");
        let plan = plan(&cfg).expect("plans");
        assert_eq!(plan.levels_for("build"), &[vec!["compile".to_string()]]);
    }

    #[test]
    fn s2_diamond_levels() {
        let d = doc(
            "  - build",
            "  - name: a\n    stage: build\n    image: alpine\n    script: [x]\n  - name: b\n    stage: build\n    image: alpine\n    script: [x]\n    needs: [a]\n  - name: c\n    stage: build\n    image: alpine\n    script: [x]\n    needs: [a]\n  - name: d\n    stage: build\n    image: alpine\n    script: [x]\n    needs: [b, c]\n",
        );
        let cfg = parse(&d).expect("parses");
        let plan = plan(&cfg).expect("plans");
        let levels = plan.levels_for("build");
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec!["a".to_string()]);
        assert_eq!(levels[1], vec!["b".to_string(), "c".to_string()]);
        assert_eq!(levels[2], vec!["d".to_string()]);
    }

    #[test]
    fn s3_cycle_detected_with_trace() {
        let d = doc(
            "  - build",
            "  - name: a\n    stage: build\n    image: alpine\n    script: [x]\n    needs: [b]\n  - name: b\n    stage: build\n    image: alpine\n    script: [x]\n    needs: [a]\n",
        );
        let cfg = parse(&d).expect("parses");
        let err = plan(&cfg).unwrap_err();
        assert_eq!(err.message, "cyclic dependencies detected: a -> b -> a");
    }

    #[test]
    fn empty_stages_is_missing_key_error() {
        let d = "version: v0\npipeline:\n  name: demo\nstages:\njobs:\n  - name: x\n    stage: build\n    image: a\n    script: [x]\n";
        let err = parse(d).unwrap_err();
        assert_eq!(err.message, "missing key 'stages'");
    }

    #[test]
    fn stage_with_no_jobs() {
        let d = doc(
            "  - build\n  - test",
            "  - name: x\n    stage: build\n    image: a\n    script: [x]\n",
        );
        let err = parse(&d).unwrap_err();
        assert_eq!(err.message, "stage 'test' has no jobs");
    }

    #[test]
    fn dependency_on_nonexistent_sibling() {
        let d = doc(
            "  - build",
            "  - name: x\n    stage: build\n    image: a\n    script: [x]\n    needs: [ghost]\n",
        );
        let err = parse(&d).unwrap_err();
        assert_eq!(err.message, "dependency job not exist");
    }

    #[test]
    fn duplicate_job_name_within_stage() {
        let d = doc(
            "  - build",
            "  - name: x\n    stage: build\n    image: a\n    script: [x]\n  - name: x\n    stage: build\n    image: a\n    script: [y]\n",
        );
        let err = parse(&d).unwrap_err();
        assert_eq!(err.message, "duplicated job name within a stage");
    }

    #[test]
    fn numeric_looking_job_name_rejected() {
        let d = doc(
            "  - build",
            "  - name: \"123\"\n    stage: build\n    image: a\n    script: [x]\n",
        );
        let err = parse(&d).unwrap_err();
        assert_eq!(err.message, "job name must be a non-empty string");
    }
}
