//! A line-oriented scanner over the pipeline document's restricted YAML
//! subset that records the `(line, column)` of every recognised key,
//! mirroring the original implementation's manual walk of a
//! `gopkg.in/yaml.v3` node tree (`CLI/schema/pipeline.go`). Positions are
//! 1-indexed to match that convention.
//!
//! The accepted grammar is narrow by design: four top-level keys
//! (`version`, `pipeline`, `stages`, `jobs`), a flat sequence of stage
//! name scalars, and a flat sequence of job mappings whose leaf values
//! are either bare scalars or inline `[a, b, c]` sequences. That is
//! exactly the shape §6.2 documents, and exactly what the original's
//! hand-rolled walk ever looks for — a generic YAML document model (with
//! its own span tracking) would be solving a much larger problem than
//! this format poses.

use buildit_core::pipeline::{SourceSpan, Spanned};

#[derive(Debug, Clone, Default)]
pub struct ScannedJob {
    pub name: Option<Spanned<String>>,
    pub stage: Option<Spanned<String>>,
    pub image: Option<Spanned<String>>,
    pub script: Option<Spanned<Vec<String>>>,
    pub needs: Option<Spanned<Vec<String>>>,
}

#[derive(Debug, Clone, Default)]
pub struct Scanned {
    pub version: Option<Spanned<String>>,
    pub pipeline_key_span: Option<SourceSpan>,
    pub pipeline_name: Option<Spanned<String>>,
    pub stages_key_span: Option<SourceSpan>,
    pub stages: Option<Spanned<Vec<String>>>,
    pub jobs_key_span: Option<SourceSpan>,
    pub jobs: Vec<ScannedJob>,
}

/// Index of the first non-space byte in `s`.
fn indent_of(s: &str) -> usize {
    s.len() - s.trim_start_matches(' ').len()
}

/// Split `"key: value"` into `("key", "value")`, treating `": "` (colon
/// followed by a space) as the delimiter so values containing bare
/// colons (`image: maven:3.8.6`) are not split on their own colons. A
/// trailing bare `"key:"` with nothing after it yields `("key", "")`.
fn split_key_value(content: &str) -> Option<(&str, &str)> {
    if let Some(idx) = content.find(": ") {
        Some((content[..idx].trim(), content[idx + 2..].trim()))
    } else if let Some(stripped) = content.strip_suffix(':') {
        Some((stripped.trim(), ""))
    } else {
        None
    }
}

fn strip_quotes(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
        {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

/// Parse an inline `[a, b, c]` sequence into its scalar elements. A bare
/// (non-bracketed) value is treated as a single-element list, so
/// `script: mvn test` behaves like `script: [mvn test]`.
fn parse_inline_list(value: &str) -> Vec<String> {
    let value = value.trim();
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .map(|s| strip_quotes(s.trim()))
        .filter(|s| !s.is_empty())
        .collect()
}

fn apply_job_field(job: &mut ScannedJob, key: &str, value: &str, span: SourceSpan) {
    match key {
        "name" => job.name = Some(Spanned::new(strip_quotes(value), span)),
        "stage" => job.stage = Some(Spanned::new(strip_quotes(value), span)),
        "image" => job.image = Some(Spanned::new(strip_quotes(value), span)),
        "script" => job.script = Some(Spanned::new(parse_inline_list(value), span)),
        "needs" => job.needs = Some(Spanned::new(parse_inline_list(value), span)),
        _ => {}
    }
}

pub fn scan(document: &str) -> Scanned {
    let lines: Vec<&str> = document.lines().collect();
    let mut out = Scanned::default();
    let mut i = 0usize;

    while i < lines.len() {
        let raw = lines[i];
        let indent = indent_of(raw);
        let content = raw[indent..].trim_end();
        let line_no = i + 1;

        if content.is_empty() || content.starts_with('#') {
            i += 1;
            continue;
        }

        if indent != 0 {
            // Stray line outside of any key block we track; skip.
            i += 1;
            continue;
        }

        let Some((key, value)) = split_key_value(content) else {
            i += 1;
            continue;
        };

        match key {
            "version" => {
                out.version = Some(Spanned::new(strip_quotes(value), SourceSpan::new(line_no, 1)));
                i += 1;
            }
            "pipeline" => {
                out.pipeline_key_span = Some(SourceSpan::new(line_no, 1));
                i += 1;
                while i < lines.len() {
                    let raw2 = lines[i];
                    let indent2 = indent_of(raw2);
                    let content2 = raw2[indent2..].trim_end();
                    if content2.is_empty() || content2.starts_with('#') {
                        i += 1;
                        continue;
                    }
                    if indent2 == 0 {
                        break;
                    }
                    if let Some((k2, v2)) = split_key_value(content2) {
                        if k2 == "name" {
                            out.pipeline_name = Some(Spanned::new(
                                strip_quotes(v2),
                                SourceSpan::new(i + 1, indent2 + 1),
                            ));
                        }
                    }
                    i += 1;
                }
            }
            "stages" => {
                out.stages_key_span = Some(SourceSpan::new(line_no, 1));
                let mut items = Vec::new();
                i += 1;
                while i < lines.len() {
                    let raw2 = lines[i];
                    let indent2 = indent_of(raw2);
                    let content2 = raw2[indent2..].trim_end();
                    if content2.is_empty() || content2.starts_with('#') {
                        i += 1;
                        continue;
                    }
                    if indent2 == 0 {
                        break;
                    }
                    if let Some(item) = content2.strip_prefix('-') {
                        items.push(strip_quotes(item.trim()));
                    }
                    i += 1;
                }
                out.stages = Some(Spanned::new(items, out.stages_key_span.unwrap()));
            }
            "jobs" => {
                out.jobs_key_span = Some(SourceSpan::new(line_no, 1));
                i += 1;
                while i < lines.len() {
                    let raw2 = lines[i];
                    let indent2 = indent_of(raw2);
                    let content2 = raw2[indent2..].trim_end();
                    if content2.is_empty() || content2.starts_with('#') {
                        i += 1;
                        continue;
                    }
                    if indent2 == 0 {
                        break;
                    }
                    if let Some(after_dash) = content2.strip_prefix('-') {
                        let item_indent = indent2;
                        let mut job = ScannedJob::default();
                        let after_dash = after_dash.trim_start();
                        let leading = content2.len() - after_dash.len();
                        if !after_dash.is_empty() {
                            if let Some((k, v)) = split_key_value(after_dash) {
                                apply_job_field(
                                    &mut job,
                                    k,
                                    v,
                                    SourceSpan::new(i + 1, item_indent + leading + 1),
                                );
                            }
                        }
                        i += 1;
                        while i < lines.len() {
                            let raw3 = lines[i];
                            let indent3 = indent_of(raw3);
                            let content3 = raw3[indent3..].trim_end();
                            if content3.is_empty() || content3.starts_with('#') {
                                i += 1;
                                continue;
                            }
                            if indent3 <= item_indent {
                                break;
                            }
                            if let Some((k, v)) = split_key_value(content3) {
                                apply_job_field(&mut job, k, v, SourceSpan::new(i + 1, indent3 + 1));
                            }
                            i += 1;
                        }
                        out.jobs.push(job);
                    } else {
                        i += 1;
                    }
                }
            }
            _ => {
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "version: v0\npipeline:\n  name: demo\nstages:\n  - build\n  - test\njobs:\n  - name: compile\n    stage: build\n    image: maven:3.8.6\n    script: [mvn -v, mvn compile]\n  - name: unit\n    stage: test\n    image: maven:3.8.6\n    script: [mvn test]\n    needs: [compile]\n";

    #[test]
    fn scans_top_level_keys_with_spans() {
        let s = scan(DOC);
        assert_eq!(s.version.as_ref().unwrap().value, "v0");
        assert_eq!(s.version.as_ref().unwrap().span, SourceSpan::new(1, 1));
        assert_eq!(s.pipeline_name.as_ref().unwrap().value, "demo");
        assert_eq!(s.pipeline_name.as_ref().unwrap().span, SourceSpan::new(3, 3));
        assert_eq!(s.stages.as_ref().unwrap().value, vec!["build", "test"]);
    }

    #[test]
    fn scans_jobs_with_inline_lists_and_needs() {
        let s = scan(DOC);
        assert_eq!(s.jobs.len(), 2);
        let compile = &s.jobs[0];
        assert_eq!(compile.name.as_ref().unwrap().value, "compile");
        assert_eq!(compile.stage.as_ref().unwrap().value, "build");
        assert_eq!(
            compile.script.as_ref().unwrap().value,
            vec!["mvn -v", "mvn compile"]
        );
        assert!(compile.needs.is_none());

        let unit = &s.jobs[1];
        assert_eq!(unit.needs.as_ref().unwrap().value, vec!["compile"]);
    }

    #[test]
    fn image_value_with_bare_colon_is_not_split() {
        let s = scan(DOC);
        assert_eq!(s.jobs[0].image.as_ref().unwrap().value, "maven:3.8.6");
    }

    #[test]
    fn empty_document_yields_all_none() {
        let s = scan("");
        assert!(s.version.is_none());
        assert!(s.stages.is_none());
        assert!(s.jobs.is_empty());
    }
}
