use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub decisions: DecisionTelemetrySummary,
    pub modes: ModeTelemetrySummary,
    pub rounds: RoundTelemetrySummary,
}

#[derive(Debug, Default, Serialize)]
pub struct DecisionTelemetrySummary {
    pub count: usize,
    /// Share of decisions that were doubts.
    pub doubt_share: Option<f64>,
    pub by_mode: BTreeMap<String, usize>,
    pub by_action: BTreeMap<String, usize>,
    pub by_reason: BTreeMap<String, usize>,
    pub by_agent: BTreeMap<String, usize>,
    pub warnings: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct ModeTelemetrySummary {
    pub fallback_activations: usize,
    pub fallback_reverts: usize,
    pub activations_by_agent: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct RoundTelemetrySummary {
    pub count: usize,
    /// Share of doubted claims that turned out to hold.
    pub claim_held_share: Option<f64>,
}

fn label(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("<unset>")
        .to_string()
}

fn bump(counts: &mut BTreeMap<String, usize>, key: String) {
    *counts.entry(key).or_insert(0) += 1;
}

fn share(part: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| part as f64 / total as f64)
}

/// Aggregate decision, mode-switch and round telemetry from a JSONL trace.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut summary = TelemetrySummary::default();
    let mut doubts = 0usize;
    let mut claims_held = 0usize;

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match target {
            "schcats_bot::decision" => {
                let decisions = &mut summary.decisions;
                if !fields.contains_key("action") {
                    decisions.warnings += 1;
                    continue;
                }
                decisions.count += 1;
                let action = label(&fields, "action");
                if action == "doubt" {
                    doubts += 1;
                }
                bump(&mut decisions.by_action, action);
                bump(&mut decisions.by_mode, label(&fields, "mode"));
                bump(&mut decisions.by_reason, label(&fields, "reason"));
                bump(&mut decisions.by_agent, label(&fields, "agent"));
            }
            "schcats_bot::mode" => {
                let modes = &mut summary.modes;
                if label(&fields, "to") == "fallback" {
                    modes.fallback_activations += 1;
                    bump(&mut modes.activations_by_agent, label(&fields, "agent"));
                } else {
                    modes.fallback_reverts += 1;
                }
            }
            "schcats_bench::round" => {
                summary.rounds.count += 1;
                if fields.get("claim_held").and_then(Value::as_bool) == Some(true) {
                    claims_held += 1;
                }
            }
            _ => {}
        }
    }

    summary.decisions.doubt_share = share(doubts, summary.decisions.count);
    summary.rounds.claim_held_share = share(claims_held, summary.rounds.count);

    Ok(summary)
}

pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(
        &json_path,
        serde_json::to_vec_pretty(&summary).map_err(TelemetryError::from)?,
    )
    .map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary json",
        source,
    })?;

    let markdown = render_markdown(&summary, telemetry_path);
    std::fs::write(&md_path, markdown).map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary markdown",
        source,
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

fn push_counts(out: &mut String, indent: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        out.push_str(&format!("{indent}- <none>\n"));
        return;
    }
    for (label, count) in counts {
        out.push_str(&format!("{indent}- {label}: {count}\n"));
    }
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let summary = &outputs.summary;
    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    section.push_str(&format!(
        "- Decision events captured: {}\n",
        summary.decisions.count
    ));
    if let Some(value) = summary.decisions.doubt_share {
        section.push_str(&format!("- Doubt share: {:.3}\n", value));
    }
    section.push_str(&format!(
        "- Fallback activations: {} (reverts: {})\n",
        summary.modes.fallback_activations, summary.modes.fallback_reverts
    ));
    section.push_str(&format!("- Rounds logged: {}\n", summary.rounds.count));

    section.push_str("\n### Decisions by Mode\n");
    push_counts(&mut section, "", &summary.decisions.by_mode);

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut output = String::new();
    output.push_str("# Telemetry Summary\n\n");
    output.push_str(&format!("- Source: `{}`\n", telemetry_path.display()));
    output.push('\n');

    let decisions = &summary.decisions;
    output.push_str("## Decisions\n");
    output.push_str(&format!("- Events: {}\n", decisions.count));
    if let Some(value) = decisions.doubt_share {
        output.push_str(&format!("- Doubt share: {:.3}\n", value));
    }
    if decisions.warnings > 0 {
        output.push_str(&format!("- Warnings: {}\n", decisions.warnings));
    }
    output.push_str("- Actions:\n");
    push_counts(&mut output, "  ", &decisions.by_action);
    output.push_str("- Modes:\n");
    push_counts(&mut output, "  ", &decisions.by_mode);
    output.push_str("- Reasons:\n");
    push_counts(&mut output, "  ", &decisions.by_reason);
    output.push_str("- Agents:\n");
    push_counts(&mut output, "  ", &decisions.by_agent);
    output.push('\n');

    output.push_str("## Mode Switches\n");
    output.push_str(&format!(
        "- Fallback activations: {}\n",
        summary.modes.fallback_activations
    ));
    output.push_str(&format!("- Reverts: {}\n", summary.modes.fallback_reverts));
    if !summary.modes.activations_by_agent.is_empty() {
        output.push_str("- By agent:\n");
        push_counts(&mut output, "  ", &summary.modes.activations_by_agent);
    }
    output.push('\n');

    output.push_str("## Rounds\n");
    output.push_str(&format!("- Events: {}\n", summary.rounds.count));
    if let Some(value) = summary.rounds.claim_held_share {
        output.push_str(&format!("- Doubted claims that held: {:.3}\n", value));
    }
    output
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
        file
    }

    #[test]
    fn summarises_decision_mode_and_round_events() {
        let lines = vec![
            r#"{"target":"schcats_bot::decision","fields":{"agent":"tom1","mode":"tom","action":"claim","reason":"open_belief"}}"#,
            r#"{"target":"schcats_bot::decision","fields":{"agent":"tom0","mode":"tom0","action":"doubt","reason":"estimate_below_claim"}}"#,
            r#"{"target":"schcats_bot::decision","fields":{"agent":"tom1","mode":"fallback","action":"claim","reason":"raise"}}"#,
            r#"{"target":"schcats_bot::decision","fields":{"agent":"tom1","message":"opponent evidence rejected by belief"}}"#,
            r#"{"target":"schcats_bot::mode","fields":{"agent":"tom1","from":"tom","to":"fallback","activations":1}}"#,
            r#"{"target":"schcats_bot::mode","fields":{"agent":"tom1","from":"fallback","to":"tom","activations":1}}"#,
            r#"{"target":"schcats_bench::round","fields":{"claim_held":true}}"#,
            r#"{"target":"schcats_bench::round","fields":{"claim_held":false}}"#,
            r#"{"target":"other::target","fields":{}}"#,
        ];
        let file = write_temp_file(&lines);
        let summary = summarise_telemetry(file.path()).expect("summarise");

        let decisions = &summary.decisions;
        assert_eq!(decisions.count, 3);
        assert_eq!(decisions.warnings, 1);
        assert!((decisions.doubt_share.unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(decisions.by_mode.get("fallback"), Some(&1));
        assert_eq!(decisions.by_action.get("claim"), Some(&2));
        assert_eq!(decisions.by_agent.get("tom1"), Some(&2));
        assert_eq!(decisions.by_reason.get("open_belief"), Some(&1));

        assert_eq!(summary.modes.fallback_activations, 1);
        assert_eq!(summary.modes.fallback_reverts, 1);
        assert_eq!(summary.modes.activations_by_agent.get("tom1"), Some(&1));

        assert_eq!(summary.rounds.count, 2);
        assert_eq!(summary.rounds.claim_held_share, Some(0.5));
    }

    #[test]
    fn handles_missing_file() {
        let path = Path::new("tests/does/not/exist.jsonl");
        let summary = summarise_telemetry(path).expect("summarise missing file");
        assert_eq!(summary.decisions.count, 0);
        assert!(summary.decisions.doubt_share.is_none());
        assert!(summary.decisions.by_mode.is_empty());
    }

    #[test]
    fn writes_summary_files_next_to_log() {
        let dir = tempfile::tempdir().expect("temp dir");
        let log = dir.path().join("telemetry.jsonl");
        std::fs::write(
            &log,
            "{\"target\":\"schcats_bench::round\",\"fields\":{\"claim_held\":true}}\n",
        )
        .expect("seed log");

        let outputs = write_summary_outputs(&log, dir.path())
            .expect("write outputs")
            .expect("log exists");
        assert_eq!(outputs.summary.rounds.count, 1);
        let markdown = std::fs::read_to_string(&outputs.markdown_path).expect("read md");
        assert!(markdown.contains("## Rounds"));
        assert!(outputs.json_path.exists());

        assert!(
            write_summary_outputs(&dir.path().join("missing.jsonl"), dir.path())
                .expect("missing log is not an error")
                .is_none()
        );
    }

    #[test]
    fn appends_highlights_to_summary_markdown() {
        let mut summary_file = tempfile::NamedTempFile::new().expect("summary temp file");
        writeln!(summary_file, "# Experiment Summary").expect("seed summary content");
        let telemetry_json = tempfile::NamedTempFile::new().expect("telemetry json temp");
        let telemetry_md = tempfile::NamedTempFile::new().expect("telemetry md temp");

        let mut by_mode = BTreeMap::new();
        by_mode.insert("tom".to_string(), 40);
        by_mode.insert("fallback".to_string(), 6);

        let outputs = TelemetryOutputs {
            summary: TelemetrySummary {
                decisions: DecisionTelemetrySummary {
                    count: 46,
                    doubt_share: Some(0.25),
                    by_mode,
                    ..Default::default()
                },
                modes: ModeTelemetrySummary {
                    fallback_activations: 2,
                    fallback_reverts: 1,
                    ..Default::default()
                },
                rounds: RoundTelemetrySummary {
                    count: 12,
                    claim_held_share: None,
                },
            },
            json_path: telemetry_json.path().to_path_buf(),
            markdown_path: telemetry_md.path().to_path_buf(),
        };

        append_highlights_to_markdown(summary_file.path(), &outputs).expect("append highlights");

        let contents = std::fs::read_to_string(summary_file.path()).expect("read summary file");
        assert!(contents.starts_with("# Experiment Summary"));
        assert!(contents.contains("## Telemetry Highlights"));
        assert!(contents.contains("Decision events captured: 46"));
        assert!(contents.contains("Doubt share: 0.250"));
        assert!(contents.contains("Fallback activations: 2 (reverts: 1)"));
        assert!(contents.contains("fallback: 6"));
    }
}
