use std::fs;

use schcats_bench::config::BenchmarkConfig;
use schcats_bench::tournament::{Side, TournamentRunner};
use sha2::{Digest, Sha256};
use tempfile::tempdir;

fn load_config(output_dir: &std::path::Path, extra_matches: &str) -> BenchmarkConfig {
    let yaml = format!(
        r#"
run_id: "test_smoke"
matches:
  count: 3
  rounds_per_match: 10
  seed: 4242
{extra_matches}
agents:
  - name: "tom0"
    kind: "tom0_memory"
  - name: "tom1"
    kind: "tom1"
    params:
      fallback_window: 3
pairings:
  - {{ a: "tom0", b: "tom0" }}
  - {{ a: "tom1", b: "tom0" }}
outputs:
  jsonl: "{jsonl}"
  summary_md: "{summary}"
  plots_dir: "{plots}"
logging:
  enable_structured: false
"#,
        jsonl = output_dir.join("matches.jsonl").display(),
        summary = output_dir.join("summary.md").display(),
        plots = output_dir.join("plots").display()
    );

    let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

fn normalized_digest(jsonl: &str) -> String {
    let mut normalized = String::new();
    for line in jsonl.lines() {
        let mut value: serde_json::Value = serde_json::from_str(line).expect("row decodes to JSON");
        if let Some(obj) = value.as_object_mut() {
            if let Some(speed) = obj.get_mut("speed_ms_decision") {
                *speed = serde_json::Value::Number(
                    serde_json::Number::from_f64(0.0).expect("number for normalized speed"),
                );
            }
        }
        normalized.push_str(&serde_json::to_string(&value).expect("re-serialize normalized row"));
        normalized.push('\n');
    }

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

fn run_once(extra_matches: &str) -> (schcats_bench::tournament::RunSummary, String) {
    let dir = tempdir().expect("temp dir");
    let config = load_config(dir.path(), extra_matches);
    let outputs = config.resolved_outputs();

    let runner = TournamentRunner::new(config, outputs).expect("runner created");
    let summary = runner.run().expect("experiment completes");
    let jsonl = fs::read_to_string(&summary.jsonl_path).expect("jsonl readable");
    assert!(summary.summary_path.exists(), "summary markdown missing");
    // Plot rendering is optional; ensure any failure surfaces explicitly
    if let Some(plot_path) = summary.plot_path.as_ref() {
        assert!(plot_path.exists(), "plot path reported but missing on disk");
    }
    (summary, jsonl)
}

#[test]
fn identical_runs_produce_identical_jsonl() {
    let (first, first_jsonl) = run_once("");
    let (_, second_jsonl) = run_once("");

    assert_eq!(first.matches_per_pairing, 3);
    assert_eq!(first.seatings, 2);
    assert_eq!(first.rounds_per_match, 10);
    // 2 pairings × 2 seatings × 3 matches × 2 sides.
    assert_eq!(first.rows_written, 24);
    assert_eq!(first_jsonl.lines().count(), 24);
    assert_eq!(
        normalized_digest(&first_jsonl),
        normalized_digest(&second_jsonl),
        "JSONL output differs between identical runs"
    );
}

#[test]
fn mirrored_self_play_is_exactly_even() {
    let (summary, _) = run_once("");
    let pairing = summary
        .analytics
        .pairing("tom0_vs_tom0")
        .expect("self-play pairing");
    let a = pairing.side(Side::A).expect("side a");
    let b = pairing.side(Side::B).expect("side b");

    assert_eq!(a.overall.n, 60);
    assert_eq!(a.overall.win_rate, 0.5);
    assert_eq!(b.overall.win_rate, 0.5);
    assert!(a.overall.ci_lower < 0.5 && 0.5 < a.overall.ci_upper);
    assert_eq!(
        a.seat_first.expect("first seat played").wins,
        b.seat_first.expect("first seat played").wins
    );
}

#[test]
fn rows_carry_seat_and_result_fields() {
    let (_, jsonl) = run_once("");
    for line in jsonl.lines() {
        let row: serde_json::Value = serde_json::from_str(line).expect("row decodes");
        let rounds_won = row["rounds_won"].as_u64().expect("rounds_won");
        assert_eq!(row["rounds_played"].as_u64(), Some(10));
        assert!(rounds_won <= 10);
        assert!(matches!(row["seat"].as_str(), Some("first" | "second")));
        assert!(matches!(row["side"].as_str(), Some("a" | "b")));
        let expected = match rounds_won {
            0..=4 => "loss",
            5 => "draw",
            _ => "win",
        };
        assert_eq!(row["result"].as_str(), Some(expected));
        assert!(row["snapshot"]["finished"].as_bool().unwrap_or(false));
    }
}

#[test]
fn chained_memory_accumulates_across_matches() {
    let (summary, jsonl) = run_once("  seat_swap: false\n  chain_memory: true");
    assert_eq!(summary.seatings, 1);
    assert_eq!(summary.rows_written, 12);
    assert_eq!(jsonl.lines().count(), 12);
    for pairing in &summary.analytics.pairings {
        assert!(pairing.seat_bias_p_value.is_none());
        let a = pairing.side(Side::A).expect("side a");
        assert_eq!(a.overall.n, 30);
        assert!(a.seat_second.is_none());
    }

    // Chained agents carry every earlier match's rounds; fresh agents hold only their own.
    for line in jsonl.lines() {
        let row: serde_json::Value = serde_json::from_str(line).expect("row decodes");
        let match_index = row["match_index"].as_u64().expect("match_index");
        assert_eq!(row["rounds_remembered"].as_u64(), Some((match_index + 1) * 10));
    }
    let (_, unchained) = run_once("  seat_swap: false");
    for line in unchained.lines() {
        let row: serde_json::Value = serde_json::from_str(line).expect("row decodes");
        assert_eq!(row["rounds_remembered"].as_u64(), Some(10));
    }
}
