use std::path::PathBuf;

use clap::Parser;

use schcats_bench::config::{BenchmarkConfig, ResolvedOutputs};
use schcats_bench::logging::init_logging;
use schcats_bench::metrics::Summary;
use schcats_bench::tournament::TournamentRunner;

/// Seat-swapped experiment harness for Schrödinger's Cats agents.
#[derive(Debug, Parser)]
#[command(
    name = "schcats-bench",
    author,
    version,
    about = "Deterministic Schrödinger's Cats experiment harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of matches per pairing and seating.
    #[arg(long, value_name = "COUNT", allow_negative_numbers = true)]
    matches: Option<i64>,

    /// Override the number of rounds per match.
    #[arg(long, value_name = "ROUNDS", allow_negative_numbers = true)]
    rounds: Option<i64>,

    /// Override the RNG seed for deal generation.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Play each pairing from one seating only.
    #[arg(long)]
    no_seat_swap: bool,

    /// Exit after validating the configuration (no matches are played).
    #[arg(long)]
    validate_only: bool,
}

fn format_summary(summary: &Summary) -> String {
    format!(
        "{:.3} [{:.3}, {:.3}] over {} rounds",
        summary.win_rate, summary.ci_lower, summary.ci_upper, summary.n
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchmarkConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(matches) = cli.matches {
        config.matches.count = matches;
    }

    if let Some(rounds) = cli.rounds {
        config.matches.rounds_per_match = rounds;
    }

    if let Some(seed) = cli.seed {
        config.matches.seed = Some(seed);
    }

    if cli.no_seat_swap {
        config.matches.seat_swap = false;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let agent_count = config.agents.len();
    let pairing_count = config.pairings.len();
    let run_id = config.run_id.clone();
    let matches = config.matches.match_count();
    let rounds = config.matches.rounds();

    println!(
        "Loaded configuration '{run_id}' with {agent_count} agent{} and {pairing_count} pairing{} ({matches} matches of {rounds} rounds, seat swap {})",
        if agent_count == 1 { "" } else { "s" },
        if pairing_count == 1 { "" } else { "s" },
        if config.matches.seat_swap { "on" } else { "off" },
    );

    let runner = TournamentRunner::new(config.clone(), outputs.clone())?;

    if cli.validate_only {
        println!("Validation-only mode: experiment execution skipped.");
        return Ok(());
    }

    let _logging_guard = init_logging(&config.logging, &outputs, &run_id)?;
    let summary = runner.run()?;
    println!(
        "Experiment complete for '{run_id}': {} matches × {} seatings → {} rows at {}",
        summary.matches_per_pairing,
        summary.seatings,
        summary.rows_written,
        summary.jsonl_path.display()
    );

    for pairing in &summary.analytics.pairings {
        println!("{}", pairing.label);
        for side in &pairing.sides {
            println!(
                "  {} ({}): {}",
                side.agent,
                side.side.as_str(),
                format_summary(&side.overall)
            );
            if let Some(first) = side.seat_first.as_ref() {
                println!("    first seat:  {}", format_summary(first));
            }
            if let Some(second) = side.seat_second.as_ref() {
                println!("    second seat: {}", format_summary(second));
            }
            if side.fallback_activations > 0 {
                println!("    fallback activations: {}", side.fallback_activations);
            }
        }
        if let Some(p) = pairing.seat_bias_p_value {
            println!("  seat effect p-value: {p:.3}");
        }
    }

    println!("Summary table: {}", summary.summary_path.display());
    if let Some(plot_path) = summary.plot_path.as_ref() {
        println!("Win rate plot: {}", plot_path.display());
    }
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }
    if let Some(outputs) = summary.telemetry_outputs.as_ref() {
        println!("Telemetry summary (JSON): {}", outputs.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            outputs.markdown_path.display()
        );
        println!(
            "  Decisions: {} events, fallback activations {}",
            outputs.summary.decisions.count, outputs.summary.modes.fallback_activations
        );
    }

    Ok(())
}
