use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use schcats_core::model::player::PlayerPosition;
use serde::Serialize;
use thiserror::Error;

use crate::config::{AgentKind, BenchmarkConfig};
use crate::metrics::{
    MetricsError, Outcome, Summary, summarize_at, two_proportion_p_value, wilson_interval,
};
use crate::tournament::{MatchOutcome, MatchVerdict, Side};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("match references unknown pairing index {0}")]
    UnknownPairing(usize),
    #[error("agent '{0}' defined in results but missing from configuration")]
    UnknownAgent(String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Accumulates per-round outcomes for every pairing side.
pub struct AnalyticsCollector {
    confidence: f64,
    latency_budget_ms: u64,
    pairings: Vec<PairingAccumulator>,
}

impl AnalyticsCollector {
    pub fn new(config: &BenchmarkConfig) -> Result<Self, AnalyticsError> {
        let mut pairings = Vec::with_capacity(config.pairings.len());
        for pairing in &config.pairings {
            let mut sides = Vec::with_capacity(2);
            for name in [&pairing.a, &pairing.b] {
                let agent = config
                    .agent(name)
                    .ok_or_else(|| AnalyticsError::UnknownAgent(name.clone()))?;
                sides.push(SideAccumulator::new(agent.name.clone(), agent.kind));
            }
            pairings.push(PairingAccumulator {
                label: pairing.label(),
                sides,
            });
        }

        Ok(Self {
            confidence: config.metrics.confidence,
            latency_budget_ms: config.metrics.latency_budget_ms,
            pairings,
        })
    }

    pub fn record_match(&mut self, outcome: &MatchOutcome) -> Result<(), AnalyticsError> {
        let pairing = self
            .pairings
            .get_mut(outcome.pairing_index)
            .ok_or(AnalyticsError::UnknownPairing(outcome.pairing_index))?;

        for side in &outcome.sides {
            let acc = &mut pairing.sides[side.side.index()];
            if acc.agent != side.agent_name {
                return Err(AnalyticsError::UnknownAgent(side.agent_name.clone()));
            }
            acc.outcomes.extend_from_slice(&side.outcomes);
            acc.by_seat[side.seat.index()].extend_from_slice(&side.outcomes);
            match side.verdict {
                MatchVerdict::Win => acc.matches_won += 1,
                MatchVerdict::Loss => acc.matches_lost += 1,
                MatchVerdict::Draw => acc.matches_drawn += 1,
            }
            acc.total_latency_ms += side.metrics.total_ms;
            acc.total_decisions += u64::from(side.metrics.decisions);
            acc.fallback_activations += side.fallback_activations;
        }

        Ok(())
    }

    pub fn finalize(self) -> Result<AnalyticsSummary, AnalyticsError> {
        let mut pairings = Vec::with_capacity(self.pairings.len());
        for pairing in self.pairings {
            let seat_bias_p_value = pairing.seat_bias_p_value()?;
            let mut sides = Vec::with_capacity(pairing.sides.len());
            for (index, side) in pairing.sides.into_iter().enumerate() {
                sides.push(side.into_report(
                    Side::from_index(index),
                    self.confidence,
                    self.latency_budget_ms,
                )?);
            }
            pairings.push(PairingReport {
                label: pairing.label,
                sides,
                seat_bias_p_value,
            });
        }

        Ok(AnalyticsSummary {
            confidence: self.confidence,
            latency_budget_ms: self.latency_budget_ms,
            pairings,
        })
    }
}

struct PairingAccumulator {
    label: String,
    sides: Vec<SideAccumulator>,
}

impl PairingAccumulator {
    /// Two-proportion test of side a's win rate from the first seat against the second.
    fn seat_bias_p_value(&self) -> Result<Option<f64>, AnalyticsError> {
        let Some(side) = self.sides.first() else {
            return Ok(None);
        };
        let [first, second] = &side.by_seat;
        if first.is_empty() || second.is_empty() {
            return Ok(None);
        }
        let p = two_proportion_p_value(
            wins(first),
            first.len(),
            wins(second),
            second.len(),
        )?;
        Ok(Some(p))
    }
}

struct SideAccumulator {
    agent: String,
    kind: AgentKind,
    outcomes: Vec<Outcome>,
    by_seat: [Vec<Outcome>; 2],
    matches_won: u32,
    matches_lost: u32,
    matches_drawn: u32,
    total_latency_ms: f64,
    total_decisions: u64,
    fallback_activations: u32,
}

impl SideAccumulator {
    fn new(agent: String, kind: AgentKind) -> Self {
        Self {
            agent,
            kind,
            outcomes: Vec::new(),
            by_seat: [Vec::new(), Vec::new()],
            matches_won: 0,
            matches_lost: 0,
            matches_drawn: 0,
            total_latency_ms: 0.0,
            total_decisions: 0,
            fallback_activations: 0,
        }
    }

    fn into_report(
        self,
        side: Side,
        confidence: f64,
        latency_budget_ms: u64,
    ) -> Result<SideReport, AnalyticsError> {
        let overall = summarize_at(&self.outcomes, confidence)?;
        let wilson = wilson_interval(overall.wins, overall.n, confidence)?;
        let [first, second] = self.by_seat;
        let seat_first = seat_summary(&first, confidence)?;
        let seat_second = seat_summary(&second, confidence)?;

        let average_ms_per_decision = if self.total_decisions == 0 {
            0.0
        } else {
            self.total_latency_ms / self.total_decisions as f64
        };

        Ok(SideReport {
            side,
            agent: self.agent,
            kind: self.kind,
            overall,
            wilson,
            seat_first,
            seat_second,
            matches_won: self.matches_won,
            matches_lost: self.matches_lost,
            matches_drawn: self.matches_drawn,
            average_ms_per_decision,
            over_budget: average_ms_per_decision > latency_budget_ms as f64,
            fallback_activations: self.fallback_activations,
        })
    }
}

fn wins(outcomes: &[Outcome]) -> usize {
    outcomes.iter().filter(|outcome| outcome.is_win()).count()
}

fn seat_summary(outcomes: &[Outcome], confidence: f64) -> Result<Option<Summary>, MetricsError> {
    if outcomes.is_empty() {
        return Ok(None);
    }
    summarize_at(outcomes, confidence).map(Some)
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub confidence: f64,
    pub latency_budget_ms: u64,
    pub pairings: Vec<PairingReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairingReport {
    pub label: String,
    /// Side a first, side b second.
    pub sides: Vec<SideReport>,
    pub seat_bias_p_value: Option<f64>,
}

impl PairingReport {
    pub fn side(&self, side: Side) -> Option<&SideReport> {
        self.sides.get(side.index())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SideReport {
    pub side: Side,
    pub agent: String,
    pub kind: AgentKind,
    pub overall: Summary,
    pub wilson: (f64, f64),
    pub seat_first: Option<Summary>,
    pub seat_second: Option<Summary>,
    pub matches_won: u32,
    pub matches_lost: u32,
    pub matches_drawn: u32,
    pub average_ms_per_decision: f64,
    pub over_budget: bool,
    pub fallback_activations: u32,
}

impl SideReport {
    pub fn seat(&self, seat: PlayerPosition) -> Option<&Summary> {
        match seat {
            PlayerPosition::First => self.seat_first.as_ref(),
            PlayerPosition::Second => self.seat_second.as_ref(),
        }
    }
}

fn format_interval(summary: Option<&Summary>) -> String {
    match summary {
        Some(s) => format!("{:.3} [{:.3}, {:.3}]", s.win_rate, s.ci_lower, s.ci_upper),
        None => "-".to_string(),
    }
}

impl AnalyticsSummary {
    pub fn pairing(&self, label: &str) -> Option<&PairingReport> {
        self.pairings.iter().find(|pairing| pairing.label == label)
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str("# Experiment Summary\n\n");
        rows.push_str(&format!(
            "Round win rates with {:.0}% Wald intervals. Latency budget: {} ms average per decision\n\n",
            self.confidence * 100.0,
            self.latency_budget_ms
        ));
        rows.push_str("| Pairing | Side | Agent | Kind | Rounds | Win rate | Wald CI | Wilson CI | First seat | Second seat | Matches W/L/D | Avg ms/decision | Over Budget | Fallbacks |\n");
        rows.push_str("|---------|------|-------|------|--------|----------|---------|-----------|------------|-------------|---------------|-----------------|-------------|-----------|\n");

        for pairing in &self.pairings {
            for side in &pairing.sides {
                rows.push_str(&format!(
                    "| {pairing} | {side} | {agent} | {kind} | {n} | {rate:.3} | [{lo:.3}, {hi:.3}] | [{wlo:.3}, {whi:.3}] | {first} | {second} | {w}/{l}/{d} | {latency:.2} | {over_budget} | {fallbacks} |\n",
                    pairing = pairing.label,
                    side = side.side.as_str(),
                    agent = side.agent,
                    kind = side.kind.as_str(),
                    n = side.overall.n,
                    rate = side.overall.win_rate,
                    lo = side.overall.ci_lower,
                    hi = side.overall.ci_upper,
                    wlo = side.wilson.0,
                    whi = side.wilson.1,
                    first = format_interval(side.seat_first.as_ref()),
                    second = format_interval(side.seat_second.as_ref()),
                    w = side.matches_won,
                    l = side.matches_lost,
                    d = side.matches_drawn,
                    latency = side.average_ms_per_decision,
                    over_budget = if side.over_budget { "Yes" } else { "No" },
                    fallbacks = side.fallback_activations,
                ));
            }
        }

        let biased: Vec<_> = self
            .pairings
            .iter()
            .filter_map(|pairing| pairing.seat_bias_p_value.map(|p| (&pairing.label, p)))
            .collect();
        if !biased.is_empty() {
            rows.push_str("\n## Seat effect\n\n");
            for (label, p) in biased {
                rows.push_str(&format!(
                    "- {label}: side a first vs second seat p = {p:.3}\n"
                ));
            }
        }

        fs::write(path.as_ref(), rows).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })?;
        Ok(())
    }

    /// Bar chart of side a's win rate per pairing with interval whiskers and a line at
    /// 0.5. Drawn without text so it does not depend on system fonts.
    pub fn render_plot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyticsError> {
        let dir = dir.as_ref();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| AnalyticsError::Io {
                context: "creating plots directory",
                source: e,
            })?;
        }

        let output_path = dir.join("win_rate.png");
        let bars: Vec<Summary> = self
            .pairings
            .iter()
            .filter_map(|pairing| pairing.side(Side::A).map(|side| side.overall))
            .collect();

        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let plot_attempt = std::panic::catch_unwind(move || {
            let root = BitMapBackend::new(&output_path, (800, 480)).into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            let mut chart = ChartBuilder::on(&root)
                .margin(20)
                .build_cartesian_2d(0.0..bars.len().max(1) as f64, 0.0..1.0f64)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(bars.iter().enumerate().map(|(idx, summary)| {
                    let color = if summary.ci_lower > 0.5 {
                        &GREEN
                    } else if summary.ci_upper < 0.5 {
                        &RED
                    } else {
                        &BLUE
                    };
                    let x = idx as f64;
                    Rectangle::new(
                        [(x + 0.15, 0.0), (x + 0.85, summary.win_rate)],
                        color.mix(0.6).filled(),
                    )
                }))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(bars.iter().enumerate().map(|(idx, summary)| {
                    let x = idx as f64 + 0.5;
                    PathElement::new(
                        vec![(x, summary.ci_lower), (x, summary.ci_upper)],
                        BLACK.stroke_width(2),
                    )
                }))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(0.0, 0.5), (bars.len().max(1) as f64, 0.5)],
                    BLACK.mix(0.5),
                )))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(chart);

            root.present()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(root);

            Ok(output_path)
        });

        std::panic::set_hook(prev_hook);

        match plot_attempt {
            Ok(result) => result,
            Err(_) => Err(AnalyticsError::Plot(
                "plotters panicked while rendering".into(),
            )),
        }
    }
}
