mod permutations;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::analytics::{AnalyticsCollector, AnalyticsError, AnalyticsSummary};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use schcats_bot::{Policy, Tom0MemoryAgent, Tom0Params, Tom1Agent, Tom1Params};
use schcats_core::game::match_state::MatchState;
use schcats_core::game::serialization::MatchSnapshot;
use schcats_core::model::player::PlayerPosition;
use schcats_core::model::round::ActionError;
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::config::{AgentConfig, AgentKind, BenchmarkConfig, ResolvedOutputs};
use crate::metrics::Outcome;
use crate::telemetry::{
    TelemetryError, TelemetryOutputs, append_highlights_to_markdown, write_summary_outputs,
};

pub use permutations::SeatPermutations;

/// Primary entry point for orchestrating experiments.
pub struct TournamentRunner {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    agents: Vec<AgentBlueprint>,
    pairings: Vec<[usize; 2]>,
    seat_permutations: SeatPermutations,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub matches_per_pairing: usize,
    pub seatings: usize,
    pub rounds_per_match: u32,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_path: Option<PathBuf>,
    pub telemetry_path: Option<PathBuf>,
    pub telemetry_outputs: Option<TelemetryOutputs>,
    pub analytics: AnalyticsSummary,
}

impl TournamentRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchmarkConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let agents = AgentBlueprint::from_configs(&config.agents)?;

        let mut pairings = Vec::with_capacity(config.pairings.len());
        for pairing in &config.pairings {
            let a = agent_index(&agents, &pairing.a)?;
            let b = agent_index(&agents, &pairing.b)?;
            pairings.push([a, b]);
        }

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            seat_permutations: SeatPermutations::new(config.matches.seat_swap),
            config,
            outputs,
            agents,
            pairings,
        })
    }

    /// Execute every pairing, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;
        if !self.outputs.plots_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.outputs.plots_dir)?;
        }

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut rng = StdRng::seed_from_u64(self.config.matches.seed.unwrap_or(0));
        // Every pairing and seating replays the same deal seeds.
        let deal_seeds: Vec<u64> = (0..self.config.matches.match_count())
            .map(|_| rng.next_u64())
            .collect();
        let mut rows_written = 0usize;
        let mut analytics = AnalyticsCollector::new(&self.config)?;

        for (pairing_index, pairing) in self.pairings.iter().enumerate() {
            for (seating_index, seating) in self.seat_permutations.as_slice().iter().enumerate() {
                let mut chained: Option<[SeatState; 2]> = None;
                for (match_index, &deal_seed) in deal_seeds.iter().enumerate() {
                    let mut seats = match chained.take() {
                        Some(seats) => seats,
                        None => self.build_seats(pairing, seating),
                    };
                    let outcome = self.play_match(
                        MatchKey {
                            pairing_index,
                            match_index,
                            seating_index,
                            deal_seed,
                        },
                        &mut seats,
                    )?;
                    analytics.record_match(&outcome)?;
                    rows_written += write_match_rows(&mut writer, &self.config, &outcome)?;
                    if self.config.matches.chain_memory {
                        chained = Some(seats);
                    }
                }
            }
        }

        writer.flush()?;

        let summary = analytics.finalize()?;
        summary.write_markdown(&self.outputs.summary_md)?;
        let plot_path = match summary.render_plot(&self.outputs.plots_dir) {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(target: "schcats_bench::run", error = %err, "plot skipped");
                eprintln!("WARN: {}", err);
                None
            }
        };

        let telemetry_dir = self
            .outputs
            .summary_md
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let telemetry_path = if self.logging_enabled {
            Some(telemetry_dir.join("telemetry.jsonl"))
        } else {
            None
        };

        let telemetry_outputs = if let Some(path) = telemetry_path.as_ref() {
            write_summary_outputs(path, &telemetry_dir)?
        } else {
            None
        };

        if let Some(outputs) = telemetry_outputs.as_ref() {
            append_highlights_to_markdown(&self.outputs.summary_md, outputs)?;
        }

        Ok(RunSummary {
            matches_per_pairing: deal_seeds.len(),
            seatings: self.seat_permutations.len(),
            rounds_per_match: self.config.matches.rounds(),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            plot_path,
            telemetry_path,
            telemetry_outputs,
            analytics: summary,
        })
    }

    fn build_seats(&self, pairing: &[usize; 2], seating: &[usize; 2]) -> [SeatState; 2] {
        PlayerPosition::LOOP.map(|seat| {
            let side = Side::from_index(seating[seat.index()]);
            let agent = &self.agents[pairing[side.index()]];
            let opponent = &self.agents[pairing[side.other().index()]];
            SeatState::new(seat, side, agent, &opponent.name)
        })
    }

    fn play_match(
        &self,
        key: MatchKey,
        seats: &mut [SeatState; 2],
    ) -> Result<MatchOutcome, RunnerError> {
        for seat in seats.iter_mut() {
            seat.begin_match();
        }

        let mut state = MatchState::with_seed(self.config.matches.rounds(), key.deal_seed);
        let mut outcomes: [Vec<Outcome>; 2] = [Vec::new(), Vec::new()];

        while !state.is_finished() {
            let to_act = state.to_act();
            let observation = state.observe(to_act);
            let seat_state = &mut seats[to_act.index()];

            let start = Instant::now();
            let action = seat_state.policy.decide(&observation);
            seat_state.metrics.record(start.elapsed());

            let step = state
                .step(to_act, &action)
                .map_err(|source| RunnerError::IllegalAction {
                    agent: seat_state.agent_name.clone(),
                    source,
                })?;

            let Some(round) = step.round else {
                continue;
            };

            for seat_state in seats.iter_mut() {
                if let Some(recap) = state.last_round_recap(seat_state.seat) {
                    seat_state.policy.observe_round_end(&recap);
                }
                outcomes[seat_state.seat.index()]
                    .push(Outcome::from_won(round.winner == seat_state.seat));
            }

            if self.logging_enabled && tracing::enabled!(Level::INFO) {
                let winner = &seats[round.winner.index()];
                event!(
                    target: "schcats_bench::round",
                    Level::INFO,
                    run_id = %self.config.run_id,
                    pairing_index = key.pairing_index as u32,
                    match_index = key.match_index as u32,
                    seating_index = key.seating_index as u32,
                    round = round.round_index,
                    winner = %round.winner,
                    winner_agent = %winner.agent_name,
                    doubter = %round.doubter,
                    claim = %round.claim,
                    claim_held = round.claim_held,
                );
            }
        }

        let result = state
            .result()
            .ok_or_else(|| RunnerError::game("match ended without a result".to_string()))?;
        let snapshot = MatchSnapshot::capture(&state);

        let mut sides = Vec::with_capacity(2);
        for (seat_state, outcomes) in seats.iter_mut().zip(outcomes) {
            let verdict = match result.winner {
                None => MatchVerdict::Draw,
                Some(winner) if winner == seat_state.seat => MatchVerdict::Win,
                Some(_) => MatchVerdict::Loss,
            };
            sides.push(SideResult {
                side: seat_state.side,
                agent_name: seat_state.agent_name.clone(),
                opponent_name: seat_state.opponent_name.clone(),
                seat: seat_state.seat,
                rounds_won: result.scores[seat_state.seat.index()],
                outcomes,
                verdict,
                metrics: seat_state.metrics.finalize(),
                fallback_activations: seat_state.match_fallback_activations(),
                final_mode: seat_state.policy.mode().map(|mode| mode.as_str()),
                rounds_remembered: seat_state.policy.rounds_remembered(),
            });
        }

        Ok(MatchOutcome {
            pairing_index: key.pairing_index,
            match_index: key.match_index,
            seating_index: key.seating_index,
            deal_seed: key.deal_seed,
            rounds_played: result.rounds_played,
            sides,
            snapshot,
        })
    }
}

fn agent_index(agents: &[AgentBlueprint], name: &str) -> Result<usize, RunnerError> {
    agents
        .iter()
        .position(|agent| agent.name == name)
        .ok_or_else(|| RunnerError::UnknownAgent {
            name: name.to_string(),
        })
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_match_rows(
    writer: &mut BufWriter<File>,
    config: &BenchmarkConfig,
    outcome: &MatchOutcome,
) -> Result<usize, RunnerError> {
    let pairing = config
        .pairings
        .get(outcome.pairing_index)
        .map(|pairing| pairing.label())
        .unwrap_or_default();
    let match_id = format!(
        "P{:02}_M{:05}_S{}",
        outcome.pairing_index, outcome.match_index, outcome.seating_index
    );

    let mut rows_written = 0usize;
    for side in &outcome.sides {
        let row = MatchLogRow {
            run_id: config.run_id.clone(),
            pairing: pairing.clone(),
            match_id: match_id.clone(),
            match_index: outcome.match_index,
            seating_index: outcome.seating_index,
            deal_seed: outcome.deal_seed,
            side: side.side.as_str(),
            agent: side.agent_name.clone(),
            opponent: side.opponent_name.clone(),
            seat: side.seat.as_str(),
            rounds_won: side.rounds_won,
            rounds_played: outcome.rounds_played,
            result: side.verdict.as_str(),
            win_rate: side.win_rate(),
            decisions: side.metrics.decisions,
            speed_ms_decision: side.metrics.avg_ms_per_decision,
            fallback_activations: side.fallback_activations,
            final_mode: side.final_mode,
            rounds_remembered: side.rounds_remembered,
            snapshot: &outcome.snapshot,
        };

        serde_json::to_writer(&mut *writer, &row)?;
        writer.write_all(b"\n")?;
        rows_written += 1;
    }

    Ok(rows_written)
}

#[derive(Clone, Copy)]
struct MatchKey {
    pairing_index: usize,
    match_index: usize,
    seating_index: usize,
    deal_seed: u64,
}

/// Which configured agent of a pairing a seat belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    pub const fn from_index(index: usize) -> Self {
        if index == 0 { Side::A } else { Side::B }
    }

    pub const fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub const fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Side::A => "a",
            Side::B => "b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchVerdict {
    Win,
    Loss,
    Draw,
}

impl MatchVerdict {
    pub const fn as_str(self) -> &'static str {
        match self {
            MatchVerdict::Win => "win",
            MatchVerdict::Loss => "loss",
            MatchVerdict::Draw => "draw",
        }
    }
}

struct SeatState {
    seat: PlayerPosition,
    side: Side,
    agent_name: String,
    opponent_name: String,
    policy: Box<dyn Policy>,
    metrics: DecisionMetrics,
    activations_at_start: u32,
}

impl SeatState {
    fn new(seat: PlayerPosition, side: Side, agent: &AgentBlueprint, opponent: &str) -> Self {
        Self {
            seat,
            side,
            agent_name: agent.name.clone(),
            opponent_name: opponent.to_string(),
            policy: agent.spawn_policy(),
            metrics: DecisionMetrics::default(),
            activations_at_start: 0,
        }
    }

    fn begin_match(&mut self) {
        self.metrics = DecisionMetrics::default();
        self.activations_at_start = self.policy.fallback_activations();
    }

    fn match_fallback_activations(&self) -> u32 {
        self.policy
            .fallback_activations()
            .saturating_sub(self.activations_at_start)
    }
}

/// Everything recorded about one played match.
pub struct MatchOutcome {
    pub pairing_index: usize,
    pub match_index: usize,
    pub seating_index: usize,
    pub deal_seed: u64,
    pub rounds_played: u32,
    /// Ordered by seat.
    pub sides: Vec<SideResult>,
    pub snapshot: MatchSnapshot,
}

pub struct SideResult {
    pub side: Side,
    pub agent_name: String,
    pub opponent_name: String,
    pub seat: PlayerPosition,
    pub rounds_won: u32,
    /// Per-round results in play order.
    pub outcomes: Vec<Outcome>,
    pub verdict: MatchVerdict,
    pub metrics: DecisionSummary,
    pub fallback_activations: u32,
    pub final_mode: Option<&'static str>,
    /// Lifetime rounds in the agent's opponent memory, which spans matches when chained.
    pub rounds_remembered: u32,
}

impl SideResult {
    pub fn win_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            f64::from(self.rounds_won) / self.outcomes.len() as f64
        }
    }
}

#[derive(Default)]
struct DecisionMetrics {
    total: Duration,
    decisions: u32,
}

impl DecisionMetrics {
    fn record(&mut self, duration: Duration) {
        self.total += duration;
        self.decisions += 1;
    }

    fn finalize(&self) -> DecisionSummary {
        let avg_ms = if self.decisions == 0 {
            0.0
        } else {
            self.total.as_secs_f64() * 1000.0 / f64::from(self.decisions)
        };

        DecisionSummary {
            decisions: self.decisions,
            avg_ms_per_decision: avg_ms,
            total_ms: self.total.as_secs_f64() * 1000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionSummary {
    pub decisions: u32,
    pub avg_ms_per_decision: f64,
    pub total_ms: f64,
}

#[derive(Serialize)]
struct MatchLogRow<'a> {
    run_id: String,
    pairing: String,
    match_id: String,
    match_index: usize,
    seating_index: usize,
    deal_seed: u64,
    side: &'static str,
    agent: String,
    opponent: String,
    seat: &'static str,
    rounds_won: u32,
    rounds_played: u32,
    result: &'static str,
    win_rate: f64,
    decisions: u32,
    speed_ms_decision: f64,
    fallback_activations: u32,
    final_mode: Option<&'static str>,
    rounds_remembered: u32,
    snapshot: &'a MatchSnapshot,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("game execution failed: {message}")]
    Game { message: String },
    #[error("agent '{agent}' chose an illegal action: {source}")]
    IllegalAction {
        agent: String,
        #[source]
        source: ActionError,
    },
    #[error("pairing references unknown agent '{name}'")]
    UnknownAgent { name: String },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("telemetry summarisation failed: {0}")]
    Telemetry(#[from] TelemetryError),
}

impl RunnerError {
    fn game(message: String) -> Self {
        RunnerError::Game { message }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid parameter for agent '{name}': {message}")]
    InvalidParam { name: String, message: String },
}

impl AgentError {
    fn invalid(name: &str, message: impl Into<String>) -> Self {
        AgentError::InvalidParam {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

struct AgentBlueprint {
    name: String,
    implementation: AgentImplementation,
}

enum AgentImplementation {
    Tom0(Tom0Params),
    Tom1(Tom1Params),
}

impl AgentBlueprint {
    fn from_configs(configs: &[AgentConfig]) -> Result<Vec<Self>, AgentError> {
        configs.iter().map(Self::from_config).collect()
    }

    fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let implementation = match config.kind {
            AgentKind::Tom0Memory => {
                AgentImplementation::Tom0(tom0_params(&config.name, &config.params)?)
            }
            AgentKind::Tom1 => AgentImplementation::Tom1(tom1_params(&config.name, &config.params)?),
        };

        Ok(Self {
            name: config.name.clone(),
            implementation,
        })
    }

    fn spawn_policy(&self) -> Box<dyn Policy> {
        match &self.implementation {
            AgentImplementation::Tom0(params) => {
                Box::new(Tom0MemoryAgent::new(self.name.clone(), *params))
            }
            AgentImplementation::Tom1(params) => Box::new(Tom1Agent::new(self.name.clone(), *params)),
        }
    }
}

fn param_entries<'a>(
    name: &str,
    params: &'a serde_yaml::Value,
) -> Result<Vec<(&'a str, &'a serde_yaml::Value)>, AgentError> {
    if params.is_null() {
        return Ok(Vec::new());
    }
    let mapping = params
        .as_mapping()
        .ok_or_else(|| AgentError::invalid(name, "expected mapping for agent params"))?;
    mapping
        .iter()
        .map(|(key, value)| {
            key.as_str()
                .map(|key| (key, value))
                .ok_or_else(|| AgentError::invalid(name, "parameter keys must be strings"))
        })
        .collect()
}

fn tom0_params(name: &str, params: &serde_yaml::Value) -> Result<Tom0Params, AgentError> {
    let mut out = Tom0Params::default();
    for (key, value) in param_entries(name, params)? {
        if !apply_tom0_param(&mut out, name, key, value)? {
            return Err(AgentError::invalid(name, format!("unknown parameter '{key}'")));
        }
    }
    Ok(out)
}

fn tom1_params(name: &str, params: &serde_yaml::Value) -> Result<Tom1Params, AgentError> {
    let mut out = Tom1Params::default();
    for (key, value) in param_entries(name, params)? {
        let known = match key {
            "fallback_window" => {
                out.fallback_window = read_positive_usize(name, key, value)?;
                true
            }
            "open_threshold" => {
                out.open_threshold = read_probability(name, key, value)?;
                true
            }
            "predictor_prior_weight" => {
                out.predictor_prior_weight = read_non_negative(name, key, value)?;
                true
            }
            "soft_claim_weight" => {
                out.soft.claim_weight = read_non_negative(name, key, value)?;
                true
            }
            "soft_minimum_weight" => {
                out.soft.minimum_weight = read_probability(name, key, value)?;
                true
            }
            _ => apply_tom0_param(&mut out.tom0, name, key, value)?,
        };
        if !known {
            return Err(AgentError::invalid(name, format!("unknown parameter '{key}'")));
        }
    }
    Ok(out)
}

fn apply_tom0_param(
    params: &mut Tom0Params,
    name: &str,
    key: &str,
    value: &serde_yaml::Value,
) -> Result<bool, AgentError> {
    match key {
        "opponent_prior" => {
            let prior = value
                .as_u64()
                .ok_or_else(|| AgentError::invalid(name, "opponent_prior must be a non-negative integer"))?;
            params.opponent_prior = usize::try_from(prior)
                .map_err(|_| AgentError::invalid(name, "opponent_prior is too large"))?;
        }
        "margin" => {
            let margin = value
                .as_i64()
                .and_then(|margin| i32::try_from(margin).ok())
                .ok_or_else(|| AgentError::invalid(name, "margin must be an integer"))?;
            params.margin = margin;
        }
        "bluff_wary_threshold" => {
            params.bluff_wary_threshold = read_probability(name, key, value)?;
        }
        "memory_window" => {
            params.memory_window = read_positive_usize(name, key, value)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn read_positive_usize(
    name: &str,
    key: &str,
    value: &serde_yaml::Value,
) -> Result<usize, AgentError> {
    value
        .as_u64()
        .filter(|v| *v > 0)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| AgentError::invalid(name, format!("{key} must be a positive integer")))
}

fn read_non_negative(name: &str, key: &str, value: &serde_yaml::Value) -> Result<f64, AgentError> {
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| AgentError::invalid(name, format!("{key} must be a non-negative number")))
}

fn read_probability(name: &str, key: &str, value: &serde_yaml::Value) -> Result<f64, AgentError> {
    value
        .as_f64()
        .filter(|v| (0.0..=1.0).contains(v))
        .ok_or_else(|| AgentError::invalid(name, format!("{key} must lie in [0, 1]")))
}
