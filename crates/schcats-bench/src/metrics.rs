//! Win-rate summaries with binomial confidence intervals.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Result of one round from one side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub const fn from_won(won: bool) -> Self {
        if won { Outcome::Win } else { Outcome::Loss }
    }

    pub const fn is_win(self) -> bool {
        matches!(self, Outcome::Win)
    }
}

/// Win rate with a Wald interval clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub wins: usize,
    pub n: usize,
    pub win_rate: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("cannot summarise an empty sample")]
    EmptySample,
    #[error("confidence level must lie strictly between 0 and 1 (got {0})")]
    InvalidConfidence(f64),
    #[error("wins ({wins}) exceed sample size ({n})")]
    WinsExceedSample { wins: usize, n: usize },
    #[error("normal distribution unavailable: {0}")]
    Distribution(String),
}

/// Win rate and 95% Wald interval over `outcomes`.
pub fn summarize(outcomes: &[Outcome]) -> Result<Summary, MetricsError> {
    summarize_at(outcomes, DEFAULT_CONFIDENCE)
}

pub fn summarize_at(outcomes: &[Outcome], level: f64) -> Result<Summary, MetricsError> {
    let wins = outcomes.iter().filter(|outcome| outcome.is_win()).count();
    wald_interval(wins, outcomes.len(), level)
}

/// `p ± z·sqrt(p(1-p)/n)` with `z = Φ⁻¹((1 + level) / 2)`.
pub fn wald_interval(wins: usize, n: usize, level: f64) -> Result<Summary, MetricsError> {
    check_counts(wins, n)?;
    let z = z_score(level)?;
    let p = wins as f64 / n as f64;
    let half_width = z * (p * (1.0 - p) / n as f64).sqrt();
    Ok(Summary {
        wins,
        n,
        win_rate: p,
        ci_lower: (p - half_width).clamp(0.0, 1.0),
        ci_upper: (p + half_width).clamp(0.0, 1.0),
    })
}

/// Wilson score interval; better behaved than Wald near 0 and 1 or for small `n`.
pub fn wilson_interval(wins: usize, n: usize, level: f64) -> Result<(f64, f64), MetricsError> {
    check_counts(wins, n)?;
    let z = z_score(level)?;
    let n = n as f64;
    let p = wins as f64 / n;
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let centre = (p + z2 / (2.0 * n)) / denom;
    let half_width = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    Ok((
        (centre - half_width).clamp(0.0, 1.0),
        (centre + half_width).clamp(0.0, 1.0),
    ))
}

/// Two-sided p-value of the pooled two-proportion z-test. Identical degenerate samples
/// (all wins or all losses) give 1.
pub fn two_proportion_p_value(
    wins_a: usize,
    n_a: usize,
    wins_b: usize,
    n_b: usize,
) -> Result<f64, MetricsError> {
    check_counts(wins_a, n_a)?;
    check_counts(wins_b, n_b)?;
    let (na, nb) = (n_a as f64, n_b as f64);
    let pooled = (wins_a + wins_b) as f64 / (na + nb);
    let se = (pooled * (1.0 - pooled) * (1.0 / na + 1.0 / nb)).sqrt();
    if se <= 0.0 {
        return Ok(1.0);
    }
    let z = (wins_a as f64 / na - wins_b as f64 / nb) / se;
    let p = 2.0 * (1.0 - standard_normal()?.cdf(z.abs()));
    Ok(p.clamp(0.0, 1.0))
}

fn check_counts(wins: usize, n: usize) -> Result<(), MetricsError> {
    if n == 0 {
        return Err(MetricsError::EmptySample);
    }
    if wins > n {
        return Err(MetricsError::WinsExceedSample { wins, n });
    }
    Ok(())
}

fn z_score(level: f64) -> Result<f64, MetricsError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(MetricsError::InvalidConfidence(level));
    }
    Ok(standard_normal()?.inverse_cdf(0.5 + level / 2.0))
}

fn standard_normal() -> Result<Normal, MetricsError> {
    Normal::new(0.0, 1.0).map_err(|err| MetricsError::Distribution(err.to_string()))
}
