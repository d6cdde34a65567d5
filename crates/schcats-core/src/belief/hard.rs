//! Deterministic (hard) belief updates and data structures.

use crate::model::card::{Card, QState};
use crate::model::claim::Claim;
use crate::model::deck::DECK_COMPOSITION;
use crate::model::hand::Hand;
use crate::model::round::HAND_SIZE;
use core::fmt;

/// Opponent hand composition: counts per card kind indexed by [`Card::index`].
pub type Composition = [u8; 4];

#[derive(Debug, Clone, PartialEq)]
pub enum BeliefError {
    /// Every hypothesis was contradicted; the belief was left unchanged.
    Inconsistent { evidence: Composition },
}

impl fmt::Display for BeliefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeliefError::Inconsistent { evidence } => {
                write!(f, "evidence {evidence:?} contradicts every hypothesis")
            }
        }
    }
}

impl std::error::Error for BeliefError {}

/// Claim outcomes observed for the opponent, kept for the lifetime of the belief.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HonestyTally {
    pub held: u32,
    pub failed: u32,
}

impl HonestyTally {
    /// Laplace-smoothed share of opponent claims that held.
    pub fn rate(&self) -> f64 {
        f64::from(self.held + 1) / f64::from(self.held + self.failed + 2)
    }
}

/// Probability distribution over the opponent's hand composition.
#[derive(Debug, Clone)]
pub struct Belief {
    hypotheses: Vec<(Composition, f64)>,
    evidence: Composition,
    deals_seen: u32,
    honesty: HonestyTally,
}

impl Belief {
    /// Creates a belief with the prior of a hand drawn from a full deck.
    pub fn new() -> Self {
        let mut belief = Self {
            hypotheses: enumerate_compositions(),
            evidence: [0; 4],
            deals_seen: 0,
            honesty: HonestyTally::default(),
        };
        belief.seed_prior(DECK_COMPOSITION);
        belief
    }

    /// Re-seeds hypotheses for a fresh deal given our own hand. The honesty tally carries over.
    pub fn begin_round(&mut self, own_hand: &Hand) {
        let mut remaining = DECK_COMPOSITION;
        for card in own_hand.iter() {
            remaining[card.index()] = remaining[card.index()].saturating_sub(1);
        }
        self.evidence = [0; 4];
        self.deals_seen += 1;
        self.seed_prior(remaining);
    }

    /// Eliminates hypotheses contradicted by the opponent's cumulative public evidence and
    /// renormalises over the survivors. Returns how many hypotheses were newly eliminated.
    pub fn observe_evidence(&mut self, evidence: &[Card]) -> Result<usize, BeliefError> {
        let mut counts = [0u8; 4];
        for card in evidence {
            counts[card.index()] += 1;
        }
        if counts == self.evidence {
            return Ok(0);
        }

        let mut filtered = self.hypotheses.clone();
        let mut eliminated = 0usize;
        for (composition, weight) in filtered.iter_mut() {
            if *weight > 0.0 && !covers(composition, &counts) {
                *weight = 0.0;
                eliminated += 1;
            }
        }

        let mass: f64 = filtered.iter().map(|(_, w)| w).sum();
        if mass <= 0.0 {
            return Err(BeliefError::Inconsistent { evidence: counts });
        }
        for (_, weight) in filtered.iter_mut() {
            *weight /= mass;
        }

        self.hypotheses = filtered;
        self.evidence = counts;
        Ok(eliminated)
    }

    /// Multiplies each hypothesis weight by `factor(composition)` and renormalises.
    /// Zero weights stay zero. Falls back to the previous weights if all mass vanishes.
    pub fn reweight<F>(&mut self, mut factor: F)
    where
        F: FnMut(&Composition) -> f64,
    {
        let previous = self.hypotheses.clone();
        for (composition, weight) in self.hypotheses.iter_mut() {
            *weight *= factor(composition).max(0.0);
        }
        let mass: f64 = self.hypotheses.iter().map(|(_, w)| w).sum();
        if mass <= 0.0 || !mass.is_finite() {
            self.hypotheses = previous;
            return;
        }
        for (_, weight) in self.hypotheses.iter_mut() {
            *weight /= mass;
        }
    }

    pub fn record_claim_resolution(&mut self, held: bool) {
        if held {
            self.honesty.held += 1;
        } else {
            self.honesty.failed += 1;
        }
    }

    pub fn honesty(&self) -> HonestyTally {
        self.honesty
    }

    pub fn deals_seen(&self) -> u32 {
        self.deals_seen
    }

    pub fn hypotheses(&self) -> impl Iterator<Item = (&Composition, f64)> {
        self.hypotheses.iter().map(|(c, w)| (c, *w))
    }

    pub fn prob(&self, composition: &Composition) -> f64 {
        self.hypotheses
            .iter()
            .find(|(c, _)| c == composition)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn total_mass(&self) -> f64 {
        self.hypotheses.iter().map(|(_, w)| w).sum()
    }

    /// `P(opponent support for state == s)` for `s` in `0..=HAND_SIZE`.
    pub fn support_distribution(&self, state: QState) -> [f64; HAND_SIZE + 1] {
        let mut dist = [0.0; HAND_SIZE + 1];
        for (composition, weight) in &self.hypotheses {
            dist[support_of(composition, state)] += weight;
        }
        dist
    }

    pub fn prob_support_at_least(&self, state: QState, needed: usize) -> f64 {
        if needed == 0 {
            return 1.0;
        }
        self.support_distribution(state)
            .iter()
            .skip(needed)
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    pub fn expected_support(&self, state: QState) -> f64 {
        self.support_distribution(state)
            .iter()
            .enumerate()
            .map(|(s, p)| s as f64 * p)
            .sum()
    }

    /// Probability that `claim` holds given our own support for its state.
    pub fn prob_claim_holds(&self, claim: Claim, own_support: usize) -> f64 {
        let needed = (claim.qty as usize).saturating_sub(own_support);
        self.prob_support_at_least(claim.state, needed)
    }

    fn seed_prior(&mut self, remaining: Composition) {
        for (composition, weight) in self.hypotheses.iter_mut() {
            *weight = composition
                .iter()
                .zip(remaining.iter())
                .map(|(&take, &available)| binomial(available, take))
                .product();
        }
        let mass: f64 = self.hypotheses.iter().map(|(_, w)| w).sum();
        if mass > 0.0 {
            for (_, weight) in self.hypotheses.iter_mut() {
                *weight /= mass;
            }
        }
    }
}

impl Default for Belief {
    fn default() -> Self {
        Self::new()
    }
}

/// Cards in `composition` that count toward `state`, wildcards included.
pub fn support_of(composition: &Composition, state: QState) -> usize {
    (composition[state.card().index()] + composition[Card::Hup.index()]) as usize
}

fn covers(composition: &Composition, evidence: &Composition) -> bool {
    composition.iter().zip(evidence.iter()).all(|(have, shown)| have >= shown)
}

fn enumerate_compositions() -> Vec<(Composition, f64)> {
    let n = HAND_SIZE as u8;
    let mut out = Vec::new();
    for alive in 0..=n {
        for dead in 0..=(n - alive) {
            for empty in 0..=(n - alive - dead) {
                let hup = n - alive - dead - empty;
                out.push(([alive, dead, empty, hup], 0.0));
            }
        }
    }
    out
}

fn binomial(n: u8, k: u8) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * f64::from(n - i) / f64::from(i + 1))
}
