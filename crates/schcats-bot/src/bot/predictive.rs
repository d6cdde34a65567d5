//! Predictive model of how the opponent answers our claims.

use super::Tom0Params;
use schcats_core::belief::Belief;
use schcats_core::model::claim::{Claim, MAX_CLAIM_QTY};
use schcats_core::model::round::{EventKind, RoundRecap};

const BUCKETS: usize = 2 * MAX_CLAIM_QTY as usize + 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ResponseCount {
    doubts: u32,
    total: u32,
}

/// Estimates `P(opponent doubts | our claim)`.
///
/// Observed responses are bucketed by effective claim strength and Laplace smoothed.
/// Sparse buckets lean on a rule that models the opponent as a zero-order player; the
/// rule's share shrinks as samples accumulate.
#[derive(Debug, Clone)]
pub struct DoubtPredictor {
    counts: [ResponseCount; BUCKETS],
    prior_weight: f64,
}

impl DoubtPredictor {
    pub fn new(prior_weight: f64) -> Self {
        Self {
            counts: [ResponseCount::default(); BUCKETS],
            prior_weight: prior_weight.max(0.0),
        }
    }

    pub fn record(&mut self, claim: Claim, doubted: bool) {
        let Some(count) = self.counts.get_mut(claim.effective() as usize) else {
            return;
        };
        count.total += 1;
        if doubted {
            count.doubts += 1;
        }
    }

    /// Records how the opponent answered each of our claims in a finished round.
    /// Returns the number of responses recorded.
    pub fn observe_round(&mut self, recap: &RoundRecap) -> usize {
        let mut recorded = 0;
        for pair in recap.public.history.windows(2) {
            let (ours, reply) = (&pair[0], &pair[1]);
            if ours.seat == recap.seat && ours.kind == EventKind::Claim && reply.seat != recap.seat {
                self.record(ours.claim, reply.kind == EventKind::Doubt);
                recorded += 1;
            }
        }
        recorded
    }

    pub fn samples(&self, claim: Claim) -> u32 {
        self.bucket(claim).total
    }

    pub fn total_samples(&self) -> u32 {
        self.counts.iter().map(|count| count.total).sum()
    }

    /// Laplace-smoothed doubt frequency for the claim's bucket.
    pub fn frequency(&self, claim: Claim) -> f64 {
        let count = self.bucket(claim);
        f64::from(count.doubts + 1) / f64::from(count.total + 2)
    }

    /// Blends the observed frequency with `rule_probability`, weighted by sample count.
    pub fn predict(&self, claim: Claim, rule_probability: f64) -> f64 {
        let samples = f64::from(self.samples(claim));
        let weight = if samples + self.prior_weight > 0.0 {
            samples / (samples + self.prior_weight)
        } else {
            1.0
        };
        (weight * self.frequency(claim) + (1.0 - weight) * rule_probability).clamp(0.0, 1.0)
    }

    fn bucket(&self, claim: Claim) -> ResponseCount {
        self.counts
            .get(claim.effective() as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// Probability that a zero-order opponent would doubt `claim`, using our belief over its
/// hand. Such an opponent doubts when its support plus prior plus margin falls short of the
/// claimed quantity, and must doubt when no raise exists.
pub fn rule_doubt_probability(belief: &Belief, claim: Claim, params: &Tom0Params) -> f64 {
    if claim.next_raise().is_none() {
        return 1.0;
    }
    let threshold = i32::from(claim.qty) - params.opponent_prior as i32 - params.margin;
    if threshold <= 0 {
        return 0.0;
    }
    1.0 - belief.prob_support_at_least(claim.state, threshold as usize)
}
