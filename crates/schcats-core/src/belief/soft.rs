//! Behavior-driven likelihood adjustments layered on top of hard belief updates.

use super::{Belief, support_of};
use crate::model::claim::Claim;
use crate::model::round::HAND_SIZE;

/// Tunable configuration for soft likelihood adjustments.
#[derive(Debug, Clone, Copy)]
pub struct SoftConfig {
    /// How strongly an opponent claim shifts mass toward hands that support it,
    /// scaled by how honest the opponent has proven.
    pub claim_weight: f64,
    /// Lower bound applied to any multiplier to avoid collapsing a hypothesis entirely.
    pub minimum_weight: f64,
}

impl Default for SoftConfig {
    fn default() -> Self {
        Self {
            claim_weight: 0.6,
            minimum_weight: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoftLikelihoodModel {
    config: SoftConfig,
}

impl SoftLikelihoodModel {
    pub fn new(config: SoftConfig) -> Self {
        Self { config }
    }

    /// Applies the soft adjustment for an opponent claim.
    ///
    /// An honest opponent (honesty rate above one half) is assumed to claim states it
    /// holds, so hypotheses with more support gain weight; a proven bluffer flips the lean.
    pub fn update_after_claim(&self, belief: &mut Belief, claim: Claim) {
        let lean = 2.0 * belief.honesty().rate() - 1.0;
        let strength = self.config.claim_weight * lean;
        let floor = self.config.minimum_weight;
        belief.reweight(|composition| {
            let share = support_of(composition, claim.state) as f64 / HAND_SIZE as f64;
            (1.0 + strength * (2.0 * share - 1.0)).max(floor)
        });
    }
}
