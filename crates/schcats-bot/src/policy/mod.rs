use crate::bot::ReasoningMode;
use schcats_core::model::round::{Action, Observation, RoundRecap};

/// Unified interface for agents seated in a match.
pub trait Policy: Send {
    /// Label used in reports and telemetry.
    fn name(&self) -> &str;

    /// Choose the next action. Only called when it is the observing seat's turn.
    fn decide(&mut self, observation: &Observation) -> Action;

    /// Called once per finished round with what the seat may learn from it.
    fn observe_round_end(&mut self, _recap: &RoundRecap) {}

    /// Current reasoning mode, for agents that switch between modes.
    fn mode(&self) -> Option<ReasoningMode> {
        None
    }

    /// Times the agent has switched into fallback over its lifetime.
    fn fallback_activations(&self) -> u32 {
        0
    }

    /// Rounds of opponent behaviour the agent has recorded over its lifetime.
    fn rounds_remembered(&self) -> u32 {
        0
    }
}
