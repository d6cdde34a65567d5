mod fallback;
mod params;
mod predictive;
mod tom0;
mod tom1;

pub use fallback::{ReasoningMode, fallback_triggered};
pub use params::{DEFAULT_FALLBACK_WINDOW, Tom0Params, Tom1Params};
pub use predictive::{DoubtPredictor, rule_doubt_probability};
pub use tom0::{Tom0MemoryAgent, bluff_wary, conservative, tom0_decide};
pub use tom1::Tom1Agent;

use schcats_core::model::round::{Action, Observation};
use tracing::{Level, event};

/// An action together with the label of the rule that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub reason: &'static str,
}

impl Decision {
    pub fn new(action: Action, reason: &'static str) -> Self {
        Self { action, reason }
    }
}

pub(crate) fn log_decision(
    agent: &str,
    observation: &Observation,
    mode: &str,
    decision: &Decision,
) {
    if !tracing::enabled!(target: "schcats_bot::decision", Level::INFO) {
        return;
    }

    let claim = match &decision.action {
        Action::Claim { claim, .. } => claim.to_string(),
        Action::Doubt => "-".to_string(),
    };
    let revealed = match &decision.action {
        Action::Claim { reveal, .. } => reveal.len(),
        Action::Doubt => 0,
    };
    let facing = observation
        .public
        .current_claim
        .map(|claim| claim.to_string())
        .unwrap_or_else(|| "-".to_string());

    event!(
        target: "schcats_bot::decision",
        Level::INFO,
        agent,
        seat = %observation.seat,
        round = observation.public.round_index,
        mode,
        action = decision.action.kind().as_str(),
        claim = %claim,
        facing = %facing,
        revealed,
        reason = decision.reason,
    );
}
