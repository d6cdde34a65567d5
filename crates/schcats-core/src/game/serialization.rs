use super::match_state::MatchState;
use crate::model::player::PlayerPosition;
use serde::{Deserialize, Serialize};

/// Compact record of a match position. Hands are not stored: they are replayed from the seed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchSnapshot {
    pub seed: u64,
    pub rounds_per_match: u32,
    pub round_index: u32,
    pub scores: [u32; 2],
    pub starting_seat: PlayerPosition,
    pub finished: bool,
}

impl MatchSnapshot {
    pub fn capture(state: &MatchState) -> Self {
        MatchSnapshot {
            seed: state.seed(),
            rounds_per_match: state.rounds_per_match(),
            round_index: state.round_index(),
            scores: *state.scores().standings(),
            starting_seat: state.round().starting_player(),
            finished: state.is_finished(),
        }
    }

    pub fn restore(self) -> MatchState {
        MatchState::from_snapshot(&self)
    }

    pub fn to_json(state: &MatchState) -> serde_json::Result<String> {
        let snapshot = Self::capture(state);
        serde_json::to_string_pretty(&snapshot)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
