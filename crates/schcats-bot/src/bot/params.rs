use schcats_core::belief::SoftConfig;
use schcats_core::memory::DEFAULT_MEMORY_WINDOW;

/// Consecutive opponent doubts that push a ToM1 agent into fallback.
pub const DEFAULT_FALLBACK_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tom0Params {
    /// Cards assumed to back the opponent for any claimed state.
    pub opponent_prior: usize,
    /// Slack added to the estimate before doubting. Reduced by one when the opponent
    /// doubted last round and by one more when it has been caught bluffing.
    pub margin: i32,
    /// Bluff rate above which the opponent's claims are distrusted.
    pub bluff_wary_threshold: f64,
    pub memory_window: usize,
}

impl Default for Tom0Params {
    fn default() -> Self {
        Self {
            opponent_prior: 2,
            margin: 1,
            bluff_wary_threshold: 0.5,
            memory_window: DEFAULT_MEMORY_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tom1Params {
    /// Heuristic used while in fallback and assumed for the opponent by the predictive model.
    pub tom0: Tom0Params,
    pub fallback_window: usize,
    /// Minimum belief probability an opening claim must hold with.
    pub open_threshold: f64,
    /// Pseudo-count of the rule-based prediction when blended with observed responses.
    pub predictor_prior_weight: f64,
    pub soft: SoftConfig,
}

impl Default for Tom1Params {
    fn default() -> Self {
        Self {
            tom0: Tom0Params::default(),
            fallback_window: DEFAULT_FALLBACK_WINDOW,
            open_threshold: 0.5,
            predictor_prior_weight: 4.0,
            soft: SoftConfig::default(),
        }
    }
}

impl Tom1Params {
    /// Remembered rounds needed to evaluate both the heuristic and the fallback trigger.
    pub fn memory_window(&self) -> usize {
        self.tom0.memory_window.max(self.fallback_window)
    }
}
