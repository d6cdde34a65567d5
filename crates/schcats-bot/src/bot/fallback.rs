use schcats_core::memory::OpponentMemory;

/// Which decision procedure a ToM1 agent is currently running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReasoningMode {
    #[default]
    TheoryOfMind,
    Fallback,
}

impl ReasoningMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ReasoningMode::TheoryOfMind => "tom",
            ReasoningMode::Fallback => "fallback",
        }
    }

    pub const fn is_fallback(self) -> bool {
        matches!(self, ReasoningMode::Fallback)
    }
}

/// True when the opponent ended each of the last `k` remembered rounds by doubting.
/// Needs at least `k` remembered rounds; `k == 0` never triggers.
pub fn fallback_triggered(memory: &OpponentMemory, k: usize) -> bool {
    if k == 0 || memory.len() < k {
        return false;
    }
    memory.recent().rev().take(k).all(|round| round.opponent_doubted)
}

#[cfg(test)]
mod tests {
    use super::{ReasoningMode, fallback_triggered};
    use schcats_core::memory::{OpponentMemory, RoundMemory};

    fn round(round_index: u32, opponent_doubted: bool) -> RoundMemory {
        RoundMemory {
            round_index,
            opponent_doubted,
            opponent_claims: 1,
            opponent_evidence_revealed: 0,
            opponent_last_claim: None,
            opponent_last_claim_was_true: None,
            won: false,
        }
    }

    #[test]
    fn requires_full_window_of_doubts() {
        let mut memory = OpponentMemory::new(5);
        memory.push(round(0, true));
        memory.push(round(1, true));
        assert!(!fallback_triggered(&memory, 3));
        memory.push(round(2, true));
        assert!(fallback_triggered(&memory, 3));
    }

    #[test]
    fn only_most_recent_rounds_count() {
        let mut memory = OpponentMemory::new(5);
        for (idx, doubted) in [true, true, true, false].into_iter().enumerate() {
            memory.push(round(idx as u32, doubted));
        }
        assert!(!fallback_triggered(&memory, 3));

        let mut memory = OpponentMemory::new(5);
        for (idx, doubted) in [false, true, true, true].into_iter().enumerate() {
            memory.push(round(idx as u32, doubted));
        }
        assert!(fallback_triggered(&memory, 3));
    }

    #[test]
    fn zero_window_never_triggers() {
        let mut memory = OpponentMemory::new(2);
        memory.push(round(0, true));
        assert!(!fallback_triggered(&memory, 0));
    }

    #[test]
    fn default_mode_is_theory_of_mind() {
        assert_eq!(ReasoningMode::default(), ReasoningMode::TheoryOfMind);
        assert!(ReasoningMode::Fallback.is_fallback());
    }
}
