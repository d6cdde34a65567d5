//! Explicit cross-round memory of opponent behavior.

use crate::model::claim::Claim;
use crate::model::round::{EventKind, RoundRecap};
use std::collections::VecDeque;

pub const DEFAULT_MEMORY_WINDOW: usize = 5;

/// Challenges needed before a bluff rate is reported.
pub const MIN_CHALLENGES_FOR_RATE: u32 = 2;

/// What one finished round revealed about the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundMemory {
    pub round_index: u32,
    /// The opponent ended the round by doubting.
    pub opponent_doubted: bool,
    pub opponent_claims: u8,
    pub opponent_evidence_revealed: u8,
    pub opponent_last_claim: Option<Claim>,
    /// Set only when we doubted the opponent's claim and the truth was shown.
    pub opponent_last_claim_was_true: Option<bool>,
    pub won: bool,
}

impl RoundMemory {
    pub fn from_recap(recap: &RoundRecap) -> Self {
        let opponent = recap.opponent();
        let mut opponent_claims = 0u8;
        let mut opponent_evidence_revealed = 0u8;
        let mut opponent_last_claim = None;
        for event in recap.public.events_by(opponent) {
            if event.kind == EventKind::Claim {
                opponent_claims += 1;
                opponent_evidence_revealed += event.revealed_count;
                opponent_last_claim = Some(event.claim);
            }
        }

        let opponent_last_claim_was_true =
            (recap.outcome.claimant == opponent).then_some(recap.outcome.claim_held);

        Self {
            round_index: recap.outcome.round_index,
            opponent_doubted: recap.outcome.doubter == opponent,
            opponent_claims,
            opponent_evidence_revealed,
            opponent_last_claim,
            opponent_last_claim_was_true,
            won: recap.won(),
        }
    }

    pub fn opponent_bluff_exposed(&self) -> bool {
        self.opponent_last_claim_was_true == Some(false)
    }
}

/// Aggregate counts over every round ever recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionTally {
    pub rounds: u32,
    pub claims: u32,
    pub doubts: u32,
    pub evidence_revealed: u32,
    pub claims_challenged: u32,
    pub bluffs_exposed: u32,
}

impl ActionTally {
    fn add(&mut self, round: &RoundMemory) {
        self.rounds += 1;
        self.claims += u32::from(round.opponent_claims);
        self.doubts += u32::from(round.opponent_doubted);
        self.evidence_revealed += u32::from(round.opponent_evidence_revealed);
        if let Some(was_true) = round.opponent_last_claim_was_true {
            self.claims_challenged += 1;
            if !was_true {
                self.bluffs_exposed += 1;
            }
        }
    }
}

/// Sliding window of recent rounds plus lifetime tallies. Never reset by the owner
/// between matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpponentMemory {
    window: usize,
    recent: VecDeque<RoundMemory>,
    totals: ActionTally,
}

impl OpponentMemory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            recent: VecDeque::with_capacity(window),
            totals: ActionTally::default(),
        }
    }

    pub fn record(&mut self, recap: &RoundRecap) -> RoundMemory {
        let round = RoundMemory::from_recap(recap);
        self.push(round);
        round
    }

    pub fn push(&mut self, round: RoundMemory) {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(round);
        self.totals.add(&round);
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn last(&self) -> Option<&RoundMemory> {
        self.recent.back()
    }

    /// Remembered rounds, oldest first.
    pub fn recent(&self) -> impl DoubleEndedIterator<Item = &RoundMemory> + ExactSizeIterator {
        self.recent.iter()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn totals(&self) -> &ActionTally {
        &self.totals
    }

    /// Share of challenged opponent claims that turned out false.
    pub fn bluff_rate(&self) -> Option<f64> {
        (self.totals.claims_challenged >= MIN_CHALLENGES_FOR_RATE).then(|| {
            f64::from(self.totals.bluffs_exposed) / f64::from(self.totals.claims_challenged)
        })
    }
}

impl Default for OpponentMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_WINDOW)
    }
}
