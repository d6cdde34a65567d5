use crate::model::card::QState;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Largest quantity a claim may name: every card in both hands.
pub const MAX_CLAIM_QTY: u8 = 12;

/// "At least `qty` cards across both hands are `state`" (Hup counts toward any state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub qty: u8,
    pub state: QState,
}

impl Claim {
    pub const fn new(qty: u8, state: QState) -> Self {
        Self { qty, state }
    }

    pub const fn is_valid_qty(self) -> bool {
        self.qty >= 1 && self.qty <= MAX_CLAIM_QTY
    }

    /// Effective quantity used for ordering. Empty counts double.
    pub const fn effective(self) -> u8 {
        match self.state {
            QState::Empty => self.qty * 2,
            _ => self.qty,
        }
    }

    /// `(effective, tier)`, compared lexicographically.
    pub const fn strength(self) -> (u8, u8) {
        (self.effective(), self.state.tier())
    }

    pub fn is_stronger_than(self, other: Claim) -> bool {
        self.strength() > other.strength()
    }

    /// Smallest legal raise that keeps the same state, falling back to the next
    /// tier at the quantity ceiling. `None` when nothing stronger exists.
    pub fn next_raise(self) -> Option<Claim> {
        if self.qty < MAX_CLAIM_QTY {
            return Some(Claim::new(self.qty + 1, self.state));
        }
        QState::ORDERED
            .iter()
            .copied()
            .filter(|state| state.tier() > self.state.tier())
            .map(|state| Claim::new(self.qty, state))
            .find(|candidate| candidate.is_stronger_than(self))
    }

    /// Every valid claim strictly stronger than `base` (or every claim when `base` is `None`).
    pub fn all_stronger(base: Option<Claim>) -> impl Iterator<Item = Claim> {
        (1..=MAX_CLAIM_QTY)
            .flat_map(|qty| QState::ORDERED.into_iter().map(move |state| Claim::new(qty, state)))
            .filter(move |claim| base.is_none_or(|current| claim.is_stronger_than(current)))
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.qty, self.state)
    }
}
