use core::fmt;
use serde::{Deserialize, Serialize};

/// A box holding a cat in one of its quantum states, or the wildcard `Hup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Card {
    Alive = 0,
    Dead = 1,
    Empty = 2,
    Hup = 3,
}

impl Card {
    pub const ALL: [Card; 4] = [Card::Alive, Card::Dead, Card::Empty, Card::Hup];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Card::Alive),
            1 => Some(Card::Dead),
            2 => Some(Card::Empty),
            3 => Some(Card::Hup),
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_wild(self) -> bool {
        matches!(self, Card::Hup)
    }

    /// Whether this card counts toward a claim on `state`.
    pub fn supports(self, state: QState) -> bool {
        self.is_wild() || self.state() == Some(state)
    }

    pub const fn state(self) -> Option<QState> {
        match self {
            Card::Alive => Some(QState::Alive),
            Card::Dead => Some(QState::Dead),
            Card::Empty => Some(QState::Empty),
            Card::Hup => None,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Card::Alive => "A",
            Card::Dead => "D",
            Card::Empty => "E",
            Card::Hup => "H",
        };
        f.write_str(symbol)
    }
}

/// States a player may claim. `Hup` is never claimable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QState {
    Dead,
    Alive,
    Empty,
}

impl QState {
    /// Claim tiers from weakest to strongest at equal effective quantity.
    pub const ORDERED: [QState; 3] = [QState::Dead, QState::Alive, QState::Empty];

    pub const fn tier(self) -> u8 {
        match self {
            QState::Dead => 0,
            QState::Alive => 1,
            QState::Empty => 2,
        }
    }

    pub const fn card(self) -> Card {
        match self {
            QState::Dead => Card::Dead,
            QState::Alive => Card::Alive,
            QState::Empty => Card::Empty,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            QState::Dead => "dead",
            QState::Alive => "alive",
            QState::Empty => "empty",
        }
    }
}

impl fmt::Display for QState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{Card, QState};

    #[test]
    fn hup_supports_every_state() {
        for state in QState::ORDERED {
            assert!(Card::Hup.supports(state));
        }
    }

    #[test]
    fn plain_cards_support_only_their_state() {
        assert!(Card::Alive.supports(QState::Alive));
        assert!(!Card::Alive.supports(QState::Dead));
        assert!(!Card::Empty.supports(QState::Alive));
    }

    #[test]
    fn index_roundtrip() {
        for (i, card) in Card::ALL.iter().enumerate() {
            assert_eq!(Card::from_index(i), Some(*card));
            assert_eq!(card.index(), i);
        }
        assert_eq!(Card::from_index(4), None);
    }

    #[test]
    fn display_returns_ascii_symbols() {
        assert_eq!(Card::Hup.to_string(), "H");
        assert_eq!(QState::Empty.to_string(), "empty");
    }
}
