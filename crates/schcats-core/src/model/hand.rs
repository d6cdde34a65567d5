use crate::model::card::{Card, QState};

/// Cards held by one player. Deal order is kept so evidence can be referenced by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn with_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn get(&self, index: usize) -> Option<Card> {
        self.cards.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Cards counting toward a claim on `state`, wildcards included.
    pub fn support(&self, state: QState) -> usize {
        self.cards.iter().filter(|c| c.supports(state)).count()
    }

    /// Indices of every card that may be revealed as evidence for `state`.
    pub fn supporting_indices(&self, state: QState) -> Vec<usize> {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, c)| c.supports(state))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Per-kind counts indexed by [`Card::index`].
    pub fn composition(&self) -> [u8; 4] {
        let mut counts = [0u8; 4];
        for card in &self.cards {
            counts[card.index()] += 1;
        }
        counts
    }
}
