use crate::model::card::{Card, QState};
use crate::model::claim::Claim;
use crate::model::deck::{DECK_COMPOSITION, Deck};
use crate::model::hand::Hand;
use crate::model::player::PlayerPosition;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::array;

pub const HAND_SIZE: usize = 6;

/// A move submitted by the seat to act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Assert `claim`, revealing the hand cards at `reveal` as evidence.
    Claim { claim: Claim, reveal: Vec<usize> },
    /// Challenge the most recent claim.
    Doubt,
}

impl Action {
    pub fn claim(claim: Claim) -> Self {
        Action::Claim {
            claim,
            reveal: Vec::new(),
        }
    }

    pub fn claim_with_evidence(claim: Claim, reveal: Vec<usize>) -> Self {
        Action::Claim { claim, reveal }
    }

    pub const fn kind(&self) -> EventKind {
        match self {
            Action::Claim { .. } => EventKind::Claim,
            Action::Doubt => EventKind::Doubt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Claim,
    Doubt,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Claim => "claim",
            EventKind::Doubt => "doubt",
        }
    }
}

/// Publicly logged action. For a doubt, `claim` is the claim being challenged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicEvent {
    pub seat: PlayerPosition,
    pub kind: EventKind,
    pub claim: Claim,
    pub revealed_count: u8,
}

/// Everything both players can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicState {
    pub current_claim: Option<Claim>,
    pub evidence: [Vec<Card>; 2],
    pub turn: PlayerPosition,
    pub round_index: u32,
    pub history: Vec<PublicEvent>,
}

impl PublicState {
    fn new(turn: PlayerPosition, round_index: u32) -> Self {
        Self {
            current_claim: None,
            evidence: [Vec::new(), Vec::new()],
            turn,
            round_index,
            history: Vec::new(),
        }
    }

    pub fn evidence_of(&self, seat: PlayerPosition) -> &[Card] {
        &self.evidence[seat.index()]
    }

    pub fn events_by(&self, seat: PlayerPosition) -> impl Iterator<Item = &PublicEvent> {
        self.history.iter().filter(move |event| event.seat == seat)
    }
}

/// What one seat is allowed to observe: its own hand and the public state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub seat: PlayerPosition,
    pub hand: Hand,
    pub public: PublicState,
}

impl Observation {
    pub fn opponent(&self) -> PlayerPosition {
        self.seat.opponent()
    }

    pub fn opponent_evidence(&self) -> &[Card] {
        self.public.evidence_of(self.opponent())
    }

    pub fn own_support(&self, state: QState) -> usize {
        self.hand.support(state)
    }
}

/// Resolution of a doubted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round_index: u32,
    pub winner: PlayerPosition,
    pub doubter: PlayerPosition,
    pub claimant: PlayerPosition,
    pub claim: Claim,
    pub claim_held: bool,
}

/// What a seat learns once a round is over: the public record and its resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRecap {
    pub seat: PlayerPosition,
    pub public: PublicState,
    pub outcome: RoundOutcome,
}

impl RoundRecap {
    pub fn opponent(&self) -> PlayerPosition {
        self.seat.opponent()
    }

    pub fn won(&self) -> bool {
        self.outcome.winner == self.seat
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    RoundOver,
    MatchFinished,
    OutOfTurn {
        expected: PlayerPosition,
        actual: PlayerPosition,
    },
    DoubtWithoutClaim,
    InvalidQuantity(u8),
    ClaimNotStronger {
        claim: Claim,
        current: Claim,
    },
    RevealOutOfRange {
        index: usize,
        hand_size: usize,
    },
    RevealMismatch {
        index: usize,
        card: Card,
        state: QState,
    },
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::RoundOver => f.write_str("round already resolved"),
            ActionError::MatchFinished => f.write_str("match already finished"),
            ActionError::OutOfTurn { expected, actual } => {
                write!(f, "{actual} acted out of turn (expected {expected})")
            }
            ActionError::DoubtWithoutClaim => f.write_str("cannot doubt before any claim"),
            ActionError::InvalidQuantity(qty) => write!(f, "claim quantity {qty} out of range"),
            ActionError::ClaimNotStronger { claim, current } => {
                write!(f, "claim {claim} is not stronger than {current}")
            }
            ActionError::RevealOutOfRange { index, hand_size } => {
                write!(f, "reveal index {index} outside hand of {hand_size}")
            }
            ActionError::RevealMismatch { index, card, state } => {
                write!(f, "revealed card {card} at {index} does not support {state}")
            }
        }
    }
}

impl std::error::Error for ActionError {}

/// Hidden and public state of a single round.
#[derive(Debug, Clone)]
pub struct RoundState {
    hands: [Hand; 2],
    stock: Vec<Card>,
    revealed: [Vec<usize>; 2],
    starting_player: PlayerPosition,
    public: PublicState,
    outcome: Option<RoundOutcome>,
}

impl RoundState {
    pub fn deal(deck: &Deck, round_index: u32, starting_player: PlayerPosition) -> Self {
        let cards = deck.cards();
        let hands = array::from_fn(|seat| {
            let start = seat * HAND_SIZE;
            Hand::with_cards(cards[start..start + HAND_SIZE].to_vec())
        });
        let stock = cards[2 * HAND_SIZE..].to_vec();

        Self {
            hands,
            stock,
            revealed: [Vec::new(), Vec::new()],
            starting_player,
            public: PublicState::new(starting_player, round_index),
            outcome: None,
        }
    }

    /// Builds a round from explicit hands; the stock holds the rest of a standard deck.
    pub fn from_hands(hands: [Hand; 2], round_index: u32, starting_player: PlayerPosition) -> Self {
        let mut remaining = DECK_COMPOSITION;
        for hand in &hands {
            for card in hand.iter() {
                remaining[card.index()] = remaining[card.index()].saturating_sub(1);
            }
        }
        let stock = Card::ALL
            .iter()
            .flat_map(|card| std::iter::repeat_n(*card, remaining[card.index()] as usize))
            .collect();

        Self {
            hands,
            stock,
            revealed: [Vec::new(), Vec::new()],
            starting_player,
            public: PublicState::new(starting_player, round_index),
            outcome: None,
        }
    }

    pub fn hand(&self, seat: PlayerPosition) -> &Hand {
        &self.hands[seat.index()]
    }

    pub fn public(&self) -> &PublicState {
        &self.public
    }

    pub fn turn(&self) -> PlayerPosition {
        self.public.turn
    }

    /// Seat that opened the round.
    pub fn starting_player(&self) -> PlayerPosition {
        self.starting_player
    }

    pub fn round_index(&self) -> u32 {
        self.public.round_index
    }

    pub fn current_claim(&self) -> Option<Claim> {
        self.public.current_claim
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn observe(&self, seat: PlayerPosition) -> Observation {
        Observation {
            seat,
            hand: self.hands[seat.index()].clone(),
            public: self.public.clone(),
        }
    }

    /// Recap for `seat`, available once the round is resolved.
    pub fn recap(&self, seat: PlayerPosition) -> Option<RoundRecap> {
        self.outcome.map(|outcome| RoundRecap {
            seat,
            public: self.public.clone(),
            outcome,
        })
    }

    /// Cards in both hands plus the undealt stock.
    pub fn cards_in_play(&self) -> usize {
        self.hands.iter().map(Hand::len).sum::<usize>() + self.stock.len()
    }

    /// Combined support for `state` across both hands.
    pub fn total_support(&self, state: QState) -> usize {
        self.hands.iter().map(|hand| hand.support(state)).sum()
    }

    pub fn claim_holds(&self, claim: Claim) -> bool {
        self.total_support(claim.state) >= claim.qty as usize
    }

    /// Every claim `seat` may legally make, each with and without full evidence.
    pub fn legal_actions(&self, seat: PlayerPosition) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.public.current_claim.is_some() {
            actions.push(Action::Doubt);
        }
        let hand = &self.hands[seat.index()];
        for claim in Claim::all_stronger(self.public.current_claim) {
            actions.push(Action::claim(claim));
            let reveal = hand.supporting_indices(claim.state);
            if !reveal.is_empty() {
                actions.push(Action::claim_with_evidence(claim, reveal));
            }
        }
        actions
    }

    pub fn apply(
        &mut self,
        seat: PlayerPosition,
        action: &Action,
    ) -> Result<Option<RoundOutcome>, ActionError> {
        if self.outcome.is_some() {
            return Err(ActionError::RoundOver);
        }
        if seat != self.public.turn {
            return Err(ActionError::OutOfTurn {
                expected: self.public.turn,
                actual: seat,
            });
        }

        match action {
            Action::Doubt => self.resolve_doubt(seat).map(Some),
            Action::Claim { claim, reveal } => {
                self.make_claim(seat, *claim, reveal)?;
                Ok(None)
            }
        }
    }

    fn resolve_doubt(&mut self, doubter: PlayerPosition) -> Result<RoundOutcome, ActionError> {
        let claim = self
            .public
            .current_claim
            .ok_or(ActionError::DoubtWithoutClaim)?;
        let claimant = doubter.opponent();
        let claim_held = self.claim_holds(claim);
        let winner = if claim_held { claimant } else { doubter };

        self.public.history.push(PublicEvent {
            seat: doubter,
            kind: EventKind::Doubt,
            claim,
            revealed_count: 0,
        });

        let outcome = RoundOutcome {
            round_index: self.public.round_index,
            winner,
            doubter,
            claimant,
            claim,
            claim_held,
        };
        self.outcome = Some(outcome);
        Ok(outcome)
    }

    fn make_claim(
        &mut self,
        seat: PlayerPosition,
        claim: Claim,
        reveal: &[usize],
    ) -> Result<(), ActionError> {
        if !claim.is_valid_qty() {
            return Err(ActionError::InvalidQuantity(claim.qty));
        }
        if let Some(current) = self.public.current_claim {
            if !claim.is_stronger_than(current) {
                return Err(ActionError::ClaimNotStronger { claim, current });
            }
        }

        // Validate every index before touching state so a rejected claim leaves no trace.
        // Cards already face up are skipped, whatever the claimed state.
        let hand = &self.hands[seat.index()];
        for &index in reveal {
            if self.revealed[seat.index()].contains(&index) {
                continue;
            }
            let card = hand.get(index).ok_or(ActionError::RevealOutOfRange {
                index,
                hand_size: hand.len(),
            })?;
            if !card.supports(claim.state) {
                return Err(ActionError::RevealMismatch {
                    index,
                    card,
                    state: claim.state,
                });
            }
        }

        let revealed = &mut self.revealed[seat.index()];
        let mut newly_revealed = Vec::new();
        for &index in reveal {
            if revealed.contains(&index) {
                continue;
            }
            revealed.push(index);
            if let Some(card) = hand.get(index) {
                newly_revealed.push(card);
            }
        }

        self.public.history.push(PublicEvent {
            seat,
            kind: EventKind::Claim,
            claim,
            revealed_count: newly_revealed.len() as u8,
        });
        self.public.evidence[seat.index()].extend(newly_revealed);
        self.public.current_claim = Some(claim);
        self.public.turn = seat.opponent();
        Ok(())
    }
}
