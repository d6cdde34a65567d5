use crate::model::player::PlayerPosition;

/// Rounds won per seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBoard {
    totals: [u32; 2],
}

impl ScoreBoard {
    pub const fn new() -> Self {
        Self { totals: [0; 2] }
    }

    pub fn award_round(&mut self, seat: PlayerPosition) {
        self.totals[seat.index()] += 1;
    }

    pub fn set_totals(&mut self, totals: [u32; 2]) {
        self.totals = totals;
    }

    pub fn score(&self, seat: PlayerPosition) -> u32 {
        self.totals[seat.index()]
    }

    pub fn standings(&self) -> &[u32; 2] {
        &self.totals
    }

    pub fn rounds_scored(&self) -> u32 {
        self.totals.iter().sum()
    }

    /// Seat with strictly more rounds won, `None` on a tie.
    pub fn leader(&self) -> Option<PlayerPosition> {
        let [first, second] = self.totals;
        match first.cmp(&second) {
            std::cmp::Ordering::Greater => Some(PlayerPosition::First),
            std::cmp::Ordering::Less => Some(PlayerPosition::Second),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self::new()
    }
}
