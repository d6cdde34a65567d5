use crate::model::deck::Deck;
use crate::model::player::PlayerPosition;
use crate::model::round::{Action, ActionError, Observation, RoundOutcome, RoundRecap, RoundState};
use crate::model::score::ScoreBoard;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ROUNDS_PER_MATCH: u32 = 30;

/// Result of a finished match. `winner` is `None` when both seats won as many rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: Option<PlayerPosition>,
    pub rounds_played: u32,
    pub scores: [u32; 2],
}

/// Returned from [`MatchState::step`].
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Observation for the seat to act next.
    pub observation: Observation,
    pub terminal: bool,
    pub round: Option<RoundOutcome>,
}

/// Two-player match of `rounds_per_match` rounds; each round ends on a doubt and
/// the next is dealt from the seeded RNG.
#[derive(Debug, Clone)]
pub struct MatchState {
    scores: ScoreBoard,
    rounds_per_match: u32,
    current_round: RoundState,
    last_round: Option<RoundState>,
    finished: bool,
    rng: StdRng,
    seed: u64,
}

impl MatchState {
    pub fn with_seed(rounds_per_match: u32, seed: u64) -> Self {
        Self::with_seed_round(seed, rounds_per_match, 0)
    }

    /// Rebuilds a match positioned at the start of `round_index` by replaying the
    /// seeded shuffles of earlier rounds.
    pub fn with_seed_round(seed: u64, rounds_per_match: u32, round_index: u32) -> Self {
        let rounds_per_match = rounds_per_match.max(1);
        let round_index = round_index.min(rounds_per_match - 1);
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..round_index {
            let _ = Deck::shuffled(&mut rng);
        }

        let deck = Deck::shuffled(&mut rng);
        let current_round = RoundState::deal(&deck, round_index, starting_player_for(round_index));

        Self {
            scores: ScoreBoard::new(),
            rounds_per_match,
            current_round,
            last_round: None,
            finished: false,
            rng,
            seed,
        }
    }

    pub fn from_snapshot(snapshot: &crate::game::serialization::MatchSnapshot) -> Self {
        let mut state = MatchState::with_seed_round(
            snapshot.seed,
            snapshot.rounds_per_match,
            snapshot.round_index,
        );
        state.scores_mut().set_totals(snapshot.scores);
        state.finished = snapshot.finished;
        state
    }

    /// Restarts the match from its seed and returns the observation of the seat to act.
    pub fn reset(&mut self) -> Observation {
        *self = Self::with_seed(self.rounds_per_match, self.seed);
        self.observe(self.to_act())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rounds_per_match(&self) -> u32 {
        self.rounds_per_match
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    pub fn scores_mut(&mut self) -> &mut ScoreBoard {
        &mut self.scores
    }

    pub fn round(&self) -> &RoundState {
        &self.current_round
    }

    pub fn round_index(&self) -> u32 {
        self.current_round.round_index()
    }

    pub fn to_act(&self) -> PlayerPosition {
        self.current_round.turn()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn observe(&self, seat: PlayerPosition) -> Observation {
        self.current_round.observe(seat)
    }

    /// Recap of the most recently finished round.
    pub fn last_round_recap(&self, seat: PlayerPosition) -> Option<RoundRecap> {
        self.last_round.as_ref().and_then(|round| round.recap(seat))
    }

    pub fn cards_in_play(&self) -> usize {
        self.current_round.cards_in_play()
    }

    /// Legal moves for `seat`; empty when it is not that seat's turn or the match is over.
    pub fn legal_actions(&self, seat: PlayerPosition) -> Vec<Action> {
        if self.finished || seat != self.to_act() {
            return Vec::new();
        }
        self.current_round.legal_actions(seat)
    }

    pub fn result(&self) -> Option<MatchResult> {
        self.finished.then(|| MatchResult {
            winner: self.scores.leader(),
            rounds_played: self.scores.rounds_scored(),
            scores: *self.scores.standings(),
        })
    }

    /// Applies `action` for `seat`. A rejected action leaves the match untouched.
    pub fn step(
        &mut self,
        seat: PlayerPosition,
        action: &Action,
    ) -> Result<StepOutcome, ActionError> {
        if self.finished {
            return Err(ActionError::MatchFinished);
        }

        let outcome = self.current_round.apply(seat, action)?;
        if let Some(resolved) = outcome {
            self.scores.award_round(resolved.winner);
            self.finish_round_and_start_next();
        }

        Ok(StepOutcome {
            observation: self.observe(self.to_act()),
            terminal: self.finished,
            round: outcome,
        })
    }

    fn finish_round_and_start_next(&mut self) {
        let next_index = self.current_round.round_index() + 1;
        if next_index >= self.rounds_per_match {
            self.last_round = Some(self.current_round.clone());
            self.finished = true;
            return;
        }

        let deck = Deck::shuffled(&mut self.rng);
        let next = RoundState::deal(&deck, next_index, starting_player_for(next_index));
        self.last_round = Some(std::mem::replace(&mut self.current_round, next));
    }
}

/// Starting seat alternates by round.
fn starting_player_for(round_index: u32) -> PlayerPosition {
    if round_index % 2 == 0 {
        PlayerPosition::First
    } else {
        PlayerPosition::Second
    }
}

#[cfg(test)]
mod tests {
    use super::MatchState;
    use crate::model::card::QState;
    use crate::model::claim::Claim;
    use crate::model::deck::DECK_SIZE;
    use crate::model::player::PlayerPosition;
    use crate::model::round::{Action, ActionError};

    fn play_short_round(state: &mut MatchState) {
        let opener = state.to_act();
        state
            .step(opener, &Action::claim(Claim::new(1, QState::Dead)))
            .unwrap();
        let outcome = state.step(opener.opponent(), &Action::Doubt).unwrap();
        assert!(outcome.round.is_some());
    }

    #[test]
    fn new_match_starts_with_first_seat() {
        let state = MatchState::with_seed(4, 0);
        assert_eq!(state.round_index(), 0);
        assert_eq!(state.to_act(), PlayerPosition::First);
        assert!(state.last_round_recap(PlayerPosition::First).is_none());
    }

    #[test]
    fn starting_seat_alternates_between_rounds() {
        let mut state = MatchState::with_seed(4, 3);
        play_short_round(&mut state);
        assert_eq!(state.round_index(), 1);
        assert_eq!(state.to_act(), PlayerPosition::Second);
        play_short_round(&mut state);
        assert_eq!(state.to_act(), PlayerPosition::First);
    }

    #[test]
    fn match_terminates_after_configured_rounds() {
        let mut state = MatchState::with_seed(3, 11);
        for _ in 0..3 {
            assert!(!state.is_finished());
            play_short_round(&mut state);
        }
        assert!(state.is_finished());
        let result = state.result().expect("finished match has a result");
        assert_eq!(result.rounds_played, 3);
        assert_eq!(result.scores.iter().sum::<u32>(), 3);
        assert!(result.winner.is_some());
        assert_eq!(
            state.step(state.to_act(), &Action::Doubt).unwrap_err(),
            ActionError::MatchFinished
        );
    }

    #[test]
    fn recap_describes_finished_round() {
        let mut state = MatchState::with_seed(5, 9);
        play_short_round(&mut state);
        let recap = state.last_round_recap(PlayerPosition::Second).unwrap();
        assert_eq!(recap.outcome.round_index, 0);
        assert_eq!(recap.public.history.len(), 2);
        assert_eq!(recap.seat, PlayerPosition::Second);
    }

    #[test]
    fn rejected_doubt_keeps_match_intact() {
        let mut state = MatchState::with_seed(5, 1);
        let before = state.observe(PlayerPosition::First);
        assert_eq!(
            state.step(PlayerPosition::First, &Action::Doubt).unwrap_err(),
            ActionError::DoubtWithoutClaim
        );
        assert_eq!(state.observe(PlayerPosition::First), before);
    }

    #[test]
    fn reset_replays_identical_deals() {
        let mut state = MatchState::with_seed(5, 42);
        let first_obs = state.observe(PlayerPosition::First);
        play_short_round(&mut state);
        let again = state.reset();
        assert_eq!(again, first_obs);
        assert_eq!(state.scores().rounds_scored(), 0);
        assert_eq!(state.cards_in_play(), DECK_SIZE);
    }

    #[test]
    fn seeded_round_matches_played_round() {
        let mut played = MatchState::with_seed(6, 77);
        play_short_round(&mut played);
        play_short_round(&mut played);
        let jumped = MatchState::with_seed_round(77, 6, 2);
        for seat in PlayerPosition::LOOP {
            assert_eq!(played.round().hand(seat), jumped.round().hand(seat));
        }
    }
}
