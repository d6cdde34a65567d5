use super::predictive::rule_doubt_probability;
use super::tom0::best_supported_state;
use super::{
    Decision, DoubtPredictor, ReasoningMode, Tom1Params, fallback_triggered, log_decision,
    tom0_decide,
};
use crate::policy::Policy;
use schcats_core::belief::{Belief, SoftLikelihoodModel};
use schcats_core::memory::{OpponentMemory, RoundMemory};
use schcats_core::model::claim::{Claim, MAX_CLAIM_QTY};
use schcats_core::model::round::{Action, EventKind, Observation, RoundRecap};
use tracing::{Level, event};

/// First-order agent: keeps a belief over the opponent's hand, predicts its replies, and
/// drops to the zero-order heuristic while the opponent keeps ending rounds by doubting.
#[derive(Debug, Clone)]
pub struct Tom1Agent {
    name: String,
    params: Tom1Params,
    belief: Belief,
    soft: SoftLikelihoodModel,
    memory: OpponentMemory,
    predictor: DoubtPredictor,
    mode: ReasoningMode,
    fallback_activations: u32,
    active_round: Option<u32>,
    events_seen: usize,
}

impl Tom1Agent {
    pub fn new(name: impl Into<String>, params: Tom1Params) -> Self {
        Self {
            name: name.into(),
            belief: Belief::new(),
            soft: SoftLikelihoodModel::new(params.soft),
            memory: OpponentMemory::new(params.memory_window()),
            predictor: DoubtPredictor::new(params.predictor_prior_weight),
            mode: ReasoningMode::TheoryOfMind,
            fallback_activations: 0,
            active_round: None,
            events_seen: 0,
            params,
        }
    }

    pub fn params(&self) -> &Tom1Params {
        &self.params
    }

    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    pub fn memory(&self) -> &OpponentMemory {
        &self.memory
    }

    pub fn predictor(&self) -> &DoubtPredictor {
        &self.predictor
    }

    pub fn reasoning_mode(&self) -> ReasoningMode {
        self.mode
    }

    /// Adds a remembered round directly and re-evaluates the fallback trigger.
    pub fn remember(&mut self, round: RoundMemory) {
        self.memory.push(round);
        self.update_mode();
    }

    fn sync_belief(&mut self, observation: &Observation) {
        let round_index = observation.public.round_index;
        if self.active_round != Some(round_index) {
            self.belief.begin_round(&observation.hand);
            self.active_round = Some(round_index);
            self.events_seen = 0;
        }

        if let Err(err) = self.belief.observe_evidence(observation.opponent_evidence()) {
            tracing::warn!(
                target: "schcats_bot::decision",
                agent = %self.name,
                error = %err,
                "opponent evidence rejected by belief"
            );
        }

        let opponent = observation.opponent();
        let history = &observation.public.history;
        for event in history.iter().skip(self.events_seen) {
            if event.seat == opponent && event.kind == EventKind::Claim {
                self.soft.update_after_claim(&mut self.belief, event.claim);
            }
        }
        self.events_seen = history.len();
    }

    fn reason(&self, observation: &Observation) -> Decision {
        match observation.public.current_claim {
            None => self.open(observation),
            Some(current) => self.respond(observation, current),
        }
    }

    /// Largest quantity on the best supported state that the belief still backs.
    fn open(&self, observation: &Observation) -> Decision {
        let state = best_supported_state(observation);
        let support = observation.own_support(state);
        let floor = support.clamp(1, MAX_CLAIM_QTY as usize) as u8;

        let mut qty = floor;
        for candidate in floor..=MAX_CLAIM_QTY {
            let claim = Claim::new(candidate, state);
            if self.belief.prob_claim_holds(claim, support) < self.params.open_threshold {
                break;
            }
            qty = candidate;
        }

        let claim = Claim::new(qty, state);
        let reveal = observation.hand.supporting_indices(state);
        Decision::new(Action::claim_with_evidence(claim, reveal), "open_belief")
    }

    fn respond(&self, observation: &Observation, current: Claim) -> Decision {
        let p_holds = self
            .belief
            .prob_claim_holds(current, observation.own_support(current.state));
        let doubt_value = 1.0 - 2.0 * p_holds;

        let mut best: Option<(Claim, f64)> = None;
        for raise in Claim::all_stronger(Some(current)) {
            let value = self.raise_value(observation, raise);
            if best.is_none_or(|(_, best_value)| value > best_value) {
                best = Some((raise, value));
            }
        }

        match best {
            Some((raise, value)) if value > doubt_value => {
                let reveal = observation.hand.supporting_indices(raise.state);
                Decision::new(Action::claim_with_evidence(raise, reveal), "raise_ev")
            }
            Some(_) => Decision::new(Action::Doubt, "doubt_ev"),
            None => Decision::new(Action::Doubt, "no_raise_available"),
        }
    }

    /// Expected payoff of raising to `raise` when the opponent's reply ends the round
    /// only through a doubt.
    fn raise_value(&self, observation: &Observation, raise: Claim) -> f64 {
        let p_holds = self
            .belief
            .prob_claim_holds(raise, observation.own_support(raise.state));
        let rule = rule_doubt_probability(&self.belief, raise, &self.params.tom0);
        let p_doubt = self.predictor.predict(raise, rule);
        p_doubt * (2.0 * p_holds - 1.0)
    }

    fn update_mode(&mut self) {
        let next = if fallback_triggered(&self.memory, self.params.fallback_window) {
            ReasoningMode::Fallback
        } else {
            ReasoningMode::TheoryOfMind
        };
        if next == self.mode {
            return;
        }
        if next.is_fallback() {
            self.fallback_activations += 1;
        }
        event!(
            target: "schcats_bot::mode",
            Level::INFO,
            agent = %self.name,
            from = self.mode.as_str(),
            to = next.as_str(),
            activations = self.fallback_activations,
        );
        self.mode = next;
    }
}

impl Policy for Tom1Agent {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, observation: &Observation) -> Action {
        self.sync_belief(observation);
        let decision = match self.mode {
            ReasoningMode::Fallback => tom0_decide(observation, &self.memory, &self.params.tom0),
            ReasoningMode::TheoryOfMind => self.reason(observation),
        };
        log_decision(&self.name, observation, self.mode.as_str(), &decision);
        decision.action
    }

    fn observe_round_end(&mut self, recap: &RoundRecap) {
        self.memory.record(recap);
        self.predictor.observe_round(recap);
        if recap.outcome.claimant == recap.opponent() {
            self.belief.record_claim_resolution(recap.outcome.claim_held);
        }
        self.active_round = None;
        self.update_mode();
    }

    fn mode(&self) -> Option<ReasoningMode> {
        Some(self.mode)
    }

    fn fallback_activations(&self) -> u32 {
        self.fallback_activations
    }

    fn rounds_remembered(&self) -> u32 {
        self.memory.totals().rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schcats_core::model::card::{Card, QState};
    use schcats_core::model::hand::Hand;
    use schcats_core::model::player::PlayerPosition;
    use schcats_core::model::round::RoundState;

    fn remembered(round_index: u32, opponent_doubted: bool) -> RoundMemory {
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

    fn agent() -> Tom1Agent {
        Tom1Agent::new("tom1", Tom1Params::default())
    }

    fn round(own: Vec<Card>, other: Vec<Card>) -> RoundState {
        RoundState::from_hands(
            [Hand::with_cards(other), Hand::with_cards(own)],
            4,
            PlayerPosition::First,
        )
    }

    #[test]
    fn opening_never_claims_below_own_support() {
        let mut agent = agent();
        let own = vec![Card::Dead, Card::Dead, Card::Dead, Card::Hup, Card::Alive, Card::Empty];
        let state = RoundState::from_hands(
            [Hand::with_cards(own), Hand::with_cards(vec![Card::Alive; 6])],
            0,
            PlayerPosition::First,
        );
        match agent.decide(&state.observe(PlayerPosition::First)) {
            Action::Claim { claim, reveal } => {
                assert_eq!(claim.state, QState::Dead);
                assert!(claim.qty >= 4);
                assert_eq!(reveal, vec![0, 1, 2, 3]);
            }
            Action::Doubt => panic!("cannot doubt when opening"),
        }
        assert_eq!(agent.belief().deals_seen(), 1);
    }

    #[test]
    fn evidence_filters_belief_before_deciding() {
        let mut agent = agent();
        let mut state = round(vec![Card::Dead; 6], vec![Card::Alive, Card::Alive, Card::Hup, Card::Empty, Card::Empty, Card::Dead]);
        state
            .apply(
                PlayerPosition::First,
                &Action::claim_with_evidence(Claim::new(3, QState::Alive), vec![0, 1, 2]),
            )
            .unwrap();
        agent.decide(&state.observe(PlayerPosition::Second));

        for (composition, p) in agent.belief().hypotheses() {
            if composition[Card::Alive.index()] < 2 || composition[Card::Hup.index()] < 1 {
                assert_eq!(p, 0.0);
            }
        }
        assert!((agent.belief().total_mass() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn doubts_claims_the_belief_rules_out() {
        let mut agent = agent();
        let mut state = round(vec![Card::Dead; 6], vec![Card::Alive; 6]);
        // Own hand holds no Alive support, so nine Alive needs more than six opponent cards.
        state
            .apply(PlayerPosition::First, &Action::claim(Claim::new(9, QState::Alive)))
            .unwrap();
        assert_eq!(agent.decide(&state.observe(PlayerPosition::Second)), Action::Doubt);
    }

    #[test]
    fn raises_when_current_claim_is_certain() {
        let mut agent = agent();
        let mut state = round(vec![Card::Dead; 6], vec![Card::Alive; 6]);
        state
            .apply(PlayerPosition::First, &Action::claim(Claim::new(2, QState::Dead)))
            .unwrap();
        match agent.decide(&state.observe(PlayerPosition::Second)) {
            Action::Claim { claim, .. } => assert!(claim.is_stronger_than(Claim::new(2, QState::Dead))),
            Action::Doubt => panic!("doubting a claim we alone cover"),
        }
    }

    #[test]
    fn fallback_follows_trigger_and_reverts() {
        let mut agent = agent();
        agent.remember(remembered(0, true));
        agent.remember(remembered(1, true));
        assert_eq!(agent.reasoning_mode(), ReasoningMode::TheoryOfMind);
        agent.remember(remembered(2, true));
        assert_eq!(agent.reasoning_mode(), ReasoningMode::Fallback);
        assert_eq!(agent.fallback_activations(), 1);
        agent.remember(remembered(3, false));
        assert_eq!(agent.reasoning_mode(), ReasoningMode::TheoryOfMind);
        assert_eq!(agent.fallback_activations(), 1);
    }

    #[test]
    fn honesty_learned_from_resolved_opponent_claims() {
        let mut agent = agent();
        let mut state = round(vec![Card::Dead; 6], vec![Card::Alive; 6]);
        state
            .apply(PlayerPosition::First, &Action::claim(Claim::new(9, QState::Alive)))
            .unwrap();
        state.apply(PlayerPosition::Second, &Action::Doubt).unwrap();
        agent.observe_round_end(&state.recap(PlayerPosition::Second).unwrap());

        assert_eq!(agent.belief().honesty().failed, 1);
        assert_eq!(agent.memory().len(), 1);
    }
}
