use super::{Decision, Tom0Params, log_decision};
use crate::policy::Policy;
use schcats_core::memory::{OpponentMemory, RoundMemory};
use schcats_core::model::card::QState;
use schcats_core::model::claim::Claim;
use schcats_core::model::round::{Action, Observation, RoundRecap};

/// The opponent ended the most recent remembered round by doubting.
pub fn conservative(memory: &OpponentMemory) -> bool {
    memory.last().is_some_and(|round| round.opponent_doubted)
}

/// The opponent's exposed bluff rate exceeds the configured threshold.
pub fn bluff_wary(memory: &OpponentMemory, params: &Tom0Params) -> bool {
    memory
        .bluff_rate()
        .is_some_and(|rate| rate > params.bluff_wary_threshold)
}

/// Zero-order heuristic: own hand, public state and explicit memory only.
pub fn tom0_decide(
    observation: &Observation,
    memory: &OpponentMemory,
    params: &Tom0Params,
) -> Decision {
    let conservative = conservative(memory);
    match observation.public.current_claim {
        None => open(observation, conservative),
        Some(current) => respond(
            observation,
            current,
            conservative,
            bluff_wary(memory, params),
            params,
        ),
    }
}

/// State with the most own support. Ties keep the weakest tier.
pub(crate) fn best_supported_state(observation: &Observation) -> QState {
    let mut best = QState::ORDERED[0];
    for state in QState::ORDERED {
        if observation.own_support(state) > observation.own_support(best) {
            best = state;
        }
    }
    best
}

fn open(observation: &Observation, conservative: bool) -> Decision {
    let state = best_supported_state(observation);
    let support = observation.own_support(state);
    let qty = support.saturating_sub(usize::from(conservative)).max(1);
    let claim = Claim::new(qty as u8, state);
    Decision::new(
        claim_action(observation, claim, conservative),
        if conservative {
            "open_conservative"
        } else {
            "open_best_support"
        },
    )
}

fn respond(
    observation: &Observation,
    current: Claim,
    conservative: bool,
    bluff_wary: bool,
    params: &Tom0Params,
) -> Decision {
    let estimate = (observation.own_support(current.state) + params.opponent_prior) as i32;
    let margin = params.margin - i32::from(conservative) - i32::from(bluff_wary);
    if estimate + margin < i32::from(current.qty) {
        return Decision::new(Action::Doubt, "estimate_below_claim");
    }

    match current.next_raise() {
        Some(raise) => Decision::new(claim_action(observation, raise, conservative), "raise"),
        None => Decision::new(Action::Doubt, "no_raise_available"),
    }
}

fn claim_action(observation: &Observation, claim: Claim, conservative: bool) -> Action {
    let reveal = if conservative {
        Vec::new()
    } else {
        observation.hand.supporting_indices(claim.state)
    };
    Action::claim_with_evidence(claim, reveal)
}

/// Zero-order agent with explicit cross-round memory of its opponent.
#[derive(Debug, Clone)]
pub struct Tom0MemoryAgent {
    name: String,
    params: Tom0Params,
    memory: OpponentMemory,
}

impl Tom0MemoryAgent {
    pub fn new(name: impl Into<String>, params: Tom0Params) -> Self {
        Self {
            name: name.into(),
            params,
            memory: OpponentMemory::new(params.memory_window),
        }
    }

    pub fn params(&self) -> &Tom0Params {
        &self.params
    }

    pub fn memory(&self) -> &OpponentMemory {
        &self.memory
    }

    /// Adds a remembered round without playing it.
    pub fn remember(&mut self, round: RoundMemory) {
        self.memory.push(round);
    }
}

impl Policy for Tom0MemoryAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, observation: &Observation) -> Action {
        let decision = tom0_decide(observation, &self.memory, &self.params);
        log_decision(&self.name, observation, "tom0", &decision);
        decision.action
    }

    fn observe_round_end(&mut self, recap: &RoundRecap) {
        self.memory.record(recap);
    }

    fn rounds_remembered(&self) -> u32 {
        self.memory.totals().rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schcats_core::model::card::Card;
    use schcats_core::model::hand::Hand;
    use schcats_core::model::player::PlayerPosition;
    use schcats_core::model::round::RoundState;

    fn hand() -> Hand {
        Hand::with_cards(vec![
            Card::Alive,
            Card::Alive,
            Card::Hup,
            Card::Dead,
            Card::Empty,
            Card::Alive,
        ])
    }

    fn opening_observation() -> Observation {
        let other = Hand::with_cards(vec![Card::Dead; 6]);
        RoundState::from_hands([hand(), other], 0, PlayerPosition::First)
            .observe(PlayerPosition::First)
    }

    fn facing(claim: Claim) -> Observation {
        let other = Hand::with_cards(vec![Card::Dead; 6]);
        let mut round = RoundState::from_hands([other, hand()], 0, PlayerPosition::First);
        round
            .apply(PlayerPosition::First, &Action::claim(claim))
            .unwrap();
        round.observe(PlayerPosition::Second)
    }

    fn remembered(opponent_doubted: bool, bluff: Option<bool>) -> RoundMemory {
        RoundMemory {
            round_index: 0,
            opponent_doubted,
            opponent_claims: 1,
            opponent_evidence_revealed: 0,
            opponent_last_claim: None,
            opponent_last_claim_was_true: bluff.map(|b| !b),
            won: true,
        }
    }

    #[test]
    fn opens_with_best_supported_state_and_reveals() {
        let decision = tom0_decide(
            &opening_observation(),
            &OpponentMemory::default(),
            &Tom0Params::default(),
        );
        assert_eq!(
            decision.action,
            Action::claim_with_evidence(Claim::new(4, QState::Alive), vec![0, 1, 2, 5])
        );
    }

    #[test]
    fn conservative_opening_shades_quantity_and_hides_evidence() {
        let mut memory = OpponentMemory::default();
        memory.push(remembered(true, None));
        let decision = tom0_decide(&opening_observation(), &memory, &Tom0Params::default());
        assert_eq!(decision.action, Action::claim(Claim::new(3, QState::Alive)));
        assert_eq!(decision.reason, "open_conservative");
    }

    #[test]
    fn doubts_claims_beyond_estimate() {
        // Alive support 4, estimate 6, margin 1: 7 is tolerated, 8 is doubted.
        let params = Tom0Params::default();
        let memory = OpponentMemory::default();
        let raise = tom0_decide(&facing(Claim::new(7, QState::Alive)), &memory, &params);
        assert!(matches!(raise.action, Action::Claim { claim, .. } if claim == Claim::new(8, QState::Alive)));
        let doubt = tom0_decide(&facing(Claim::new(8, QState::Alive)), &memory, &params);
        assert_eq!(doubt.action, Action::Doubt);
    }

    #[test]
    fn wariness_tightens_margin() {
        let params = Tom0Params::default();
        let mut memory = OpponentMemory::default();
        memory.push(remembered(false, Some(true)));
        memory.push(remembered(true, Some(true)));
        assert!(bluff_wary(&memory, &params));
        assert!(conservative(&memory));
        // Margin drops to -1: 6 > 6 - 1 is doubted.
        let decision = tom0_decide(&facing(Claim::new(6, QState::Alive)), &memory, &params);
        assert_eq!(decision.action, Action::Doubt);
    }

    #[test]
    fn doubts_when_no_raise_exists() {
        let params = Tom0Params {
            opponent_prior: 12,
            ..Tom0Params::default()
        };
        let decision = tom0_decide(
            &facing(Claim::new(12, QState::Empty)),
            &OpponentMemory::default(),
            &params,
        );
        assert_eq!(decision.action, Action::Doubt);
        assert_eq!(decision.reason, "no_raise_available");
    }

    #[test]
    fn agent_memory_survives_rounds() {
        let mut agent = Tom0MemoryAgent::new("tom0", Tom0Params::default());
        let mut round = RoundState::from_hands(
            [hand(), Hand::with_cards(vec![Card::Dead; 6])],
            0,
            PlayerPosition::First,
        );
        let opening = agent.decide(&round.observe(PlayerPosition::First));
        round.apply(PlayerPosition::First, &opening).unwrap();
        round.apply(PlayerPosition::Second, &Action::Doubt).unwrap();
        agent.observe_round_end(&round.recap(PlayerPosition::First).unwrap());

        assert_eq!(agent.memory().len(), 1);
        assert!(conservative(agent.memory()));
        assert_eq!(agent.name(), "tom0");
    }
}
