use schcats_bot::{
    Policy, ReasoningMode, Tom0MemoryAgent, Tom0Params, Tom1Agent, Tom1Params, tom0_decide,
};
use schcats_core::game::match_state::MatchState;
use schcats_core::memory::RoundMemory;
use schcats_core::model::card::{Card, QState};
use schcats_core::model::claim::Claim;
use schcats_core::model::hand::Hand;
use schcats_core::model::player::PlayerPosition;
use schcats_core::model::round::{Action, Observation, RoundState};

fn doubted_round(round_index: u32) -> RoundMemory {
    RoundMemory {
        round_index,
        opponent_doubted: true,
        opponent_claims: 0,
        opponent_evidence_revealed: 0,
        opponent_last_claim: None,
        opponent_last_claim_was_true: None,
        won: false,
    }
}

fn observations() -> Vec<Observation> {
    let own = Hand::with_cards(vec![
        Card::Alive,
        Card::Dead,
        Card::Hup,
        Card::Alive,
        Card::Empty,
        Card::Alive,
    ]);
    let other = Hand::with_cards(vec![Card::Dead; 6]);

    let opening = RoundState::from_hands([own.clone(), other.clone()], 0, PlayerPosition::First)
        .observe(PlayerPosition::First);

    let mut out = vec![opening];
    for claim in [
        Claim::new(3, QState::Dead),
        Claim::new(6, QState::Alive),
        Claim::new(7, QState::Alive),
        Claim::new(12, QState::Empty),
    ] {
        let mut round =
            RoundState::from_hands([other.clone(), own.clone()], 1, PlayerPosition::First);
        round
            .apply(PlayerPosition::First, &Action::claim(claim))
            .unwrap();
        out.push(round.observe(PlayerPosition::Second));
    }
    out
}

#[test]
fn fallback_decisions_match_zero_order_heuristic() {
    let params = Tom1Params::default();
    let mut tom1 = Tom1Agent::new("tom1", params);
    let mut tom0 = Tom0MemoryAgent::new("tom0", params.tom0);
    for idx in 0..3 {
        tom1.remember(doubted_round(idx));
        tom0.remember(doubted_round(idx));
    }
    assert_eq!(tom1.mode(), Some(ReasoningMode::Fallback));
    assert_eq!(tom0.rounds_remembered(), 3);
    assert_eq!(tom1.rounds_remembered(), 3);

    let mut raised = 0;
    for observation in observations() {
        let fallback = tom1.decide(&observation);
        if matches!(fallback, Action::Claim { .. }) {
            raised += 1;
        }
        assert_eq!(fallback, tom0.decide(&observation));
    }
    assert!(raised > 0, "observations should exercise claims as well as doubts");
}

#[test]
fn fallback_uses_the_same_memory_a_zero_order_agent_would_build() {
    let params = Tom1Params::default();
    let mut tom1 = Tom1Agent::new("tom1", params);
    for idx in 0..3 {
        tom1.remember(doubted_round(idx));
    }
    let mut memory = schcats_core::memory::OpponentMemory::new(params.tom0.memory_window);
    for idx in 0..3 {
        memory.push(doubted_round(idx));
    }
    for observation in observations() {
        assert_eq!(
            tom1.decide(&observation),
            tom0_decide(&observation, &memory, &params.tom0).action
        );
    }
}

fn play_match(
    seed: u64,
    rounds: u32,
    first: &mut dyn Policy,
    second: &mut dyn Policy,
) -> MatchState {
    let mut state = MatchState::with_seed(rounds, seed);
    while !state.is_finished() {
        let seat = state.to_act();
        let observation = state.observe(seat);
        let action = match seat {
            PlayerPosition::First => first.decide(&observation),
            PlayerPosition::Second => second.decide(&observation),
        };
        let step = state
            .step(seat, &action)
            .unwrap_or_else(|err| panic!("{} chose an illegal action: {err}", seat));
        if step.round.is_some() {
            for seat in PlayerPosition::LOOP {
                let recap = state.last_round_recap(seat).expect("recap after round");
                match seat {
                    PlayerPosition::First => first.observe_round_end(&recap),
                    PlayerPosition::Second => second.observe_round_end(&recap),
                }
            }
        }
    }
    state
}

#[test]
fn agents_only_choose_legal_actions() {
    for seed in 0..6 {
        let mut tom1 = Tom1Agent::new("tom1", Tom1Params::default());
        let mut tom0 = Tom0MemoryAgent::new("tom0", Tom0Params::default());
        let state = play_match(seed, 30, &mut tom1, &mut tom0);
        let result = state.result().expect("match finished");
        assert_eq!(result.scores.iter().sum::<u32>(), 30);
        assert_eq!(tom1.memory().totals().rounds, 30);
        assert_eq!(tom0.memory().totals().rounds, 30);
        assert_eq!(tom1.belief().deals_seen(), 30);
    }
}

#[test]
fn zero_order_self_play_is_deterministic() {
    let run = |seed| {
        let mut a = Tom0MemoryAgent::new("a", Tom0Params::default());
        let mut b = Tom0MemoryAgent::new("b", Tom0Params::default());
        *play_match(seed, 20, &mut a, &mut b).scores().standings()
    };
    assert_eq!(run(7), run(7));
}
