//! Walk the machine through a full quest-clear cycle, the way the control
//! loop would drive it: three stable rankings per screen, collecting the
//! action emitted on each confirmed transition.

use core_fsm::{FSM_CONFIRM_COUNT, Machine, State};

fn ranking(entries: &[(&str, f64)]) -> Vec<(String, f64)> {
    entries.iter().map(|&(n, s)| (n.to_string(), s)).collect()
}

/// Feed one stable ranking until it confirms; assert it confirms exactly on
/// the configured count.
fn confirm(machine: &mut Machine, scores: &[(String, f64)], expect: State) -> Option<&'static str> {
    for i in 1..=FSM_CONFIRM_COUNT {
        let outcome = machine.step(scores);
        if i < FSM_CONFIRM_COUNT {
            assert!(!outcome.changed, "confirmed early at {i} for {expect}");
        } else {
            assert!(outcome.changed, "not confirmed at {i} for {expect}");
            assert_eq!(outcome.state, expect);
        }
    }
    expect.action_name()
}

#[test]
fn full_quest_clear_cycle_emits_actions_in_order() {
    let mut machine = Machine::new();
    let mut actions = Vec::new();

    let home = ranking(&[("home", 0.9), ("clear-ok", 0.7), ("helper-select", 0.6)]);
    let quest = ranking(&[("quest", 0.85), ("event", 0.8), ("home", 0.4)]);
    let normal_quest = ranking(&[
        ("normal-quest", 0.85),
        ("normal-quest-uijin", 0.75),
        ("home", 0.3),
    ]);
    let uijin = ranking(&[
        ("normal-quest-uijin", 0.85),
        ("normal-quest", 0.75),
        ("deck-select", 0.55),
        ("event", 0.5),
        ("quest", 0.5),
    ]);
    let karyu = ranking(&[
        ("normal-quest-uijin-karyu", 0.75),
        ("helper-select", 0.65),
        ("home", 0.2),
    ]);
    let helper = ranking(&[
        ("helper-select", 0.85),
        ("clear-ok", 0.65),
        ("deck-select", 0.62),
    ]);
    let deck = ranking(&[("deck-select", 0.85), ("event", 0.65), ("home", 0.2)]);
    let in_play = ranking(&[
        ("normal-quest-uijin-in-play", 0.65),
        ("home", 0.1),
        ("event", 0.1),
        ("quest", 0.1),
        ("normal-quest", 0.1),
        ("normal-quest-uijin", 0.1),
        ("helper-select", 0.1),
        ("deck-select", 0.1),
        ("clear-ok", 0.1),
    ]);
    let clear_ok = ranking(&[("clear-ok", 0.9), ("home", 0.3)]);
    let special = ranking(&[
        ("special-reward", 0.7),
        ("reward-next", 0.35),
        ("home", 0.1),
    ]);
    let reward_next = ranking(&[
        ("reward-next", 0.7),
        ("special-reward", 0.5),
        ("home", 0.2),
    ]);

    let flow: &[(&[(String, f64)], State)] = &[
        (&home, State::Home),
        (&quest, State::Quest),
        (&normal_quest, State::NormalQuest),
        (&uijin, State::NormalQuestUijin),
        (&karyu, State::NormalQuestUijinKaryu),
        (&helper, State::HelperSelect),
        (&deck, State::DeckSelect),
        (&in_play, State::InPlay),
        (&clear_ok, State::ClearOk),
        (&special, State::SpecialReward),
        (&reward_next, State::RewardNext),
        (&home, State::Home),
    ];

    for (scores, expect) in flow {
        actions.extend(confirm(&mut machine, scores, *expect));
    }

    assert_eq!(
        actions,
        vec![
            "quest_bt_click",
            "normal_bt_click",
            "shojin_bt_click",
            "karyu_bt_click",
            "solo_bt_click",
            "helper_select",
            "shutsugeki_bt_click",
            "play_turn",
            "clear_ok",
            "special_reward",
            "reward_next",
            "quest_bt_click",
        ]
    );
}

#[test]
fn back_navigation_to_home_is_allowed_mid_flow() {
    let mut machine = Machine::new();
    let quest = ranking(&[("quest", 0.85), ("event", 0.8), ("home", 0.4)]);
    let home = ranking(&[("home", 0.9), ("clear-ok", 0.7), ("deck-select", 0.6)]);
    for _ in 0..3 {
        machine.step(&quest);
    }
    assert_eq!(machine.state(), State::Quest);
    for _ in 0..3 {
        machine.step(&home);
    }
    assert_eq!(machine.state(), State::Home);
}
