//! Property tests over the round resolver's casualty arithmetic.

use hexmarch_core::{
    load_rules, resolve_round, CombatRng, CompiledRules, RoundContext, RulesSource, TerritoryView,
    Unit, TOTAL_ROUNDS,
};
use hexmarch_protocol::TerritoryId;
use proptest::prelude::*;

fn fixture_territory(rules: &CompiledRules, id: u32, terrain: &str) -> TerritoryView {
    TerritoryView {
        id: TerritoryId(id),
        terrain: rules.terrain_id(terrain).unwrap(),
        owner: None,
        buildings: Vec::new(),
        resource: None,
        is_capital: false,
    }
}

fn warband(rules: &CompiledRules, count: usize, health: i32, level: u8) -> Vec<Unit> {
    let warrior = rules.unit_type_id("warrior").unwrap();
    (0..count)
        .map(|_| {
            let mut unit = Unit::new(warrior, TerritoryId(9), rules, 0);
            unit.health = health;
            unit.level = level;
            unit
        })
        .collect()
}

proptest! {
    /// Per-round casualty percentages stay inside the designed bands no
    /// matter which cards meet which groups.
    #[test]
    fn casualties_stay_in_bounds(
        seed in any::<u64>(),
        attacker_card in 0usize..12,
        defender_card in 0usize..12,
        attacker_count in 0usize..4,
        defender_count in 0usize..4,
        health in 1i32..=100,
        level in 1u8..=5,
        round in 1u8..=TOTAL_ROUNDS,
    ) {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(seed);
        let attackers = warband(&rules, attacker_count, health, level);
        let defenders = warband(&rules, defender_count, health, level);
        let att_t = fixture_territory(&rules, 1, "steppe");
        let def_t = fixture_territory(&rules, 2, "hills");

        let ctx = RoundContext {
            attacker_card: Some(hexmarch_protocol::CardId::new(
                (attacker_card % rules.cards.len()) as u16,
            )),
            defender_card: Some(hexmarch_protocol::CardId::new(
                (defender_card % rules.cards.len()) as u16,
            )),
            attacker_units: &attackers,
            defender_units: &defenders,
            attacker_territory: &att_t,
            defender_territory: &def_t,
            round,
            total_rounds: TOTAL_ROUNDS,
        };
        let record = resolve_round(&rules, &ctx, &mut rng);

        match record.winner {
            Some(winner) => {
                let (winner_cas, loser_cas) = if winner == hexmarch_protocol::Side::Attacker {
                    (record.attacker_casualties, record.defender_casualties)
                } else {
                    (record.defender_casualties, record.attacker_casualties)
                };
                prop_assert!((5u8..=15).contains(&winner_cas));
                prop_assert!((10u8..=30).contains(&loser_cas));
            }
            None => {
                prop_assert_eq!(record.attacker_casualties, 10);
                prop_assert_eq!(record.defender_casualties, 10);
            }
        }
    }

    /// A perfectly mirrored round is always a stalemate at 10/10.
    #[test]
    fn mirrored_rounds_always_draw(
        seed in any::<u64>(),
        count in 0usize..4,
        health in 1i32..=100,
        level in 1u8..=5,
        round in 1u8..=TOTAL_ROUNDS,
    ) {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(seed);
        let attackers = warband(&rules, count, health, level);
        let defenders = warband(&rules, count, health, level);
        let att_t = fixture_territory(&rules, 1, "steppe");
        let def_t = fixture_territory(&rules, 2, "steppe");

        let ctx = RoundContext {
            attacker_card: rules.card_id("frontal_assault"),
            defender_card: rules.card_id("frontal_assault"),
            attacker_units: &attackers,
            defender_units: &defenders,
            attacker_territory: &att_t,
            defender_territory: &def_t,
            round,
            total_rounds: TOTAL_ROUNDS,
        };
        let record = resolve_round(&rules, &ctx, &mut rng);

        prop_assert_eq!(record.winner, None);
        prop_assert_eq!(record.attacker_casualties, 10);
        prop_assert_eq!(record.defender_casualties, 10);
    }
}
