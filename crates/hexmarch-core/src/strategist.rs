//! The AI opponent's three heuristics: where to attack, which tactical
//! card to play, and what to train. All of them score candidates over
//! immutable views, perturb the scores by difficulty, and degrade to
//! `None` when there is nothing sensible to do.

use tracing::debug;

use hexmarch_protocol::{CardId, Difficulty, PlayerId, TerritoryId, UnitTypeId};

use crate::{
    rng::CombatRng,
    roster::UnitRoster,
    rules::{CardTier, CompiledRules, Era, ResourceRarity},
    unit::Unit,
    world::{TerritoryGrid, TerritoryProvider, TerritoryView, Treasury},
};

/// Attacks with a lower estimated win probability are never executed,
/// regardless of difficulty.
pub const MIN_ATTACK_PROBABILITY: f32 = 0.4;

#[derive(Clone, Copy, Debug)]
pub struct AttackPlan {
    pub from: TerritoryId,
    pub target: TerritoryId,
    pub win_probability: f32,
    pub score: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct Strategist {
    difficulty: Difficulty,
}

impl Strategist {
    pub fn new(difficulty: Difficulty) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Picks the most promising adjacent enemy territory to attack, or
    /// `None` when every candidate is too risky.
    #[allow(clippy::too_many_arguments)]
    pub fn select_attack_target(
        &self,
        rules: &CompiledRules,
        rng: &mut CombatRng,
        player: PlayerId,
        roster: &UnitRoster,
        territories: &dyn TerritoryProvider,
        grid: &dyn TerritoryGrid,
        known_territories: &[TerritoryId],
    ) -> Option<AttackPlan> {
        let enemy_capital = known_territories
            .iter()
            .filter_map(|&id| territories.territory(id))
            .find(|view| view.is_capital && view.owner != Some(player))
            .map(|view| view.id);

        let mut candidates = Vec::new();
        for from in roster.territories_with_units() {
            let Some(from_view) = territories.territory(from) else {
                continue;
            };
            if from_view.owner != Some(player) {
                continue;
            }
            let attackers = roster.units_snapshot(from);
            if attackers.is_empty() {
                continue;
            }

            for target in grid.neighbors(from) {
                let Some(target_view) = territories.territory(target) else {
                    continue;
                };
                if target_view.owner == Some(player) {
                    continue;
                }
                let defenders = roster.units_snapshot(target);

                let win_probability =
                    self.estimate_win_probability(rules, roster, &attackers, &defenders, &target_view);
                if win_probability < MIN_ATTACK_PROBABILITY {
                    continue;
                }

                let mut score = win_probability * 100.0
                    + self.strategic_value(rules, &target_view, grid, enemy_capital);
                if self.difficulty == Difficulty::Hard {
                    if target_view.resource.is_some() {
                        score += 10.0;
                    }
                    if attackers
                        .iter()
                        .any(|u| rules.unit_type(u.type_id).terrain_bonus(target_view.terrain) > 0)
                    {
                        score += 8.0;
                    }
                }

                candidates.push((
                    score,
                    AttackPlan {
                        from,
                        target,
                        win_probability,
                        score,
                    },
                ));
            }
        }

        let plan = self.pick_scored(rng, candidates);
        if let Some(plan) = &plan {
            debug!(
                from = ?plan.from,
                target = ?plan.target,
                p = plan.win_probability,
                "attack target selected"
            );
        }
        plan
    }

    /// Scores the given cards for one side of a round and picks one.
    #[allow(clippy::too_many_arguments)]
    pub fn select_card(
        &self,
        rules: &CompiledRules,
        rng: &mut CombatRng,
        available: &[CardId],
        group: &[Unit],
        territory: &TerritoryView,
        known_opponent_card: Option<CardId>,
        attacking: bool,
    ) -> Option<CardId> {
        let fielded: Vec<UnitTypeId> = group.iter().map(|u| u.type_id).collect();
        let mut candidates = Vec::new();

        for &id in available {
            let card = rules.card(id);
            if !card.requires_units.is_empty()
                && !card.requires_units.iter().any(|req| fielded.contains(req))
            {
                continue;
            }

            let mut score = card.strength as f32 * 10.0;
            if let Some(opponent) = known_opponent_card {
                if card.counters_card(opponent) {
                    score += 30.0;
                    if self.difficulty == Difficulty::Hard {
                        score += 10.0;
                    }
                }
            }
            if card.favors_terrain(territory.terrain) {
                score += 25.0;
                if self.difficulty == Difficulty::Hard {
                    score += 8.0;
                }
            }
            if card.defensive != attacking {
                score += 15.0;
            }
            score += match card.tier {
                CardTier::Advanced => 10.0,
                CardTier::Intermediate => 5.0,
                CardTier::Basic => 0.0,
            };

            candidates.push((score, id));
        }

        self.pick_scored(rng, candidates)
    }

    /// Chooses a unit type to train in `territory`, or `None` when nothing
    /// is affordable.
    pub fn decide_training(
        &self,
        rules: &CompiledRules,
        rng: &mut CombatRng,
        era: Era,
        territory: &TerritoryView,
        roster: &UnitRoster,
        treasury: &dyn Treasury,
    ) -> Option<UnitTypeId> {
        let mut candidates: Vec<UnitTypeId> = rules.unit_types_in_era(era);
        if let Some(doctrine) = roster.current_doctrine() {
            for &unlocked in &rules.doctrine(doctrine).unlocks_units {
                if !candidates.contains(&unlocked) {
                    candidates.push(unlocked);
                }
            }
        }

        let mut scored = Vec::new();
        for type_id in candidates {
            let utype = rules.unit_type(type_id);
            if let Some(required) = utype.requires_resource {
                if territory.resource != Some(required) {
                    continue;
                }
            }
            if !treasury.can_afford(&utype.cost) {
                continue;
            }

            let mut score = 50.0
                + utype.strength as f32 * 2.0
                + utype.moves as f32 * 10.0
                - 5.0 * roster.count_of_type(type_id) as f32;

            let affinity = utype.terrain_bonus(territory.terrain);
            if affinity > 0 {
                score += 10.0 + affinity.min(5) as f32;
            }
            if let (Some(present), Some(required)) = (territory.resource, utype.requires_resource) {
                if present == required {
                    score += match rules.resource(present).rarity {
                        ResourceRarity::Strategic => 25.0,
                        ResourceRarity::Luxury => 20.0,
                        ResourceRarity::Common => 15.0,
                    };
                    if self.difficulty == Difficulty::Hard {
                        score += 8.0;
                    }
                }
            }

            scored.push((score, type_id));
        }

        self.pick_scored(rng, scored)
    }

    fn estimate_win_probability(
        &self,
        rules: &CompiledRules,
        roster: &UnitRoster,
        attackers: &[Unit],
        defenders: &[Unit],
        target: &TerritoryView,
    ) -> f32 {
        let doctrine = roster.current_doctrine().map(|d| rules.doctrine(d));
        let attack_bonus = doctrine.map(|d| d.attack_bonus).unwrap_or(0);
        let defense_bonus = doctrine.map(|d| d.defense_bonus).unwrap_or(0);

        let attacker_power = estimated_power(rules, attackers, target, defenders)
            * (100 + attack_bonus) as f32
            / 100.0;
        // Home ground is worth a flat extra point to the defender.
        let defender_power = estimated_power(rules, defenders, target, attackers)
            * (100 + defense_bonus) as f32
            / 100.0
            + 1.0;

        win_probability(attacker_power / defender_power.max(0.1))
    }

    fn strategic_value(
        &self,
        rules: &CompiledRules,
        target: &TerritoryView,
        grid: &dyn TerritoryGrid,
        enemy_capital: Option<TerritoryId>,
    ) -> f32 {
        let mut value = 10.0;
        if let Some(resource) = target.resource {
            value += match rules.resource(resource).rarity {
                ResourceRarity::Strategic => 30.0,
                ResourceRarity::Luxury => 25.0,
                ResourceRarity::Common => 15.0,
            };
        }
        value += rules.terrain(target.terrain).strategic_bonus as f32;
        for building in &target.buildings {
            value += 10.0 + 15.0 * building.level.saturating_sub(1) as f32;
        }
        if target.is_capital {
            value += 100.0;
        }
        if let Some(capital) = enemy_capital {
            value += (10 - grid.distance(target.id, capital)).max(0) as f32;
        }
        value
    }

    /// Difficulty-dependent pick: easy play is noisy and sometimes settles
    /// for the runner-up; hard play takes the top score as computed.
    fn pick_scored<T>(&self, rng: &mut CombatRng, scored: Vec<(f32, T)>) -> Option<T> {
        if scored.is_empty() {
            return None;
        }

        let mut scored: Vec<(f32, usize, T)> = scored
            .into_iter()
            .enumerate()
            .map(|(index, (score, item))| {
                let noisy = match self.difficulty {
                    Difficulty::Easy => score * rng.noise(0.7, 1.3),
                    Difficulty::Normal => score * rng.noise(0.9, 1.1),
                    Difficulty::Hard => score,
                };
                (noisy, index, item)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let pick_second =
            self.difficulty == Difficulty::Easy && scored.len() > 1 && rng.chance(0.3);
        let index = usize::from(pick_second);
        Some(scored.swap_remove(index).2)
    }
}

/// Rough group strength for attack planning: effective strength on the
/// contested terrain plus a small edge for fielding types the enemy is
/// vulnerable to.
fn estimated_power(
    rules: &CompiledRules,
    units: &[Unit],
    battleground: &TerritoryView,
    enemy: &[Unit],
) -> f32 {
    let base: f32 = units
        .iter()
        .map(|u| u.effective_strength(rules, Some(battleground.terrain)))
        .sum();
    let advantage: i32 = units
        .iter()
        .map(|u| {
            let exploits = enemy
                .iter()
                .any(|e| rules.unit_type(e.type_id).vulnerable_to.contains(&u.type_id));
            if exploits {
                2
            } else {
                0
            }
        })
        .sum();
    base + advantage as f32
}

/// Fixed strength-ratio to win-probability table.
pub fn win_probability(ratio: f32) -> f32 {
    if ratio >= 3.0 {
        0.90
    } else if ratio >= 2.0 {
        0.75
    } else if ratio >= 1.5 {
        0.65
    } else if ratio >= 1.0 {
        0.55
    } else if ratio >= 0.75 {
        0.40
    } else if ratio >= 0.5 {
        0.25
    } else {
        0.10
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use hexmarch_protocol::TerritoryId;

    use super::*;
    use crate::rules::{load_rules, RulesSource};
    use crate::world::{ResourceCost, TerritoryView};

    struct TestWorld {
        territories: HashMap<TerritoryId, TerritoryView>,
        edges: Vec<(TerritoryId, TerritoryId)>,
    }

    impl TerritoryProvider for TestWorld {
        fn territory(&self, id: TerritoryId) -> Option<TerritoryView> {
            self.territories.get(&id).cloned()
        }
    }

    impl TerritoryGrid for TestWorld {
        fn neighbors(&self, id: TerritoryId) -> Vec<TerritoryId> {
            self.edges
                .iter()
                .filter_map(|&(a, b)| {
                    if a == id {
                        Some(b)
                    } else if b == id {
                        Some(a)
                    } else {
                        None
                    }
                })
                .collect()
        }

        fn distance(&self, a: TerritoryId, b: TerritoryId) -> i32 {
            if a == b {
                0
            } else if self.neighbors(a).contains(&b) {
                1
            } else {
                2
            }
        }
    }

    struct TestTreasury {
        funds: ResourceCost,
    }

    impl Treasury for TestTreasury {
        fn can_afford(&self, cost: &ResourceCost) -> bool {
            cost.iter()
                .all(|(k, v)| self.funds.get(k).copied().unwrap_or(0) >= *v)
        }

        fn pay(&mut self, cost: &ResourceCost) -> bool {
            self.can_afford(cost)
        }
    }

    const AI: PlayerId = PlayerId(1);
    const FOE: PlayerId = PlayerId(0);
    const HOME: TerritoryId = TerritoryId(10);
    const BORDER: TerritoryId = TerritoryId(11);
    const CAPITAL: TerritoryId = TerritoryId(12);

    fn view(
        rules: &CompiledRules,
        id: TerritoryId,
        terrain: &str,
        owner: Option<PlayerId>,
        resource: Option<&str>,
        is_capital: bool,
    ) -> TerritoryView {
        TerritoryView {
            id,
            terrain: rules.terrain_id(terrain).unwrap(),
            owner,
            buildings: Vec::new(),
            resource: resource.map(|r| rules.resource_id(r).unwrap()),
            is_capital,
        }
    }

    fn spawn(roster: &mut UnitRoster, rules: &CompiledRules, type_name: &str, at: TerritoryId) {
        // Bypass training costs: tests place units directly.
        let mut treasury = AlwaysAfford;
        let mut workers = FreeWorkers;
        roster
            .train(
                rules,
                at,
                rules.unit_type_id(type_name).unwrap(),
                &mut treasury,
                &mut workers,
            )
            .expect("spawn");
    }

    struct AlwaysAfford;
    impl Treasury for AlwaysAfford {
        fn can_afford(&self, _cost: &ResourceCost) -> bool {
            true
        }
        fn pay(&mut self, _cost: &ResourceCost) -> bool {
            true
        }
    }

    struct FreeWorkers;
    impl crate::world::WorkerPool for FreeWorkers {
        fn convert_worker(&mut self, _territory: TerritoryId) -> bool {
            true
        }
    }

    #[test]
    fn probability_table_matches_ratio_bands() {
        assert_eq!(win_probability(3.5), 0.90);
        assert_eq!(win_probability(2.1), 0.75);
        assert_eq!(win_probability(1.6), 0.65);
        assert_eq!(win_probability(1.0), 0.55);
        assert_eq!(win_probability(0.8), 0.40);
        assert_eq!(win_probability(0.6), 0.25);
        assert_eq!(win_probability(0.3), 0.10);
    }

    #[test]
    fn no_attack_when_every_candidate_is_too_risky() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(5);
        let mut roster = UnitRoster::new();
        spawn(&mut roster, &rules, "warrior", HOME);
        // Three defenders make the ratio fall under every playable band.
        spawn(&mut roster, &rules, "warrior", BORDER);
        spawn(&mut roster, &rules, "warrior", BORDER);
        spawn(&mut roster, &rules, "warrior", BORDER);

        let world = TestWorld {
            territories: HashMap::from([
                (HOME, view(&rules, HOME, "plains", Some(AI), None, false)),
                (BORDER, view(&rules, BORDER, "plains", Some(FOE), None, false)),
            ]),
            edges: vec![(HOME, BORDER)],
        };

        let strategist = Strategist::new(Difficulty::Hard);
        let plan = strategist.select_attack_target(
            &rules,
            &mut rng,
            AI,
            &roster,
            &world,
            &world,
            &[HOME, BORDER],
        );
        assert!(plan.is_none());
    }

    #[test]
    fn capital_targets_outrank_equal_defenses() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(5);
        let mut roster = UnitRoster::new();
        spawn(&mut roster, &rules, "warrior", HOME);
        spawn(&mut roster, &rules, "warrior", HOME);

        let world = TestWorld {
            territories: HashMap::from([
                (HOME, view(&rules, HOME, "plains", Some(AI), None, false)),
                (BORDER, view(&rules, BORDER, "plains", Some(FOE), None, false)),
                (CAPITAL, view(&rules, CAPITAL, "plains", Some(FOE), None, true)),
            ]),
            edges: vec![(HOME, BORDER), (HOME, CAPITAL)],
        };

        let strategist = Strategist::new(Difficulty::Hard);
        let plan = strategist
            .select_attack_target(
                &rules,
                &mut rng,
                AI,
                &roster,
                &world,
                &world,
                &[HOME, BORDER, CAPITAL],
            )
            .expect("plan");
        assert_eq!(plan.target, CAPITAL);
        assert!(plan.win_probability >= MIN_ATTACK_PROBABILITY);
    }

    #[test]
    fn attack_selection_is_deterministic_given_seed() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut roster = UnitRoster::new();
        spawn(&mut roster, &rules, "warrior", HOME);
        spawn(&mut roster, &rules, "spearman", HOME);

        let world = TestWorld {
            territories: HashMap::from([
                (HOME, view(&rules, HOME, "plains", Some(AI), None, false)),
                (BORDER, view(&rules, BORDER, "plains", Some(FOE), None, false)),
                (CAPITAL, view(&rules, CAPITAL, "hills", Some(FOE), None, false)),
            ]),
            edges: vec![(HOME, BORDER), (HOME, CAPITAL)],
        };

        let strategist = Strategist::new(Difficulty::Easy);
        let pick = |seed: u64| {
            let mut rng = CombatRng::seed_from_u64(seed);
            strategist
                .select_attack_target(
                    &rules,
                    &mut rng,
                    AI,
                    &roster,
                    &world,
                    &world,
                    &[HOME, BORDER, CAPITAL],
                )
                .map(|p| p.target)
        };
        assert_eq!(pick(77), pick(77));
    }

    #[test]
    fn card_choice_prefers_counters_when_opponent_is_known() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(5);
        let mut roster = UnitRoster::new();
        spawn(&mut roster, &rules, "spearman", HOME);
        let group = roster.units_snapshot(HOME);
        let home_view = view(&rules, HOME, "plains", Some(AI), None, false);

        let available = vec![
            rules.card_id("frontal_assault").unwrap(),
            rules.card_id("shield_wall").unwrap(),
        ];
        let strategist = Strategist::new(Difficulty::Hard);
        let pick = strategist.select_card(
            &rules,
            &mut rng,
            &available,
            &group,
            &home_view,
            rules.card_id("cavalry_charge"),
            false,
        );
        assert_eq!(pick, rules.card_id("shield_wall"));
    }

    #[test]
    fn card_requirements_exclude_unfielded_types() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(5);
        let mut roster = UnitRoster::new();
        spawn(&mut roster, &rules, "warrior", HOME);
        let group = roster.units_snapshot(HOME);
        let home_view = view(&rules, HOME, "plains", Some(AI), None, false);

        // Cavalry charge needs horsemen or knights; none are fielded.
        let available = vec![rules.card_id("cavalry_charge").unwrap()];
        let strategist = Strategist::new(Difficulty::Normal);
        let pick = strategist.select_card(
            &rules,
            &mut rng,
            &available,
            &group,
            &home_view,
            None,
            true,
        );
        assert_eq!(pick, None);
    }

    #[test]
    fn training_favors_resource_synergy() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(5);
        let roster = UnitRoster::new();
        let treasury = TestTreasury {
            funds: ResourceCost::from([("production".into(), 500), ("gold".into(), 100)]),
        };
        let pasture = view(&rules, HOME, "plains", Some(AI), Some("horses"), false);

        let strategist = Strategist::new(Difficulty::Hard);
        let pick = strategist.decide_training(
            &rules,
            &mut rng,
            Era::Ancient,
            &pasture,
            &roster,
            &treasury,
        );
        assert_eq!(pick, rules.unit_type_id("horseman"));
    }

    #[test]
    fn training_degrades_to_none_when_broke() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(5);
        let roster = UnitRoster::new();
        let treasury = TestTreasury {
            funds: ResourceCost::new(),
        };
        let home_view = view(&rules, HOME, "plains", Some(AI), None, false);

        let strategist = Strategist::new(Difficulty::Normal);
        let pick = strategist.decide_training(
            &rules,
            &mut rng,
            Era::Medieval,
            &home_view,
            &roster,
            &treasury,
        );
        assert_eq!(pick, None);
    }

    #[test]
    fn owned_unit_counts_push_toward_variety() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let mut rng = CombatRng::seed_from_u64(5);
        let mut roster = UnitRoster::new();
        for _ in 0..8 {
            spawn(&mut roster, &rules, "spearman", HOME);
        }
        let treasury = TestTreasury {
            funds: ResourceCost::from([("production".into(), 500), ("gold".into(), 100)]),
        };
        let home_view = view(&rules, HOME, "plains", Some(AI), None, false);

        let strategist = Strategist::new(Difficulty::Hard);
        let pick = strategist.decide_training(
            &rules,
            &mut rng,
            Era::Ancient,
            &home_view,
            &roster,
            &treasury,
        );
        // Eight spearmen already: -40 drops them behind the warrior.
        assert_eq!(pick, rules.unit_type_id("warrior"));
    }
}
