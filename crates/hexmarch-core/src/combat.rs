//! Round and combat resolution: pure scoring over card picks, unit
//! snapshots and territory views. All randomness comes through the
//! injected [`CombatRng`].

use hexmarch_protocol::{CardId, CombatOutcome, RoundRecord, Side};

use crate::{
    rng::CombatRng,
    rules::{CardType, CompiledRules, SpecialEffect, UnitAbility},
    unit::Unit,
    world::TerritoryView,
};

pub const TOTAL_ROUNDS: u8 = 3;
pub const FULL_CONQUEST_THRESHOLD: i32 = 100;
pub const DRAW_CONTROL: i32 = 10;

pub const INVALID_CARD_MESSAGE: &str = "Invalid card selection";

/// Everything one round is scored from. Unit slices are the snapshots
/// taken at combat start, not the live roster.
pub struct RoundContext<'a> {
    pub attacker_card: Option<CardId>,
    pub defender_card: Option<CardId>,
    pub attacker_units: &'a [Unit],
    pub defender_units: &'a [Unit],
    pub attacker_territory: &'a TerritoryView,
    pub defender_territory: &'a TerritoryView,
    pub round: u8,
    pub total_rounds: u8,
}

/// Aggregate of three resolved rounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombatSummary {
    pub result: CombatOutcome,
    pub attacker_casualties: u8,
    pub defender_casualties: u8,
    pub territory_control: i32,
}

impl CombatSummary {
    /// Control at or past the threshold transfers the territory outright.
    pub fn is_full_conquest(&self) -> bool {
        self.result == CombatOutcome::Victory
            && self.territory_control >= FULL_CONQUEST_THRESHOLD
    }
}

/// Scores one round. A side whose card id did not resolve scores 0 and
/// forfeits the round to its opponent.
pub fn resolve_round(
    rules: &CompiledRules,
    ctx: &RoundContext<'_>,
    rng: &mut CombatRng,
) -> RoundRecord {
    let attacker_card = ctx.attacker_card.map(|id| rules.card(id));
    let defender_card = ctx.defender_card.map(|id| rules.card(id));

    let attacker_score = attacker_card
        .map(|card| score_side(rules, ctx, card, Side::Attacker, rng))
        .unwrap_or(0.0);
    let defender_score = defender_card
        .map(|card| score_side(rules, ctx, card, Side::Defender, rng))
        .unwrap_or(0.0);

    let winner = match (attacker_card, defender_card) {
        (Some(_), None) => Some(Side::Attacker),
        (None, Some(_)) => Some(Side::Defender),
        (None, None) => None,
        (Some(_), Some(_)) => {
            let diff = attacker_score - defender_score;
            if diff.abs() < 1e-6 {
                None
            } else if diff > 0.0 {
                Some(Side::Attacker)
            } else {
                Some(Side::Defender)
            }
        }
    };

    let (attacker_casualties, defender_casualties) = match winner {
        Some(Side::Attacker) => {
            let (winner_cas, loser_cas) = casualties(attacker_score, defender_score);
            (winner_cas, loser_cas)
        }
        Some(Side::Defender) => {
            let (winner_cas, loser_cas) = casualties(defender_score, attacker_score);
            (loser_cas, winner_cas)
        }
        None => (10, 10),
    };

    let message = if attacker_card.is_none() || defender_card.is_none() {
        INVALID_CARD_MESSAGE.to_string()
    } else {
        match winner {
            Some(Side::Attacker) => {
                format!("{} carries the field", attacker_card.expect("scored").name)
            }
            Some(Side::Defender) => {
                format!("{} holds the line", defender_card.expect("scored").name)
            }
            None => "The round ends in a stalemate".to_string(),
        }
    };

    RoundRecord {
        round: ctx.round,
        message,
        attacker_score,
        defender_score,
        winner,
        attacker_casualties,
        defender_casualties,
    }
}

/// Folds a full battle log into the session outcome.
pub fn resolve_combat(log: &[RoundRecord]) -> CombatSummary {
    let attacker_wins = log
        .iter()
        .filter(|r| r.winner == Some(Side::Attacker))
        .count() as i32;
    let defender_wins = log
        .iter()
        .filter(|r| r.winner == Some(Side::Defender))
        .count() as i32;

    let attacker_casualties = clamp_percent_sum(log.iter().map(|r| r.attacker_casualties));
    let defender_casualties = clamp_percent_sum(log.iter().map(|r| r.defender_casualties));

    let result = if attacker_wins > defender_wins {
        CombatOutcome::Victory
    } else if defender_wins > attacker_wins {
        CombatOutcome::Defeat
    } else {
        CombatOutcome::Draw
    };

    let territory_control = match result {
        CombatOutcome::Victory => {
            let casualty_edge =
                (defender_casualties as i32 - attacker_casualties as i32).div_euclid(5);
            30 + 20 * (attacker_wins - 1) + casualty_edge
        }
        CombatOutcome::Draw => DRAW_CONTROL,
        CombatOutcome::Defeat => 0,
    };

    CombatSummary {
        result,
        attacker_casualties,
        defender_casualties,
        territory_control,
    }
}

fn score_side(
    rules: &CompiledRules,
    ctx: &RoundContext<'_>,
    card: &CardType,
    side: Side,
    rng: &mut CombatRng,
) -> f32 {
    let (territory, units, enemy_units, opponent_card) = match side {
        Side::Attacker => (
            ctx.attacker_territory,
            ctx.attacker_units,
            ctx.defender_units,
            ctx.defender_card,
        ),
        Side::Defender => (
            ctx.defender_territory,
            ctx.defender_units,
            ctx.attacker_units,
            ctx.attacker_card,
        ),
    };

    let mut score = card.strength as f32;

    if let Some(opponent) = opponent_card {
        if card.counters_card(opponent) {
            score += 2.0;
        }
    }
    if card.favors_terrain(territory.terrain) {
        score += 1.0;
    }
    if side == Side::Defender {
        if card.defensive {
            score += 1.0;
        }
        score += fortification_bonus(rules, territory) as f32;
        score += rules.terrain(territory.terrain).defense_bonus as f32;
    }

    score += group_strength(rules, units, territory, enemy_units, side == Side::Attacker) / 5.0;
    score += special_effect_bonus(card, ctx.round, ctx.total_rounds, rng);
    score
}

/// Defensive buildings each add their level to the defender's score.
pub fn fortification_bonus(rules: &CompiledRules, territory: &TerritoryView) -> i32 {
    territory
        .buildings
        .iter()
        .filter(|b| rules.building(b.id).defensive)
        .map(|b| b.level as i32)
        .sum()
}

/// Summed effective strength of a unit group, including ability bonuses.
pub fn group_strength(
    rules: &CompiledRules,
    units: &[Unit],
    territory: &TerritoryView,
    enemy_units: &[Unit],
    attacking: bool,
) -> f32 {
    let enemy_fields_cavalry = enemy_units
        .iter()
        .any(|u| rules.unit_type(u.type_id).ability == Some(UnitAbility::Charge));

    units
        .iter()
        .map(|unit| {
            unit.effective_strength(rules, Some(territory.terrain))
                + ability_bonus(rules, unit, units, enemy_fields_cavalry, attacking)
        })
        .sum()
}

fn ability_bonus(
    rules: &CompiledRules,
    unit: &Unit,
    group: &[Unit],
    enemy_fields_cavalry: bool,
    attacking: bool,
) -> f32 {
    match rules.unit_type(unit.type_id).ability {
        Some(UnitAbility::AntiCavalry) if enemy_fields_cavalry => 3.0,
        Some(UnitAbility::Charge) if attacking => 2.0,
        Some(UnitAbility::VolleyFire) if !attacking => 3.0,
        Some(UnitAbility::FormationFighting) => group
            .iter()
            .filter(|other| other.type_id == unit.type_id)
            .count() as f32,
        _ => 0.0,
    }
}

fn special_effect_bonus(card: &CardType, round: u8, total_rounds: u8, rng: &mut CombatRng) -> f32 {
    match card.effect {
        Some(SpecialEffect::Initiative) if round == 1 => 3.0,
        Some(SpecialEffect::Surprise) if round == total_rounds => 4.0,
        Some(SpecialEffect::Random) => rng.roll_range(1, 5) as f32,
        Some(SpecialEffect::HeroUnit) => 3.0,
        _ => 0.0,
    }
}

/// Loss percentages for one decisive round, given the two scores.
fn casualties(winner_score: f32, loser_score: f32) -> (u8, u8) {
    let diff = winner_score - loser_score;
    let loser = (10.0 + 5.0 * diff).min(30.0);
    let winner = (15.0 - 2.0 * diff).max(5.0);
    (clamp_percent(winner), clamp_percent(loser))
}

fn clamp_percent(value: f32) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn clamp_percent_sum(values: impl Iterator<Item = u8>) -> u8 {
    values.map(|v| v as u32).sum::<u32>().min(100) as u8
}
