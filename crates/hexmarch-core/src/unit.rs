use serde::{Deserialize, Serialize};

use hexmarch_protocol::{TerrainId, TerritoryId, UnitTypeId};

use crate::rules::CompiledRules;

pub const MAX_HEALTH: i32 = 100;
pub const EXPERIENCE_PER_LEVEL: i32 = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    pub type_id: UnitTypeId,
    /// Copied from the type at creation; replaced on upgrade.
    pub strength: i32,
    pub health: i32,
    pub experience: i32,
    pub level: u8,
    pub moves_left: i32,
    pub position: TerritoryId,
    /// Battle honors earned on promotion, named after the battlefield.
    pub specializations: Vec<String>,
}

impl Unit {
    pub fn new(
        type_id: UnitTypeId,
        position: TerritoryId,
        rules: &CompiledRules,
        movement_bonus: i32,
    ) -> Self {
        let utype = rules.unit_type(type_id);
        Self {
            type_id,
            strength: utype.strength,
            health: MAX_HEALTH,
            experience: 0,
            level: 1,
            moves_left: utype.moves + movement_bonus,
            position,
            specializations: Vec::new(),
        }
    }

    /// Strength this unit contributes to a round, before ability bonuses:
    /// base scaled by health and veterancy, plus the type's affinity for
    /// the terrain it fights on.
    pub fn effective_strength(&self, rules: &CompiledRules, terrain: Option<TerrainId>) -> f32 {
        let health_factor = self.health as f32 / MAX_HEALTH as f32;
        let veterancy = 1.0 + 0.1 * (self.level.saturating_sub(1)) as f32;
        let terrain_bonus = terrain
            .map(|t| rules.unit_type(self.type_id).terrain_bonus(t))
            .unwrap_or(0);
        self.strength as f32 * health_factor * veterancy + terrain_bonus as f32
    }

    /// Reduces health by `amount` percent. Returns true when the unit is
    /// destroyed.
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        self.health = (self.health - amount.max(0)).max(0);
        self.health == 0
    }

    /// Adds experience, converting each full 100 into a level. Returns the
    /// number of levels gained.
    pub fn gain_experience(&mut self, amount: i32) -> u8 {
        self.experience += amount.max(0);
        let mut levels = 0;
        while self.experience >= EXPERIENCE_PER_LEVEL {
            self.experience -= EXPERIENCE_PER_LEVEL;
            self.level = self.level.saturating_add(1);
            levels += 1;
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{load_rules, RulesSource};

    #[test]
    fn effective_strength_scales_with_health_and_level() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let warrior = rules.unit_type_id("warrior").unwrap();
        let mut unit = Unit::new(warrior, TerritoryId(1), &rules, 0);

        assert_eq!(unit.effective_strength(&rules, None), 6.0);

        unit.health = 50;
        assert_eq!(unit.effective_strength(&rules, None), 3.0);

        unit.health = 100;
        unit.level = 3;
        let expected = 6.0 * 1.2;
        assert!((unit.effective_strength(&rules, None) - expected).abs() < 1e-6);
    }

    #[test]
    fn terrain_affinity_adds_flat_bonus() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let archer = rules.unit_type_id("archer").unwrap();
        let hills = rules.terrain_id("hills").unwrap();
        let plains = rules.terrain_id("plains").unwrap();
        let unit = Unit::new(archer, TerritoryId(1), &rules, 0);

        assert_eq!(unit.effective_strength(&rules, Some(hills)), 6.0);
        assert_eq!(unit.effective_strength(&rules, Some(plains)), 4.0);
    }

    #[test]
    fn experience_rolls_over_into_levels() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let warrior = rules.unit_type_id("warrior").unwrap();
        let mut unit = Unit::new(warrior, TerritoryId(1), &rules, 0);

        assert_eq!(unit.gain_experience(95), 0);
        assert_eq!(unit.level, 1);
        assert_eq!(unit.gain_experience(10), 1);
        assert_eq!(unit.level, 2);
        assert_eq!(unit.experience, 5);
    }

    #[test]
    fn damage_floors_at_zero_and_reports_death() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let warrior = rules.unit_type_id("warrior").unwrap();
        let mut unit = Unit::new(warrior, TerritoryId(1), &rules, 0);

        assert!(!unit.apply_damage(60));
        assert_eq!(unit.health, 40);
        assert!(unit.apply_damage(75));
        assert_eq!(unit.health, 0);
    }
}
