use std::collections::BTreeMap;

use hexmarch_protocol::{
    BuildingId, CardId, DoctrineId, ResourceId, TerrainId, UnitTypeId,
};
use serde::Deserialize;
use thiserror::Error;

use crate::rules::CompiledRules;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing referenced id: {0}")]
    MissingId(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub enum RulesSource {
    Embedded,
    Path(String),
}

#[derive(Debug, Deserialize)]
struct RawRules {
    terrains: BTreeMap<String, crate::rules::RawTerrainType>,
    units: BTreeMap<String, crate::rules::RawUnitType>,
    cards: BTreeMap<String, crate::rules::RawCardType>,
    doctrines: BTreeMap<String, crate::rules::RawDoctrineType>,
    buildings: BTreeMap<String, crate::rules::RawBuildingType>,
    resources: BTreeMap<String, crate::rules::RawResourceType>,
}

pub fn load_rules(source: RulesSource) -> Result<CompiledRules, RulesError> {
    let raw: RawRules = match source {
        RulesSource::Embedded => {
            let terrain_yaml = include_str!("../../data/base/terrain.yaml");
            let units_yaml = include_str!("../../data/base/units.yaml");
            let cards_yaml = include_str!("../../data/base/cards.yaml");
            let doctrines_yaml = include_str!("../../data/base/doctrines.yaml");
            let buildings_yaml = include_str!("../../data/base/buildings.yaml");
            let resources_yaml = include_str!("../../data/base/resources.yaml");

            parse_raw_rules(
                terrain_yaml,
                units_yaml,
                cards_yaml,
                doctrines_yaml,
                buildings_yaml,
                resources_yaml,
            )?
        }
        RulesSource::Path(path) => {
            let terrain_yaml = std::fs::read_to_string(format!("{path}/terrain.yaml"))?;
            let units_yaml = std::fs::read_to_string(format!("{path}/units.yaml"))?;
            let cards_yaml = std::fs::read_to_string(format!("{path}/cards.yaml"))?;
            let doctrines_yaml = std::fs::read_to_string(format!("{path}/doctrines.yaml"))?;
            let buildings_yaml = std::fs::read_to_string(format!("{path}/buildings.yaml"))?;
            let resources_yaml = std::fs::read_to_string(format!("{path}/resources.yaml"))?;
            parse_raw_rules(
                &terrain_yaml,
                &units_yaml,
                &cards_yaml,
                &doctrines_yaml,
                &buildings_yaml,
                &resources_yaml,
            )?
        }
    };

    compile_rules(raw)
}

fn parse_raw_rules(
    terrain_yaml: &str,
    units_yaml: &str,
    cards_yaml: &str,
    doctrines_yaml: &str,
    buildings_yaml: &str,
    resources_yaml: &str,
) -> Result<RawRules, RulesError> {
    Ok(RawRules {
        terrains: serde_yaml::from_str(terrain_yaml)?,
        units: serde_yaml::from_str(units_yaml)?,
        cards: serde_yaml::from_str(cards_yaml)?,
        doctrines: serde_yaml::from_str(doctrines_yaml)?,
        buildings: serde_yaml::from_str(buildings_yaml)?,
        resources: serde_yaml::from_str(resources_yaml)?,
    })
}

fn compile_rules(raw: RawRules) -> Result<CompiledRules, RulesError> {
    // Id maps first: catalog entries cross-reference each other by data id,
    // so every key must be known before any entry is compiled.
    let terrain_ids = raw
        .terrains
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), TerrainId::new(i as u16)))
        .collect::<std::collections::HashMap<_, _>>();
    let unit_type_ids = raw
        .units
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), UnitTypeId::new(i as u16)))
        .collect::<std::collections::HashMap<_, _>>();
    let card_ids = raw
        .cards
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), CardId::new(i as u16)))
        .collect::<std::collections::HashMap<_, _>>();
    let doctrine_ids = raw
        .doctrines
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), DoctrineId::new(i as u16)))
        .collect::<std::collections::HashMap<_, _>>();
    let building_ids = raw
        .buildings
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), BuildingId::new(i as u16)))
        .collect::<std::collections::HashMap<_, _>>();
    let resource_ids = raw
        .resources
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), ResourceId::new(i as u16)))
        .collect::<std::collections::HashMap<_, _>>();

    let terrains = raw
        .terrains
        .into_values()
        .map(|t| t.compile())
        .collect::<Vec<_>>();
    let unit_types = raw
        .units
        .into_values()
        .map(|u| u.compile(&terrain_ids, &unit_type_ids, &resource_ids))
        .collect::<Result<Vec<_>, _>>()?;
    let cards = raw
        .cards
        .into_values()
        .map(|c| c.compile(&card_ids, &terrain_ids, &unit_type_ids))
        .collect::<Result<Vec<_>, _>>()?;
    let doctrines = raw
        .doctrines
        .into_values()
        .map(|d| d.compile(&card_ids, &unit_type_ids))
        .collect::<Result<Vec<_>, _>>()?;
    let buildings = raw
        .buildings
        .into_values()
        .map(|b| b.compile())
        .collect::<Vec<_>>();
    let resources = raw
        .resources
        .into_values()
        .map(|r| r.compile())
        .collect::<Vec<_>>();

    Ok(CompiledRules {
        terrains,
        unit_types,
        cards,
        doctrines,
        buildings,
        resources,
        terrain_ids,
        unit_type_ids,
        card_ids,
        doctrine_ids,
        building_ids,
        resource_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CardTier, ResourceRarity, SpecialEffect};

    #[test]
    fn embedded_rules_load_and_cross_references_resolve() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");

        assert!(!rules.terrains.is_empty());
        assert!(!rules.unit_types.is_empty());
        assert!(!rules.cards.is_empty());

        // Every cross-referenced id survived compilation in bounds.
        for card in &rules.cards {
            for counter in &card.counters {
                assert!((counter.raw as usize) < rules.cards.len());
            }
        }
        for unit in &rules.unit_types {
            if let Some(target) = unit.upgrades_to {
                assert!((target.raw as usize) < rules.unit_types.len());
            }
        }
    }

    #[test]
    fn baseline_cards_match_expected_stats() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");

        let assault = rules.card(rules.card_id("frontal_assault").unwrap());
        assert_eq!(assault.strength, 2);
        assert_eq!(assault.tier, CardTier::Basic);
        assert!(!assault.defensive);
        assert!(assault.counters.is_empty());

        let stance = rules.card(rules.card_id("defensive_stance").unwrap());
        assert_eq!(stance.strength, 2);
        assert!(stance.defensive);

        let raid = rules.card(rules.card_id("night_raid").unwrap());
        assert_eq!(raid.effect, Some(SpecialEffect::Surprise));
    }

    #[test]
    fn terrain_defense_ladder_is_mountains_hills_forest() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let bonus = |name: &str| rules.terrain(rules.terrain_id(name).unwrap()).defense_bonus;
        assert_eq!(bonus("mountains"), 3);
        assert_eq!(bonus("hills"), 2);
        assert_eq!(bonus("forest"), 1);
        assert_eq!(bonus("plains"), 0);
    }

    #[test]
    fn partial_doctrine_defaults_all_modifiers_to_neutral() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let levy = rules.doctrine(rules.doctrine_id("horde_levy").unwrap());
        assert_eq!(levy.attack_bonus, 0);
        assert_eq!(levy.defense_bonus, 0);
        assert_eq!(levy.movement_bonus, 1);
        assert_eq!(levy.maintenance_percent, -20);
        assert!(levy.unlocks_cards.is_empty());
    }

    #[test]
    fn strategic_resources_are_tagged() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let iron = rules.resource(rules.resource_id("iron").unwrap());
        assert_eq!(iron.rarity, ResourceRarity::Strategic);
    }

    #[test]
    fn era_filter_excludes_later_unit_types() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let warrior = rules.unit_type_id("warrior").unwrap();
        let swordsman = rules.unit_type_id("swordsman").unwrap();
        let knight = rules.unit_type_id("knight").unwrap();

        let ancient = rules.unit_types_in_era(crate::rules::Era::Ancient);
        assert!(ancient.contains(&warrior));
        assert!(!ancient.contains(&swordsman));

        let classical = rules.unit_types_in_era(crate::rules::Era::Classical);
        assert!(classical.contains(&swordsman));
        assert!(!classical.contains(&knight));
    }

    #[test]
    fn card_requirement_filter_respects_fielded_units() {
        let rules = load_rules(RulesSource::Embedded).expect("rules load");
        let spearman = rules.unit_type_id("spearman").unwrap();
        let shield_wall = rules.card_id("shield_wall").unwrap();
        let flanking = rules.card_id("flanking_maneuver").unwrap();

        let playable = rules.cards_playable_with(&[spearman]);
        assert!(playable.contains(&shield_wall));
        assert!(!playable.contains(&flanking));
    }
}
