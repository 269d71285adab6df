use std::collections::{BTreeMap, HashMap};

use hexmarch_protocol::{
    BuildingId, CardId, DataId, DoctrineId, ResourceId, TerrainId, UnitTypeId,
};
use serde::Deserialize;

use crate::world::ResourceCost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Era {
    Ancient,
    Classical,
    Medieval,
}

impl Era {
    pub fn index(self) -> u8 {
        match self {
            Era::Ancient => 0,
            Era::Classical => 1,
            Era::Medieval => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitAbility {
    AntiCavalry,
    Charge,
    VolleyFire,
    FormationFighting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTier {
    Basic,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialEffect {
    Initiative,
    Surprise,
    Random,
    HeroUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRarity {
    Common,
    Luxury,
    Strategic,
}

#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub terrains: Vec<TerrainType>,
    pub unit_types: Vec<UnitType>,
    pub cards: Vec<CardType>,
    pub doctrines: Vec<DoctrineType>,
    pub buildings: Vec<BuildingType>,
    pub resources: Vec<ResourceType>,

    pub terrain_ids: HashMap<DataId, TerrainId>,
    pub unit_type_ids: HashMap<DataId, UnitTypeId>,
    pub card_ids: HashMap<DataId, CardId>,
    pub doctrine_ids: HashMap<DataId, DoctrineId>,
    pub building_ids: HashMap<DataId, BuildingId>,
    pub resource_ids: HashMap<DataId, ResourceId>,
}

impl CompiledRules {
    pub fn terrain(&self, id: TerrainId) -> &TerrainType {
        &self.terrains[id.raw as usize]
    }

    pub fn unit_type(&self, id: UnitTypeId) -> &UnitType {
        &self.unit_types[id.raw as usize]
    }

    pub fn card(&self, id: CardId) -> &CardType {
        &self.cards[id.raw as usize]
    }

    pub fn doctrine(&self, id: DoctrineId) -> &DoctrineType {
        &self.doctrines[id.raw as usize]
    }

    pub fn building(&self, id: BuildingId) -> &BuildingType {
        &self.buildings[id.raw as usize]
    }

    pub fn resource(&self, id: ResourceId) -> &ResourceType {
        &self.resources[id.raw as usize]
    }

    pub fn terrain_id(&self, data_id: &str) -> Option<TerrainId> {
        self.terrain_ids.get(data_id).copied()
    }

    pub fn unit_type_id(&self, data_id: &str) -> Option<UnitTypeId> {
        self.unit_type_ids.get(data_id).copied()
    }

    pub fn card_id(&self, data_id: &str) -> Option<CardId> {
        self.card_ids.get(data_id).copied()
    }

    pub fn doctrine_id(&self, data_id: &str) -> Option<DoctrineId> {
        self.doctrine_ids.get(data_id).copied()
    }

    pub fn building_id(&self, data_id: &str) -> Option<BuildingId> {
        self.building_ids.get(data_id).copied()
    }

    pub fn resource_id(&self, data_id: &str) -> Option<ResourceId> {
        self.resource_ids.get(data_id).copied()
    }

    /// Unit types trainable at or before the given era, in id order.
    pub fn unit_types_in_era(&self, era: Era) -> Vec<UnitTypeId> {
        self.unit_types
            .iter()
            .enumerate()
            .filter(|(_, u)| u.era.index() <= era.index())
            .map(|(i, _)| UnitTypeId::new(i as u16))
            .collect()
    }

    /// Cards whose unit requirement is empty or met by at least one of the
    /// fielded unit types, in id order.
    pub fn cards_playable_with(&self, fielded: &[UnitTypeId]) -> Vec<CardId> {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.requires_units.is_empty()
                    || c.requires_units.iter().any(|req| fielded.contains(req))
            })
            .map(|(i, _)| CardId::new(i as u16))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTerrainType {
    pub name: String,
    #[serde(default)]
    pub defense_bonus: i32,
    #[serde(default)]
    pub strategic_bonus: i32,
}

impl RawTerrainType {
    pub fn compile(self) -> TerrainType {
        TerrainType {
            name: self.name,
            defense_bonus: self.defense_bonus,
            strategic_bonus: self.strategic_bonus,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TerrainType {
    pub name: String,
    /// Flat bonus to the defender's round score when fighting here.
    pub defense_bonus: i32,
    /// How much the AI values holding this terrain.
    pub strategic_bonus: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUnitType {
    pub name: String,
    pub era: Era,
    pub strength: i32,
    pub cost: ResourceCost,
    #[serde(default = "default_workers_required")]
    pub workers_required: u8,
    pub maintenance: i32,
    pub moves: i32,
    #[serde(default)]
    pub ability: Option<UnitAbility>,
    #[serde(default)]
    pub terrain_effectiveness: BTreeMap<String, i32>,
    #[serde(default)]
    pub upgrades_to: Option<String>,
    #[serde(default)]
    pub vulnerable_to: Vec<String>,
    #[serde(default)]
    pub requires_resource: Option<String>,
}

fn default_workers_required() -> u8 {
    1
}

impl RawUnitType {
    pub fn compile(
        self,
        terrain_ids: &HashMap<DataId, TerrainId>,
        unit_type_ids: &HashMap<DataId, UnitTypeId>,
        resource_ids: &HashMap<DataId, ResourceId>,
    ) -> Result<UnitType, crate::rules::RulesError> {
        let terrain_effectiveness = self
            .terrain_effectiveness
            .into_iter()
            .map(|(terrain, bonus)| {
                terrain_ids
                    .get(&terrain)
                    .copied()
                    .map(|id| (id, bonus))
                    .ok_or(crate::rules::RulesError::MissingId(terrain))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let upgrades_to = match self.upgrades_to {
            Some(id) => Some(
                *unit_type_ids
                    .get(&id)
                    .ok_or(crate::rules::RulesError::MissingId(id))?,
            ),
            None => None,
        };
        let vulnerable_to = self
            .vulnerable_to
            .into_iter()
            .map(|id| {
                unit_type_ids
                    .get(&id)
                    .copied()
                    .ok_or(crate::rules::RulesError::MissingId(id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let requires_resource = match self.requires_resource {
            Some(id) => Some(
                *resource_ids
                    .get(&id)
                    .ok_or(crate::rules::RulesError::MissingId(id))?,
            ),
            None => None,
        };
        Ok(UnitType {
            name: self.name,
            era: self.era,
            strength: self.strength,
            cost: self.cost,
            workers_required: self.workers_required.max(1),
            maintenance: self.maintenance,
            moves: self.moves,
            ability: self.ability,
            terrain_effectiveness,
            upgrades_to,
            vulnerable_to,
            requires_resource,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UnitType {
    pub name: String,
    pub era: Era,
    pub strength: i32,
    pub cost: ResourceCost,
    pub workers_required: u8,
    pub maintenance: i32,
    pub moves: i32,
    pub ability: Option<UnitAbility>,
    pub terrain_effectiveness: Vec<(TerrainId, i32)>,
    pub upgrades_to: Option<UnitTypeId>,
    pub vulnerable_to: Vec<UnitTypeId>,
    pub requires_resource: Option<ResourceId>,
}

impl UnitType {
    pub fn terrain_bonus(&self, terrain: TerrainId) -> i32 {
        self.terrain_effectiveness
            .iter()
            .find(|(id, _)| *id == terrain)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCardType {
    pub name: String,
    pub tier: CardTier,
    pub strength: i32,
    #[serde(default)]
    pub defensive: bool,
    #[serde(default)]
    pub counters: Vec<String>,
    #[serde(default)]
    pub terrains: Vec<String>,
    #[serde(default)]
    pub requires_units: Vec<String>,
    #[serde(default)]
    pub effect: Option<SpecialEffect>,
}

impl RawCardType {
    pub fn compile(
        self,
        card_ids: &HashMap<DataId, CardId>,
        terrain_ids: &HashMap<DataId, TerrainId>,
        unit_type_ids: &HashMap<DataId, UnitTypeId>,
    ) -> Result<CardType, crate::rules::RulesError> {
        let counters = self
            .counters
            .into_iter()
            .map(|id| {
                card_ids
                    .get(&id)
                    .copied()
                    .ok_or(crate::rules::RulesError::MissingId(id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let terrains = self
            .terrains
            .into_iter()
            .map(|id| {
                terrain_ids
                    .get(&id)
                    .copied()
                    .ok_or(crate::rules::RulesError::MissingId(id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let requires_units = self
            .requires_units
            .into_iter()
            .map(|id| {
                unit_type_ids
                    .get(&id)
                    .copied()
                    .ok_or(crate::rules::RulesError::MissingId(id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CardType {
            name: self.name,
            tier: self.tier,
            strength: self.strength,
            defensive: self.defensive,
            counters,
            terrains,
            requires_units,
            effect: self.effect,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CardType {
    pub name: String,
    pub tier: CardTier,
    pub strength: i32,
    pub defensive: bool,
    pub counters: Vec<CardId>,
    pub terrains: Vec<TerrainId>,
    /// Playable only while fielding at least one of these types. Empty
    /// means no requirement.
    pub requires_units: Vec<UnitTypeId>,
    pub effect: Option<SpecialEffect>,
}

impl CardType {
    pub fn counters_card(&self, other: CardId) -> bool {
        self.counters.contains(&other)
    }

    pub fn favors_terrain(&self, terrain: TerrainId) -> bool {
        self.terrains.contains(&terrain)
    }
}

/// Doctrine modifiers all default to neutral, so a partial doctrine entry
/// never leaves a field undefined.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDoctrineType {
    pub name: String,
    #[serde(default)]
    pub attack_bonus: i32,
    #[serde(default)]
    pub defense_bonus: i32,
    #[serde(default)]
    pub movement_bonus: i32,
    #[serde(default)]
    pub maintenance_percent: i32,
    #[serde(default)]
    pub unlocks_cards: Vec<String>,
    #[serde(default)]
    pub unlocks_units: Vec<String>,
}

impl RawDoctrineType {
    pub fn compile(
        self,
        card_ids: &HashMap<DataId, CardId>,
        unit_type_ids: &HashMap<DataId, UnitTypeId>,
    ) -> Result<DoctrineType, crate::rules::RulesError> {
        let unlocks_cards = self
            .unlocks_cards
            .into_iter()
            .map(|id| {
                card_ids
                    .get(&id)
                    .copied()
                    .ok_or(crate::rules::RulesError::MissingId(id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let unlocks_units = self
            .unlocks_units
            .into_iter()
            .map(|id| {
                unit_type_ids
                    .get(&id)
                    .copied()
                    .ok_or(crate::rules::RulesError::MissingId(id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DoctrineType {
            name: self.name,
            attack_bonus: self.attack_bonus,
            defense_bonus: self.defense_bonus,
            movement_bonus: self.movement_bonus,
            maintenance_percent: self.maintenance_percent,
            unlocks_cards,
            unlocks_units,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DoctrineType {
    pub name: String,
    /// Percent bonus to estimated attacking strength.
    pub attack_bonus: i32,
    /// Percent bonus to estimated defending strength.
    pub defense_bonus: i32,
    /// Flat extra moves per turn for every unit.
    pub movement_bonus: i32,
    /// Percent delta on total maintenance (negative reduces upkeep).
    pub maintenance_percent: i32,
    pub unlocks_cards: Vec<CardId>,
    pub unlocks_units: Vec<UnitTypeId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBuildingType {
    pub name: String,
    #[serde(default)]
    pub defensive: bool,
}

impl RawBuildingType {
    pub fn compile(self) -> BuildingType {
        BuildingType {
            name: self.name,
            defensive: self.defensive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildingType {
    pub name: String,
    /// Defensive buildings add their level to the defender's round score.
    pub defensive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawResourceType {
    pub name: String,
    pub rarity: ResourceRarity,
}

impl RawResourceType {
    pub fn compile(self) -> ResourceType {
        ResourceType {
            name: self.name,
            rarity: self.rarity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceType {
    pub name: String,
    pub rarity: ResourceRarity,
}
