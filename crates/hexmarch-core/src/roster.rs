use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use hexmarch_protocol::{DoctrineId, TerritoryId, UnitId, UnitTypeId};

use crate::{
    rules::CompiledRules,
    unit::Unit,
    world::{ResourceCost, TerritoryGrid, Treasury, WorkerPool},
};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("unknown unit")]
    UnknownUnit,
    #[error("unit is not in that territory")]
    WrongTerritory,
    #[error("unit has no moves left")]
    NoMovesLeft,
    #[error("destination is not adjacent")]
    NotAdjacent,
    #[error("not enough resources")]
    NotEnoughResources,
    #[error("no worker available for conversion")]
    NoWorkerAvailable,
    #[error("unit type has no upgrade target")]
    NoUpgradeTarget,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    unit: Option<Unit>,
}

/// All standing units, stored generationally and indexed by territory.
///
/// - Stable iteration order: ascending slot index.
/// - A unit belongs to exactly one territory at a time; the index is kept
///   in sync by every mutation that relocates or removes a unit.
#[derive(Clone, Debug, Default)]
pub struct UnitRoster {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_territory: BTreeMap<TerritoryId, Vec<UnitId>>,
    current_doctrine: Option<DoctrineId>,
}

impl UnitRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation == id.generation {
            slot.unit.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation == id.generation {
            slot.unit.as_mut()
        } else {
            None
        }
    }

    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let unit = slot.unit.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.unindex(unit.position, id);
        Some(unit)
    }

    pub fn iter_ordered(&self) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let unit = slot.unit.as_ref()?;
            Some((UnitId::new(index as u32, slot.generation), unit))
        })
    }

    /// Unit ids stationed in `territory`, in training order.
    pub fn units_in(&self, territory: TerritoryId) -> &[UnitId] {
        self.by_territory
            .get(&territory)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Cloned unit states for `territory`, the snapshot combat scores from.
    pub fn units_snapshot(&self, territory: TerritoryId) -> Vec<Unit> {
        self.units_in(territory)
            .iter()
            .filter_map(|&id| self.get(id).cloned())
            .collect()
    }

    /// Territories currently holding at least one unit, ascending.
    pub fn territories_with_units(&self) -> Vec<TerritoryId> {
        self.by_territory
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(&t, _)| t)
            .collect()
    }

    pub fn count_of_type(&self, type_id: UnitTypeId) -> usize {
        self.iter_ordered()
            .filter(|(_, u)| u.type_id == type_id)
            .count()
    }

    pub fn current_doctrine(&self) -> Option<DoctrineId> {
        self.current_doctrine
    }

    /// Adopts a doctrine (or reverts to none). At most one is current.
    pub fn set_doctrine(&mut self, doctrine: Option<DoctrineId>) {
        self.current_doctrine = doctrine;
    }

    pub fn movement_bonus(&self, rules: &CompiledRules) -> i32 {
        self.current_doctrine
            .map(|d| rules.doctrine(d).movement_bonus)
            .unwrap_or(0)
    }

    /// Trains a new unit in `territory`.
    ///
    /// Affordability is checked before any side effect, so a failure never
    /// leaves a worker consumed or resources partially paid.
    pub fn train(
        &mut self,
        rules: &CompiledRules,
        territory: TerritoryId,
        type_id: UnitTypeId,
        treasury: &mut dyn Treasury,
        workers: &mut dyn WorkerPool,
    ) -> Result<UnitId, RosterError> {
        let utype = rules.unit_type(type_id);
        if !treasury.can_afford(&utype.cost) {
            return Err(RosterError::NotEnoughResources);
        }
        for _ in 0..utype.workers_required {
            if !workers.convert_worker(territory) {
                return Err(RosterError::NoWorkerAvailable);
            }
        }
        if !treasury.pay(&utype.cost) {
            return Err(RosterError::NotEnoughResources);
        }

        let unit = Unit::new(type_id, territory, rules, self.movement_bonus(rules));
        let id = self.insert(unit);
        debug!(?territory, unit_type = %utype.name, "unit trained");
        Ok(id)
    }

    /// Moves a unit one step to an adjacent territory, spending one move.
    pub fn move_unit(
        &mut self,
        id: UnitId,
        from: TerritoryId,
        to: TerritoryId,
        grid: &dyn TerritoryGrid,
    ) -> Result<(), RosterError> {
        {
            let unit = self.get(id).ok_or(RosterError::UnknownUnit)?;
            if unit.position != from {
                return Err(RosterError::WrongTerritory);
            }
            if unit.moves_left <= 0 {
                return Err(RosterError::NoMovesLeft);
            }
            if !grid.neighbors(from).contains(&to) {
                return Err(RosterError::NotAdjacent);
            }
        }

        let unit = self.get_mut(id).ok_or(RosterError::UnknownUnit)?;
        unit.moves_left -= 1;
        unit.position = to;
        self.unindex(from, id);
        self.index(to, id);
        Ok(())
    }

    /// Start-of-turn movement refresh for every unit.
    pub fn reset_movement(&mut self, rules: &CompiledRules) {
        let bonus = self.movement_bonus(rules);
        for slot in &mut self.slots {
            if let Some(unit) = slot.unit.as_mut() {
                unit.moves_left = rules.unit_type(unit.type_id).moves + bonus;
            }
        }
    }

    /// Garrison healing: units that have not moved this turn recover.
    pub fn heal_garrisons(&mut self, rules: &CompiledRules, amount: i32) {
        let bonus = self.movement_bonus(rules);
        for slot in &mut self.slots {
            if let Some(unit) = slot.unit.as_mut() {
                let full_moves = rules.unit_type(unit.type_id).moves + bonus;
                if unit.moves_left >= full_moves && unit.health < crate::unit::MAX_HEALTH {
                    unit.health = (unit.health + amount).min(crate::unit::MAX_HEALTH);
                }
            }
        }
    }

    /// Upgrades a unit to its type's declared target for half the target's
    /// cost. Experience, level and current health carry over; type id,
    /// strength and movement range are replaced.
    pub fn upgrade(
        &mut self,
        rules: &CompiledRules,
        id: UnitId,
        territory: TerritoryId,
        treasury: &mut dyn Treasury,
    ) -> Result<UnitTypeId, RosterError> {
        let (target, cost) = {
            let unit = self.get(id).ok_or(RosterError::UnknownUnit)?;
            if unit.position != territory {
                return Err(RosterError::WrongTerritory);
            }
            let target = rules
                .unit_type(unit.type_id)
                .upgrades_to
                .ok_or(RosterError::NoUpgradeTarget)?;
            (target, half_cost(&rules.unit_type(target).cost))
        };

        if !treasury.can_afford(&cost) || !treasury.pay(&cost) {
            return Err(RosterError::NotEnoughResources);
        }

        let bonus = self.movement_bonus(rules);
        let target_type = rules.unit_type(target);
        let unit = self.get_mut(id).ok_or(RosterError::UnknownUnit)?;
        unit.type_id = target;
        unit.strength = target_type.strength;
        unit.moves_left = unit.moves_left.min(target_type.moves + bonus);
        debug!(unit = ?id, new_type = %target_type.name, "unit upgraded");
        Ok(target)
    }

    /// Total upkeep for all standing units, with the current doctrine's
    /// percent delta applied once at the end.
    pub fn maintenance(&self, rules: &CompiledRules) -> i32 {
        let total: i32 = self
            .iter_ordered()
            .map(|(_, u)| rules.unit_type(u.type_id).maintenance)
            .sum();
        let percent = self
            .current_doctrine
            .map(|d| rules.doctrine(d).maintenance_percent)
            .unwrap_or(0);
        total * (100 + percent) / 100
    }

    fn insert(&mut self, unit: Unit) -> UnitId {
        let territory = unit.position;
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.unit.is_none());
            slot.unit = Some(unit);
            UnitId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                unit: Some(unit),
            });
            UnitId::new(index, 0)
        };
        self.index(territory, id);
        id
    }

    fn index(&mut self, territory: TerritoryId, id: UnitId) {
        self.by_territory.entry(territory).or_default().push(id);
    }

    fn unindex(&mut self, territory: TerritoryId, id: UnitId) {
        if let Some(ids) = self.by_territory.get_mut(&territory) {
            ids.retain(|&other| other != id);
        }
    }
}

fn half_cost(cost: &ResourceCost) -> ResourceCost {
    cost.iter().map(|(k, v)| (k.clone(), v / 2)).collect()
}
