#![allow(dead_code)]

use std::collections::HashMap;

use hexmarch_core::{
    BuildingInstance, CardInventory, CompiledRules, ControlSink, ResourceCost, TerritoryGrid,
    TerritoryProvider, TerritoryView, Treasury, UnitRoster, WorkerPool,
};
use hexmarch_protocol::{CardId, PlayerId, TerritoryId};

/// Small handcrafted map standing in for the external territory layer.
#[derive(Default)]
pub struct FixtureWorld {
    pub territories: HashMap<TerritoryId, TerritoryView>,
    pub edges: Vec<(TerritoryId, TerritoryId)>,
}

impl FixtureWorld {
    pub fn add(
        &mut self,
        rules: &CompiledRules,
        id: TerritoryId,
        terrain: &str,
        owner: Option<PlayerId>,
        buildings: &[(&str, u8)],
        is_capital: bool,
    ) {
        self.territories.insert(
            id,
            TerritoryView {
                id,
                terrain: rules.terrain_id(terrain).unwrap(),
                owner,
                buildings: buildings
                    .iter()
                    .map(|(name, level)| BuildingInstance {
                        id: rules.building_id(name).unwrap(),
                        level: *level,
                    })
                    .collect(),
                resource: None,
                is_capital,
            },
        );
    }

    pub fn connect(&mut self, a: TerritoryId, b: TerritoryId) {
        self.edges.push((a, b));
    }
}

impl TerritoryProvider for FixtureWorld {
    fn territory(&self, id: TerritoryId) -> Option<TerritoryView> {
        self.territories.get(&id).cloned()
    }
}

impl TerritoryGrid for FixtureWorld {
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

pub struct Funds(pub ResourceCost);

impl Treasury for Funds {
    fn can_afford(&self, cost: &ResourceCost) -> bool {
        cost.iter()
            .all(|(k, v)| self.0.get(k).copied().unwrap_or(0) >= *v)
    }

    fn pay(&mut self, cost: &ResourceCost) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        for (k, v) in cost {
            *self.0.get_mut(k).expect("checked above") -= v;
        }
        true
    }
}

pub struct Workers(pub HashMap<TerritoryId, u32>);

impl WorkerPool for Workers {
    fn convert_worker(&mut self, territory: TerritoryId) -> bool {
        match self.0.get_mut(&territory) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }
}

/// An inventory with plenty of every card.
pub struct FullDeck;

impl CardInventory for FullDeck {
    fn remaining(&self, _card: CardId) -> u32 {
        99
    }
}

#[derive(Default)]
pub struct ControlLog {
    pub calls: Vec<(TerritoryId, TerritoryId, bool, Option<i32>)>,
}

impl ControlSink for ControlLog {
    fn update_territory_control(
        &mut self,
        defender: TerritoryId,
        attacker: TerritoryId,
        full_conquest: bool,
        control_percent: Option<i32>,
    ) {
        self.calls
            .push((defender, attacker, full_conquest, control_percent));
    }
}

/// Places a unit directly, bypassing the economy.
pub fn spawn(roster: &mut UnitRoster, rules: &CompiledRules, type_name: &str, at: TerritoryId) {
    struct NoCost;
    impl Treasury for NoCost {
        fn can_afford(&self, _cost: &ResourceCost) -> bool {
            true
        }
        fn pay(&mut self, _cost: &ResourceCost) -> bool {
            true
        }
    }
    struct Militia;
    impl WorkerPool for Militia {
        fn convert_worker(&mut self, _territory: TerritoryId) -> bool {
            true
        }
    }

    roster
        .train(
            rules,
            at,
            rules.unit_type_id(type_name).unwrap(),
            &mut NoCost,
            &mut Militia,
        )
        .expect("spawn unit");
}
