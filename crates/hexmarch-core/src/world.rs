//! Interfaces to the collaborators outside the military engine: the map,
//! the economy, the worker pool, and the card inventory. The engine never
//! owns this state; it reads views and requests mutations through these
//! traits, and the turn orchestrator wires in the real systems.

use std::collections::BTreeMap;

use hexmarch_protocol::{
    BuildingId, CardId, PlayerId, ResourceId, TerrainId, TerritoryId,
};

/// Resource costs keyed by resource data id (e.g. `production`, `gold`).
pub type ResourceCost = BTreeMap<String, i32>;

/// A building standing in a territory, with its constructed level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildingInstance {
    pub id: BuildingId,
    pub level: u8,
}

/// Read-only view of one territory, captured by the map layer.
#[derive(Clone, Debug)]
pub struct TerritoryView {
    pub id: TerritoryId,
    pub terrain: TerrainId,
    pub owner: Option<PlayerId>,
    pub buildings: Vec<BuildingInstance>,
    pub resource: Option<ResourceId>,
    pub is_capital: bool,
}

/// Supplies territory views by id.
pub trait TerritoryProvider {
    fn territory(&self, id: TerritoryId) -> Option<TerritoryView>;
}

/// Hex adjacency and distance, owned by the external grid.
pub trait TerritoryGrid {
    fn neighbors(&self, id: TerritoryId) -> Vec<TerritoryId>;
    fn distance(&self, a: TerritoryId, b: TerritoryId) -> i32;
}

/// The player economy. `pay` must only succeed in full; the engine checks
/// `can_afford` before committing any other side effect.
pub trait Treasury {
    fn can_afford(&self, cost: &ResourceCost) -> bool;
    fn pay(&mut self, cost: &ResourceCost) -> bool;
}

/// Converts a worker in the given territory into a recruit. Returns false
/// when no worker is available there.
pub trait WorkerPool {
    fn convert_worker(&mut self, territory: TerritoryId) -> bool;
}

/// The player's tactical card inventory. Consumption happens outside the
/// engine; combat only verifies availability at selection time.
pub trait CardInventory {
    fn remaining(&self, card: CardId) -> u32;
}

/// Receives the territory-control result when a combat session ends.
/// A full conquest transfers ownership outright; otherwise the delta in
/// `control_percent` is accumulated by the map layer.
pub trait ControlSink {
    fn update_territory_control(
        &mut self,
        defender: TerritoryId,
        attacker: TerritoryId,
        full_conquest: bool,
        control_percent: Option<i32>,
    );
}
