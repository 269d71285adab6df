use serde::{Deserialize, Serialize};

use crate::{CombatOutcome, RoundRecord, TerritoryId, UnitId, UnitTypeId};

/// All possible sim→client events. Fully serializable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // Combat flow
    CombatStarted {
        attacker: TerritoryId,
        defender: TerritoryId,
    },
    RoundResolved {
        record: RoundRecord,
    },
    CombatResolved {
        result: CombatOutcome,
        attacker_casualties: u8,
        defender_casualties: u8,
        territory_control: i32,
    },
    CombatEnded {
        result: CombatOutcome,
        full_conquest: bool,
    },

    // Unit events
    UnitTrained {
        unit: UnitId,
        type_id: UnitTypeId,
        territory: TerritoryId,
    },
    UnitMoved {
        unit: UnitId,
        from: TerritoryId,
        to: TerritoryId,
        moves_left: i32,
    },
    UnitUpgraded {
        unit: UnitId,
        new_type: UnitTypeId,
    },
    UnitDamaged {
        unit: UnitId,
        new_health: i32,
    },
    UnitDied {
        unit: UnitId,
    },
    UnitPromoted {
        unit: UnitId,
        new_level: u8,
        specialization: Option<String>,
    },
}
