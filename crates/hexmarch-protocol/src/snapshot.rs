use serde::{Deserialize, Serialize};

use crate::{CombatOutcome, Side, TerritoryId, UnitId, UnitTypeId};

/// Compact unit state for display.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub type_id: UnitTypeId,
    pub strength: i32,
    pub health: i32,
    pub experience: i32,
    pub level: u8,
    pub position: TerritoryId,
}

/// One resolved round in the battle log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u8,
    pub message: String,
    pub attacker_score: f32,
    pub defender_score: f32,
    /// `None` means the round was drawn.
    pub winner: Option<Side>,
    pub attacker_casualties: u8,
    pub defender_casualties: u8,
}

/// Read-only view of the combat session for display.
///
/// `Default` is the idle session: inactive, empty log, no result.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CombatSnapshot {
    pub active: bool,
    pub attacker_territory: Option<TerritoryId>,
    pub defender_territory: Option<TerritoryId>,
    pub current_round: u8,
    pub total_rounds: u8,
    pub attacker_units: Vec<UnitSnapshot>,
    pub defender_units: Vec<UnitSnapshot>,
    pub log: Vec<RoundRecord>,
    pub attacker_casualties: u8,
    pub defender_casualties: u8,
    pub territory_control: i32,
    pub result: Option<CombatOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_for_display() {
        let snapshot = CombatSnapshot {
            active: true,
            attacker_territory: Some(TerritoryId(3)),
            defender_territory: Some(TerritoryId(7)),
            current_round: 2,
            total_rounds: 3,
            log: vec![RoundRecord {
                round: 1,
                message: "Shield Wall holds the line".into(),
                attacker_score: 4.2,
                defender_score: 5.0,
                winner: Some(Side::Defender),
                attacker_casualties: 14,
                defender_casualties: 13,
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&snapshot).expect("snapshot to json");
        assert_eq!(json["current_round"], 2);
        assert_eq!(json["log"][0]["winner"], "Defender");
    }
}
