use serde::{Deserialize, Serialize};

use crate::{CardId, TerritoryId, UnitTypeId};

/// The two sides of a combat session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    #[inline]
    pub const fn opponent(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Side::Attacker => 0,
            Side::Defender => 1,
        }
    }
}

/// Final outcome of a combat session, from the attacker's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatOutcome {
    Victory,
    Defeat,
    Draw,
}

/// AI opponent difficulty. Governs score noise and second-choice odds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

/// One unit trained during the AI military turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainedUnit {
    pub territory: TerritoryId,
    pub unit_type: UnitTypeId,
}

/// Summary of an attack the AI executed end-to-end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub from: TerritoryId,
    pub target: TerritoryId,
    pub result: CombatOutcome,
    pub territory_control: i32,
    pub full_conquest: bool,
}

/// Everything the AI did in one military turn, for the turn orchestrator
/// to log and animate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MilitaryTurnReport {
    #[serde(default)]
    pub trained: Vec<TrainedUnit>,
    #[serde(default)]
    pub attack: Option<AttackOutcome>,
    #[serde(default)]
    pub cards_played: Vec<CardId>,
}
