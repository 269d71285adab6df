//! The combat session state machine. One engine value owns the lifecycle
//! Idle → Active(rounds 1..=3) → Resolved → Idle; every command returns an
//! explicit result and misuse is a typed error, never a panic.

use thiserror::Error;
use tracing::{debug, info};

use hexmarch_protocol::{
    AttackOutcome, CardId, CombatOutcome, CombatSnapshot, Event, MilitaryTurnReport, PlayerId,
    RoundRecord, Side, TerritoryId, TrainedUnit, UnitId, UnitSnapshot, UnitTypeId,
};

use crate::{
    combat::{resolve_combat, resolve_round, CombatSummary, RoundContext, TOTAL_ROUNDS},
    rng::CombatRng,
    roster::UnitRoster,
    rules::{CardTier, CompiledRules, Era},
    strategist::Strategist,
    unit::Unit,
    world::{
        CardInventory, ControlSink, TerritoryGrid, TerritoryProvider, TerritoryView, Treasury,
        WorkerPool,
    },
};

#[derive(Debug, Error)]
pub enum CombatError {
    #[error("a combat session is already active")]
    SessionActive,
    #[error("no active combat session")]
    NoActiveSession,
    #[error("combat is already resolved")]
    AlreadyResolved,
    #[error("combat is not resolved yet")]
    NotResolved,
    #[error("attacking territory has no units")]
    NoAttackingUnits,
    #[error("unknown territory {0:?}")]
    UnknownTerritory(TerritoryId),
    #[error("card is not available in the inventory")]
    CardNotAvailable,
    #[error("card requires units the side does not field")]
    CardRequirementNotMet,
}

/// A side's pick for one round. `Invalid` is remembered so an unknown card
/// id scores zero at resolution instead of erroring at selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum CardChoice {
    #[default]
    Unset,
    Invalid,
    Card(CardId),
}

impl CardChoice {
    fn card(self) -> Option<CardId> {
        match self {
            CardChoice::Card(id) => Some(id),
            _ => None,
        }
    }
}

struct ActiveCombat {
    attacker_territory: TerritoryView,
    defender_territory: TerritoryView,
    attacker_unit_ids: Vec<UnitId>,
    defender_unit_ids: Vec<UnitId>,
    attacker_units: Vec<Unit>,
    defender_units: Vec<Unit>,
    ai_side: Side,
    doctrine_card_unlocks: Vec<CardId>,
    current_round: u8,
    selections: [[CardChoice; TOTAL_ROUNDS as usize]; 2],
    log: Vec<RoundRecord>,
}

enum SessionState {
    Idle,
    Active(Box<ActiveCombat>),
    Resolved {
        combat: Box<ActiveCombat>,
        summary: CombatSummary,
    },
}

/// Owns the single combat session plus the rules, RNG and AI strategist.
pub struct CombatEngine {
    rules: CompiledRules,
    rng: CombatRng,
    strategist: Strategist,
    state: SessionState,
}

impl CombatEngine {
    pub fn new(rules: CompiledRules, strategist: Strategist, seed: u64) -> Self {
        Self {
            rules,
            rng: CombatRng::seed_from_u64(seed),
            strategist,
            state: SessionState::Idle,
        }
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, SessionState::Idle)
    }

    pub fn current_round(&self) -> Option<u8> {
        match &self.state {
            SessionState::Active(combat) => Some(combat.current_round),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<CombatSummary> {
        match &self.state {
            SessionState::Resolved { summary, .. } => Some(*summary),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<CombatOutcome> {
        self.summary().map(|s| s.result)
    }

    /// Opens a combat between two territories, snapshotting both unit
    /// groups and territory views at this instant. The AI side's first
    /// card is selected immediately.
    pub fn start_combat(
        &mut self,
        attacker: TerritoryId,
        defender: TerritoryId,
        ai_side: Side,
        roster: &UnitRoster,
        territories: &dyn TerritoryProvider,
    ) -> Result<Vec<Event>, CombatError> {
        if !matches!(self.state, SessionState::Idle) {
            return Err(CombatError::SessionActive);
        }
        let attacker_territory = territories
            .territory(attacker)
            .ok_or(CombatError::UnknownTerritory(attacker))?;
        let defender_territory = territories
            .territory(defender)
            .ok_or(CombatError::UnknownTerritory(defender))?;

        let attacker_units = roster.units_snapshot(attacker);
        if attacker_units.is_empty() {
            return Err(CombatError::NoAttackingUnits);
        }
        let defender_units = roster.units_snapshot(defender);

        let doctrine_card_unlocks = roster
            .current_doctrine()
            .map(|d| self.rules.doctrine(d).unlocks_cards.clone())
            .unwrap_or_default();

        debug!(?attacker, ?defender, ?ai_side, "combat started");
        self.state = SessionState::Active(Box::new(ActiveCombat {
            attacker_territory,
            defender_territory,
            attacker_unit_ids: roster.units_in(attacker).to_vec(),
            defender_unit_ids: roster.units_in(defender).to_vec(),
            attacker_units,
            defender_units,
            ai_side,
            doctrine_card_unlocks,
            current_round: 1,
            selections: Default::default(),
            log: Vec::new(),
        }));
        self.preselect_ai_card();

        Ok(vec![Event::CombatStarted { attacker, defender }])
    }

    /// Records a card pick for the current round. An id that does not
    /// resolve in the catalog is remembered as an invalid selection; the
    /// side will score zero when the round resolves.
    pub fn select_card(
        &mut self,
        side: Side,
        card: &str,
        inventory: &dyn CardInventory,
    ) -> Result<Vec<Event>, CombatError> {
        match self.rules.card_id(card) {
            Some(id) => self.select_card_id(side, id, inventory),
            None => {
                let combat = self.active_mut()?;
                let round_index = (combat.current_round - 1) as usize;
                combat.selections[side.index()][round_index] = CardChoice::Invalid;
                Ok(Vec::new())
            }
        }
    }

    /// Typed variant of [`select_card`](Self::select_card).
    pub fn select_card_id(
        &mut self,
        side: Side,
        card: CardId,
        inventory: &dyn CardInventory,
    ) -> Result<Vec<Event>, CombatError> {
        let card_type = self.rules.card(card);
        let requires_units = card_type.requires_units.clone();

        let combat = self.active_mut()?;
        let group = match side {
            Side::Attacker => &combat.attacker_units,
            Side::Defender => &combat.defender_units,
        };
        if !requires_units.is_empty()
            && !group.iter().any(|u| requires_units.contains(&u.type_id))
        {
            return Err(CombatError::CardRequirementNotMet);
        }
        // Only the player's picks draw on the external inventory.
        if side != combat.ai_side && inventory.remaining(card) == 0 {
            return Err(CombatError::CardNotAvailable);
        }

        let round_index = (combat.current_round - 1) as usize;
        combat.selections[side.index()][round_index] = CardChoice::Card(card);
        Ok(Vec::new())
    }

    /// Resolves the current round. On rounds 1 and 2 the session advances
    /// and the AI pre-selects its next card; after round 3 the combat
    /// resolver runs and the session transitions to Resolved.
    pub fn next_round(&mut self) -> Result<Vec<Event>, CombatError> {
        let record = {
            let combat = match &self.state {
                SessionState::Active(combat) => combat,
                SessionState::Resolved { .. } => return Err(CombatError::AlreadyResolved),
                SessionState::Idle => return Err(CombatError::NoActiveSession),
            };
            let round_index = (combat.current_round - 1) as usize;
            let ctx = RoundContext {
                attacker_card: combat.selections[Side::Attacker.index()][round_index].card(),
                defender_card: combat.selections[Side::Defender.index()][round_index].card(),
                attacker_units: &combat.attacker_units,
                defender_units: &combat.defender_units,
                attacker_territory: &combat.attacker_territory,
                defender_territory: &combat.defender_territory,
                round: combat.current_round,
                total_rounds: TOTAL_ROUNDS,
            };
            resolve_round(&self.rules, &ctx, &mut self.rng)
        };

        let mut events = vec![Event::RoundResolved {
            record: record.clone(),
        }];

        let finished = {
            let combat = self.active_mut()?;
            combat.log.push(record);
            combat.current_round == TOTAL_ROUNDS
        };

        if finished {
            let SessionState::Active(combat) =
                std::mem::replace(&mut self.state, SessionState::Idle)
            else {
                unreachable!("checked active above");
            };
            let summary = resolve_combat(&combat.log);
            info!(
                result = ?summary.result,
                control = summary.territory_control,
                "combat resolved"
            );
            events.push(Event::CombatResolved {
                result: summary.result,
                attacker_casualties: summary.attacker_casualties,
                defender_casualties: summary.defender_casualties,
                territory_control: summary.territory_control,
            });
            self.state = SessionState::Resolved { combat, summary };
        } else {
            if let SessionState::Active(combat) = &mut self.state {
                combat.current_round += 1;
            }
            self.preselect_ai_card();
        }

        Ok(events)
    }

    /// Applies the resolved combat to the live roster: casualty damage and
    /// experience for both sides, then the territory-control callback.
    /// Returns the session to Idle.
    pub fn end_combat(
        &mut self,
        roster: &mut UnitRoster,
        control: &mut dyn ControlSink,
    ) -> Result<Vec<Event>, CombatError> {
        let (combat, summary) = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Resolved { combat, summary } => (combat, summary),
            active @ SessionState::Active(_) => {
                self.state = active;
                return Err(CombatError::NotResolved);
            }
            SessionState::Idle => return Err(CombatError::NoActiveSession),
        };

        let mut events = Vec::new();
        let battlefield_terrain = combat.defender_territory.terrain;
        let sides = [
            (
                combat.attacker_territory.id,
                summary.attacker_casualties,
                experience_award(summary.result, Side::Attacker),
            ),
            (
                combat.defender_territory.id,
                summary.defender_casualties,
                experience_award(summary.result, Side::Defender),
            ),
        ];

        for (territory, casualties, experience) in sides {
            let ids = roster.units_in(territory).to_vec();
            for id in ids {
                let destroyed = match roster.get_mut(id) {
                    Some(unit) => unit.apply_damage(casualties as i32),
                    None => continue,
                };
                if destroyed {
                    roster.remove(id);
                    events.push(Event::UnitDied { unit: id });
                    continue;
                }

                let unit = roster.get_mut(id).expect("survivor still stored");
                events.push(Event::UnitDamaged {
                    unit: id,
                    new_health: unit.health,
                });
                if unit.gain_experience(experience) > 0 {
                    let tag = format!(
                        "{}-veteran",
                        self.rules.terrain(battlefield_terrain).name.to_lowercase()
                    );
                    unit.specializations.push(tag.clone());
                    events.push(Event::UnitPromoted {
                        unit: id,
                        new_level: unit.level,
                        specialization: Some(tag),
                    });
                }
            }
        }

        let full_conquest = summary.is_full_conquest();
        control.update_territory_control(
            combat.defender_territory.id,
            combat.attacker_territory.id,
            full_conquest,
            if full_conquest {
                None
            } else {
                Some(summary.territory_control)
            },
        );
        debug!(?full_conquest, "combat ended");
        events.push(Event::CombatEnded {
            result: summary.result,
            full_conquest,
        });
        Ok(events)
    }

    /// Read-only session view for display.
    pub fn snapshot(&self) -> CombatSnapshot {
        match &self.state {
            SessionState::Idle => CombatSnapshot {
                total_rounds: TOTAL_ROUNDS,
                ..Default::default()
            },
            SessionState::Active(combat) => self.snapshot_of(combat, None),
            SessionState::Resolved { combat, summary } => self.snapshot_of(combat, Some(*summary)),
        }
    }

    /// Runs the AI's whole military turn: train at most one unit, then
    /// execute at most one attack end-to-end (the defender's cards are
    /// auto-selected from the player's inventory).
    pub fn ai_military_turn(
        &mut self,
        player: PlayerId,
        era: Era,
        roster: &mut UnitRoster,
        world: &mut AiTurnWorld<'_>,
    ) -> Result<(MilitaryTurnReport, Vec<Event>), CombatError> {
        let mut report = MilitaryTurnReport::default();
        let mut events = Vec::new();

        self.ai_train(player, era, roster, world, &mut report, &mut events);

        let plan = self.strategist.select_attack_target(
            &self.rules,
            &mut self.rng,
            player,
            roster,
            world.territories,
            world.grid,
            world.known_territories,
        );
        if let Some(plan) = plan {
            events.extend(self.start_combat(
                plan.from,
                plan.target,
                Side::Attacker,
                roster,
                world.territories,
            )?);
            for _ in 0..TOTAL_ROUNDS {
                if let Some(card) = self.auto_defense_card(world.inventory) {
                    // A failed defender pick forfeits the round.
                    let _ = self.select_card_id(Side::Defender, card, world.inventory);
                }
                if let Some(card) = self.current_ai_selection() {
                    report.cards_played.push(card);
                }
                events.extend(self.next_round()?);
            }
            let summary = self.summary().expect("session resolved after final round");
            events.extend(self.end_combat(roster, world.control)?);
            report.attack = Some(AttackOutcome {
                from: plan.from,
                target: plan.target,
                result: summary.result,
                territory_control: summary.territory_control,
                full_conquest: summary.is_full_conquest(),
            });
        }

        Ok((report, events))
    }

    fn ai_train(
        &mut self,
        player: PlayerId,
        era: Era,
        roster: &mut UnitRoster,
        world: &mut AiTurnWorld<'_>,
        report: &mut MilitaryTurnReport,
        events: &mut Vec<Event>,
    ) {
        for &territory in world.known_territories {
            let Some(view) = world.territories.territory(territory) else {
                continue;
            };
            if view.owner != Some(player) {
                continue;
            }
            let Some(type_id) = self.strategist.decide_training(
                &self.rules,
                &mut self.rng,
                era,
                &view,
                roster,
                world.treasury,
            ) else {
                continue;
            };
            match roster.train(&self.rules, territory, type_id, world.treasury, world.workers) {
                Ok(unit) => {
                    events.push(Event::UnitTrained {
                        unit,
                        type_id,
                        territory,
                    });
                    report.trained.push(TrainedUnit {
                        territory,
                        unit_type: type_id,
                    });
                    return;
                }
                // No worker here; try the next owned territory.
                Err(_) => continue,
            }
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveCombat, CombatError> {
        match &mut self.state {
            SessionState::Active(combat) => Ok(combat),
            SessionState::Resolved { .. } => Err(CombatError::AlreadyResolved),
            SessionState::Idle => Err(CombatError::NoActiveSession),
        }
    }

    /// Cards a side may pick from: requirement-satisfying cards, with
    /// advanced-tier cards gated behind the snapshotted doctrine unlocks.
    fn card_pool(&self, combat: &ActiveCombat, group: &[Unit]) -> Vec<CardId> {
        let fielded: Vec<UnitTypeId> = group.iter().map(|u| u.type_id).collect();
        let mut pool = self.rules.cards_playable_with(&fielded);
        pool.retain(|&id| {
            self.rules.card(id).tier != CardTier::Advanced
                || combat.doctrine_card_unlocks.contains(&id)
        });
        pool
    }

    /// Picks and stores the AI side's card for the current round. The AI
    /// assumes the opponent repeats its latest known selection.
    fn preselect_ai_card(&mut self) {
        let choice = {
            let SessionState::Active(combat) = &self.state else {
                return;
            };
            let side = combat.ai_side;
            let (group, territory) = match side {
                Side::Attacker => (&combat.attacker_units, &combat.attacker_territory),
                Side::Defender => (&combat.defender_units, &combat.defender_territory),
            };
            let available = self.card_pool(combat, group);
            let round_index = (combat.current_round - 1) as usize;
            let assumed_opponent = combat.selections[side.opponent().index()][..=round_index]
                .iter()
                .rev()
                .find_map(|choice| choice.card());
            self.strategist.select_card(
                &self.rules,
                &mut self.rng,
                &available,
                group,
                territory,
                assumed_opponent,
                side == Side::Attacker,
            )
        };

        if let SessionState::Active(combat) = &mut self.state {
            let side = combat.ai_side;
            let round_index = (combat.current_round - 1) as usize;
            combat.selections[side.index()][round_index] = match choice {
                Some(id) => CardChoice::Card(id),
                // Nothing playable: the AI forfeits the round.
                None => CardChoice::Invalid,
            };
        }
    }

    /// Best defensive card for the player side during an AI-driven attack,
    /// honoring the player's remaining inventory.
    fn auto_defense_card(&mut self, inventory: &dyn CardInventory) -> Option<CardId> {
        let SessionState::Active(combat) = &self.state else {
            return None;
        };
        let mut available = self.card_pool(combat, &combat.defender_units);
        available.retain(|&id| inventory.remaining(id) > 0);
        self.strategist.select_card(
            &self.rules,
            &mut self.rng,
            &available,
            &combat.defender_units,
            &combat.defender_territory,
            None,
            false,
        )
    }

    fn current_ai_selection(&self) -> Option<CardId> {
        let SessionState::Active(combat) = &self.state else {
            return None;
        };
        let round_index = (combat.current_round - 1) as usize;
        combat.selections[combat.ai_side.index()][round_index].card()
    }

    fn snapshot_of(&self, combat: &ActiveCombat, summary: Option<CombatSummary>) -> CombatSnapshot {
        let sum_casualties = |f: fn(&RoundRecord) -> u8| {
            combat
                .log
                .iter()
                .map(|r| f(r) as u32)
                .sum::<u32>()
                .min(100) as u8
        };
        CombatSnapshot {
            active: true,
            attacker_territory: Some(combat.attacker_territory.id),
            defender_territory: Some(combat.defender_territory.id),
            current_round: combat.current_round,
            total_rounds: TOTAL_ROUNDS,
            attacker_units: unit_snapshots(&combat.attacker_unit_ids, &combat.attacker_units),
            defender_units: unit_snapshots(&combat.defender_unit_ids, &combat.defender_units),
            log: combat.log.clone(),
            attacker_casualties: summary
                .map(|s| s.attacker_casualties)
                .unwrap_or_else(|| sum_casualties(|r| r.attacker_casualties)),
            defender_casualties: summary
                .map(|s| s.defender_casualties)
                .unwrap_or_else(|| sum_casualties(|r| r.defender_casualties)),
            territory_control: summary.map(|s| s.territory_control).unwrap_or(0),
            result: summary.map(|s| s.result),
        }
    }
}

/// External collaborators the AI turn drives.
pub struct AiTurnWorld<'a> {
    pub territories: &'a dyn TerritoryProvider,
    pub grid: &'a dyn TerritoryGrid,
    pub treasury: &'a mut dyn Treasury,
    pub workers: &'a mut dyn WorkerPool,
    pub inventory: &'a dyn CardInventory,
    pub control: &'a mut dyn ControlSink,
    pub known_territories: &'a [TerritoryId],
}

/// Victors learn more than the defeated; a draw teaches both sides a
/// little.
fn experience_award(result: CombatOutcome, side: Side) -> i32 {
    match (result, side) {
        (CombatOutcome::Victory, Side::Attacker) | (CombatOutcome::Defeat, Side::Defender) => 15,
        (CombatOutcome::Victory, Side::Defender) | (CombatOutcome::Defeat, Side::Attacker) => 5,
        (CombatOutcome::Draw, _) => 8,
    }
}

fn unit_snapshots(ids: &[UnitId], units: &[Unit]) -> Vec<UnitSnapshot> {
    ids.iter()
        .zip(units.iter())
        .map(|(&id, unit)| UnitSnapshot {
            id,
            type_id: unit.type_id,
            strength: unit.strength,
            health: unit.health,
            experience: unit.experience,
            level: unit.level,
            position: unit.position,
        })
        .collect()
}
