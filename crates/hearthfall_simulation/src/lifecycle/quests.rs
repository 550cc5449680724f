//! Квестовый прогресс: kill-цели по смертям, collect-цели по инвентарю.

use bevy::prelude::*;

use super::health::DeathRecord;
use super::{due, LifecycleTimers};
use crate::combat::{CombatEvents, Notice};
use crate::components::*;
use crate::config::SimulationConfig;
use crate::registry::Inactive;
use crate::scheduler::TickClock;

fn progress_notice(quest_id: &str, index: usize, objective: &Objective) -> Notice {
    Notice::QuestProgress {
        quest_id: quest_id.to_string(),
        objective: index,
        current: objective.current,
        required: objective.required,
    }
}

/// Смерть врага продвигает kill-цели у всех игроков с таким квестом.
pub fn on_death(world: &mut World, record: &DeathRecord) {
    if !record.tags.has(Tag::Enemy) {
        return;
    }
    let Some(enemy_type) = record.enemy_type.as_deref() else {
        return;
    };

    let mut query = world.query_filtered::<(Entity, &mut QuestLog), Without<Inactive>>();
    let mut notices = Vec::new();
    for (player, mut log) in query.iter_mut(world) {
        for quest in log.active.iter_mut() {
            for (index, objective) in quest.objectives.iter_mut().enumerate() {
                let matches = matches!(
                    &objective.kind,
                    ObjectiveKind::Kill { enemy_type: target } if target == enemy_type
                );
                if matches && objective.current < objective.required {
                    objective.current += 1;
                    notices.push((player, progress_notice(&quest.quest_id, index, objective)));
                }
            }
        }
    }

    notices.sort_by_key(|(player, _)| *player);
    let mut events = world.resource_mut::<CombatEvents>();
    for (player, notice) in notices {
        events.notify(player, notice);
    }
}

/// Каждые quest_check_interval: collect/deliver цели = min(в инвентаре, required).
pub fn quest_system(world: &mut World) {
    let dt = world.resource::<TickClock>().dt;
    let interval = world.resource::<SimulationConfig>().quest_check_interval;
    if !due(&mut world.resource_mut::<LifecycleTimers>().quests, dt, interval) {
        return;
    }

    let mut query =
        world.query_filtered::<(Entity, &mut QuestLog, &Inventory), Without<Inactive>>();
    let mut notices = Vec::new();
    for (player, mut log, inventory) in query.iter_mut(world) {
        for quest in log.active.iter_mut() {
            for (index, objective) in quest.objectives.iter_mut().enumerate() {
                let item_id = match &objective.kind {
                    ObjectiveKind::Collect { item_id } | ObjectiveKind::Deliver { item_id } => item_id,
                    ObjectiveKind::Kill { .. } => continue,
                };
                let current = inventory.count_item(item_id).min(objective.required);
                if current != objective.current {
                    objective.current = current;
                    notices.push((player, progress_notice(&quest.quest_id, index, objective)));
                }
            }
        }
    }

    notices.sort_by_key(|(player, _)| *player);
    let mut events = world.resource_mut::<CombatEvents>();
    for (player, notice) in notices {
        events.notify(player, notice);
    }
}
