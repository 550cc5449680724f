//! Жизненный цикл сущностей: реген, смерть, лут, спавн/деспавн, ресурсы, квесты.
//!
//! Системы:
//! - health: реген (25) + детект смерти с упорядоченными обработчиками (25)
//! - loot: доставка лута и XP (26)
//! - resources: спавн и респаун ресурсных нод (48)
//! - spawn: спавн врагов/лошадей (50), деспавн далёких врагов (51)
//! - quests: collect-цели по инвентарю (90)

use std::collections::BTreeSet;

use bevy::prelude::*;

pub mod health;
pub mod loot;
pub mod quests;
pub mod resources;
pub mod spawn;

pub use health::{death_system, regen_system, DeathHandler, DeathRecord, DEATH_HANDLERS};
pub use loot::{loot_system, PendingLoot};
pub use quests::quest_system;
pub use resources::{resource_system, ResourceLedger};
pub use spawn::{despawn_system, spawn_system};

use crate::components::{Position, Tag, Tags};
use crate::registry::Inactive;
use crate::scheduler::{priority, TickSystemAppExt};

/// Таймеры периодических проверок (секунды симуляции с прошлого срабатывания)
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct LifecycleTimers {
    pub spawn: f32,
    pub despawn: f32,
    pub resources: f32,
    pub quests: f32,
}

/// true раз в `interval` секунд
pub(crate) fn due(timer: &mut f32, dt: f32, interval: f32) -> bool {
    *timer += dt;
    if *timer < interval {
        return false;
    }
    *timer = 0.0;
    true
}

/// Позиции всех активных игроков (живых и мёртвых), по возрастанию Entity.
pub(crate) fn player_positions(world: &mut World) -> Vec<(Entity, Vec2)> {
    let mut query = world.query_filtered::<(Entity, &Position, &Tags), Without<Inactive>>();
    let mut players: Vec<(Entity, Vec2)> = query
        .iter(world)
        .filter(|(_, _, tags)| tags.has(Tag::Player))
        .map(|(entity, pos, _)| (entity, pos.xy()))
        .collect();
    players.sort_by_key(|(entity, _)| *entity);
    players
}

/// Чанки в квадрате `radius` вокруг каждого игрока
pub(crate) fn chunks_around(players: &[(Entity, Vec2)], radius: i32) -> BTreeSet<(i32, i32)> {
    let mut chunks = BTreeSet::new();
    for (_, pos) in players {
        let center = Position::new(pos.x, pos.y).chunk();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                chunks.insert((center.x + dx, center.y + dy));
            }
        }
    }
    chunks
}

pub struct LifecyclePlugin;

impl Plugin for LifecyclePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LifecycleTimers>()
            .init_resource::<PendingLoot>()
            .init_resource::<ResourceLedger>()
            .add_tick_system("health_regen", priority::HEALTH, regen_system)
            .add_tick_system("death", priority::HEALTH, death_system)
            .add_tick_system("loot", priority::LOOT, loot_system)
            .add_tick_system("resources", priority::RESOURCE_RESPAWN, resource_system)
            .add_tick_system("spawn", priority::SPAWN, spawn_system)
            .add_tick_system("despawn", priority::DESPAWN, despawn_system)
            .add_tick_system("quests", priority::QUEST_TRACKING, quest_system);
    }
}
