//! Реген HP и детект смерти.

use bevy::prelude::*;

use super::{loot, quests, resources};
use crate::combat::{CombatEvents, DeathEvent};
use crate::components::*;
use crate::config::SimulationConfig;
use crate::registry::{entity_id, Inactive, Registry};
use crate::scheduler::TickClock;

/// Реген вне боя: regen_rate · dt, если с последнего урона прошло больше regen_delay.
pub fn regen_system(
    clock: Res<TickClock>,
    config: Res<SimulationConfig>,
    mut query: Query<&mut Health, Without<Inactive>>,
) {
    for mut health in query.iter_mut() {
        if !health.is_alive() || health.regen_rate <= 0.0 || health.current >= health.max {
            continue;
        }
        if clock.elapsed - health.last_damage_time > config.regen_delay {
            let amount = health.regen_rate * clock.dt;
            health.heal(amount);
        }
    }
}

/// Снимок умершей сущности для обработчиков.
#[derive(Debug, Clone, PartialEq)]
pub struct DeathRecord {
    pub entity: Entity,
    pub pos: Vec2,
    pub tags: Tags,
    pub enemy_type: Option<String>,
    pub is_boss: bool,
}

impl DeathRecord {
    pub fn is_player(&self) -> bool {
        self.tags.has(Tag::Player)
    }
}

pub type DeathHandler = fn(&mut World, &DeathRecord);

/// Обработчики смерти в порядке вызова.
/// Лут роллится первым, пока нода ресурса ещё не помечена на удаление.
pub const DEATH_HANDLERS: &[(&str, DeathHandler)] = &[
    ("loot", loot::on_death),
    ("resource_depletion", resources::on_death),
    ("quest_kills", quests::on_death),
    ("boss_shrine", reset_boss_shrine),
];

/// Смерть обрабатывается ровно один раз (флаг `death_handled`).
pub fn death_system(world: &mut World) {
    let mut query = world.query_filtered::<(
        Entity,
        &Health,
        &Position,
        Option<&Tags>,
        Option<&EnemyKind>,
    ), Without<Inactive>>();

    let mut dead: Vec<DeathRecord> = query
        .iter(world)
        .filter(|(_, health, ..)| !health.is_alive() && !health.death_handled)
        .map(|(entity, _, pos, tags, kind)| DeathRecord {
            entity,
            pos: pos.xy(),
            tags: tags.copied().unwrap_or_default(),
            enemy_type: kind.map(|k| k.enemy_type.clone()),
            is_boss: kind.is_some_and(|k| k.is_boss) || tags.is_some_and(|t| t.has(Tag::Boss)),
        })
        .collect();
    dead.sort_by_key(|record| record.entity);

    for record in dead {
        if let Some(mut health) = world.get_mut::<Health>(record.entity) {
            health.death_handled = true;
        }

        let is_player = record.is_player();
        world.resource_mut::<CombatEvents>().deaths.push(DeathEvent {
            id: entity_id(record.entity),
            x: record.pos.x,
            y: record.pos.y,
            is_player,
        });

        for (_, handler) in DEATH_HANDLERS {
            handler(world, &record);
        }

        if is_player {
            // Мёртвый игрок ждёт respawn, сущность не удаляется
            if let Some(mut health) = world.get_mut::<Health>(record.entity) {
                health.invulnerable = true;
            }
            crate::log(&format!("💀 Player {:?} died", record.entity));
        } else if record.tags.has(Tag::Resource) {
            // нода уже уничтожена обработчиком истощения
        } else {
            world.mark_for_destroy(record.entity);
        }
    }
}

/// Алтарь босса снова доступен для призыва.
fn reset_boss_shrine(world: &mut World, record: &DeathRecord) {
    if !record.is_boss {
        return;
    }
    let mut stations = world.query::<&mut CraftingStation>();
    for mut station in stations.iter_mut(world) {
        if station.linked_boss == Some(record.entity) {
            station.altar_active = false;
            station.linked_boss = None;
            crate::log(&format!("⛩️ Shrine {} reset", station.station_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentTables;
    use crate::lifecycle::{PendingLoot, ResourceLedger};
    use crate::DeterministicRng;
    use bevy::ecs::system::RunSystemOnce;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(TickClock {
            dt: 0.05,
            elapsed: 10.0,
            tick: 200,
        });
        world.insert_resource(SimulationConfig::default());
        world.insert_resource(ContentTables::default());
        world.insert_resource(DeterministicRng::new(3));
        world.init_resource::<CombatEvents>();
        world.init_resource::<PendingLoot>();
        world.init_resource::<ResourceLedger>();
        world
    }

    #[test]
    fn test_regen_waits_for_delay() {
        let mut world = world();
        let mut hp = Health::new(100.0).with_regen(2.0);
        hp.current = 50.0;
        hp.last_damage_time = 6.0;
        let recent = world.spawn(hp).id();
        hp.last_damage_time = 4.0;
        let calm = world.spawn(hp).id();

        world.run_system_once(regen_system).expect("regen");
        assert_eq!(world.get::<Health>(recent).map(|h| h.current), Some(50.0));
        let healed = world.get::<Health>(calm).map(|h| h.current).unwrap_or_default();
        assert!((healed - 50.1).abs() < 1e-4, "2 HP/s × 0.05: {healed}");
    }

    #[test]
    fn test_dead_regen_skipped() {
        let mut world = world();
        let mut hp = Health::new(100.0).with_regen(5.0);
        hp.current = 0.0;
        let corpse = world.spawn(hp).id();
        world.run_system_once(regen_system).expect("regen");
        assert_eq!(world.get::<Health>(corpse).map(|h| h.current), Some(0.0));
    }

    #[test]
    fn test_enemy_death_fires_once_and_marks_destroy() {
        let mut world = world();
        let mut hp = Health::new(30.0);
        hp.current = 0.0;
        let wolf = world
            .spawn((
                hp,
                Position::new(10.0, 20.0),
                Tags::of(&[Tag::Enemy]),
                EnemyKind {
                    enemy_type: "wolf".to_string(),
                    is_boss: false,
                },
            ))
            .id();

        world.run_system_once(death_system).expect("death");
        assert!(world.get::<Inactive>(wolf).is_some());
        let deaths = &world.resource::<CombatEvents>().deaths;
        assert_eq!(deaths.len(), 1);
        assert_eq!((deaths[0].x, deaths[0].y), (10.0, 20.0));
        assert!(!deaths[0].is_player);

        world.entity_mut(wolf).remove::<Inactive>();
        world.run_system_once(death_system).expect("death");
        assert_eq!(world.resource::<CombatEvents>().deaths.len(), 1, "повторно не срабатывает");
    }

    #[test]
    fn test_player_death_keeps_entity_invulnerable() {
        let mut world = world();
        let mut hp = Health::new(100.0);
        hp.current = 0.0;
        let player = world
            .spawn((hp, Position::new(0.0, 0.0), Tags::of(&[Tag::Player])))
            .id();

        world.run_system_once(death_system).expect("death");
        assert!(world.get::<Inactive>(player).is_none());
        assert!(world.get::<Health>(player).is_some_and(|h| h.invulnerable));
        assert!(world.resource::<CombatEvents>().deaths[0].is_player);
    }

    #[test]
    fn test_boss_death_resets_shrine() {
        let mut world = world();
        let mut hp = Health::new(500.0);
        hp.current = 0.0;
        let boss = world
            .spawn((
                hp,
                Position::new(0.0, 0.0),
                Tags::of(&[Tag::Enemy, Tag::Boss]),
                EnemyKind {
                    enemy_type: "copper_golem".to_string(),
                    is_boss: true,
                },
            ))
            .id();
        let mut altar = CraftingStation::new("boss_altar", 1);
        altar.altar_active = true;
        altar.linked_boss = Some(boss);
        let shrine = world.spawn(altar).id();

        world.run_system_once(death_system).expect("death");
        let station = world.get::<CraftingStation>(shrine).expect("station");
        assert!(!station.altar_active);
        assert_eq!(station.linked_boss, None);
    }
}
