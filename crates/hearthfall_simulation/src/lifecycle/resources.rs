//! Ресурсные ноды: спавн по точкам террейна, истощение, респаун.
//!
//! Нода идентифицируется (чанк, индекс точки). Ledger помнит, какие ноды
//! стоят в мире и какие истощены (с временем истощения). Истощённая нода
//! возвращается, когда прошло `respawn_time` секунд симуляции и её чанк
//! снова рядом с игроком.

use std::collections::BTreeMap;

use bevy::prelude::*;

use super::health::DeathRecord;
use super::{chunks_around, due, player_positions, LifecycleTimers};
use crate::combat::resolver::sim_now;
use crate::components::*;
use crate::config::SimulationConfig;
use crate::factory::spawn_resource_node;
use crate::registry::Registry;
use crate::scheduler::TickClock;
use crate::terrain::Terrain;

/// (chunk_x, chunk_y, индекс точки)
pub type NodeKey = (i32, i32, usize);

/// Ноды за пределом view_distance + CLEANUP_MARGIN снимаются
const CLEANUP_MARGIN: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Depletion {
    pub at: f32,
    pub respawn_time: f32,
}

#[derive(Resource, Debug, Default)]
pub struct ResourceLedger {
    pub spawned: BTreeMap<NodeKey, Entity>,
    pub depleted: BTreeMap<NodeKey, Depletion>,
}

impl ResourceLedger {
    pub fn is_depleted(&self, key: &NodeKey) -> bool {
        self.depleted.contains_key(key)
    }

    /// Снимает истощение с нод, чьё время вышло. Возвращает их ключи.
    pub fn release_expired(&mut self, now: f32) -> Vec<NodeKey> {
        let expired: Vec<NodeKey> = self
            .depleted
            .iter()
            .filter(|(_, d)| now - d.at >= d.respawn_time)
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            self.depleted.remove(key);
        }
        expired
    }
}

fn key_of(node: &ResourceNode) -> NodeKey {
    (node.chunk.x, node.chunk.y, node.resource_index)
}

/// Обработчик смерти: нода истощена и удаляется из мира.
pub fn on_death(world: &mut World, record: &DeathRecord) {
    if !record.tags.has(Tag::Resource) {
        return;
    }
    let now = sim_now(world);
    if world.get::<ResourceNode>(record.entity).is_none() {
        world.mark_for_destroy(record.entity);
        return;
    }
    let Some(mut node) = world.get_mut::<ResourceNode>(record.entity) else {
        return;
    };
    node.depleted = true;
    node.depleted_at = now;
    let key = key_of(&node);
    let respawn_time = node.respawn_time;

    let mut ledger = world.resource_mut::<ResourceLedger>();
    ledger.spawned.remove(&key);
    ledger.depleted.insert(key, Depletion {
        at: now,
        respawn_time,
    });
    world.mark_for_destroy(record.entity);
    crate::log(&format!(
        "🪓 Resource {:?} depleted, respawn in {:.0}s",
        key, respawn_time
    ));
}

pub fn resource_system(world: &mut World) {
    let dt = world.resource::<TickClock>().dt;
    let (interval, view_distance) = {
        let config = world.resource::<SimulationConfig>();
        (config.resource_respawn_interval, config.view_distance)
    };
    if !due(&mut world.resource_mut::<LifecycleTimers>().resources, dt, interval) {
        return;
    }
    if !world.contains_resource::<Terrain>() {
        return;
    }

    let now = sim_now(world);
    let released = world.resource_mut::<ResourceLedger>().release_expired(now);
    for key in released {
        crate::log(&format!("🌱 Resource {:?} ready to respawn", key));
    }

    let players = player_positions(world);
    let active = chunks_around(&players, view_distance);
    let kept = chunks_around(&players, view_distance + CLEANUP_MARGIN);

    // Ноды в выгруженных чанках
    let stale: Vec<(NodeKey, Entity)> = world
        .resource::<ResourceLedger>()
        .spawned
        .iter()
        .filter(|((cx, cy, _), _)| !kept.contains(&(*cx, *cy)))
        .map(|(key, entity)| (*key, *entity))
        .collect();
    for (key, entity) in stale {
        world.resource_mut::<ResourceLedger>().spawned.remove(&key);
        world.mark_for_destroy(entity);
    }

    // Недостающие ноды в активных чанках
    let mut to_spawn = Vec::new();
    {
        let terrain = world.resource::<Terrain>();
        let ledger = world.resource::<ResourceLedger>();
        for &(cx, cy) in &active {
            let chunk = IVec2::new(cx, cy);
            for (index, point) in terrain.resource_points(chunk).iter().enumerate() {
                let key = (cx, cy, index);
                if ledger.spawned.contains_key(&key) || ledger.is_depleted(&key) {
                    continue;
                }
                to_spawn.push((key, point.clone()));
            }
        }
    }

    for ((cx, cy, index), point) in to_spawn {
        let entity = spawn_resource_node(world, &point, IVec2::new(cx, cy), index);
        world
            .resource_mut::<ResourceLedger>()
            .spawned
            .insert((cx, cy, index), entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatEvents;
    use crate::content::ContentTables;
    use crate::lifecycle::{death_system, PendingLoot};
    use crate::terrain::{GridTerrain, ResourcePoint};
    use crate::DeterministicRng;
    use bevy::ecs::system::RunSystemOnce;

    fn tree(x: f32, y: f32) -> ResourcePoint {
        ResourcePoint {
            resource_id: "oak".to_string(),
            name: "Oak".to_string(),
            color: "#2e7d32".to_string(),
            x,
            y,
            size: 28.0,
            health: 40.0,
            tool: Some("axe".to_string()),
            tool_tier: 1,
            respawn_time: 30.0,
            drops: Vec::new(),
        }
    }

    fn world() -> World {
        let mut terrain = GridTerrain::open_area(IVec2::new(-4, -4), IVec2::new(4, 4));
        terrain.add_resource_point(tree(100.0, 100.0));
        terrain.add_resource_point(tree(200.0, 100.0));

        let mut world = World::new();
        world.insert_resource(Terrain::new(terrain));
        world.insert_resource(TickClock {
            dt: 1.0,
            elapsed: 0.0,
            tick: 0,
        });
        world.insert_resource(SimulationConfig::default());
        world.insert_resource(ContentTables::default());
        world.insert_resource(DeterministicRng::new(1));
        world.init_resource::<CombatEvents>();
        world.init_resource::<PendingLoot>();
        world.init_resource::<ResourceLedger>();
        world.init_resource::<LifecycleTimers>();
        world.spawn((Position::new(50.0, 50.0), Tags::of(&[Tag::Player])));
        world
    }

    fn advance(world: &mut World, seconds: f32) {
        world.resource_mut::<TickClock>().elapsed += seconds;
        world.run_system_once(resource_system).expect("resources");
    }

    fn nodes(world: &mut World) -> usize {
        world.get_by_tag(Tag::Resource).len()
    }

    #[test]
    fn test_nodes_spawn_near_players_once() {
        let mut world = world();
        advance(&mut world, 1.0);
        assert_eq!(nodes(&mut world), 2);
        advance(&mut world, 1.0);
        assert_eq!(nodes(&mut world), 2, "повторный проход не дублирует");
    }

    #[test]
    fn test_depleted_node_respawns_after_timer() {
        let mut world = world();
        advance(&mut world, 1.0);
        let oak = world.get_by_tag(Tag::Resource)[0];
        world.get_mut::<Health>(oak).expect("hp").current = 0.0;
        world.run_system_once(death_system).expect("death");

        assert!(world.get::<ResourceNode>(oak).is_some_and(|n| n.depleted));
        assert_eq!(world.resource::<ResourceLedger>().depleted.len(), 1);
        world.flush_destroyed();
        assert_eq!(nodes(&mut world), 1);

        advance(&mut world, 10.0);
        assert_eq!(nodes(&mut world), 1, "ещё рано");

        advance(&mut world, 25.0);
        assert_eq!(nodes(&mut world), 2);
        assert!(world.resource::<ResourceLedger>().depleted.is_empty());
    }
}
