//! Спавн врагов и лошадей вокруг игроков, деспавн далёких врагов.

use std::collections::BTreeMap;

use bevy::prelude::*;
use rand::seq::SliceRandom;

use super::{chunks_around, due, player_positions, LifecycleTimers};
use crate::components::*;
use crate::config::SimulationConfig;
use crate::factory::spawn_enemy;
use crate::registry::{Inactive, Registry};
use crate::scheduler::TickClock;
use crate::terrain::{SpawnPoint, Terrain};
use crate::DeterministicRng;

/// Лошадей за одну проверку на чанк
const HORSES_PER_CHECK: usize = 1;

fn count_by_chunk(world: &mut World, tag: Tag) -> BTreeMap<(i32, i32), usize> {
    let mut query = world.query_filtered::<(&Position, &Tags), Without<Inactive>>();
    let mut counts = BTreeMap::new();
    for (pos, tags) in query.iter(world) {
        if tags.has(tag) {
            let chunk = pos.chunk();
            *counts.entry((chunk.x, chunk.y)).or_insert(0) += 1;
        }
    }
    counts
}

/// Каждые spawn_interval: не-городские чанки в view_distance от игроков
/// добирают врагов (до 2 за проверку, cap 6) и лошадей (1, cap 2).
pub fn spawn_system(world: &mut World) {
    let dt = world.resource::<TickClock>().dt;
    let config = world.resource::<SimulationConfig>().clone();
    if !due(&mut world.resource_mut::<LifecycleTimers>().spawn, dt, config.spawn_interval) {
        return;
    }
    if !world.contains_resource::<Terrain>() {
        return;
    }

    let players = player_positions(world);
    if players.is_empty() {
        return;
    }
    let chunks = chunks_around(&players, config.view_distance);
    let enemies = count_by_chunk(world, Tag::Enemy);
    let horses = count_by_chunk(world, Tag::Horse);

    let plan: Vec<SpawnPoint> = world.resource_scope(|world, mut rng: Mut<DeterministicRng>| {
        let terrain = world.resource::<Terrain>();
        let mut plan = Vec::new();
        for &(cx, cy) in &chunks {
            let chunk = IVec2::new(cx, cy);
            if terrain.is_town(chunk) {
                continue;
            }
            let (mut horse_points, mut enemy_points): (Vec<&SpawnPoint>, Vec<&SpawnPoint>) = terrain
                .spawn_points(chunk)
                .iter()
                .partition(|p| p.template.is_horse);

            let current = enemies.get(&(cx, cy)).copied().unwrap_or(0);
            if current < config.max_enemies_per_chunk && !enemy_points.is_empty() {
                let count = (config.max_enemies_per_chunk - current)
                    .min(config.max_enemy_spawns_per_check);
                enemy_points.shuffle(&mut rng.rng);
                plan.extend(enemy_points.into_iter().take(count).cloned());
            }

            let current = horses.get(&(cx, cy)).copied().unwrap_or(0);
            if current < config.max_horses_per_chunk && !horse_points.is_empty() {
                let count = (config.max_horses_per_chunk - current).min(HORSES_PER_CHECK);
                horse_points.shuffle(&mut rng.rng);
                plan.extend(horse_points.into_iter().take(count).cloned());
            }
        }
        plan
    });

    if !plan.is_empty() {
        crate::log(&format!("🐺 Spawning {} creatures", plan.len()));
    }
    for point in &plan {
        spawn_enemy(world, point);
    }
}

/// Каждые despawn_interval: не-боссы дальше despawn_distance от всех игроков
/// (игрок "рядом", если близко по обеим осям) помечаются на удаление.
pub fn despawn_system(world: &mut World) {
    let dt = world.resource::<TickClock>().dt;
    let (interval, limit) = {
        let config = world.resource::<SimulationConfig>();
        (config.despawn_interval, config.despawn_distance())
    };
    if !due(&mut world.resource_mut::<LifecycleTimers>().despawn, dt, interval) {
        return;
    }

    let players = player_positions(world);
    if players.is_empty() {
        return;
    }

    let mut query = world.query_filtered::<(Entity, &Position, &Tags), Without<Inactive>>();
    let mut far: Vec<Entity> = query
        .iter(world)
        .filter(|(_, _, tags)| tags.has(Tag::Enemy) && !tags.has(Tag::Boss))
        .filter(|(_, pos, _)| {
            !players.iter().any(|(_, p)| {
                (pos.x() - p.x).abs() < limit && (pos.y() - p.y).abs() < limit
            })
        })
        .map(|(entity, _, _)| entity)
        .collect();
    far.sort();

    for entity in far {
        world.mark_for_destroy(entity);
    }
}
