//! Collision system (priority 20).
//!
//! Порядок важен:
//! 1. tile sweep для движущихся не-игроков (prev → current);
//! 2. пересборка spatial grid;
//! 3. расталкивание entity-entity по MTV;
//! 4. depenetrate для всех, кого толкнули в шаге 3.

use bevy::prelude::*;

use super::aabb::{colliders_mtv, Aabb};
use super::spatial_grid::SpatialGrid;
use super::tile_map::TileCollision;
use crate::components::{Collider, Position, Tag, Tags, Velocity};
use crate::config::SimulationConfig;
use crate::registry::Inactive;
use crate::terrain::Terrain;

/// Broad-phase индекс текущего тика. Рабочее состояние, не сохраняется.
#[derive(Resource, Debug, Default)]
pub struct CollisionGrid(pub SpatialGrid);

/// Запас при поиске соседей в broad-phase
const QUERY_MARGIN: f32 = 4.0;

struct Body {
    entity: Entity,
    pos: Position,
    collider: Collider,
    dynamic: bool,
    pushed: bool,
}

pub fn collision_system(world: &mut World) {
    if !world.contains_resource::<Terrain>() {
        return;
    }

    sweep_movers(world);

    let cell_size = world.resource::<SimulationConfig>().spatial_cell_size;
    let mut bodies = collect_bodies(world);

    let mut grid = SpatialGrid::new(cell_size);
    for body in &bodies {
        if body.collider.solid || body.collider.trigger {
            grid.insert(body.entity, &Aabb::of(&body.pos, &body.collider));
        }
    }

    separate_bodies(&grid, &mut bodies);

    world.resource_scope(|world, terrain: Mut<Terrain>| {
        let tiles = TileCollision::new(&**terrain);
        for body in bodies.iter_mut().filter(|b| b.pushed) {
            let center =
                tiles.depenetrate(body.collider.center(&body.pos), body.collider.half_extents());
            let fixed = center - body.collider.offset;
            body.pos.set(fixed.x, fixed.y);
            if let Some(mut pos) = world.get_mut::<Position>(body.entity) {
                pos.set(fixed.x, fixed.y);
            }
        }
    });

    world.insert_resource(CollisionGrid(grid));
}

/// Шаг 1: двигаем AABB от prev к текущей позиции через tile sweep.
/// Игроки клиент-авторитетны и сюда не попадают.
fn sweep_movers(world: &mut World) {
    let mut movers = world.query_filtered::<
        (&mut Position, &mut Velocity, &Collider, Option<&Tags>),
        Without<Inactive>,
    >();

    world.resource_scope(|world, terrain: Mut<Terrain>| {
        let tiles = TileCollision::new(&**terrain);
        for (mut pos, mut vel, collider, tags) in movers.iter_mut(world) {
            if !collider.solid || collider.trigger || tags.is_some_and(|t| t.has(Tag::Player)) {
                continue;
            }
            let from = pos.prev() + collider.offset;
            let delta = collider.center(&pos) - from;
            if delta == Vec2::ZERO {
                continue;
            }

            let result = tiles.move_and_slide(from, collider.half_extents(), delta);
            let target = result.pos - collider.offset;
            pos.set(target.x, target.y);
            if result.hit_x {
                vel.dx = 0.0;
            }
            if result.hit_y {
                vel.dy = 0.0;
            }
        }
    });
}

fn collect_bodies(world: &mut World) -> Vec<Body> {
    let mut query = world
        .query_filtered::<(Entity, &Position, &Collider, Has<Velocity>), Without<Inactive>>();
    let mut bodies: Vec<Body> = query
        .iter(world)
        .map(|(entity, pos, collider, dynamic)| Body {
            entity,
            pos: *pos,
            collider: *collider,
            dynamic,
            pushed: false,
        })
        .collect();
    bodies.sort_by_key(|b| b.entity);
    bodies
}

/// Шаг 3: каждую пару (a < b) проверяем один раз.
/// Оба динамические → 50/50, один → он получает полный MTV.
fn separate_bodies(grid: &SpatialGrid, bodies: &mut [Body]) {
    for i in 0..bodies.len() {
        if !pushes(&bodies[i].collider) {
            continue;
        }
        let query = Aabb::of(&bodies[i].pos, &bodies[i].collider).expand(QUERY_MARGIN);
        let mut candidates = grid.query(&query);
        candidates.sort();

        for other in candidates {
            if other <= bodies[i].entity {
                continue;
            }
            let Ok(j) = bodies.binary_search_by_key(&other, |b| b.entity) else {
                continue;
            };
            if !pushes(&bodies[j].collider) || (!bodies[i].dynamic && !bodies[j].dynamic) {
                continue;
            }

            let (left, right) = bodies.split_at_mut(j);
            let (a, b) = (&mut left[i], &mut right[0]);
            let Some(mtv) = colliders_mtv(&a.pos, &a.collider, &b.pos, &b.collider) else {
                continue;
            };

            match (a.dynamic, b.dynamic) {
                (true, true) => {
                    a.pos.translate(mtv.x * 0.5, mtv.y * 0.5);
                    b.pos.translate(-mtv.x * 0.5, -mtv.y * 0.5);
                    a.pushed = true;
                    b.pushed = true;
                }
                (true, false) => {
                    a.pos.translate(mtv.x, mtv.y);
                    a.pushed = true;
                }
                (false, true) => {
                    b.pos.translate(-mtv.x, -mtv.y);
                    b.pushed = true;
                }
                (false, false) => {}
            }
        }
    }
}

/// Trigger-коллайдеры детектятся, но не толкают и не толкаются
fn pushes(collider: &Collider) -> bool {
    collider.solid && !collider.trigger
}
