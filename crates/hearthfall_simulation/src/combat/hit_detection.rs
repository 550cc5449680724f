//! Поиск целей в радиусе.

use bevy::prelude::*;

use crate::components::{Collider, CollisionLayer, Health, Position};
use crate::registry::Inactive;

/// Живые сущности с Health в радиусе `range`, ближайшие первыми.
///
/// `layer` фильтрует только тех, у кого есть коллайдер: без коллайдера сущность
/// проходит любой фильтр. При равной дистанции порядок по `Entity`.
pub fn query_area(
    world: &mut World,
    center: Vec2,
    range: f32,
    exclude: Option<Entity>,
    layer: Option<CollisionLayer>,
) -> Vec<Entity> {
    let range_sq = range * range;
    let mut query = world
        .query_filtered::<(Entity, &Position, &Health, Option<&Collider>), Without<Inactive>>();

    let mut hits: Vec<(f32, Entity)> = query
        .iter(world)
        .filter(|(entity, _, health, _)| Some(*entity) != exclude && health.is_alive())
        .filter(|(_, _, _, collider)| match (layer, collider) {
            (Some(layer), Some(collider)) => collider.layer == layer,
            _ => true,
        })
        .map(|(entity, pos, _, _)| (pos.xy().distance_squared(center), entity))
        .filter(|(dist_sq, _)| *dist_sq <= range_sq)
        .collect();

    hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    hits.into_iter().map(|(_, entity)| entity).collect()
}

pub fn find_nearest(
    world: &mut World,
    center: Vec2,
    range: f32,
    exclude: Option<Entity>,
    layer: Option<CollisionLayer>,
) -> Option<Entity> {
    query_area(world, center, range, exclude, layer).into_iter().next()
}
