//! Spatial Collision Layer: broad-phase grid, AABB/MTV, tile map.

mod aabb;
mod spatial_grid;
mod systems;
mod tile_map;

pub use aabb::{circle_overlap, colliders_mtv, colliders_overlap, Aabb};
pub use spatial_grid::SpatialGrid;
pub use systems::{collision_system, CollisionGrid};
pub use tile_map::{SlideResult, TileCollision};

use bevy::prelude::*;

use crate::scheduler::{priority, TickSystemAppExt};

pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CollisionGrid>()
            .add_tick_system("collision", priority::COLLISION, collision_system);
    }
}
