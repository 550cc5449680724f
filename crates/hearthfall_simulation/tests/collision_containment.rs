//! Collision containment: враг, рвущийся к игроку через стену,
//! никогда не оказывается AABB внутри solid тайла.

use bevy::prelude::*;
use hearthfall_simulation::collision::TileCollision;
use hearthfall_simulation::factory::{spawn_enemy, EnemyTemplate};
use hearthfall_simulation::terrain::{SpawnPoint, TILE_WALL};
use hearthfall_simulation::*;

fn walled_arena() -> GridTerrain {
    let mut terrain = GridTerrain::open_area(IVec2::new(-1, -1), IVec2::new(3, 3));
    // Вертикальная стена x = 640..704 px, с проходом сверху
    terrain.fill_tiles(20, 6, 21, 30, TILE_WALL);
    terrain
}

fn assert_outside_walls(sim: &Simulation, entity: Entity, tick: usize) {
    let world = sim.world();
    let (Some(pos), Some(collider)) = (world.get::<Position>(entity), world.get::<Collider>(entity))
    else {
        return;
    };
    let terrain = world.resource::<Terrain>();
    let tiles = TileCollision::new(&**terrain);
    assert!(
        !tiles.overlaps_solid(collider.center(pos), collider.half_extents()),
        "тик {}: AABB в стене на ({}, {})",
        tick,
        pos.x(),
        pos.y()
    );
}

#[test]
fn test_chasers_never_enter_walls() {
    let config = SimulationConfig {
        respawn_point: (560.0, 512.0),
        ..Default::default()
    };
    let mut sim = Simulation::new(config, walled_arena());
    sim.join(1, "Ann", "#e74c3c", None).expect("join");

    let template = EnemyTemplate {
        id: "wolf".to_string(),
        speed: 140.0,
        aggro_range: 400.0,
        deaggro_range: 800.0,
        leash_range: 900.0,
        ..Default::default()
    };
    let chasers: Vec<Entity> = [(800.0, 512.0), (780.0, 300.0), (820.0, 700.0)]
        .into_iter()
        .map(|(x, y)| {
            spawn_enemy(
                sim.world_mut(),
                &SpawnPoint {
                    x,
                    y,
                    template: template.clone(),
                },
            )
        })
        .collect();

    for tick in 0..600 {
        // Игрок мечется вдоль стены
        let y = 512.0 + (tick as f32 * 0.05).sin() * 200.0;
        sim.handle_input(
            1,
            &PlayerInput {
                seq: tick as u64,
                position: Some(Vec2::new(560.0, y)),
                ..Default::default()
            },
        )
        .expect("input");
        sim.tick().expect("tick");

        for &wolf in &chasers {
            assert_outside_walls(&sim, wolf, tick);
        }
    }
}
