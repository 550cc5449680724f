//! Delta sync: клиентская проекция, собранная из full + delta сообщений,
//! совпадает со снапшотом сервера на каждом тике, для каждого наблюдателя.

use std::collections::BTreeMap;

use bevy::prelude::*;
use hearthfall_simulation::factory::EnemyTemplate;
use hearthfall_simulation::sync::build_snapshot;
use hearthfall_simulation::terrain::SpawnPoint;
use hearthfall_simulation::*;

fn world_with_wolves() -> GridTerrain {
    let mut terrain = GridTerrain::open_area(IVec2::new(-2, -2), IVec2::new(3, 3));
    for i in 0..5 {
        terrain.add_spawn_point(SpawnPoint {
            x: 620.0 + i as f32 * 30.0,
            y: 600.0,
            template: EnemyTemplate {
                id: "wolf".to_string(),
                speed: 90.0,
                health: 30.0,
                ..Default::default()
            },
        });
    }
    terrain
}

#[test]
fn test_projection_matches_server_every_tick() {
    let mut sim = Simulation::new(SimulationConfig::default(), world_with_wolves());
    sim.join(1, "Ann", "#e74c3c", None).expect("join");

    let mut clients: BTreeMap<ObserverId, ClientProjection> = BTreeMap::new();
    clients.insert(1, ClientProjection::default());
    let mut states = 0;

    for tick in 0..400u64 {
        if tick == 150 {
            sim.join(2, "Bob", "#3498db", None).expect("join");
            clients.insert(2, ClientProjection::default());
        }
        let angle = tick as f32 * 0.03;
        sim.handle_input(
            1,
            &PlayerInput {
                seq: tick,
                position: Some(Vec2::new(540.0 + angle.cos() * 40.0, 540.0)),
                attack: tick % 8 == 0,
                ..Default::default()
            },
        )
        .expect("input");

        for out in sim.tick().expect("tick") {
            let client = clients.get_mut(&out.observer).expect("known observer");
            if client.apply_message(&out.message) {
                states += 1;
            }
        }

        let server = build_snapshot(sim.world_mut());
        for (observer, client) in &clients {
            assert_eq!(
                client.entities, server,
                "проекция наблюдателя {} разошлась на тике {}",
                observer, tick
            );
        }
    }
    assert!(states > 2);
}

#[test]
fn test_idle_world_sends_no_state() {
    let mut sim = Simulation::new(
        SimulationConfig::default(),
        GridTerrain::open_area(IVec2::new(-1, -1), IVec2::new(2, 2)),
    );
    sim.join(7, "Ann", "#e74c3c", None).expect("join");

    let first = sim.tick().expect("tick");
    assert!(first.iter().any(|m| m.message["type"] == "full"));

    for _ in 0..20 {
        let out = sim.tick().expect("tick");
        assert!(
            out.iter().all(|m| m.message.get("type").is_none()),
            "без изменений state не шлётся"
        );
    }
}
