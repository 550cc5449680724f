//! Headless симуляция Hearthfall
//!
//! Поднимает небольшой открытый мир с точками спавна и ресурсами, подключает
//! бота-наблюдателя и гоняет тики. Аргумент: путь к JSON-конфигу (опционально).

use bevy::prelude::*;
use tracing_subscriber::EnvFilter;

use hearthfall_simulation::factory::EnemyTemplate;
use hearthfall_simulation::terrain::{ResourcePoint, SpawnPoint};
use hearthfall_simulation::{
    GridTerrain, PlayerInput, Registry, SimError, Simulation, SimulationConfig, Tag,
};

const TICKS: u64 = 2000;

fn demo_terrain() -> GridTerrain {
    let mut terrain = GridTerrain::open_area(IVec2::new(-3, -3), IVec2::new(3, 3));
    terrain.set_town(IVec2::new(1, 1), true);

    for i in 0..6 {
        terrain.add_spawn_point(SpawnPoint {
            x: -900.0 + i as f32 * 48.0,
            y: 200.0,
            template: EnemyTemplate {
                id: "wolf".to_string(),
                speed: 90.0,
                health: 40.0,
                xp_reward: 12,
                ..Default::default()
            },
        });
    }
    terrain.add_spawn_point(SpawnPoint {
        x: 1300.0,
        y: -400.0,
        template: EnemyTemplate {
            id: "wild_horse".to_string(),
            is_horse: true,
            ..Default::default()
        },
    });
    for i in 0..4 {
        terrain.add_resource_point(ResourcePoint {
            resource_id: "oak".to_string(),
            name: "Oak".to_string(),
            color: "#2e7d32".to_string(),
            x: 200.0 + i as f32 * 64.0,
            y: 900.0,
            size: 28.0,
            health: 40.0,
            tool: Some("axe".to_string()),
            tool_tier: 1,
            respawn_time: 30.0,
            drops: Vec::new(),
        });
    }
    terrain
}

fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    let seed = config.seed;
    tracing::info!("Starting Hearthfall headless simulation (seed: {})", seed);

    let mut sim = Simulation::new(config, demo_terrain());
    sim.join(1, "Scout", "#f1c40f", None)?;

    let mut sent = 0usize;
    for tick in 0..TICKS {
        // Бот ходит по кругу вокруг точки респавна
        let angle = tick as f32 * 0.01;
        let input = PlayerInput {
            seq: tick + 1,
            position: Some(Vec2::new(512.0, 512.0) + Vec2::new(angle.cos(), angle.sin()) * 400.0),
            attack: tick % 20 == 0,
            ..Default::default()
        };
        sim.handle_input(1, &input)?;
        sent += sim.tick()?.len();

        if tick % 200 == 0 {
            let world = sim.world();
            tracing::info!(
                "Tick {}: {} live entities, {} enemies, {} messages so far",
                tick,
                world.live_count(),
                world.get_by_tag(Tag::Enemy).len(),
                sent
            );
        }
    }

    let snapshot = sim.leave(1)?;
    tracing::info!(
        "Simulation complete: scout level {}, {} messages sent",
        snapshot.stats.level,
        sent
    );
    Ok(())
}
