//! Hearthfall Simulation Core
//!
//! Авторитетная tick-симуляция мультиплеерного мира на Bevy ECS 0.16:
//! реестр сущностей, коллизии, AI, боевой пайплайн, delta-синхронизация.
//!
//! Bevy здесь только как ECS-контейнер: `Main` schedule не запускается,
//! тик гоняет `TickScheduler` (one-shot системы по приоритетам).

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub mod ai;
pub mod collision;
pub mod combat;
pub mod components;
pub mod config;
pub mod content;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod logger;
pub mod movement;
pub mod persistence;
pub mod registry;
pub mod scheduler;
pub mod simulation;
pub mod stats;
pub mod sync;
pub mod terrain;

pub use ai::AiPlugin;
pub use collision::CollisionPlugin;
pub use combat::{calculate, CombatEvents, CombatPlugin, DamageEvent, DeathEvent};
pub use components::*;
pub use config::SimulationConfig;
pub use content::ContentTables;
pub use error::{ActionResult, SimError};
pub use lifecycle::LifecyclePlugin;
pub use logger::{init_logger, log, log_error, log_info, log_warning};
pub use movement::MovementPlugin;
pub use persistence::PlayerSnapshot;
pub use registry::{entity_from_id, entity_id, ComponentKind, Inactive, Registry};
pub use scheduler::{priority, run_tick, SchedulerPlugin, TickClock, TickScheduler};
pub use simulation::{InputOutcome, Outbound, PlayerInput, Simulation};
pub use stats::StatsPlugin;
pub use sync::{ClientProjection, StateDelta};
pub use terrain::{GridTerrain, Terrain, TerrainProvider};

/// Id наблюдателя (соединения)
pub type ObserverId = u64;

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let seed = app
            .world()
            .get_resource::<SimulationConfig>()
            .map(|c| c.seed)
            .unwrap_or_default();

        app.init_resource::<SimulationConfig>()
            .init_resource::<ContentTables>()
            .insert_resource(DeterministicRng::new(seed))
            .add_plugins((
                SchedulerPlugin,
                AiPlugin,
                StatsPlugin,
                MovementPlugin,
                CombatPlugin,
                CollisionPlugin,
                LifecyclePlugin,
            ));
    }
}

/// Детерминистичный RNG resource (seeded). Единственный источник случайности.
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    pub fn chance(&mut self, probability: f32) -> bool {
        probability > 0.0 && self.next_f32() < probability
    }

    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Случайное единичное направление
    pub fn direction(&mut self) -> Vec2 {
        let angle = self.next_f32() * std::f32::consts::TAU;
        Vec2::new(angle.cos(), angle.sin())
    }
}

/// Headless App со всеми подсистемами. Terrain вставляет вызывающий.
pub fn create_headless_app(config: SimulationConfig) -> App {
    let mut app = App::new();
    init_logger();
    app.insert_resource(config).add_plugins(SimulationPlugin);
    app
}
