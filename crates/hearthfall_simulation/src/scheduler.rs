//! Tick Scheduler: приоритетный список one-shot систем.
//!
//! Системы регистрируются плагинами через `add_tick_system(name, priority, system)`.
//! Первый запуск после регистрации делает стабильную сортировку по приоритету
//! (tiebreak = порядок регистрации) и кеширует порядок.

use bevy::ecs::system::SystemId;
use bevy::prelude::*;

use crate::error::SimError;

pub mod priority {
    pub const AI: i32 = 5;
    pub const STATS: i32 = 8;
    pub const MOVEMENT: i32 = 10;
    pub const PROJECTILES: i32 = 11;
    pub const STATUS_EFFECTS: i32 = 12;
    pub const SKILLS: i32 = 13;
    pub const DAMAGE_ZONES: i32 = 14;
    pub const COMBAT: i32 = 15;
    pub const COLLISION: i32 = 20;
    pub const HEALTH: i32 = 25;
    pub const LOOT: i32 = 26;
    pub const RESOURCE_RESPAWN: i32 = 48;
    pub const SPAWN: i32 = 50;
    pub const DESPAWN: i32 = 51;
    pub const QUEST_TRACKING: i32 = 90;
}

/// Часы симуляции. `elapsed`: единственный источник "времени" для логики.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct TickClock {
    pub dt: f32,
    pub elapsed: f32,
    pub tick: u64,
}

impl TickClock {
    pub fn advance(&mut self, dt: f32) {
        self.dt = dt;
        self.elapsed += dt;
        self.tick += 1;
    }
}

#[derive(Debug, Clone)]
struct TickSystem {
    name: &'static str,
    priority: i32,
    id: SystemId,
    enabled: bool,
}

#[derive(Resource, Debug, Default)]
pub struct TickScheduler {
    systems: Vec<TickSystem>,
    sorted: bool,
}

impl TickScheduler {
    pub fn register(&mut self, name: &'static str, priority: i32, id: SystemId) {
        self.systems.push(TickSystem {
            name,
            priority,
            id,
            enabled: true,
        });
        self.sorted = false;
    }

    /// Возвращает false, если система с таким именем не зарегистрирована.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let mut found = false;
        for system in self.systems.iter_mut().filter(|s| s.name == name) {
            system.enabled = enabled;
            found = true;
        }
        found
    }

    /// Имена систем в порядке выполнения.
    pub fn order(&mut self) -> Vec<&'static str> {
        self.ensure_sorted();
        self.systems.iter().map(|s| s.name).collect()
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            // sort_by_key стабильный → при равных приоритетах порядок регистрации
            self.systems.sort_by_key(|s| s.priority);
            self.sorted = true;
        }
    }

    fn enabled_systems(&mut self) -> Vec<(&'static str, SystemId)> {
        self.ensure_sorted();
        self.systems
            .iter()
            .filter(|s| s.enabled)
            .map(|s| (s.name, s.id))
            .collect()
    }
}

/// Один тик: продвигает часы и прогоняет все включённые системы по приоритету.
pub fn run_tick(world: &mut World, dt: f32) -> Result<(), SimError> {
    world.resource_mut::<TickClock>().advance(dt);

    let systems = world.resource_mut::<TickScheduler>().enabled_systems();
    for (name, id) in systems {
        world.run_system(id).map_err(|err| SimError::SystemFailed {
            name: name.to_string(),
            reason: err.to_string(),
        })?;
    }
    Ok(())
}

pub struct SchedulerPlugin;

impl Plugin for SchedulerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TickClock>()
            .init_resource::<TickScheduler>();
    }
}

pub trait TickSystemAppExt {
    fn add_tick_system<M>(
        &mut self,
        name: &'static str,
        priority: i32,
        system: impl IntoSystem<(), (), M> + 'static,
    ) -> &mut Self;
}

impl TickSystemAppExt for App {
    fn add_tick_system<M>(
        &mut self,
        name: &'static str,
        priority: i32,
        system: impl IntoSystem<(), (), M> + 'static,
    ) -> &mut Self {
        let world = self.world_mut();
        world.init_resource::<TickScheduler>();
        let id = world.register_system(system);
        world.resource_mut::<TickScheduler>().register(name, priority, id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Resource, Default)]
    struct Trace(Vec<&'static str>);

    fn app_with(systems: &[(&'static str, i32)]) -> App {
        let mut app = App::new();
        app.add_plugins(SchedulerPlugin).init_resource::<Trace>();
        for &(name, prio) in systems {
            app.add_tick_system(name, prio, move |mut trace: ResMut<Trace>| {
                trace.0.push(name)
            });
        }
        app
    }

    #[test]
    fn test_priority_order_is_stable() {
        let mut app = app_with(&[("combat", 15), ("ai_a", 5), ("collision", 20), ("ai_b", 5)]);
        run_tick(app.world_mut(), 0.05).expect("tick");

        assert_eq!(
            app.world().resource::<Trace>().0,
            vec!["ai_a", "ai_b", "combat", "collision"],
            "равные приоритеты идут в порядке регистрации"
        );
    }

    #[test]
    fn test_disabled_system_skipped() {
        let mut app = app_with(&[("a", 1), ("b", 2)]);
        assert!(app.world_mut().resource_mut::<TickScheduler>().set_enabled("a", false));
        assert!(!app.world_mut().resource_mut::<TickScheduler>().set_enabled("nope", false));
        run_tick(app.world_mut(), 0.05).expect("tick");

        assert_eq!(app.world().resource::<Trace>().0, vec!["b"]);
        let clock = *app.world().resource::<TickClock>();
        assert_eq!(clock.tick, 1);
        assert!((clock.elapsed - 0.05).abs() < 1e-6);
    }
}
