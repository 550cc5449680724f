//! Movement system (priority 10): pos += vel · dt.
//!
//! Игроки клиент-авторитетны: их позицию пишет input handler, здесь они пропускаются.
//! Перед сдвигом сохраняется prev: collision делает tile sweep по отрезку prev → pos.

use bevy::prelude::*;

use crate::components::{Position, Tag, Tags, Velocity};
use crate::registry::Inactive;
use crate::scheduler::{priority, TickClock, TickSystemAppExt};

pub fn movement_system(
    clock: Res<TickClock>,
    mut movers: Query<(&mut Position, &Velocity, Option<&Tags>), Without<Inactive>>,
) {
    let dt = clock.dt;
    for (mut pos, vel, tags) in movers.iter_mut() {
        if tags.is_some_and(|t| t.has(Tag::Player)) {
            continue;
        }
        pos.save_prev();
        if vel.dx != 0.0 || vel.dy != 0.0 {
            pos.translate(vel.dx * dt, vel.dy * dt);
        }
    }
}

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.add_tick_system("movement", priority::MOVEMENT, movement_system);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{run_tick, SchedulerPlugin};

    #[test]
    fn test_integrates_velocity_and_skips_players() {
        let mut app = App::new();
        app.add_plugins((SchedulerPlugin, MovementPlugin));
        let world = app.world_mut();

        let mob = world
            .spawn((Position::new(0.0, 0.0), Velocity { dx: 20.0, dy: -40.0, speed: 60.0 }))
            .id();
        let player = world
            .spawn((
                Position::new(5.0, 5.0),
                Velocity { dx: 100.0, dy: 0.0, speed: 160.0 },
                Tags::of(&[Tag::Player]),
            ))
            .id();

        run_tick(world, 0.5).expect("tick");

        let pos = world.get::<Position>(mob).expect("mob");
        assert_eq!(pos.xy(), Vec2::new(10.0, -20.0));
        assert_eq!(pos.prev(), Vec2::ZERO);
        assert_eq!(world.get::<Position>(player).map(|p| p.xy()), Some(Vec2::new(5.0, 5.0)));
    }
}
