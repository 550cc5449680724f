//! Tick driver: наблюдатели, input, исходящие сообщения.
//!
//! `Simulation` владеет Bevy `App` и картой наблюдателей. Между тиками
//! принимаются join/leave/input/respawn/tile-мутации; `tick()` прогоняет
//! все системы, сбрасывает помеченные сущности и собирает сообщения
//! для каждого наблюдателя (state + батчи событий + личные уведомления).

use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::combat::{resolve_player_attack, use_skill, CombatEvents, Notice};
use crate::components::*;
use crate::config::SimulationConfig;
use crate::content::ContentTables;
use crate::error::{ActionResult, SimError};
use crate::factory::spawn_player;
use crate::persistence::{capture, restore, PlayerSnapshot};
use crate::registry::{entity_id, Registry};
use crate::scheduler::{run_tick, TickClock};
use crate::sync::{build_snapshot, ObserverSync, StateMessage};
use crate::terrain::{Terrain, TerrainProvider, TileChange};
use crate::{create_headless_app, ObserverId};

/// Input наблюдателя за один кадр клиента.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerInput {
    pub seq: u64,
    /// Клиент-авторитетная позиция: записывается как есть
    pub position: Option<Vec2>,
    /// Скорость для интерполяции у других клиентов
    pub velocity: Option<Vec2>,
    pub attack: bool,
    pub aim: Option<Vec2>,
    /// Слот хотбара
    pub skill_slot: Option<usize>,
}

/// Результаты intent'ов из одного input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputOutcome {
    pub attack: Option<ActionResult>,
    pub skill: Option<ActionResult>,
}

/// Одно исходящее сообщение
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub observer: ObserverId,
    pub message: Value,
}

struct ObserverState {
    player: Entity,
    sync: ObserverSync,
}

pub struct Simulation {
    app: App,
    observers: BTreeMap<ObserverId, ObserverState>,
}

fn tagged(event: &str, payload: &impl Serialize) -> Result<Value, SimError> {
    let mut value = serde_json::to_value(payload).map_err(SimError::Encode)?;
    if let Value::Object(map) = &mut value {
        map.insert("event".to_string(), Value::from(event));
    }
    Ok(value)
}

impl Simulation {
    pub fn new(config: SimulationConfig, terrain: impl TerrainProvider + 'static) -> Self {
        let mut app = create_headless_app(config);
        app.insert_resource(Terrain::new(terrain));
        Self {
            app,
            observers: BTreeMap::new(),
        }
    }

    pub fn with_content(mut self, content: ContentTables) -> Self {
        self.app.insert_resource(content);
        self
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn tick_count(&self) -> u64 {
        self.world().resource::<TickClock>().tick
    }

    pub fn player_of(&self, observer: ObserverId) -> Option<Entity> {
        self.observers.get(&observer).map(|o| o.player)
    }

    pub fn observers(&self) -> impl Iterator<Item = ObserverId> + '_ {
        self.observers.keys().copied()
    }

    fn player(&self, observer: ObserverId) -> Result<Entity, SimError> {
        self.player_of(observer)
            .ok_or(SimError::UnknownObserver(observer))
    }

    /// Спавнит игрока в точке респавна; при наличии снапшота восстанавливает прогресс.
    /// Первый tick после join отдаёт наблюдателю полный снапшот.
    pub fn join(
        &mut self,
        observer: ObserverId,
        name: &str,
        color: &str,
        saved: Option<&PlayerSnapshot>,
    ) -> Result<Entity, SimError> {
        if self.observers.contains_key(&observer) {
            return Err(SimError::ObserverExists(observer));
        }
        let world = self.app.world_mut();
        let (x, y) = world.resource::<SimulationConfig>().respawn_point;
        let player = spawn_player(world, observer, name, color, x, y);

        if let Some(snapshot) = saved {
            if let Err(err) = restore(world, player, snapshot) {
                world.mark_for_destroy(player);
                return Err(err);
            }
        }

        world.resource_scope(|world, content: Mut<ContentTables>| {
            let level = world.get::<Stats>(player).map_or(1, |s| s.level);
            if let Some(mut skills) = world.get_mut::<Skills>(player) {
                skills.learn_skills_for_level(level, &content);
            }
        });

        self.observers.insert(
            observer,
            ObserverState {
                player,
                sync: ObserverSync::default(),
            },
        );
        crate::log(&format!(
            "👋 Observer {} joined as '{}' ({:?})",
            observer, name, player
        ));
        Ok(player)
    }

    /// Отключение: снапшот для хранилища, сущность уходит через deferred destroy.
    pub fn leave(&mut self, observer: ObserverId) -> Result<PlayerSnapshot, SimError> {
        let player = self.player(observer)?;
        let world = self.app.world_mut();
        let snapshot = capture(world, player);
        world.mark_for_destroy(player);
        self.observers.remove(&observer);
        crate::log(&format!("🚪 Observer {} left", observer));
        snapshot
    }

    /// Снапшот для autosave без отключения
    pub fn save(&mut self, observer: ObserverId) -> Result<PlayerSnapshot, SimError> {
        let player = self.player(observer)?;
        capture(self.app.world_mut(), player)
    }

    /// Респавн только мёртвого игрока: полное HP, снятие неуязвимости, телепорт.
    pub fn respawn(&mut self, observer: ObserverId) -> Result<ActionResult, SimError> {
        let player = self.player(observer)?;
        let world = self.app.world_mut();
        let (x, y) = world.resource::<SimulationConfig>().respawn_point;

        let Some(mut health) = world.get_mut::<Health>(player) else {
            return Err(SimError::UnknownEntity(entity_id(player)));
        };
        if health.is_alive() {
            return Ok(ActionResult::rejected("Not dead"));
        }
        health.current = health.max;
        health.invulnerable = false;
        health.death_handled = false;

        if let Some(mut pos) = world.get_mut::<Position>(player) {
            pos.set(x, y);
            pos.save_prev();
        }
        if let Some(mut vel) = world.get_mut::<Velocity>(player) {
            vel.stop();
        }
        if let Some(mut effects) = world.get_mut::<StatusEffects>(player) {
            effects.effects.clear();
        }
        world
            .resource_mut::<CombatEvents>()
            .notify(player, Notice::Respawned { x, y });
        crate::log(&format!("💫 Observer {} respawned at ({}, {})", observer, x, y));
        Ok(ActionResult::ok())
    }

    pub fn handle_input(
        &mut self,
        observer: ObserverId,
        input: &PlayerInput,
    ) -> Result<InputOutcome, SimError> {
        let player = self.player(observer)?;
        let world = self.app.world_mut();
        let alive = world.get::<Health>(player).is_some_and(Health::is_alive);

        if let Some(mut info) = world.get_mut::<PlayerInfo>(player) {
            info.last_input_seq = info.last_input_seq.max(input.seq);
        }

        if let (Some(target), true) = (input.position, alive) {
            let motion = world
                .get::<Position>(player)
                .map_or(Vec2::ZERO, |pos| target - pos.xy());
            if let Some(mut pos) = world.get_mut::<Position>(player) {
                pos.save_prev();
                pos.set(target.x, target.y);
            }
            if let (Some(facing), Some(mut info)) =
                (Facing::from_motion(motion), world.get_mut::<PlayerInfo>(player))
            {
                info.facing = facing;
            }
        }
        if let (Some(v), Some(mut vel)) = (input.velocity, world.get_mut::<Velocity>(player)) {
            vel.dx = v.x;
            vel.dy = v.y;
        }

        let mut outcome = InputOutcome::default();
        if input.attack {
            outcome.attack = Some(resolve_player_attack(world, player, input.aim));
        }
        if let Some(slot) = input.skill_slot {
            let skill = world
                .get::<Skills>(player)
                .and_then(|skills| skills.hotbar_skill(slot).map(str::to_string));
            outcome.skill = Some(match skill {
                Some(skill_id) => use_skill(world, player, &skill_id),
                None => ActionResult::rejected("No skill in slot"),
            });
        }
        Ok(outcome)
    }

    /// Разрушаемый террейн. Уведомление уходит всем в конце следующего тика.
    pub fn mutate_tile(
        &mut self,
        chunk: IVec2,
        local_x: u32,
        local_y: u32,
        tile: u16,
    ) -> Option<TileChange> {
        let world = self.app.world_mut();
        let change = world
            .resource_mut::<Terrain>()
            .set_tile(chunk, local_x, local_y, tile)?;
        world.resource_mut::<CombatEvents>().tiles.push(change);
        Some(change)
    }

    /// Один тик: системы, flush, state + события каждому наблюдателю.
    pub fn tick(&mut self) -> Result<Vec<Outbound>, SimError> {
        let world = self.app.world_mut();
        let dt = world.resource::<SimulationConfig>().tick_dt();
        run_tick(world, dt)?;
        world.flush_destroyed();

        let tick = world.resource::<TickClock>().tick;
        let snapshot = build_snapshot(world);
        let events = world.resource_mut::<CombatEvents>().drain();

        let mut broadcast = Vec::new();
        if !events.damage.is_empty() {
            broadcast.push(tagged("damage", &serde_json::json!({ "events": events.damage }))?);
        }
        for death in &events.deaths {
            broadcast.push(tagged("death", death)?);
        }
        for change in &events.tiles {
            broadcast.push(tagged("tileChanged", change)?);
        }

        let mut out = Vec::new();
        for (&observer, state) in self.observers.iter_mut() {
            let last_input_seq = world
                .get::<PlayerInfo>(state.player)
                .map_or(0, |info| info.last_input_seq);

            if let Some(payload) = state.sync.sync(&snapshot) {
                let message = StateMessage {
                    tick,
                    your_id: Some(entity_id(state.player)),
                    last_input_seq,
                    payload,
                };
                out.push(Outbound {
                    observer,
                    message: message.to_json()?,
                });
            }
            for message in &broadcast {
                out.push(Outbound {
                    observer,
                    message: message.clone(),
                });
            }
            for (_, notice) in events.notices.iter().filter(|(to, _)| *to == state.player) {
                out.push(Outbound {
                    observer,
                    message: serde_json::to_value(notice).map_err(SimError::Encode)?,
                });
            }
        }
        Ok(out)
    }
}
