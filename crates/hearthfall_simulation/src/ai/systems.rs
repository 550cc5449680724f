//! AI tick-система (приоритет 5).
//!
//! Порядок на актора (по возрастанию Entity):
//! 1. мёртвый → стоит, решений нет
//! 2. цель: стража ищет врагов, Flee следит за своим threat, остальные за игроками
//! 3. босс → фаза + boss FSM; кастер в бою → windup/cast; иначе базовая FSM
//! 4. velocity × speed modifier статус-эффектов
//!
//! Способности, которым нужен весь мир (ground pound, каст), исполняются
//! после решения актора, когда его компоненты уже отпущены.

use bevy::ecs::query::QueryData;
use bevy::prelude::*;

use super::boss::{self, BossStep};
use super::caster::{self, CastStep};
use super::fsm::{self, Sighting};
use super::perception::Perception;
use crate::components::*;
use crate::config::{BossTuning, SimulationConfig};
use crate::registry::Inactive;
use crate::scheduler::TickClock;
use crate::DeterministicRng;

/// Что исполнить после решения актора
#[derive(Debug, Clone)]
enum AiAction {
    Boss(BossAbility),
    Cast(CasterSkill),
}

#[derive(QueryData)]
#[query_data(mutable)]
struct ActorQuery {
    ai: &'static mut Ai,
    velocity: &'static mut Velocity,
    position: &'static Position,
    combat: Option<&'static mut Combat>,
    health: Option<&'static mut Health>,
    effects: Option<&'static mut StatusEffects>,
    boss: Option<&'static mut BossBrain>,
    caster: Option<&'static mut CasterBrain>,
    horse: Option<&'static Horse>,
}

pub fn ai_system(world: &mut World) {
    let dt = world.resource::<TickClock>().dt;
    let tuning = world
        .get_resource::<SimulationConfig>()
        .map(|c| c.boss.clone())
        .unwrap_or_default();
    let perception = Perception::gather(world);

    let mut actors: Vec<Entity> = world
        .query_filtered::<Entity, (With<Ai>, Without<Inactive>)>()
        .iter(world)
        .collect();
    actors.sort();

    let mut state = world.query::<ActorQuery>();
    for entity in actors {
        let action = world.resource_scope(|world, mut rng: Mut<DeterministicRng>| {
            let Ok(mut actor) = state.get_mut(world, entity) else {
                return None;
            };
            think(&mut actor, &perception, &tuning, &mut rng, dt)
        });

        match action {
            Some(AiAction::Boss(ability)) => boss::execute_ability(world, entity, ability, &tuning),
            Some(AiAction::Cast(skill)) => caster::execute_cast(world, entity, &skill),
            None => {}
        }
    }
}

fn pick_target(ai: &Ai, pos: Vec2, perception: &Perception) -> Option<Sighting> {
    if ai.state == AiState::Flee {
        if let Some(threat) = ai.threat.and_then(|t| perception.sighting(pos, t)) {
            return Some(threat);
        }
    }
    perception.nearest_for(ai.behavior, pos)
}

fn think(
    actor: &mut ActorQueryItem,
    perception: &Perception,
    tuning: &BossTuning,
    rng: &mut DeterministicRng,
    dt: f32,
) -> Option<AiAction> {
    if actor.health.as_deref().is_some_and(|h| !h.is_alive()) {
        actor.velocity.stop();
        return None;
    }
    // Оседланная лошадь слушается всадника
    if actor.horse.is_some_and(|h| h.mounted) {
        return None;
    }

    let pos = actor.position.xy();
    let target = pick_target(&actor.ai, pos, perception);

    let action = if let Some(brain) = actor.boss.as_deref_mut() {
        if let Some(health) = actor.health.as_deref() {
            if boss::update_phase(brain, health, actor.effects.as_deref_mut(), tuning) {
                crate::log(&format!("👹 Boss phase → {}", brain.phase));
            }
        }
        let shell_active = actor
            .effects
            .as_deref()
            .is_some_and(|se| se.has("copper_shell"));

        match boss::step(
            &mut actor.ai,
            brain,
            &mut actor.velocity,
            actor.combat.as_deref_mut(),
            pos,
            target,
            shell_active,
            tuning,
            rng,
            dt,
        ) {
            BossStep::Execute(ability) => Some(AiAction::Boss(ability)),
            BossStep::ArrivedHome => {
                if let Some(health) = actor.health.as_deref_mut() {
                    health.current = health.max;
                }
                None
            }
            BossStep::Continue => None,
        }
    } else {
        step_regular(actor, pos, target, rng, dt)
    };

    if let Some(effects) = actor.effects.as_deref() {
        let speed_mod = effects.speed_modifier();
        actor.velocity.dx *= speed_mod;
        actor.velocity.dy *= speed_mod;
    }
    action
}

fn step_regular(
    actor: &mut ActorQueryItem,
    pos: Vec2,
    target: Option<Sighting>,
    rng: &mut DeterministicRng,
    dt: f32,
) -> Option<AiAction> {
    let mut action = None;
    let mut casting = false;

    if let Some(brain) = actor.caster.as_deref_mut() {
        if fsm::enforce_leash(&mut actor.ai, pos) {
            brain.windup = None;
        }
        let engaged = brain.windup.is_some()
            || matches!(actor.ai.state, AiState::Chase | AiState::Attack);
        if engaged {
            let hp = actor.health.as_deref().map_or(1.0, Health::percent);
            match caster::step(brain, &mut actor.velocity, hp, target, rng, dt) {
                CastStep::Idle => {}
                CastStep::Casting => casting = true,
                CastStep::Execute(index) => {
                    casting = true;
                    action = brain.skills.get(index).cloned().map(AiAction::Cast);
                }
            }
        }
    }

    if casting {
        actor.ai.state_timer += dt;
    } else {
        fsm::step(
            &mut actor.ai,
            &mut actor.velocity,
            actor.combat.as_deref_mut(),
            pos,
            target,
            rng,
            dt,
        );
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatEvents;
    use bevy::ecs::system::RunSystemOnce;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(DeterministicRng::new(9));
        world.insert_resource(SimulationConfig::default());
        world.insert_resource(TickClock {
            dt: 0.05,
            elapsed: 1.0,
            tick: 20,
        });
        world.init_resource::<CombatEvents>();
        world
    }

    fn spawn_player(world: &mut World, x: f32) -> Entity {
        world
            .spawn((
                Position::new(x, 0.0),
                Health::new(100.0),
                StatusEffects::default(),
                Tags::of(&[Tag::Player]),
            ))
            .id()
    }

    fn spawn_wolf(world: &mut World, x: f32) -> Entity {
        world
            .spawn((
                Position::new(x, 0.0),
                Velocity::with_speed(100.0),
                Health::new(50.0),
                Combat::default(),
                Ai::new(Behavior::Aggressive, Vec2::ZERO),
                StatusEffects::default(),
                Tags::of(&[Tag::Enemy]),
            ))
            .id()
    }

    fn run(world: &mut World) {
        world.run_system_once(ai_system).expect("ai_system");
    }

    #[test]
    fn test_aggressive_chases_nearest_living_player() {
        let mut world = world();
        let wolf = spawn_wolf(&mut world, 0.0);
        let near = spawn_player(&mut world, 100.0);
        let dead = spawn_player(&mut world, 50.0);
        world.get_mut::<Health>(dead).expect("hp").current = 0.0;

        run(&mut world);
        let ai = world.get::<Ai>(wolf).expect("ai");
        assert_eq!(ai.state, AiState::Chase);

        run(&mut world);
        let ai = world.get::<Ai>(wolf).expect("ai");
        assert_eq!(ai.target, Some(near), "мёртвый игрок не цель");
        assert!(world.get::<Velocity>(wolf).expect("vel").dx > 0.0);
    }

    #[test]
    fn test_slow_scales_velocity() {
        let mut world = world();
        let wolf = spawn_wolf(&mut world, 0.0);
        spawn_player(&mut world, 100.0);
        {
            let mut ai = world.get_mut::<Ai>(wolf).expect("ai");
            ai.transition(AiState::Chase);
        }
        world
            .get_mut::<StatusEffects>(wolf)
            .expect("se")
            .add(StatusEffect::new("slow", 2.0).speed(0.5));

        run(&mut world);
        assert!((world.get::<Velocity>(wolf).expect("vel").dx - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_dead_actor_stands_still() {
        let mut world = world();
        let wolf = spawn_wolf(&mut world, 0.0);
        spawn_player(&mut world, 100.0);
        world.get_mut::<Velocity>(wolf).expect("vel").set(30.0, 0.0);
        world.get_mut::<Health>(wolf).expect("hp").current = 0.0;

        run(&mut world);
        let vel = world.get::<Velocity>(wolf).expect("vel");
        assert_eq!((vel.dx, vel.dy), (0.0, 0.0));
        assert_eq!(world.get::<Ai>(wolf).map(|a| a.state), Some(AiState::Idle));
    }

    #[test]
    fn test_guard_hunts_enemies_not_players() {
        let mut world = world();
        let mut ai = Ai::new(Behavior::Guard, Vec2::ZERO);
        ai.leash_range = 128.0;
        let guard = world
            .spawn((
                Position::new(0.0, 0.0),
                Velocity::with_speed(80.0),
                Health::new(200.0),
                Combat::default(),
                ai,
                Tags::of(&[Tag::Npc, Tag::Guard]),
            ))
            .id();
        spawn_player(&mut world, 20.0);
        let wolf = spawn_wolf(&mut world, -100.0);
        run(&mut world);

        let ai = world.get::<Ai>(guard).expect("ai");
        assert_eq!(ai.target, Some(wolf));
    }

    #[test]
    fn test_boss_enters_phase_two_on_damage() {
        let mut world = world();
        let boss = world
            .spawn((
                Position::new(0.0, 0.0),
                Velocity::with_speed(60.0),
                Health::new(500.0),
                Combat::default(),
                Ai::new(Behavior::Boss, Vec2::ZERO),
                StatusEffects::default(),
                BossBrain::default(),
                Tags::of(&[Tag::Enemy, Tag::Boss]),
            ))
            .id();
        world.get_mut::<Health>(boss).expect("hp").current = 250.0;

        run(&mut world);
        assert_eq!(world.get::<BossBrain>(boss).map(|b| b.phase), Some(2));
        let se = world.get::<StatusEffects>(boss).expect("se");
        assert_eq!(se.get(boss::PHASE_BUFF).and_then(|e| e.damage_mod), Some(1.25));
    }

    #[test]
    fn test_boss_heals_when_back_home() {
        let mut world = world();
        let mut ai = Ai::new(Behavior::Boss, Vec2::ZERO);
        ai.transition(AiState::Return);
        let boss = world
            .spawn((
                Position::new(5.0, 0.0),
                Velocity::with_speed(60.0),
                Health::new(500.0),
                Combat::default(),
                ai,
                StatusEffects::default(),
                BossBrain::default(),
                Tags::of(&[Tag::Enemy, Tag::Boss]),
            ))
            .id();
        world.get_mut::<Health>(boss).expect("hp").current = 400.0;

        run(&mut world);
        assert_eq!(world.get::<Health>(boss).map(|h| h.current), Some(500.0));
        assert_eq!(world.get::<Ai>(boss).map(|a| a.state), Some(AiState::Idle));
    }

    #[test]
    fn test_caster_stops_to_cast_then_fires() {
        let mut world = world();
        let bolt = CasterSkill {
            id: "shadow_bolt".to_string(),
            cast_range: Some(200.0),
            hp_threshold: None,
            cast_chance: 1.0,
            windup: 0.1,
            cooldown: 8.0,
            effect: CasterEffect::RangedProjectile {
                speed: 400.0,
                damage: 10.0,
                projectile_type: "shadow_bolt".to_string(),
            },
        };
        let mut ai = Ai::new(Behavior::Aggressive, Vec2::ZERO);
        ai.transition(AiState::Chase);
        let mage = world
            .spawn((
                Position::new(0.0, 0.0),
                Velocity::with_speed(70.0),
                Health::new(60.0),
                Combat::default(),
                ai,
                StatusEffects::default(),
                CasterBrain::new(vec![bolt]),
                Tags::of(&[Tag::Enemy]),
            ))
            .id();
        spawn_player(&mut world, 120.0);

        run(&mut world);
        assert!(world.get::<CasterBrain>(mage).is_some_and(|b| b.windup.is_some()));
        assert_eq!(world.get::<Velocity>(mage).map(|v| v.dx), Some(0.0));

        for _ in 0..3 {
            run(&mut world);
        }
        let mut projectiles = world.query::<&Projectile>();
        assert_eq!(projectiles.iter(&world).count(), 1, "windup 0.1 → выстрел");
    }
}
