//! Вражеские кастеры: выбор скилла, windup, исполнение эффекта.

use bevy::prelude::*;

use super::fsm::{nearest, Sighting};
use crate::combat::resolver::sim_now;
use crate::combat::{CombatEvents, DamageEvent};
use crate::components::*;
use crate::factory::spawn_projectile;
use crate::registry::Inactive;
use crate::DeterministicRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastStep {
    /// Не кастует: работает обычная FSM
    Idle,
    /// Windup идёт, актор стоит
    Casting,
    /// Windup закончился, исполнить скилл с этим индексом
    Execute(usize),
}

/// Шаг кастера. Вызывается в Chase/Attack или пока идёт windup.
pub fn step(
    brain: &mut CasterBrain,
    vel: &mut Velocity,
    hp_percent: f32,
    target: Option<Sighting>,
    rng: &mut DeterministicRng,
    dt: f32,
) -> CastStep {
    for cd in brain.cooldowns.iter_mut() {
        *cd = (*cd - dt).max(0.0);
    }

    if let Some((index, remaining)) = brain.windup {
        vel.stop();
        let remaining = remaining - dt;
        if remaining <= 0.0 {
            brain.windup = None;
            return CastStep::Execute(index);
        }
        brain.windup = Some((index, remaining));
        return CastStep::Casting;
    }

    let Some(target) = target else {
        return CastStep::Idle;
    };

    for (index, skill) in brain.skills.iter().enumerate() {
        if brain.cooldowns.get(index).copied().unwrap_or(0.0) > 0.0 {
            continue;
        }
        if skill.cast_range.is_some_and(|range| target.dist > range) {
            continue;
        }
        if skill.hp_threshold.is_some_and(|threshold| hp_percent > threshold) {
            continue;
        }
        // Шанс на тик, чтобы не кастовать мгновенно
        if !rng.chance(skill.cast_chance) {
            continue;
        }

        brain.windup = Some((index, skill.windup));
        if let Some(cd) = brain.cooldowns.get_mut(index) {
            *cd = skill.cooldown;
        }
        vel.stop();
        return CastStep::Casting;
    }
    CastStep::Idle
}

fn with_modifiers(mut effect: StatusEffect, modifiers: &CasterModifiers) -> StatusEffect {
    effect.armor_flat = modifiers.armor_flat;
    effect.damage_mod = modifiers.damage_mod;
    effect.attack_speed_mod = modifiers.attack_speed_mod;
    effect.damage_taken_mod = modifiers.damage_taken_mod;
    if let Some(speed) = modifiers.speed_mod {
        effect.speed_mod = speed;
    }
    effect
}

fn living_players(world: &mut World) -> Vec<(Entity, Vec2)> {
    let mut query =
        world.query_filtered::<(Entity, &Position, &Health, &Tags), Without<Inactive>>();
    let mut players: Vec<(Entity, Vec2)> = query
        .iter(world)
        .filter(|(_, _, health, tags)| tags.has(Tag::Player) && health.is_alive())
        .map(|(entity, pos, _, _)| (entity, pos.xy()))
        .collect();
    players.sort_by_key(|(entity, _)| *entity);
    players
}

/// Событие с нулевым уроном для визуального отклика
fn feedback(world: &mut World, target: Entity, caster: Entity, at: Vec2) {
    let event = DamageEvent::new(target, caster, &Position::new(at.x, at.y), 0.0);
    world.resource_mut::<CombatEvents>().push(event);
}

fn add_effect(world: &mut World, entity: Entity, effect: StatusEffect) -> bool {
    let Some(mut se) = world.get_mut::<StatusEffects>(entity) else {
        return false;
    };
    se.add(effect);
    true
}

/// Исполняет скилл кастера. Цель: ближайший живой игрок на момент исполнения.
pub fn execute_cast(world: &mut World, caster: Entity, skill: &CasterSkill) {
    let Some(origin) = world.get::<Position>(caster).map(Position::xy) else {
        return;
    };
    let players = living_players(world);
    let Some(target) = nearest(origin, &players) else {
        return;
    };
    crate::log(&format!("🔮 Caster {:?} casts {}", caster, skill.id));

    match &skill.effect {
        CasterEffect::RangedProjectile {
            speed,
            damage,
            projectile_type,
        } => {
            let Some(dir) = (target.pos - origin).try_normalize() else {
                return;
            };
            spawn_projectile(
                world,
                origin,
                dir * *speed,
                Projectile {
                    owner: Some(caster),
                    hostile: true,
                    damage: *damage,
                    projectile_type: projectile_type.clone(),
                    crit_chance: 0.05,
                    crit_multiplier: 1.5,
                    knockback: 4.0,
                    ..Default::default()
                },
            );
        }
        CasterEffect::AoeDamage { radius, damage, dot } => {
            let now = sim_now(world);
            for (player, pos) in players {
                if pos.distance(origin) > *radius {
                    continue;
                }
                let Some(mut health) = world.get_mut::<Health>(player) else {
                    continue;
                };
                let dealt = health.damage(*damage, now);
                let killed = !health.is_alive();
                let event = DamageEvent::new(player, caster, &Position::new(pos.x, pos.y), dealt)
                    .killed(killed);
                world.resource_mut::<CombatEvents>().push(event);

                if let Some(dot) = dot {
                    let effect = StatusEffect::new(dot.dot_type.clone(), dot.duration)
                        .tick_damage(dot.damage);
                    add_effect(world, player, effect);
                }
            }
        }
        CasterEffect::Dot(dot) => {
            let effect = StatusEffect::new(dot.dot_type.clone(), dot.duration)
                .tick_damage(dot.damage)
                .source(caster);
            if add_effect(world, target.entity, effect) {
                feedback(world, target.entity, caster, target.pos);
            }
        }
        CasterEffect::SelfBuff {
            buff_type,
            duration,
            modifiers,
        } => {
            add_effect(
                world,
                caster,
                with_modifiers(StatusEffect::new(buff_type.clone(), *duration), modifiers),
            );
        }
        CasterEffect::Debuff {
            debuff_type,
            duration,
            modifiers,
        } => {
            let effect = with_modifiers(
                StatusEffect::new(debuff_type.clone(), *duration).source(caster),
                modifiers,
            );
            if add_effect(world, target.entity, effect) {
                feedback(world, target.entity, caster, target.pos);
            }
        }
        CasterEffect::SelfHeal { percent } => {
            let Some(mut health) = world.get_mut::<Health>(caster) else {
                return;
            };
            if !health.is_alive() {
                return;
            }
            let amount = (health.max * percent).round();
            let healed = health.heal(amount);
            if healed > 0.0 {
                let at = Position::new(origin.x, origin.y);
                let mut event = DamageEvent::new(caster, caster, &at, healed);
                event.is_heal = true;
                world.resource_mut::<CombatEvents>().push(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TickClock;

    fn skill(effect: CasterEffect) -> CasterSkill {
        CasterSkill {
            id: "test".to_string(),
            cast_range: Some(200.0),
            hp_threshold: None,
            cast_chance: 1.0,
            windup: 0.5,
            cooldown: 8.0,
            effect,
        }
    }

    fn bolt() -> CasterEffect {
        CasterEffect::RangedProjectile {
            speed: 400.0,
            damage: 10.0,
            projectile_type: "shadow_bolt".to_string(),
        }
    }

    fn sighting(dist: f32) -> Option<Sighting> {
        Some(Sighting {
            entity: Entity::from_raw(3),
            pos: Vec2::new(dist, 0.0),
            dist,
        })
    }

    #[test]
    fn test_windup_then_execute_and_cooldown() {
        let mut brain = CasterBrain::new(vec![skill(bolt())]);
        let mut vel = Velocity::with_speed(60.0);
        let mut rng = DeterministicRng::new(5);

        assert_eq!(step(&mut brain, &mut vel, 1.0, sighting(100.0), &mut rng, 0.1), CastStep::Casting);
        assert_eq!(brain.cooldowns[0], 8.0);

        let mut result = CastStep::Casting;
        for _ in 0..10 {
            result = step(&mut brain, &mut vel, 1.0, sighting(100.0), &mut rng, 0.1);
            if result != CastStep::Casting {
                break;
            }
        }
        assert_eq!(result, CastStep::Execute(0));
        assert_eq!(
            step(&mut brain, &mut vel, 1.0, sighting(100.0), &mut rng, 0.1),
            CastStep::Idle,
            "на кулдауне"
        );
    }

    #[test]
    fn test_gates_range_and_hp_threshold() {
        let mut rng = DeterministicRng::new(5);
        let mut vel = Velocity::with_speed(60.0);

        let mut brain = CasterBrain::new(vec![skill(bolt())]);
        assert_eq!(step(&mut brain, &mut vel, 1.0, sighting(300.0), &mut rng, 0.1), CastStep::Idle);

        let mut heal = skill(CasterEffect::SelfHeal { percent: 0.15 });
        heal.hp_threshold = Some(0.5);
        let mut brain = CasterBrain::new(vec![heal]);
        assert_eq!(step(&mut brain, &mut vel, 0.8, sighting(50.0), &mut rng, 0.1), CastStep::Idle);
        assert_eq!(step(&mut brain, &mut vel, 0.4, sighting(50.0), &mut rng, 0.1), CastStep::Casting);
    }

    fn world_with_player() -> (World, Entity, Entity) {
        let mut world = World::new();
        world.init_resource::<CombatEvents>();
        world.init_resource::<TickClock>();
        let caster = world
            .spawn((Position::new(0.0, 0.0), Health::new(100.0), StatusEffects::default()))
            .id();
        let player = world
            .spawn((
                Position::new(40.0, 0.0),
                Health::new(100.0),
                StatusEffects::default(),
                Tags::of(&[Tag::Player]),
            ))
            .id();
        (world, caster, player)
    }

    #[test]
    fn test_projectile_cast_is_hostile() {
        let (mut world, caster, _) = world_with_player();
        execute_cast(&mut world, caster, &skill(bolt()));

        let mut query = world.query::<(&Projectile, &Velocity)>();
        let (proj, vel) = query.single(&world).expect("снаряд");
        assert!(proj.hostile);
        assert_eq!(proj.owner, Some(caster));
        assert_eq!(proj.projectile_type, "shadow_bolt");
        assert!((vel.dx - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_aoe_with_dot() {
        let (mut world, caster, player) = world_with_player();
        let aoe = skill(CasterEffect::AoeDamage {
            radius: 64.0,
            damage: 12.0,
            dot: Some(CasterDot::default()),
        });
        execute_cast(&mut world, caster, &aoe);

        assert_eq!(world.get::<Health>(player).map(|h| h.current), Some(88.0));
        let se = world.get::<StatusEffects>(player).expect("se");
        assert_eq!(se.get("enemy_curse").map(|e| e.tick_damage), Some(5.0));
    }

    #[test]
    fn test_debuff_and_self_heal() {
        let (mut world, caster, player) = world_with_player();
        let debuff = skill(CasterEffect::Debuff {
            debuff_type: "weaken".to_string(),
            duration: 6.0,
            modifiers: CasterModifiers {
                damage_mod: Some(0.7),
                speed_mod: Some(0.8),
                ..Default::default()
            },
        });
        execute_cast(&mut world, caster, &debuff);
        let se = world.get::<StatusEffects>(player).expect("se");
        assert_eq!(se.get("weaken").and_then(|e| e.damage_mod), Some(0.7));
        assert_eq!(se.get("weaken").map(|e| e.speed_mod), Some(0.8));

        world.get_mut::<Health>(caster).expect("hp").current = 50.0;
        execute_cast(&mut world, caster, &skill(CasterEffect::SelfHeal { percent: 0.15 }));
        assert_eq!(world.get::<Health>(caster).map(|h| h.current), Some(65.0));

        let events = &world.resource::<CombatEvents>().damage;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_heal);
    }
}
