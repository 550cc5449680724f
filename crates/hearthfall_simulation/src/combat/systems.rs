//! Боевые tick-системы: снаряды (11), статус-эффекты (12), зоны урона (14),
//! резолв вражеских атак (15).

use bevy::prelude::*;

use super::events::DamageEvent;
use super::hit_detection::find_nearest;
use super::resolver::{
    apply_damage, apply_projectile_damage, apply_resource_damage, push_event, sim_now,
    PROJECTILE_HIT_RADIUS,
};
use crate::components::*;
use crate::config::SimulationConfig;
use crate::registry::{Inactive, Registry};
use crate::scheduler::TickClock;

/// Снаряды: стареют, бьют ближайшую цель противоположного слоя (или ресурс),
/// уничтожаются после попадания или по истечении lifetime.
pub fn projectile_system(world: &mut World) {
    let dt = world.resource::<TickClock>().dt;
    let mut query =
        world.query_filtered::<(Entity, &mut Projectile, &Position), Without<Inactive>>();
    let mut flying: Vec<(Entity, Projectile, Vec2)> = Vec::new();
    let mut expired: Vec<Entity> = Vec::new();
    for (entity, mut projectile, pos) in query.iter_mut(world) {
        projectile.age += dt;
        if projectile.expired() {
            expired.push(entity);
        } else {
            flying.push((entity, projectile.clone(), pos.xy()));
        }
    }
    flying.sort_by_key(|(entity, _, _)| *entity);

    for entity in expired {
        world.mark_for_destroy(entity);
    }

    for (entity, projectile, at) in flying {
        let layer = if projectile.hostile {
            CollisionLayer::Player
        } else {
            CollisionLayer::Enemy
        };
        let owner = projectile.owner;

        let hit = if let Some(target) =
            find_nearest(world, at, PROJECTILE_HIT_RADIUS, owner, Some(layer))
        {
            apply_projectile_damage(world, &projectile, at, target);
            true
        } else if let Some(node) =
            find_nearest(world, at, PROJECTILE_HIT_RADIUS, owner, Some(CollisionLayer::Resource))
                .filter(|node| world.get::<ResourceNode>(*node).is_some())
        {
            let attacker = owner.unwrap_or(Entity::PLACEHOLDER);
            apply_resource_damage(world, attacker, node, projectile.damage);
            true
        } else {
            false
        };

        if hit {
            if let Some(mut live) = world.get_mut::<Projectile>(entity) {
                live.hit = true;
            }
            world.mark_for_destroy(entity);
        }
    }
}

/// Статус-эффекты: таймеры, DoT/HoT (tick_damage · dt), снятие истёкших.
pub fn status_effect_system(
    clock: Res<TickClock>,
    mut actors: Query<(&mut StatusEffects, Option<&mut Health>), Without<Inactive>>,
) {
    let dt = clock.dt;
    let now = clock.elapsed;
    for (mut effects, mut health) in actors.iter_mut() {
        if effects.effects.is_empty() {
            continue;
        }
        for effect in effects.effects.iter_mut() {
            effect.remaining -= dt;
            let Some(health) = health.as_deref_mut() else {
                continue;
            };
            if !health.is_alive() {
                continue;
            }
            if effect.tick_damage > 0.0 {
                health.damage(effect.tick_damage * dt, now);
            } else if effect.tick_damage < 0.0 {
                health.heal(-effect.tick_damage * dt);
            }
        }
        effects.effects.retain(|e| e.remaining > 0.0);
    }
}

/// Зоны урона: раз в `damage_zone_tick` секунд бьют врагов в радиусе
/// долей max HP и вешают короткий slow.
pub fn damage_zone_system(world: &mut World) {
    let dt = world.resource::<TickClock>().dt;
    let interval = world.resource::<SimulationConfig>().damage_zone_tick;

    let mut query =
        world.query_filtered::<(Entity, &mut DamageZone, &Position), Without<Inactive>>();
    let mut pulsing: Vec<(Entity, DamageZone, Vec2)> = Vec::new();
    let mut expired: Vec<Entity> = Vec::new();
    for (entity, mut zone, pos) in query.iter_mut(world) {
        zone.age += dt;
        if zone.age >= zone.duration {
            expired.push(entity);
            continue;
        }
        zone.tick_timer += dt;
        if zone.tick_timer >= interval {
            zone.tick_timer -= interval;
            pulsing.push((entity, zone.clone(), pos.xy()));
        }
    }
    for entity in expired {
        world.mark_for_destroy(entity);
    }
    pulsing.sort_by_key(|(entity, _, _)| *entity);

    for (entity, zone, center) in pulsing {
        pulse_zone(world, entity, &zone, center, interval);
    }
}

fn pulse_zone(world: &mut World, zone_entity: Entity, zone: &DamageZone, center: Vec2, interval: f32) {
    let now = sim_now(world);
    let radius_sq = zone.radius * zone.radius;
    let mut victims: Vec<Entity> = world
        .get_by_tag(Tag::Enemy)
        .into_iter()
        .filter(|e| Some(*e) != zone.owner)
        .filter(|e| {
            world
                .get::<Position>(*e)
                .is_some_and(|p| p.xy().distance_squared(center) <= radius_sq)
        })
        .collect();
    victims.sort();

    let attacker = zone.owner.unwrap_or(zone_entity);
    for victim in victims {
        let Some(pos) = world.get::<Position>(victim).copied() else {
            continue;
        };
        let Some(mut health) = world.get_mut::<Health>(victim) else {
            continue;
        };
        if !health.is_alive() {
            continue;
        }
        let amount = (health.max * zone.tick_damage_percent * interval).round();
        if amount <= 0.0 {
            continue;
        }
        let actual = health.damage(amount, now);
        let killed = !health.is_alive();
        let mut event = DamageEvent::new(victim, attacker, &pos, actual).killed(killed);
        event.is_zone = true;
        push_event(world, event);

        if zone.slow_percent > 0.0 {
            if let Some(mut effects) = world.get_mut::<StatusEffects>(victim) {
                effects.add(
                    StatusEffect::new(format!("slow_zone_{}", zone.zone_type), 0.7)
                        .speed(1.0 - zone.slow_percent),
                );
            }
        }
    }
}

/// Вражеские атаки: каждый AI-актор в Attack с открытым окном атаки и живой
/// целью наносит один удар и потребляет цель, затем тикают таймеры всех Combat.
///
/// Удар резолвится до тика таймеров: окно, открытое AI в этом тике, застаёт
/// резолв при любом dt (tick rate ниже 1 / attack_duration).
pub fn combat_system(world: &mut World) {
    let dt = world.resource::<TickClock>().dt;

    let mut attackers = world.query_filtered::<(Entity, &Ai, &Combat), Without<Inactive>>();
    let mut swings: Vec<(Entity, Entity, f32)> = attackers
        .iter(world)
        .filter(|(_, ai, combat)| ai.state == AiState::Attack && combat.is_attacking)
        .filter_map(|(entity, _, combat)| combat.target.map(|target| (entity, target, combat.damage)))
        .collect();
    swings.sort_by_key(|(entity, _, _)| *entity);

    for (attacker, target, damage) in swings {
        if world.get::<Health>(attacker).is_some_and(|h| !h.is_alive()) {
            continue;
        }
        let target_alive = world.is_live(target)
            && world.get::<Health>(target).is_some_and(Health::is_alive);
        if target_alive {
            apply_damage(world, attacker, target, damage);
        }
        if let Some(mut combat) = world.get_mut::<Combat>(attacker) {
            combat.target = None;
        }
    }

    let mut timers = world.query_filtered::<&mut Combat, Without<Inactive>>();
    for mut combat in timers.iter_mut(world) {
        combat.update(dt);
    }
}
