//! Combat resolver: атака игрока, полный пайплайн урона, урон по ресурсам и от снарядов.
//!
//! Все функции работают на `&mut World` внутри тика и пишут события в `CombatEvents`.
//! Ничего не отправляется сразу: батч уходит наблюдателям в конце тика.

use bevy::prelude::*;

use super::damage::{calculate, roll_crit};
use super::events::{CombatEvents, DamageEvent};
use super::hit_detection::{find_nearest, query_area};
use crate::collision::TileCollision;
use crate::components::*;
use crate::content::{ContentTables, EquipSlot, ItemDef};
use crate::error::ActionResult;
use crate::factory::spawn_projectile;
use crate::scheduler::TickClock;
use crate::terrain::Terrain;
use crate::{log, DeterministicRng};

/// Дистанция попадания снаряда
pub const PROJECTILE_HIT_RADIUS: f32 = 12.0;

pub(crate) fn sim_now(world: &World) -> f32 {
    world.get_resource::<TickClock>().map_or(0.0, |clock| clock.elapsed)
}

pub(crate) fn push_event(world: &mut World, event: DamageEvent) {
    world.resource_mut::<CombatEvents>().push(event);
}

fn alive(world: &World, entity: Entity) -> bool {
    world.get::<Health>(entity).is_some_and(Health::is_alive)
}

/// Атака игрока (input `attack`).
///
/// Дальнобойное оружие → снаряд в ближайшего врага (или в точку прицела).
/// Ближний бой → ближайший враг в радиусе, иначе ближайший ресурс.
pub fn resolve_player_attack(
    world: &mut World,
    attacker: Entity,
    aim: Option<Vec2>,
) -> ActionResult {
    if !alive(world, attacker) {
        return ActionResult::rejected("Dead");
    }
    let Some(pos) = world.get::<Position>(attacker).copied() else {
        return ActionResult::rejected("No position");
    };
    let Some(mut combat) = world.get_mut::<Combat>(attacker) else {
        return ActionResult::rejected("Cannot attack");
    };
    if !combat.can_attack() {
        return ActionResult::not_ready();
    }
    combat.start_attack();
    let combat = combat.clone();

    if combat.is_ranged() {
        fire_player_projectile(world, attacker, &pos, &combat, aim);
        return ActionResult::ok();
    }

    if let Some(enemy) = find_nearest(
        world,
        pos.xy(),
        combat.range,
        Some(attacker),
        Some(CollisionLayer::Enemy),
    ) {
        apply_damage(world, attacker, enemy, combat.damage);
        return ActionResult::ok();
    }

    if let Some(node) = find_nearest(
        world,
        pos.xy(),
        combat.range,
        Some(attacker),
        Some(CollisionLayer::Resource),
    ) {
        apply_resource_damage(world, attacker, node, combat.damage);
        return ActionResult::ok();
    }

    ActionResult::no_target()
}

fn fire_player_projectile(
    world: &mut World,
    attacker: Entity,
    pos: &Position,
    combat: &Combat,
    aim: Option<Vec2>,
) {
    let auto_aim = find_nearest(
        world,
        pos.xy(),
        combat.range,
        Some(attacker),
        Some(CollisionLayer::Enemy),
    )
    .and_then(|target| world.get::<Position>(target))
    .map(Position::xy);

    let facing = world
        .get::<PlayerInfo>(attacker)
        .map_or(Facing::Down, |info| info.facing);
    let direction = auto_aim
        .or(aim)
        .map(|point| point - pos.xy())
        .and_then(|delta| delta.try_normalize())
        .unwrap_or_else(|| facing.direction());

    let projectile_type = combat.projectile.clone().unwrap_or_else(|| "arrow".to_string());
    let speed = projectile_speed(&projectile_type);
    spawn_projectile(
        world,
        pos.xy(),
        direction * speed,
        Projectile {
            owner: Some(attacker),
            damage: combat.damage,
            projectile_type,
            crit_chance: combat.crit_chance,
            crit_multiplier: combat.crit_multiplier,
            knockback: combat.knockback,
            ..Default::default()
        },
    );
}

/// Одноразовые баффы атакующего, снятые перед ударом
#[derive(Debug, Default)]
struct NextHit {
    damage_mod: Option<f32>,
    crit_bonus: Option<f32>,
    poison: Option<PoisonOnHit>,
}

fn take_next_hit(world: &mut World, attacker: Entity) -> NextHit {
    let mut next = NextHit::default();
    let Some(mut effects) = world.get_mut::<StatusEffects>(attacker) else {
        return next;
    };
    for effect in effects.take_next_hit() {
        if let Some(m) = effect.damage_mod {
            next.damage_mod = Some(next.damage_mod.unwrap_or(1.0) * m);
        }
        if effect.guaranteed_crit {
            let bonus = effect.crit_bonus.unwrap_or(0.0);
            next.crit_bonus = Some(next.crit_bonus.unwrap_or(0.0) + bonus);
        }
        if effect.poison_on_hit.is_some() {
            next.poison = effect.poison_on_hit;
        }
    }
    next
}

/// Dodge по статус-эффектам цели. true → удар уклонён (событие уже записано).
fn roll_dodge(world: &mut World, attacker: Entity, target: Entity, at: &Position) -> bool {
    let dodge = world
        .get::<StatusEffects>(target)
        .map_or(0.0, StatusEffects::dodge_chance);
    if dodge <= 0.0 || !world.resource_mut::<DeterministicRng>().chance(dodge) {
        return false;
    }
    let mut event = DamageEvent::new(target, attacker, at, 0.0);
    event.dodged = true;
    push_event(world, event);
    true
}

/// damage_taken_mod + щит. None → урон полностью поглощён (событие записано).
fn mitigate(
    world: &mut World,
    attacker: Entity,
    target: Entity,
    at: &Position,
    damage: f32,
    is_crit: bool,
) -> Option<f32> {
    let Some(mut effects) = world.get_mut::<StatusEffects>(target) else {
        return Some(damage);
    };
    let taken = effects.damage_taken_mod();
    let mut damage = if taken != 1.0 && damage > 0.0 {
        (damage * taken).round().max(1.0)
    } else {
        damage
    };

    let absorbed = effects.consume_shield(damage);
    if absorbed > 0.0 {
        damage -= absorbed;
        if damage <= 0.0 {
            let mut event = DamageEvent::new(target, attacker, at, 0.0).crit(is_crit);
            event.shielded = true;
            push_event(world, event);
            return None;
        }
    }
    Some(damage)
}

/// Полный пайплайн урона. Возвращает реально снятое HP.
pub fn apply_damage(world: &mut World, attacker: Entity, target: Entity, base_damage: f32) -> f32 {
    if !alive(world, target) {
        return 0.0;
    }
    let Some(target_pos) = world.get::<Position>(target).copied() else {
        return 0.0;
    };

    if roll_dodge(world, attacker, target, &target_pos) {
        return 0.0;
    }

    let next = take_next_hit(world, attacker);
    let base = next
        .damage_mod
        .map_or(base_damage, |m| (base_damage * m).round());

    let (crit_chance, crit_multiplier, knockback) = world
        .get::<Combat>(attacker)
        .map_or((0.05, 1.5, 0.0), |c| (c.crit_chance, c.crit_multiplier, c.knockback));
    let crit_mod = match next.crit_bonus {
        Some(bonus) => crit_multiplier + bonus,
        None => roll_crit(
            &mut world.resource_mut::<DeterministicRng>(),
            crit_chance,
            crit_multiplier,
        ),
    };

    let armor = world.get::<Combat>(target).map_or(0.0, |c| c.armor);
    let result = calculate(base, armor, crit_mod);
    let Some(final_damage) = mitigate(world, attacker, target, &target_pos, result.damage, result.is_crit)
    else {
        return 0.0;
    };

    let now = sim_now(world);
    let Some(mut health) = world.get_mut::<Health>(target) else {
        return 0.0;
    };
    let actual = health.damage(final_damage, now);
    let killed = !health.is_alive();
    let target_max = health.max;
    push_event(
        world,
        DamageEvent::new(target, attacker, &target_pos, actual)
            .crit(result.is_crit)
            .killed(killed),
    );

    if let Some(poison) = next.poison {
        let per_second = target_max * poison.percent;
        if per_second > 0.0 {
            if let Some(mut effects) = world.get_mut::<StatusEffects>(target) {
                effects.add(
                    StatusEffect::new("poison", poison.duration)
                        .tick_damage(per_second)
                        .source(attacker),
                );
            }
        }
    }

    if actual > 0.0 {
        apply_life_steal(world, attacker, actual);
        apply_thorns(world, attacker, target, actual, now);
    }

    if let Some(attacker_pos) = world.get::<Position>(attacker).copied() {
        apply_knockback(world, target, target_pos.xy() - attacker_pos.xy(), knockback);
    }

    if let Some(mut ai) = world.get_mut::<Ai>(target) {
        if ai.behavior == Behavior::Passive && !killed {
            ai.threat = Some(attacker);
            ai.transition(AiState::Flee);
        }
    }

    actual
}

fn apply_life_steal(world: &mut World, attacker: Entity, dealt: f32) {
    let life_steal = world
        .get::<StatusEffects>(attacker)
        .map_or(0.0, StatusEffects::life_steal);
    if life_steal <= 0.0 {
        return;
    }
    let amount = (dealt * life_steal).round();
    if let Some(mut health) = world.get_mut::<Health>(attacker) {
        if amount > 0.0 && health.is_alive() {
            health.heal(amount);
        }
    }
}

fn apply_thorns(world: &mut World, attacker: Entity, target: Entity, dealt: f32, now: f32) {
    let thorns = world
        .get::<StatusEffects>(target)
        .map_or(0.0, StatusEffects::thorns_reflect);
    let reflected = (dealt * thorns).round();
    if reflected <= 0.0 {
        return;
    }
    let Some(attacker_pos) = world.get::<Position>(attacker).copied() else {
        return;
    };
    let Some(mut health) = world.get_mut::<Health>(attacker) else {
        return;
    };
    if !health.is_alive() {
        return;
    }
    let actual = health.damage(reflected, now);
    let killed = !health.is_alive();
    let mut event = DamageEvent::new(attacker, target, &attacker_pos, actual).killed(killed);
    event.is_thorns = true;
    push_event(world, event);
}

/// Отталкивание через tile sweep: цель никогда не оказывается внутри solid тайла.
pub fn apply_knockback(world: &mut World, target: Entity, direction: Vec2, strength: f32) {
    if strength <= 0.0 {
        return;
    }
    let Some(direction) = direction.try_normalize() else {
        return;
    };
    let Some(pos) = world.get::<Position>(target).copied() else {
        return;
    };
    let delta = direction * strength;

    let collider = world.get::<Collider>(target).copied();
    let moved = match (world.get_resource::<Terrain>(), collider) {
        (Some(terrain), Some(collider)) => {
            let tiles = TileCollision::new(&**terrain);
            let slid = tiles.move_and_slide(collider.center(&pos), collider.half_extents(), delta);
            slid.pos - collider.offset
        }
        _ => pos.xy() + delta,
    };

    if let Some(mut pos) = world.get_mut::<Position>(target) {
        pos.set(moved.x, moved.y);
    }
}

/// Лучший подходящий инструмент: экипированные tool/weapon, потом инвентарь.
pub fn find_best_tool<'a>(
    world: &World,
    entity: Entity,
    content: &'a ContentTables,
    tool_type: &str,
    min_tier: u8,
) -> Option<&'a ItemDef> {
    let fits = |id: &str| {
        content
            .item(id)
            .filter(|def| def.tool_type.as_deref() == Some(tool_type) && def.tool_tier >= min_tier)
    };

    let equipped = world.get::<Equipment>(entity).into_iter().flat_map(|eq| {
        [EquipSlot::Tool, EquipSlot::Weapon]
            .into_iter()
            .filter_map(|slot| eq.get(slot))
            .filter_map(|stack| fits(&stack.item_id))
    });
    let carried = world
        .get::<Inventory>(entity)
        .into_iter()
        .flat_map(|inv| inv.stacks().filter_map(|stack| fits(&stack.item_id)));

    equipped.chain(carried).max_by_key(|def| def.tool_tier)
}

/// Урон по ресурсной ноде: без крита и брони, с проверкой инструмента.
pub fn apply_resource_damage(world: &mut World, attacker: Entity, node: Entity, base_damage: f32) -> f32 {
    if !alive(world, node) {
        return 0.0;
    }
    let Some(pos) = world.get::<Position>(node).copied() else {
        return 0.0;
    };
    let Some(resource) = world.get::<ResourceNode>(node).cloned() else {
        return 0.0;
    };

    if let Some(tool) = &resource.tool {
        let has_tool = {
            let world: &World = world;
            world.get_resource::<ContentTables>().is_some_and(|content| {
                find_best_tool(world, attacker, content, tool, resource.tool_tier).is_some()
            })
        };
        if !has_tool {
            let mut event = DamageEvent::new(node, attacker, &pos, 0.0);
            event.blocked = Some(format!("Needs {tool}"));
            push_event(world, event);
            return 0.0;
        }
    }

    let now = sim_now(world);
    let Some(mut health) = world.get_mut::<Health>(node) else {
        return 0.0;
    };
    let actual = health.damage(base_damage, now);
    let killed = !health.is_alive();
    let mut event = DamageEvent::new(node, attacker, &pos, actual).killed(killed);
    event.is_resource = true;
    push_event(world, event);
    actual
}

/// Попадание снаряда. Крит/нокбэк берутся из снаряда, а не из владельца.
pub fn apply_projectile_damage(
    world: &mut World,
    projectile: &Projectile,
    projectile_pos: Vec2,
    target: Entity,
) -> f32 {
    if !alive(world, target) {
        return 0.0;
    }
    let Some(target_pos) = world.get::<Position>(target).copied() else {
        return 0.0;
    };
    // Владелец мог уже умереть и исчезнуть: id в событии остаётся
    let owner = projectile.owner.unwrap_or(Entity::PLACEHOLDER);

    if roll_dodge(world, owner, target, &target_pos) {
        return 0.0;
    }

    let crit_mod = roll_crit(
        &mut world.resource_mut::<DeterministicRng>(),
        projectile.crit_chance,
        projectile.crit_multiplier,
    );
    let armor = world.get::<Combat>(target).map_or(0.0, |c| c.armor);
    let result = calculate(projectile.damage, armor, crit_mod);
    let Some(final_damage) = mitigate(world, owner, target, &target_pos, result.damage, result.is_crit)
    else {
        return 0.0;
    };

    let now = sim_now(world);
    let Some(mut health) = world.get_mut::<Health>(target) else {
        return 0.0;
    };
    let actual = health.damage(final_damage, now);
    let killed = !health.is_alive();
    let target_max = health.max;
    push_event(
        world,
        DamageEvent::new(target, owner, &target_pos, actual)
            .crit(result.is_crit)
            .killed(killed),
    );

    apply_knockback(
        world,
        target,
        target_pos.xy() - projectile_pos,
        projectile.knockback,
    );

    let Some(mut effects) = world.get_mut::<StatusEffects>(target) else {
        return actual;
    };
    if let Some(slow) = projectile.slow_on_hit {
        effects.add(StatusEffect::new("slow_frost", slow.duration).speed(slow.speed_mod));
    }
    if let Some(poison) = projectile.poison_on_hit {
        let per_second = target_max * poison.percent;
        if per_second > 0.0 {
            effects.add(StatusEffect::new("poison_proj", poison.duration).tick_damage(per_second));
        }
    }
    if let Some(debuff) = projectile.armor_debuff {
        effects.add(StatusEffect::new("armor_debuff_proj", debuff.duration).armor_flat(debuff.armor_flat));
    }
    if let Some(dot) = projectile.dot_on_hit {
        let per_second = target_max * dot.percent;
        if per_second > 0.0 {
            effects.add(StatusEffect::new("dot_proj", dot.duration).tick_damage(per_second));
        }
    }
    log(&format!(
        "projectile {} hit {:?} for {actual}",
        projectile.projectile_type, target
    ));
    actual
}

/// Все живые цели слоя в радиусе (для AoE скиллов)
pub fn targets_in_radius(
    world: &mut World,
    center: Vec2,
    radius: f32,
    exclude: Option<Entity>,
    layer: CollisionLayer,
) -> Vec<Entity> {
    query_area(world, center, radius, exclude, Some(layer))
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
