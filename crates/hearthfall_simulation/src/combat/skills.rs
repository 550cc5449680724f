//! Скиллы игрока: исполнение (`use_skill`) и tick-система кулдаунов (13).
//!
//! Определения скиллов живут в `ContentTables`; здесь только эффект по варианту
//! `SkillEffect`. Стоимость (доля текущего HP) проверяется до любых изменений:
//! отказ никогда не оставляет частично применённый скилл.

use bevy::prelude::*;

use super::hit_detection::{find_nearest, query_area};
use super::resolver::apply_damage;
use crate::collision::TileCollision;
use crate::components::*;
use crate::content::{ContentTables, SkillDef, SkillEffect};
use crate::error::ActionResult;
use crate::registry::Inactive;
use crate::scheduler::TickClock;
use crate::terrain::Terrain;
use crate::log;

const BASE_STAT: f32 = 5.0;

/// Множитель скилла: scale_base + (stat − 5) · scale_per_point
fn scale_mult(world: &World, entity: Entity, def: &SkillDef) -> f32 {
    let Some(stat) = def.scale_stat else {
        return 1.0;
    };
    if def.scale_base == 0.0 {
        return 1.0;
    }
    match world.get::<Stats>(entity) {
        Some(stats) => def.scale_base + (stats.total(stat) - BASE_STAT) * def.scale_per_point,
        None => def.scale_base,
    }
}

fn effect_kind(def: &SkillDef) -> String {
    format!("skill_{}", def.id)
}

/// Использовать скилл `skill_id`. Кулдаун стартует только при успехе.
pub fn use_skill(world: &mut World, entity: Entity, skill_id: &str) -> ActionResult {
    let Some(health) = world.get::<Health>(entity) else {
        return ActionResult::rejected("Cannot use skills");
    };
    if !health.is_alive() {
        return ActionResult::rejected("Dead");
    }
    let current_hp = health.current;

    let Some(skills) = world.get::<Skills>(entity) else {
        return ActionResult::rejected("Cannot use skills");
    };
    if !skills.knows(skill_id) {
        return ActionResult::rejected("Skill not learned");
    }
    if !skills.can_use(skill_id) {
        return ActionResult::not_ready();
    }
    let Some(def) = world
        .get_resource::<ContentTables>()
        .and_then(|content| content.skill(skill_id))
        .cloned()
    else {
        return ActionResult::rejected("Unknown skill");
    };

    let cost = (current_hp * def.health_cost_percent).round();
    if def.health_cost_percent > 0.0 && cost >= current_hp {
        return ActionResult::rejected("Not enough health");
    }

    let result = execute(world, entity, &def);
    if !result.success {
        return result;
    }

    if cost > 0.0 {
        if let Some(mut health) = world.get_mut::<Health>(entity) {
            health.current = (health.current - cost).max(1.0);
        }
    }
    if let Some(mut skills) = world.get_mut::<Skills>(entity) {
        skills.start_cooldown(&def.id, def.cooldown);
    }
    log(&format!("{entity:?} used skill {}", def.id));
    result
}

fn add_effect(world: &mut World, entity: Entity, effect: StatusEffect) -> ActionResult {
    match world.get_mut::<StatusEffects>(entity) {
        Some(mut effects) => {
            effects.add(effect);
            ActionResult::ok()
        }
        None => ActionResult::rejected("No status effects"),
    }
}

fn execute(world: &mut World, entity: Entity, def: &SkillDef) -> ActionResult {
    let mult = scale_mult(world, entity, def);
    let kind = effect_kind(def);
    let max_hp = world.get::<Health>(entity).map_or(0.0, |h| h.max);

    match &def.effect {
        SkillEffect::NextHit => add_effect(
            world,
            entity,
            StatusEffect::new(kind, def.duration).damage_mod(mult).next_hit(),
        ),
        SkillEffect::PrecisionStrike => add_effect(
            world,
            entity,
            StatusEffect::new(kind, def.duration).guaranteed_crit(mult).next_hit(),
        ),
        SkillEffect::VenomStrike { poison_duration } => add_effect(
            world,
            entity,
            StatusEffect::new(kind, def.duration)
                .poison_on_hit(mult, *poison_duration)
                .next_hit(),
        ),
        SkillEffect::Heal => {
            let amount = (max_hp * mult).round();
            let healed = world
                .get_mut::<Health>(entity)
                .map_or(0.0, |mut health| health.heal(amount));
            ActionResult::ok_with(format!("Healed {healed}"))
        }
        SkillEffect::Dash {
            distance,
            invuln_duration,
        } => dash(world, entity, *distance, *invuln_duration, kind),
        SkillEffect::Cleave { range } => {
            let Some(combat) = world.get::<Combat>(entity).cloned() else {
                return ActionResult::rejected("Cannot cleave");
            };
            let range = if *range > 0.0 { *range } else { combat.range };
            let damage = (combat.damage * mult).round();
            let hits = strike_area(world, entity, range, damage, 1);
            ActionResult::ok_with(format!("Hits {hits}"))
        }
        SkillEffect::Whirlwind { hits, range } => {
            let Some(combat) = world.get::<Combat>(entity).cloned() else {
                return ActionResult::rejected("Cannot whirlwind");
            };
            let damage = (combat.damage * mult).round();
            let total = strike_area(world, entity, *range, damage, *hits);
            ActionResult::ok_with(format!("Hits {total}"))
        }
        SkillEffect::Execute { threshold, mult: execute_mult } => {
            let Some(combat) = world.get::<Combat>(entity).cloned() else {
                return ActionResult::rejected("Cannot execute");
            };
            let Some(center) = world.get::<Position>(entity).map(Position::xy) else {
                return ActionResult::rejected("Cannot execute");
            };
            let Some(target) =
                find_nearest(world, center, combat.range, Some(entity), Some(CollisionLayer::Enemy))
            else {
                return ActionResult::no_target();
            };
            let percent = world.get::<Health>(target).map_or(1.0, Health::percent);
            let finishing = percent <= *threshold;
            let factor = if finishing { *execute_mult } else { mult };
            apply_damage(world, entity, target, (combat.damage * factor).round());
            if finishing {
                ActionResult::ok_with("Execute")
            } else {
                ActionResult::ok()
            }
        }
        SkillEffect::Buff {
            damage_mod,
            armor_flat,
            attack_speed_mod,
            armor_mod,
        } => {
            let mut effect = StatusEffect::new(kind, def.duration);
            effect.damage_mod = *damage_mod;
            effect.armor_flat = *armor_flat;
            effect.attack_speed_mod = *attack_speed_mod;
            effect.armor_mod = *armor_mod;
            add_effect(world, entity, effect)
        }
        SkillEffect::Regeneration => add_effect(
            world,
            entity,
            StatusEffect::new(kind, def.duration).tick_damage(-(max_hp * mult)),
        ),
        SkillEffect::Shield => add_effect(
            world,
            entity,
            StatusEffect::new(kind, def.duration).shield((max_hp * mult).round()),
        ),
        SkillEffect::Evasion => add_effect(
            world,
            entity,
            StatusEffect::new(kind, def.duration).dodge(mult),
        ),
        SkillEffect::LifeSteal => add_effect(
            world,
            entity,
            StatusEffect::new(kind, def.duration).life_steal(mult),
        ),
    }
}

/// `hits` ударов по каждому живому врагу в радиусе. Возвращает число ударов.
fn strike_area(world: &mut World, entity: Entity, range: f32, damage: f32, hits: u32) -> u32 {
    let Some(center) = world.get::<Position>(entity).map(Position::xy) else {
        return 0;
    };
    let targets = query_area(world, center, range, Some(entity), Some(CollisionLayer::Enemy));
    let mut total = 0;
    for target in targets {
        for _ in 0..hits {
            if !world.get::<Health>(target).is_some_and(Health::is_alive) {
                break;
            }
            apply_damage(world, entity, target, damage);
            total += 1;
        }
    }
    total
}

/// Рывок по facing через tile sweep (сквозь стены не проходит) + короткая неуязвимость.
fn dash(world: &mut World, entity: Entity, distance: f32, invuln: f32, kind: String) -> ActionResult {
    let Some(pos) = world.get::<Position>(entity).copied() else {
        return ActionResult::rejected("Cannot dash");
    };
    let facing = world
        .get::<PlayerInfo>(entity)
        .map_or(Facing::Down, |info| info.facing);
    let delta = facing.direction() * distance;

    let collider = world.get::<Collider>(entity).copied();
    let target = match (world.get_resource::<Terrain>(), collider) {
        (Some(terrain), Some(collider)) => {
            let tiles = TileCollision::new(&**terrain);
            tiles
                .move_and_slide(collider.center(&pos), collider.half_extents(), delta)
                .pos
                - collider.offset
        }
        _ => pos.xy() + delta,
    };

    if let Some(mut pos) = world.get_mut::<Position>(entity) {
        pos.set(target.x, target.y);
    }
    if let Some(mut health) = world.get_mut::<Health>(entity) {
        health.invulnerable = true;
    }
    if let Some(mut skills) = world.get_mut::<Skills>(entity) {
        skills.dash_invuln = invuln;
    }
    if let Some(mut effects) = world.get_mut::<StatusEffects>(entity) {
        effects.add(StatusEffect::new(kind, invuln));
    }
    ActionResult::ok_with(format!("{:.0},{:.0}", target.x, target.y))
}

/// Кулдауны скиллов + снятие неуязвимости после dash.
pub fn skill_system(
    clock: Res<TickClock>,
    mut players: Query<(&mut Skills, Option<&mut Health>), Without<Inactive>>,
) {
    let dt = clock.dt;
    for (mut skills, health) in players.iter_mut() {
        skills.tick_cooldowns(dt);
        if skills.dash_invuln <= 0.0 {
            continue;
        }
        skills.dash_invuln -= dt;
        if skills.dash_invuln > 0.0 {
            continue;
        }
        skills.dash_invuln = 0.0;
        // Мёртвый игрок остаётся неуязвимым до респавна
        if let Some(mut health) = health {
            if health.is_alive() {
                health.invulnerable = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatEvents;
    use crate::terrain::{GridTerrain, TILE_WALL};
    use crate::DeterministicRng;
    use bevy::ecs::system::RunSystemOnce;

    fn world() -> World {
        let mut world = World::new();
        world.init_resource::<CombatEvents>();
        world.init_resource::<ContentTables>();
        world.insert_resource(DeterministicRng::new(5));
        let mut clock = TickClock::default();
        clock.advance(0.1);
        world.insert_resource(clock);
        world
    }

    fn player(world: &mut World, level: u32) -> Entity {
        let content = ContentTables::default();
        let mut skills = Skills::default();
        skills.learn_skills_for_level(level, &content);
        world
            .spawn((
                Position::new(100.0, 100.0),
                Health::new(100.0),
                Collider::aabb(24.0, 24.0, CollisionLayer::Player),
                Combat {
                    damage: 10.0,
                    crit_chance: 0.0,
                    range: 40.0,
                    ..Default::default()
                },
                StatusEffects::default(),
                Stats::default(),
                skills,
                PlayerInfo::new(1),
            ))
            .id()
    }

    fn dummy(world: &mut World, x: f32, hp: f32) -> Entity {
        world
            .spawn((
                Position::new(x, 100.0),
                Health::new(hp),
                Collider::aabb(24.0, 24.0, CollisionLayer::Enemy),
            ))
            .id()
    }

    #[test]
    fn test_unknown_and_cooldown() {
        let mut world = world();
        let p = player(&mut world, 1);
        assert_eq!(
            use_skill(&mut world, p, "whirlwind"),
            ActionResult::rejected("Skill not learned")
        );

        assert!(use_skill(&mut world, p, "power_strike").success);
        assert_eq!(use_skill(&mut world, p, "power_strike"), ActionResult::not_ready());
        assert!(world
            .get::<StatusEffects>(p)
            .is_some_and(|se| se.get("skill_power_strike").is_some_and(|e| e.next_hit)));
    }

    #[test]
    fn test_heal_scales_with_vit() {
        let mut world = world();
        let p = player(&mut world, 1);
        world.get_mut::<Health>(p).expect("hp").current = 10.0;
        world.get_mut::<Stats>(p).expect("stats").vit = 15;

        assert!(use_skill(&mut world, p, "heal").success);
        // 0.25 + 10 · 0.005 = 0.30 → 30 HP
        assert_eq!(world.get::<Health>(p).map(|h| h.current), Some(40.0));
    }

    #[test]
    fn test_blood_pact_cost_is_atomic() {
        let mut world = world();
        let p = player(&mut world, 6);
        world.get_mut::<Health>(p).expect("hp").current = 1.0;

        let rejected = use_skill(&mut world, p, "blood_pact");
        assert!(!rejected.success);
        assert_eq!(world.get::<Health>(p).map(|h| h.current), Some(1.0));
        assert!(!world.get::<StatusEffects>(p).is_some_and(|se| se.has("skill_blood_pact")));
        assert!(world.get::<Skills>(p).is_some_and(|s| s.can_use("blood_pact")), "кулдаун не начат");

        world.get_mut::<Health>(p).expect("hp").current = 80.0;
        assert!(use_skill(&mut world, p, "blood_pact").success);
        assert_eq!(world.get::<Health>(p).map(|h| h.current), Some(40.0));
        assert!(world.get::<StatusEffects>(p).is_some_and(|se| se.life_steal() > 0.0));
    }

    #[test]
    fn test_whirlwind_hits_each_target_three_times() {
        let mut world = world();
        let p = player(&mut world, 10);
        let a = dummy(&mut world, 130.0, 1000.0);
        let b = dummy(&mut world, 70.0, 1000.0);
        dummy(&mut world, 400.0, 1000.0);

        assert_eq!(use_skill(&mut world, p, "whirlwind"), ActionResult::ok_with("Hits 6"));
        // 10 · 0.8 = 8 за удар
        assert_eq!(world.get::<Health>(a).map(|h| h.current), Some(976.0));
        assert_eq!(world.get::<Health>(b).map(|h| h.current), Some(976.0));
    }

    #[test]
    fn test_execute_below_threshold() {
        let mut world = world();
        let p = player(&mut world, 12);
        let target = dummy(&mut world, 120.0, 100.0);
        world.get_mut::<Health>(target).expect("hp").current = 25.0;

        assert_eq!(use_skill(&mut world, p, "execute"), ActionResult::ok_with("Execute"));
        assert_eq!(world.get::<Health>(target).map(|h| h.current), Some(0.0), "10 × 3 = 30");
    }

    #[test]
    fn test_dash_stops_at_wall_and_invuln_expires() {
        let mut world = world();
        let mut terrain = GridTerrain::open_area(IVec2::ZERO, IVec2::ZERO);
        terrain.fill_tiles(5, 0, 5, 15, TILE_WALL);
        world.insert_resource(Terrain::new(terrain));
        let p = player(&mut world, 3);
        world.get_mut::<PlayerInfo>(p).expect("info").facing = Facing::Right;

        assert!(use_skill(&mut world, p, "dash").success);
        let x = world.get::<Position>(p).expect("pos").x();
        assert!(x > 100.0 && x + 12.0 <= 160.0 + 1e-3, "рывок упёрся в стену: {x}");
        assert!(world.get::<Health>(p).is_some_and(|h| h.invulnerable));

        world.run_system_once(skill_system).expect("run");
        assert!(world.get::<Health>(p).is_some_and(|h| h.invulnerable));
        for _ in 0..3 {
            world.run_system_once(skill_system).expect("run");
        }
        assert!(world.get::<Health>(p).is_some_and(|h| !h.invulnerable), "0.3s прошло");
    }
}
