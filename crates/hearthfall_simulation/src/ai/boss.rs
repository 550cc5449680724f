//! Boss controller: фазы по HP, способности с windup, усиленный return.
//!
//! Решение (`step`) чистое; исполнение способности (`execute_ability`) идёт по миру.

use bevy::prelude::*;

use super::fsm::{enforce_leash, move_toward, nearest, Sighting, HOME_RADIUS};
use crate::combat::resolver::sim_now;
use crate::combat::{apply_knockback, CombatEvents, DamageEvent};
use crate::components::*;
use crate::config::BossTuning;
use crate::registry::Inactive;
use crate::DeterministicRng;

pub const PHASE_BUFF: &str = "boss_phase_buff";
const PHASE_BUFF_DURATION: f32 = 9999.0;
const IDLE_DURATION: f32 = 2.0;
const RETURN_SPEED: f32 = 1.5;
const REAGGRO_FACTOR: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BossStep {
    Continue,
    /// Windup закончился: способность исполняется в этом тике
    Execute(BossAbility),
    /// Дошёл до дома: полное лечение
    ArrivedHome,
}

pub fn phase_for(hp_percent: f32, tuning: &BossTuning) -> u8 {
    if hp_percent > tuning.phase2_threshold {
        1
    } else if hp_percent > tuning.phase3_threshold {
        2
    } else {
        3
    }
}

/// Бафф фазы. Фаза 1 без баффа.
pub fn phase_buff(phase: u8) -> Option<StatusEffect> {
    let damage = match phase {
        2 => 1.25,
        3 => 1.5,
        _ => return None,
    };
    Some(
        StatusEffect::new(PHASE_BUFF, PHASE_BUFF_DURATION)
            .speed(1.2)
            .damage_mod(damage),
    )
}

/// Обновляет фазу по HP и пере-накладывает бафф. true если фаза сменилась.
pub fn update_phase(
    brain: &mut BossBrain,
    health: &Health,
    effects: Option<&mut StatusEffects>,
    tuning: &BossTuning,
) -> bool {
    let phase = phase_for(health.percent(), tuning);
    if phase == brain.phase {
        return false;
    }
    brain.phase = phase;
    if let Some(se) = effects {
        se.remove(PHASE_BUFF);
        if let Some(buff) = phase_buff(phase) {
            se.add(buff);
        }
    }
    true
}

/// Один шаг FSM босса.
#[allow(clippy::too_many_arguments)]
pub fn step(
    ai: &mut Ai,
    brain: &mut BossBrain,
    vel: &mut Velocity,
    combat: Option<&mut Combat>,
    pos: Vec2,
    target: Option<Sighting>,
    shell_active: bool,
    tuning: &BossTuning,
    rng: &mut DeterministicRng,
    dt: f32,
) -> BossStep {
    ai.state_timer += dt;
    brain.ground_pound_cd = (brain.ground_pound_cd - dt).max(0.0);
    brain.shards_cd = (brain.shards_cd - dt).max(0.0);
    brain.shell_cd = (brain.shell_cd - dt).max(0.0);

    if enforce_leash(ai, pos) {
        brain.windup = None;
    }

    if let Some((ability, remaining)) = brain.windup {
        vel.stop();
        let remaining = remaining - dt;
        if remaining <= 0.0 {
            brain.windup = None;
            return BossStep::Execute(ability);
        }
        brain.windup = Some((ability, remaining));
        return BossStep::Continue;
    }

    let in_aggro = |t: &Sighting, range: f32| t.dist <= range;

    match ai.state {
        AiState::Idle => {
            vel.stop();
            if let Some(t) = target.filter(|t| in_aggro(t, ai.aggro_range)) {
                ai.target = Some(t.entity);
                ai.transition(AiState::Chase);
            } else if ai.state_timer >= IDLE_DURATION {
                ai.patrol_dir = Vec2::ZERO;
                ai.transition(AiState::Patrol);
            }
        }
        AiState::Patrol => {
            if ai.state_timer >= ai.patrol_duration {
                ai.transition(AiState::Idle);
                return BossStep::Continue;
            }
            if ai.patrol_dir == Vec2::ZERO {
                ai.patrol_dir = rng.direction();
            }
            let v = ai.patrol_dir * vel.speed * 0.4;
            vel.set(v.x, v.y);
            if let Some(t) = target.filter(|t| in_aggro(t, ai.aggro_range)) {
                ai.target = Some(t.entity);
                ai.transition(AiState::Chase);
            }
        }
        AiState::Chase => {
            let Some(t) = target.filter(|t| t.dist <= ai.deaggro_range) else {
                ai.target = None;
                ai.transition(AiState::Return);
                return BossStep::Continue;
            };
            ai.target = Some(t.entity);
            if try_special(brain, &t, shell_active, tuning) {
                vel.stop();
                return BossStep::Continue;
            }
            if t.dist > ai.attack_range {
                move_toward(vel, pos, t.pos, 1.0);
            } else {
                ai.transition(AiState::Attack);
            }
        }
        AiState::Attack => {
            vel.stop();
            let Some(t) = target.filter(|t| t.dist <= ai.attack_range * 1.5) else {
                ai.transition(AiState::Chase);
                return BossStep::Continue;
            };
            if try_special(brain, &t, shell_active, tuning) {
                return BossStep::Continue;
            }
            if let Some(combat) = combat {
                if combat.can_attack() {
                    combat.start_attack();
                    combat.target = Some(t.entity);
                }
            }
            if t.dist > ai.attack_range * 1.2 {
                ai.transition(AiState::Chase);
            }
        }
        // Босс не убегает
        AiState::Flee => ai.transition(AiState::Return),
        AiState::Return => {
            if pos.distance(ai.home) < HOME_RADIUS {
                vel.stop();
                ai.transition(AiState::Idle);
                return BossStep::ArrivedHome;
            }
            move_toward(vel, pos, ai.home, RETURN_SPEED);
            if let Some(t) = target.filter(|t| in_aggro(t, ai.aggro_range * REAGGRO_FACTOR)) {
                ai.target = Some(t.entity);
                ai.transition(AiState::Chase);
            }
        }
    }
    BossStep::Continue
}

/// Приоритет: shell (фаза 3) → shards (фаза 2+) → ground pound.
fn try_special(
    brain: &mut BossBrain,
    target: &Sighting,
    shell_active: bool,
    tuning: &BossTuning,
) -> bool {
    if brain.phase >= 3 && brain.shell_cd <= 0.0 && !shell_active {
        brain.shell_cd = tuning.shell_cooldown;
        brain.windup = Some((BossAbility::CopperShell, tuning.shell_windup));
        return true;
    }
    if brain.phase >= 2 && brain.shards_cd <= 0.0 && target.dist <= tuning.shards_range {
        brain.shards_cd = tuning.shards_cooldown;
        brain.windup = Some((BossAbility::CopperShards, tuning.shards_windup));
        return true;
    }
    if brain.ground_pound_cd <= 0.0 && target.dist <= tuning.ground_pound_radius {
        brain.ground_pound_cd = tuning.ground_pound_cooldown;
        brain.windup = Some((BossAbility::GroundPound, tuning.ground_pound_windup));
        return true;
    }
    false
}

fn living_players(world: &mut World, exclude: Entity) -> Vec<(Entity, Vec2)> {
    let mut query =
        world.query_filtered::<(Entity, &Position, &Health, &Tags), Without<Inactive>>();
    let mut players: Vec<(Entity, Vec2)> = query
        .iter(world)
        .filter(|(entity, _, health, tags)| {
            *entity != exclude && tags.has(Tag::Player) && health.is_alive()
        })
        .map(|(entity, pos, _, _)| (entity, pos.xy()))
        .collect();
    players.sort_by_key(|(entity, _)| *entity);
    players
}

/// Исполняет способность после windup.
pub fn execute_ability(world: &mut World, boss: Entity, ability: BossAbility, tuning: &BossTuning) {
    let Some(center) = world.get::<Position>(boss).map(Position::xy) else {
        return;
    };
    crate::log(&format!("👹 Boss {:?}: {:?}", boss, ability));

    match ability {
        BossAbility::CopperShell => {
            if let Some(mut se) = world.get_mut::<StatusEffects>(boss) {
                se.add(StatusEffect::new("copper_shell", 5.0).armor_flat(10.0));
            }
        }
        BossAbility::CopperShards => {
            let players = living_players(world, boss);
            let in_range = nearest(center, &players).filter(|t| t.dist <= tuning.shards_range);
            let Some(target) = in_range else {
                return;
            };
            if let Some(mut se) = world.get_mut::<StatusEffects>(target.entity) {
                se.add(
                    StatusEffect::new("copper_bleed", 3.0)
                        .tick_damage(3.0)
                        .source(boss),
                );
            }
            let at = Position::new(target.pos.x, target.pos.y);
            world
                .resource_mut::<CombatEvents>()
                .push(DamageEvent::new(target.entity, boss, &at, 0.0));
        }
        BossAbility::GroundPound => {
            let now = sim_now(world);
            for (player, pos) in living_players(world, boss) {
                let offset = pos - center;
                if offset.length() > tuning.ground_pound_radius {
                    continue;
                }
                let Some(mut health) = world.get_mut::<Health>(player) else {
                    continue;
                };
                let dealt = health.damage(tuning.ground_pound_damage, now);
                let killed = !health.is_alive();

                let at = Position::new(pos.x, pos.y);
                world
                    .resource_mut::<CombatEvents>()
                    .push(DamageEvent::new(player, boss, &at, dealt).killed(killed));

                if let Some(mut se) = world.get_mut::<StatusEffects>(player) {
                    se.add(
                        StatusEffect::new("ground_pound_slow", 2.0)
                            .speed(0.5)
                            .source(boss),
                    );
                }
                apply_knockback(world, player, offset, tuning.ground_pound_knockback);
            }
        }
    }
}
