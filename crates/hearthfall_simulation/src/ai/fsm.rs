//! Базовая FSM актора: idle → patrol → chase → attack, flee, return.
//!
//! Шаг FSM не трогает `World`: на вход компоненты актора и "наблюдение"
//! (ближайшая цель), на выход новое состояние, velocity и намерение атаки
//! в `Combat`. Всё, что требует мира (лечение босса, способности), решает
//! вызывающая система по `StepOutcome`.

use bevy::prelude::*;

use crate::components::{Ai, AiState, Behavior, Combat, Velocity};
use crate::DeterministicRng;

/// Ближе этого к дому → Return завершён
pub const HOME_RADIUS: f32 = 16.0;
const PATROL_SPEED: f32 = 0.4;
const RETURN_SPEED: f32 = 0.7;
/// Attack → Chase, если цель дальше attack_range × 1.5
const ATTACK_BREAK: f32 = 1.5;
const IDLE_CHANCE: f32 = 0.4;

/// Цель, которую видит актор в этом тике.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub entity: Entity,
    pub pos: Vec2,
    pub dist: f32,
}

/// Ближайший кандидат. Кандидаты отсортированы по Entity, ничья → меньший Entity.
pub fn nearest(from: Vec2, candidates: &[(Entity, Vec2)]) -> Option<Sighting> {
    let mut best: Option<Sighting> = None;
    for &(entity, pos) in candidates {
        let dist = from.distance(pos);
        if best.is_none_or(|b| dist < b.dist) {
            best = Some(Sighting { entity, pos, dist });
        }
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Leash сработал в этом тике (windup надо отменить)
    Leashed,
    ArrivedHome,
}

/// Leash доминирует: вне Return актор дальше leash_range от дома
/// бросает цель и возвращается.
pub fn enforce_leash(ai: &mut Ai, pos: Vec2) -> bool {
    if ai.state == AiState::Return || pos.distance(ai.home) <= ai.leash_range {
        return false;
    }
    ai.target = None;
    ai.transition(AiState::Return);
    true
}

pub(crate) fn move_toward(vel: &mut Velocity, from: Vec2, to: Vec2, speed_mult: f32) {
    let delta = to - from;
    let dist = delta.length();
    if dist < 1.0 {
        vel.stop();
        return;
    }
    let v = delta / dist * vel.speed * speed_mult;
    vel.set(v.x, v.y);
}

/// Один шаг FSM для обычного актора (не босса).
pub fn step(
    ai: &mut Ai,
    vel: &mut Velocity,
    mut combat: Option<&mut Combat>,
    pos: Vec2,
    target: Option<Sighting>,
    rng: &mut DeterministicRng,
    dt: f32,
) -> StepOutcome {
    ai.state_timer += dt;
    let leashed = enforce_leash(ai, pos);

    match ai.state {
        AiState::Idle => {
            vel.stop();
            if ai.state_timer >= ai.idle_duration {
                ai.transition(AiState::Patrol);
            } else {
                check_aggro(ai, target);
            }
        }
        AiState::Patrol => {
            patrol(ai, vel, pos, rng, dt);
            check_aggro(ai, target);
        }
        AiState::Chase => {
            match target {
                Some(t) => move_toward(vel, pos, t.pos, 1.0),
                None => vel.stop(),
            }
            if check_deaggro(ai, target) {
                return StepOutcome::Continue;
            }
            let ready = combat.as_deref().is_some_and(Combat::can_attack);
            if let Some(t) = target {
                ai.target = Some(t.entity);
                if ready && t.dist <= ai.attack_range {
                    ai.transition(AiState::Attack);
                }
            }
        }
        AiState::Attack => {
            attack(ai, vel, combat.as_deref_mut(), target);
            if ai.state == AiState::Attack {
                check_deaggro(ai, target);
            }
        }
        AiState::Flee => {
            flee(vel, pos, target, rng);
            if target.is_none_or(|t| t.dist > ai.deaggro_range) {
                ai.threat = None;
                ai.transition(AiState::Return);
            }
        }
        AiState::Return => {
            if pos.distance(ai.home) < HOME_RADIUS {
                vel.stop();
                ai.transition(AiState::Idle);
                return StepOutcome::ArrivedHome;
            }
            move_toward(vel, pos, ai.home, RETURN_SPEED);
        }
    }

    if leashed {
        StepOutcome::Leashed
    } else {
        StepOutcome::Continue
    }
}

fn check_aggro(ai: &mut Ai, target: Option<Sighting>) {
    let Some(t) = target else { return };
    if t.dist > ai.aggro_range {
        return;
    }
    match ai.behavior {
        Behavior::Aggressive | Behavior::Patrol | Behavior::Pack | Behavior::Guard | Behavior::Boss => {
            ai.target = Some(t.entity);
            ai.transition(AiState::Chase);
        }
        Behavior::Horse => {
            ai.threat = Some(t.entity);
            ai.transition(AiState::Flee);
        }
        // passive убегает только после удара
        Behavior::Passive | Behavior::Wander => {}
    }
}

fn check_deaggro(ai: &mut Ai, target: Option<Sighting>) -> bool {
    if target.is_some_and(|t| t.dist <= ai.deaggro_range) {
        return false;
    }
    ai.target = None;
    ai.transition(AiState::Return);
    true
}

fn patrol(ai: &mut Ai, vel: &mut Velocity, pos: Vec2, rng: &mut DeterministicRng, dt: f32) {
    ai.patrol_timer += dt;
    if ai.patrol_timer >= ai.patrol_duration {
        ai.patrol_timer = 0.0;
        if rng.chance(IDLE_CHANCE) {
            ai.transition(AiState::Idle);
            ai.idle_duration = rng.range(1.5, 4.5);
            vel.stop();
            return;
        }
        ai.patrol_dir = rng.direction();
        ai.patrol_duration = rng.range(1.0, 3.0);
    }
    if ai.patrol_dir == Vec2::ZERO {
        ai.patrol_dir = rng.direction();
    }

    // Держимся у дома
    let offset = pos - ai.home;
    let dist_home = offset.length();
    if dist_home > ai.leash_range * 0.5 {
        ai.patrol_dir = -offset / dist_home;
    }

    let v = ai.patrol_dir * vel.speed * PATROL_SPEED;
    vel.set(v.x, v.y);
}

fn attack(ai: &mut Ai, vel: &mut Velocity, combat: Option<&mut Combat>, target: Option<Sighting>) {
    let (Some(t), Some(combat)) = (target, combat) else {
        ai.transition(AiState::Chase);
        return;
    };

    vel.stop();
    if t.dist > ai.attack_range * ATTACK_BREAK {
        ai.transition(AiState::Chase);
        return;
    }
    if combat.can_attack() {
        combat.start_attack();
        combat.target = Some(t.entity);
    }
}

fn flee(vel: &mut Velocity, pos: Vec2, threat: Option<Sighting>, rng: &mut DeterministicRng) {
    let Some(t) = threat else {
        vel.stop();
        return;
    };
    let away = pos - t.pos;
    let dist = away.length();
    let dir = if dist < 1.0 { rng.direction() } else { away / dist };
    let v = dir * vel.speed;
    vel.set(v.x, v.y);
}

#[cfg(test)]
#[path = "fsm_tests.rs"]
mod tests;
