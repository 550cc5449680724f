//! AI domain: решения акторов раз в тик.
//!
//! Архитектура:
//! - fsm: базовая FSM (idle/patrol/chase/attack/flee/return), чистая
//! - boss: фазы и способности босса
//! - caster: скиллы вражеских кастеров
//! - perception: снимок живых целей на начало тика
//! - systems: ai_system (приоритет 5), склеивает всё с миром
//!
//! AI только выставляет velocity и намерение атаки (`Combat.target`).
//! Удар резолвит combat_system (15), перемещение movement (10).

use bevy::prelude::*;

pub mod boss;
pub mod caster;
pub mod fsm;
pub mod perception;
pub mod systems;

pub use fsm::{nearest, Sighting, StepOutcome};
pub use perception::Perception;
pub use systems::ai_system;

use crate::scheduler::{priority, TickSystemAppExt};

pub struct AiPlugin;

impl Plugin for AiPlugin {
    fn build(&self, app: &mut App) {
        app.add_tick_system("ai", priority::AI, ai_system);
    }
}
