//! Combat domain: формулы урона, резолвер, скиллы, снаряды, зоны, статус-эффекты.
//!
//! Архитектура:
//! - damage: чистые формулы (armor curve, crit roll)
//! - hit_detection: поиск целей в радиусе
//! - resolver: атака игрока, полный damage pipeline, ресурсы, снаряды
//! - skills: use_skill + кулдауны
//! - systems: tick-системы 11/12/14/15
//! - events: батч событий тика

use bevy::prelude::*;

pub mod damage;
pub mod events;
pub mod hit_detection;
pub mod resolver;
pub mod skills;
pub mod systems;

pub use damage::{calculate, damage_reduction, roll_crit, DamageResult};
pub use events::{CombatEvents, DamageEvent, DeathEvent, Notice};
pub use hit_detection::{find_nearest, query_area};
pub use resolver::{
    apply_damage, apply_knockback, apply_projectile_damage, apply_resource_damage,
    find_best_tool, resolve_player_attack,
};
pub use skills::{skill_system, use_skill};
pub use systems::{combat_system, damage_zone_system, projectile_system, status_effect_system};

use crate::scheduler::{priority, TickSystemAppExt};

/// Combat plugin: регистрирует боевые tick-системы
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CombatEvents>()
            .add_tick_system("projectiles", priority::PROJECTILES, projectile_system)
            .add_tick_system("status_effects", priority::STATUS_EFFECTS, status_effect_system)
            .add_tick_system("skills", priority::SKILLS, skill_system)
            .add_tick_system("damage_zones", priority::DAMAGE_ZONES, damage_zone_system)
            .add_tick_system("combat", priority::COMBAT, combat_system);
    }
}
