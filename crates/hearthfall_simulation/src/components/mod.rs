//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - movement: Position (+chunk), Velocity, Collider
//! - actor: Health, Combat, BaseCombat
//! - status: StatusEffects (баффы/дебаффы/DoT)
//! - ai: Ai FSM, BossBrain, CasterBrain
//! - progression: Stats, Inventory, Equipment, Skills, QuestLog (только игроки)
//! - world: ResourceNode, CraftingStation, LootTable, Projectile, DamageZone, Horse
//! - identity: Tags, DisplayName, Appearance, PlayerInfo, Npc, EnemyKind

pub mod actor;
pub mod ai;
pub mod identity;
pub mod movement;
pub mod progression;
pub mod status;
pub mod world;

// Re-exports для удобного импорта
pub use actor::*;
pub use ai::*;
pub use identity::*;
pub use movement::*;
pub use progression::*;
pub use status::*;
pub use world::*;
