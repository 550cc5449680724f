//! Компоненты мировых объектов: ресурсы, станции, лут, снаряды, зоны урона, лошади.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::status::PoisonOnHit;

/// Ресурсная нода (дерево, камень, руда).
///
/// `tool = None` → добывается голыми руками.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub resource_id: String,
    pub tool: Option<String>,
    pub tool_tier: u8,
    /// Секунды симуляции до респауна
    pub respawn_time: f32,
    pub depleted: bool,
    pub depleted_at: f32,
    /// Чанк + индекс точки ресурса (для respawn)
    pub chunk: IVec2,
    pub resource_index: usize,
}

impl ResourceNode {
    pub fn new(resource_id: impl Into<String>, chunk: IVec2, resource_index: usize) -> Self {
        Self {
            resource_id: resource_id.into(),
            tool: None,
            tool_tier: 0,
            respawn_time: 300.0,
            depleted: false,
            depleted_at: 0.0,
            chunk,
            resource_index,
        }
    }

    pub fn requiring(mut self, tool: impl Into<String>, tier: u8) -> Self {
        self.tool = Some(tool.into());
        self.tool_tier = tier;
        self
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct CraftingStation {
    /// workbench / furnace / forge / cooking_fire / chest / altar
    pub station_id: String,
    pub level: u32,
    pub is_chest: bool,
    pub altar_active: bool,
    /// Босс, призванный на этом алтаре
    pub linked_boss: Option<Entity>,
}

impl CraftingStation {
    pub fn new(station_id: impl Into<String>, level: u32) -> Self {
        Self {
            station_id: station_id.into(),
            level,
            is_chest: false,
            altar_active: false,
            linked_boss: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootDrop {
    pub item: String,
    #[serde(default = "default_chance")]
    pub chance: f32,
    pub min: u32,
    pub max: u32,
}

fn default_chance() -> f32 {
    1.0
}

#[derive(Component, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LootTable {
    pub drops: Vec<LootDrop>,
    pub xp_reward: u32,
}

impl LootTable {
    /// Один бросок по всем записям: запись проходит при rand ≤ chance,
    /// количество = min + floor(rand · (max − min + 1)).
    pub fn roll_drops(&self, rng: &mut impl Rng) -> Vec<(String, u32)> {
        let mut result = Vec::new();
        for drop in &self.drops {
            if drop.chance <= 0.0 || rng.gen::<f32>() > drop.chance {
                continue;
            }
            let span = drop.max.saturating_sub(drop.min) + 1;
            let count = drop.min + (rng.gen::<f32>() * span as f32).floor() as u32;
            let count = count.min(drop.max.max(drop.min));
            if count > 0 {
                result.push((drop.item.clone(), count));
            }
        }
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowOnHit {
    pub speed_mod: f32,
    pub duration: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmorDebuff {
    pub armor_flat: f32,
    pub duration: f32,
}

/// Летящий снаряд. Уничтожается при попадании или по истечении lifetime.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Projectile {
    pub owner: Option<Entity>,
    /// Снаряд врага → бьёт игроков
    pub hostile: bool,
    pub damage: f32,
    pub projectile_type: String,
    pub lifetime: f32,
    pub age: f32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub knockback: f32,
    pub hit: bool,
    pub slow_on_hit: Option<SlowOnHit>,
    pub poison_on_hit: Option<PoisonOnHit>,
    pub armor_debuff: Option<ArmorDebuff>,
    pub dot_on_hit: Option<PoisonOnHit>,
}

impl Default for Projectile {
    fn default() -> Self {
        Self {
            owner: None,
            hostile: false,
            damage: 10.0,
            projectile_type: "arrow".to_string(),
            lifetime: 0.6,
            age: 0.0,
            crit_chance: 0.05,
            crit_multiplier: 1.5,
            knockback: 4.0,
            hit: false,
            slow_on_hit: None,
            poison_on_hit: None,
            armor_debuff: None,
            dot_on_hit: None,
        }
    }
}

impl Projectile {
    pub fn expired(&self) -> bool {
        self.hit || self.age >= self.lifetime
    }
}

/// Скорость снаряда по типу (px/s)
pub fn projectile_speed(projectile_type: &str) -> f32 {
    match projectile_type {
        "bolt" => 600.0,
        "shadow_bolt" => 400.0,
        _ => 500.0,
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct DamageZone {
    pub owner: Option<Entity>,
    pub radius: f32,
    /// Доля max HP цели за секунду
    pub tick_damage_percent: f32,
    pub duration: f32,
    pub age: f32,
    pub slow_percent: f32,
    pub zone_type: String,
    pub tick_timer: f32,
}

impl Default for DamageZone {
    fn default() -> Self {
        Self {
            owner: None,
            radius: 64.0,
            tick_damage_percent: 0.05,
            duration: 6.0,
            age: 0.0,
            slow_percent: 0.0,
            zone_type: "fire".to_string(),
            tick_timer: 0.0,
        }
    }
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Horse {
    pub tamed: bool,
    pub owner: Option<Entity>,
    pub mounted: bool,
    pub rider: Option<Entity>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_roll_drops_respects_bounds() {
        let table = LootTable {
            drops: vec![
                LootDrop {
                    item: "bone".to_string(),
                    chance: 1.0,
                    min: 1,
                    max: 3,
                },
                LootDrop {
                    item: "ruby".to_string(),
                    chance: 0.0,
                    min: 1,
                    max: 1,
                },
            ],
            xp_reward: 5,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let drops = table.roll_drops(&mut rng);
            assert_eq!(drops.len(), 1, "chance 0 никогда не выпадает");
            assert!((1..=3).contains(&drops[0].1));
        }
    }

    #[test]
    fn test_projectile_expiry() {
        let mut proj = Projectile::default();
        assert!(!proj.expired());
        proj.age = 0.6;
        assert!(proj.expired());
    }
}
