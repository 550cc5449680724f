//! Read-only таблицы контента: предметы, скиллы игрока, XP-таблица.
//!
//! Загружаются один раз (JSON или встроенные дефолты) и лежат в `ContentTables` resource.

use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Накопленный XP для уровня (index 0 = level 1)
pub const XP_TABLE: [u32; 20] = [
    0, 20, 50, 100, 170, 270, 400, 580, 820, 1150, 1600, 2200, 3000, 4000, 5300, 7000, 9200,
    12000, 15500, 20000,
];

pub const MAX_LEVEL: u32 = XP_TABLE.len() as u32;
pub const STAT_POINTS_PER_LEVEL: u32 = 3;
pub const INVENTORY_SLOTS: usize = 100;
pub const DEFAULT_MAX_STACK: u32 = 99;

pub fn level_from_xp(total_xp: u32) -> u32 {
    XP_TABLE
        .iter()
        .rposition(|&needed| total_xp >= needed)
        .map(|index| index as u32 + 1)
        .unwrap_or(1)
}

/// Множитель бонусов экипировки по уровню заточки (0..=5)
pub fn upgrade_multiplier(level: u8) -> f32 {
    match level {
        0 => 1.0,
        1 => 1.10,
        2 => 1.20,
        3 => 1.35,
        4 => 1.50,
        5 => 1.70,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Weapon,
    Head,
    Body,
    Legs,
    Feet,
    Shield,
    Ring1,
    Ring2,
    Tool,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 9] = [
        EquipSlot::Weapon,
        EquipSlot::Head,
        EquipSlot::Body,
        EquipSlot::Legs,
        EquipSlot::Feet,
        EquipSlot::Shield,
        EquipSlot::Ring1,
        EquipSlot::Ring2,
        EquipSlot::Tool,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Str,
    Dex,
    Vit,
    End,
    Lck,
}

/// Бонусы предмета (экипировка или камень)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatBonuses {
    pub str: f32,
    pub dex: f32,
    pub vit: f32,
    pub end: f32,
    pub lck: f32,
    pub armor: f32,
    pub base_damage: f32,
}

impl StatBonuses {
    pub fn scaled_floor(&self, mult: f32) -> StatBonuses {
        StatBonuses {
            str: (self.str * mult).floor(),
            dex: (self.dex * mult).floor(),
            vit: (self.vit * mult).floor(),
            end: (self.end * mult).floor(),
            lck: (self.lck * mult).floor(),
            armor: (self.armor * mult).floor(),
            base_damage: (self.base_damage * mult).floor(),
        }
    }

    pub fn add(&mut self, other: &StatBonuses) {
        self.str += other.str;
        self.dex += other.dex;
        self.vit += other.vit;
        self.end += other.end;
        self.lck += other.lck;
        self.armor += other.armor;
        self.base_damage += other.base_damage;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub max_stack: Option<u32>,
    #[serde(default)]
    pub slot: Option<EquipSlot>,
    #[serde(default)]
    pub tool_type: Option<String>,
    #[serde(default)]
    pub tool_tier: u8,
    #[serde(default)]
    pub stat_bonuses: StatBonuses,
    #[serde(default)]
    pub gem_bonus: Option<StatBonuses>,
    #[serde(default)]
    pub projectile_type: Option<String>,
    #[serde(default)]
    pub attack_speed: Option<f32>,
    #[serde(default)]
    pub range: Option<f32>,
}

impl ItemDef {
    pub fn material(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            stackable: true,
            max_stack: None,
            slot: None,
            tool_type: None,
            tool_tier: 0,
            stat_bonuses: StatBonuses::default(),
            gem_bonus: None,
            projectile_type: None,
            attack_speed: None,
            range: None,
        }
    }

    pub fn equipment(id: &str, name: &str, slot: EquipSlot, bonuses: StatBonuses) -> Self {
        Self {
            stackable: false,
            slot: Some(slot),
            stat_bonuses: bonuses,
            ..Self::material(id, name)
        }
    }

    pub fn tool(id: &str, name: &str, tool_type: &str, tier: u8, base_damage: f32) -> Self {
        Self {
            tool_type: Some(tool_type.to_string()),
            tool_tier: tier,
            ..Self::equipment(
                id,
                name,
                EquipSlot::Tool,
                StatBonuses {
                    base_damage,
                    ..Default::default()
                },
            )
        }
    }

    /// None → не стакается
    pub fn stack_limit(&self) -> Option<u32> {
        self.stackable
            .then(|| self.max_stack.unwrap_or(DEFAULT_MAX_STACK))
    }
}

/// Что делает скилл игрока. Параметры специфичные для эффекта живут в варианте.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SkillEffect {
    /// Одноразовый множитель урона на следующий удар
    NextHit,
    /// Мгновенное лечение долей max HP
    Heal,
    Dash { distance: f32, invuln_duration: f32 },
    /// Все враги в радиусе (0 = дальность оружия)
    Cleave { range: f32 },
    /// Бафф с фиксированными модификаторами
    Buff {
        #[serde(default)]
        damage_mod: Option<f32>,
        #[serde(default)]
        armor_flat: Option<f32>,
        #[serde(default)]
        attack_speed_mod: Option<f32>,
        #[serde(default)]
        armor_mod: Option<f32>,
    },
    Whirlwind { hits: u32, range: f32 },
    Execute { threshold: f32, mult: f32 },
    /// Лечение долей max HP в секунду
    Regeneration,
    /// Щит = доля max HP
    Shield,
    Evasion,
    PrecisionStrike,
    VenomStrike { poison_duration: f32 },
    LifeSteal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDef {
    pub id: String,
    pub name: String,
    pub unlock_level: u32,
    pub cooldown: f32,
    #[serde(default)]
    pub scale_stat: Option<StatKind>,
    #[serde(default)]
    pub scale_base: f32,
    #[serde(default)]
    pub scale_per_point: f32,
    #[serde(default)]
    pub duration: f32,
    /// Стоимость в долях текущего HP (проверяется до любых изменений)
    #[serde(default)]
    pub health_cost_percent: f32,
    pub effect: SkillEffect,
}

impl SkillDef {
    fn new(id: &str, name: &str, unlock_level: u32, cooldown: f32, effect: SkillEffect) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            unlock_level,
            cooldown,
            scale_stat: None,
            scale_base: 0.0,
            scale_per_point: 0.0,
            duration: 0.0,
            health_cost_percent: 0.0,
            effect,
        }
    }

    fn scaled(mut self, stat: StatKind, base: f32, per_point: f32) -> Self {
        self.scale_stat = Some(stat);
        self.scale_base = base;
        self.scale_per_point = per_point;
        self
    }

    fn lasting(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    fn costing(mut self, health_percent: f32) -> Self {
        self.health_cost_percent = health_percent;
        self
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTables {
    pub items: BTreeMap<String, ItemDef>,
    pub skills: BTreeMap<String, SkillDef>,
}

impl ContentTables {
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        serde_json::from_str(json).map_err(SimError::ConfigParse)
    }

    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn skill(&self, id: &str) -> Option<&SkillDef> {
        self.skills.get(id)
    }

    /// Скиллы с unlock_level ≤ level, отсортированные по уровню (стабильно по id).
    pub fn skills_for_level(&self, level: u32) -> Vec<&SkillDef> {
        let mut skills: Vec<_> = self
            .skills
            .values()
            .filter(|s| s.unlock_level <= level)
            .collect();
        skills.sort_by_key(|s| s.unlock_level);
        skills
    }
}

impl Default for ContentTables {
    fn default() -> Self {
        let items = [
            ItemDef::material("wood", "Wood"),
            ItemDef::material("stone", "Stone"),
            ItemDef::material("copper_ore", "Copper Ore"),
            ItemDef::material("bone", "Bone"),
            ItemDef::material("hide", "Hide"),
            ItemDef::material("copper_bar", "Copper Bar"),
            ItemDef {
                gem_bonus: Some(StatBonuses {
                    str: 2.0,
                    ..Default::default()
                }),
                ..ItemDef::material("ruby", "Ruby")
            },
            ItemDef::equipment(
                "wooden_club",
                "Wooden Club",
                EquipSlot::Weapon,
                StatBonuses {
                    base_damage: 8.0,
                    str: 1.0,
                    ..Default::default()
                },
            ),
            ItemDef::equipment(
                "bronze_sword",
                "Bronze Sword",
                EquipSlot::Weapon,
                StatBonuses {
                    base_damage: 18.0,
                    str: 3.0,
                    ..Default::default()
                },
            ),
            ItemDef {
                projectile_type: Some("arrow".to_string()),
                attack_speed: Some(1.0),
                range: Some(96.0),
                ..ItemDef::equipment(
                    "hunting_bow",
                    "Hunting Bow",
                    EquipSlot::Weapon,
                    StatBonuses {
                        base_damage: 9.0,
                        dex: 2.0,
                        ..Default::default()
                    },
                )
            },
            ItemDef::equipment(
                "leather_cap",
                "Leather Cap",
                EquipSlot::Head,
                StatBonuses {
                    armor: 3.0,
                    ..Default::default()
                },
            ),
            ItemDef::equipment(
                "copper_chest",
                "Copper Chestplate",
                EquipSlot::Body,
                StatBonuses {
                    armor: 8.0,
                    vit: 1.0,
                    ..Default::default()
                },
            ),
            ItemDef::tool("stone_pickaxe", "Stone Pickaxe", "pickaxe", 0, 6.0),
            ItemDef::tool("stone_hatchet", "Stone Hatchet", "axe", 0, 6.0),
            ItemDef::tool("bronze_pickaxe", "Bronze Pickaxe", "pickaxe", 1, 9.0),
        ];

        let skills = [
            SkillDef::new("power_strike", "Power Strike", 1, 8.0, SkillEffect::NextHit)
                .scaled(StatKind::Str, 2.0, 0.02)
                .lasting(10.0),
            SkillDef::new("heal", "Heal", 1, 20.0, SkillEffect::Heal).scaled(
                StatKind::Vit,
                0.25,
                0.005,
            ),
            SkillDef::new(
                "dash",
                "Dash",
                3,
                6.0,
                SkillEffect::Dash {
                    distance: 96.0,
                    invuln_duration: 0.3,
                },
            ),
            SkillDef::new("cleave", "Cleave", 5, 10.0, SkillEffect::Cleave { range: 0.0 })
                .scaled(StatKind::Str, 1.5, 0.02),
            SkillDef::new(
                "war_cry",
                "War Cry",
                5,
                25.0,
                SkillEffect::Buff {
                    damage_mod: Some(1.3),
                    armor_flat: None,
                    attack_speed_mod: None,
                    armor_mod: None,
                },
            )
            .lasting(8.0),
            SkillDef::new("blood_pact", "Blood Pact", 6, 20.0, SkillEffect::LifeSteal)
                .scaled(StatKind::Vit, 0.2, 0.01)
                .lasting(8.0)
                .costing(0.5),
            SkillDef::new(
                "iron_skin",
                "Iron Skin",
                8,
                25.0,
                SkillEffect::Buff {
                    damage_mod: None,
                    armor_flat: Some(50.0),
                    attack_speed_mod: None,
                    armor_mod: None,
                },
            )
            .lasting(10.0),
            SkillDef::new(
                "whirlwind",
                "Whirlwind",
                10,
                15.0,
                SkillEffect::Whirlwind {
                    hits: 3,
                    range: 64.0,
                },
            )
            .scaled(StatKind::Str, 0.8, 0.015),
            SkillDef::new(
                "execute",
                "Execute",
                12,
                12.0,
                SkillEffect::Execute {
                    threshold: 0.3,
                    mult: 3.0,
                },
            )
            .scaled(StatKind::Str, 1.5, 0.02),
            SkillDef::new("regeneration", "Regeneration", 15, 30.0, SkillEffect::Regeneration)
                .scaled(StatKind::Vit, 0.05, 0.002)
                .lasting(8.0),
            SkillDef::new(
                "berserker_rage",
                "Berserker Rage",
                18,
                45.0,
                SkillEffect::Buff {
                    damage_mod: Some(1.5),
                    armor_flat: None,
                    attack_speed_mod: Some(1.25),
                    armor_mod: Some(0.7),
                },
            )
            .lasting(12.0),
        ];

        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
            skills: skills.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_xp() {
        assert_eq!(level_from_xp(0), 1);
        assert_eq!(level_from_xp(19), 1);
        assert_eq!(level_from_xp(20), 2);
        assert_eq!(level_from_xp(99), 3);
        assert_eq!(level_from_xp(1_000_000), MAX_LEVEL);
    }

    #[test]
    fn test_skills_for_level_sorted() {
        let content = ContentTables::default();
        let ids: Vec<_> = content
            .skills_for_level(3)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["heal", "power_strike", "dash"]);
    }

    #[test]
    fn test_stack_limit() {
        let content = ContentTables::default();
        assert_eq!(content.item("wood").and_then(|i| i.stack_limit()), Some(99));
        assert_eq!(content.item("bronze_sword").and_then(|i| i.stack_limit()), None);
    }

    #[test]
    fn test_content_round_trips_through_json() {
        let content = ContentTables::default();
        let json = serde_json::to_string(&content).expect("serialize");
        let back = ContentTables::from_json_str(&json).expect("parse");
        assert_eq!(back, content);
    }
}
