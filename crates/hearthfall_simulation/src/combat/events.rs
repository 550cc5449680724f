//! Буферы боевых событий тика.
//!
//! Всё копится в `CombatEvents` и уходит наблюдателям одним батчем в конце тика,
//! никогда посреди тика.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Position;
use crate::registry::entity_id;
use crate::terrain::TileChange;

/// Одно попадание (или промах/блок) для плавающих цифр на клиенте.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageEvent {
    pub target_id: u64,
    pub attacker_id: u64,
    pub damage: f32,
    pub is_crit: bool,
    pub x: f32,
    pub y: f32,
    pub killed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub dodged: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub shielded: bool,
    /// "Needs pickaxe" и т.п.: урон 0, ресурс не тронут
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_thorns: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_resource: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_zone: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_heal: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl DamageEvent {
    pub fn new(target: Entity, attacker: Entity, at: &Position, damage: f32) -> Self {
        Self {
            target_id: entity_id(target),
            attacker_id: entity_id(attacker),
            damage,
            is_crit: false,
            x: at.x(),
            y: at.y(),
            killed: false,
            dodged: false,
            shielded: false,
            blocked: None,
            is_thorns: false,
            is_resource: false,
            is_zone: false,
            is_heal: false,
        }
    }

    pub fn crit(mut self, is_crit: bool) -> Self {
        self.is_crit = is_crit;
        self
    }

    pub fn killed(mut self, killed: bool) -> Self {
        self.killed = killed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathEvent {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub is_player: bool,
}

/// Персональное уведомление игроку (только его наблюдателю).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notice {
    ItemPickup { item_id: String, count: u32 },
    InventoryFull { item_id: String, lost: u32 },
    XpGain { amount: u32, total: u32 },
    LevelUp { level: u32, stat_points: u32, new_skills: Vec<String> },
    QuestProgress { quest_id: String, objective: usize, current: u32, required: u32 },
    Respawned { x: f32, y: f32 },
}

/// Накопитель событий одного тика.
#[derive(Resource, Debug, Default)]
pub struct CombatEvents {
    pub damage: Vec<DamageEvent>,
    pub deaths: Vec<DeathEvent>,
    pub tiles: Vec<TileChange>,
    /// (кому, что)
    pub notices: Vec<(Entity, Notice)>,
}

impl CombatEvents {
    pub fn push(&mut self, event: DamageEvent) {
        self.damage.push(event);
    }

    pub fn notify(&mut self, player: Entity, notice: Notice) {
        self.notices.push((player, notice));
    }

    pub fn is_empty(&self) -> bool {
        self.damage.is_empty()
            && self.deaths.is_empty()
            && self.tiles.is_empty()
            && self.notices.is_empty()
    }

    /// Забирает всё накопленное, буфер остаётся пустым
    pub fn drain(&mut self) -> CombatEvents {
        std::mem::take(self)
    }
}
