//! Прогрессия игрока: статы/уровень, инвентарь, экипировка, скиллы, квесты.
//!
//! Эти компоненты есть только у игроков и целиком уходят в persistence snapshot.

use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::content::{
    level_from_xp, ContentTables, EquipSlot, StatBonuses, StatKind, INVENTORY_SLOTS, MAX_LEVEL,
    STAT_POINTS_PER_LEVEL,
};

pub const HOTBAR_SLOTS: usize = 5;
const BASE_STAT: u32 = 5;

/// Базовые статы + уровень.
///
/// `equip_bonuses` пересчитывается StatSystem каждый тик из экипировки.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub str: u32,
    pub dex: u32,
    pub vit: u32,
    pub end: u32,
    pub lck: u32,
    pub level: u32,
    pub xp: u32,
    pub stat_points: u32,
    #[serde(skip)]
    pub equip_bonuses: StatBonuses,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            str: BASE_STAT,
            dex: BASE_STAT,
            vit: BASE_STAT,
            end: BASE_STAT,
            lck: BASE_STAT,
            level: 1,
            xp: 0,
            stat_points: 0,
            equip_bonuses: StatBonuses::default(),
        }
    }
}

impl Stats {
    pub fn base(&self, stat: StatKind) -> u32 {
        match stat {
            StatKind::Str => self.str,
            StatKind::Dex => self.dex,
            StatKind::Vit => self.vit,
            StatKind::End => self.end,
            StatKind::Lck => self.lck,
        }
    }

    /// База + бонус экипировки
    pub fn total(&self, stat: StatKind) -> f32 {
        let bonus = match stat {
            StatKind::Str => self.equip_bonuses.str,
            StatKind::Dex => self.equip_bonuses.dex,
            StatKind::Vit => self.equip_bonuses.vit,
            StatKind::End => self.equip_bonuses.end,
            StatKind::Lck => self.equip_bonuses.lck,
        };
        self.base(stat) as f32 + bonus
    }

    /// Начисляет XP, возвращает сколько уровней набрано.
    pub fn add_xp(&mut self, amount: u32) -> u32 {
        self.xp = self.xp.saturating_add(amount);
        let new_level = level_from_xp(self.xp).min(MAX_LEVEL);
        if new_level <= self.level {
            return 0;
        }
        let gained = new_level - self.level;
        self.level = new_level;
        self.stat_points += gained * STAT_POINTS_PER_LEVEL;
        gained
    }

    pub fn allocate(&mut self, stat: StatKind) -> bool {
        if self.stat_points == 0 {
            return false;
        }
        self.stat_points -= 1;
        match stat {
            StatKind::Str => self.str += 1,
            StatKind::Dex => self.dex += 1,
            StatKind::Vit => self.vit += 1,
            StatKind::End => self.end += 1,
            StatKind::Lck => self.lck += 1,
        }
        true
    }
}

/// Стак предметов в слоте инвентаря/экипировки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStack {
    pub item_id: String,
    pub count: u32,
    #[serde(default)]
    pub upgrade_level: u8,
    #[serde(default)]
    pub gem: Option<String>,
}

impl ItemStack {
    pub fn new(item_id: impl Into<String>, count: u32) -> Self {
        Self {
            item_id: item_id.into(),
            count,
            upgrade_level: 0,
            gem: None,
        }
    }
}

#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub slots: Vec<Option<ItemStack>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            slots: vec![None; INVENTORY_SLOTS],
        }
    }
}

impl Inventory {
    /// Кладёт предметы: сначала доливает существующие стаки, потом пустые слоты.
    /// Возвращает остаток, который не влез.
    pub fn add_item(&mut self, item_id: &str, count: u32, content: &ContentTables) -> u32 {
        let limit = content.item(item_id).and_then(|def| def.stack_limit());
        let mut remaining = count;

        if let Some(max_stack) = limit {
            for stack in self.slots.iter_mut().flatten() {
                if remaining == 0 {
                    break;
                }
                if stack.item_id == item_id && stack.count < max_stack {
                    let add = remaining.min(max_stack - stack.count);
                    stack.count += add;
                    remaining -= add;
                }
            }
        }

        let per_slot = limit.unwrap_or(1);
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let add = remaining.min(per_slot);
                *slot = Some(ItemStack::new(item_id, add));
                remaining -= add;
            }
        }

        remaining
    }

    /// Возвращает сколько реально убрано.
    pub fn remove_item(&mut self, item_id: &str, count: u32) -> u32 {
        let mut remaining = count;
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            let Some(stack) = slot else { continue };
            if stack.item_id != item_id {
                continue;
            }
            let take = remaining.min(stack.count);
            stack.count -= take;
            remaining -= take;
            if stack.count == 0 {
                *slot = None;
            }
        }
        count - remaining
    }

    pub fn count_item(&self, item_id: &str) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.item_id == item_id)
            .map(|s| s.count)
            .sum()
    }

    pub fn stacks(&self) -> impl Iterator<Item = &ItemStack> {
        self.slots.iter().flatten()
    }
}

#[derive(Component, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub slots: BTreeMap<EquipSlot, ItemStack>,
}

impl Equipment {
    /// Надевает предмет, возвращает снятый.
    /// Кольцо в занятый ring1 уходит в ring2, если тот свободен.
    pub fn equip(&mut self, slot: EquipSlot, item: ItemStack) -> Option<ItemStack> {
        let slot = match slot {
            EquipSlot::Ring1
                if self.slots.contains_key(&EquipSlot::Ring1)
                    && !self.slots.contains_key(&EquipSlot::Ring2) =>
            {
                EquipSlot::Ring2
            }
            other => other,
        };
        self.slots.insert(slot, item)
    }

    pub fn unequip(&mut self, slot: EquipSlot) -> Option<ItemStack> {
        self.slots.remove(&slot)
    }

    pub fn get(&self, slot: EquipSlot) -> Option<&ItemStack> {
        self.slots.get(&slot)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemStack> {
        self.slots.values()
    }
}

/// Выученные скиллы игрока, кулдауны и hotbar.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skills {
    pub known: Vec<String>,
    pub cooldowns: BTreeMap<String, f32>,
    pub hotbar: [Option<String>; HOTBAR_SLOTS],
    /// Остаток неуязвимости после dash
    #[serde(skip)]
    pub dash_invuln: f32,
}

impl Default for Skills {
    fn default() -> Self {
        Self {
            known: Vec::new(),
            cooldowns: BTreeMap::new(),
            hotbar: Default::default(),
            dash_invuln: 0.0,
        }
    }
}

impl Skills {
    pub fn knows(&self, skill_id: &str) -> bool {
        self.known.iter().any(|s| s == skill_id)
    }

    /// Учит всё доступное на уровне, новые скиллы занимают пустые слоты hotbar.
    /// Возвращает id новых скиллов.
    pub fn learn_skills_for_level(&mut self, level: u32, content: &ContentTables) -> Vec<String> {
        let mut learned = Vec::new();
        for def in content.skills_for_level(level) {
            if self.knows(&def.id) {
                continue;
            }
            self.known.push(def.id.clone());
            if let Some(slot) = self.hotbar.iter_mut().find(|s| s.is_none()) {
                *slot = Some(def.id.clone());
            }
            learned.push(def.id.clone());
        }
        learned
    }

    pub fn can_use(&self, skill_id: &str) -> bool {
        self.knows(skill_id) && self.cooldowns.get(skill_id).copied().unwrap_or(0.0) <= 0.0
    }

    pub fn start_cooldown(&mut self, skill_id: &str, cooldown: f32) {
        self.cooldowns.insert(skill_id.to_string(), cooldown);
    }

    pub fn tick_cooldowns(&mut self, dt: f32) {
        for remaining in self.cooldowns.values_mut() {
            *remaining = (*remaining - dt).max(0.0);
        }
    }

    pub fn set_hotbar(&mut self, slot: usize, skill_id: Option<String>) -> bool {
        if slot >= HOTBAR_SLOTS {
            return false;
        }
        if let Some(id) = &skill_id {
            if !self.knows(id) {
                return false;
            }
        }
        self.hotbar[slot] = skill_id;
        true
    }

    pub fn hotbar_skill(&self, slot: usize) -> Option<&str> {
        self.hotbar.get(slot).and_then(|s| s.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ObjectiveKind {
    Kill { enemy_type: String },
    Collect { item_id: String },
    Deliver { item_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    #[serde(flatten)]
    pub kind: ObjectiveKind,
    pub required: u32,
    pub current: u32,
}

impl Objective {
    pub fn new(kind: ObjectiveKind, required: u32) -> Self {
        Self {
            kind,
            required,
            current: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.current >= self.required
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestProgress {
    pub quest_id: String,
    pub objectives: Vec<Objective>,
}

#[derive(Component, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestLog {
    pub active: Vec<QuestProgress>,
    pub completed: Vec<String>,
}

impl QuestLog {
    pub fn accept(&mut self, quest: QuestProgress) -> bool {
        let known = self.active.iter().any(|q| q.quest_id == quest.quest_id)
            || self.completed.contains(&quest.quest_id);
        if known {
            return false;
        }
        self.active.push(quest);
        true
    }

    /// Сдаёт квест, только если все цели выполнены.
    pub fn complete(&mut self, quest_id: &str) -> bool {
        if !self.is_ready(quest_id) {
            return false;
        }
        self.active.retain(|q| q.quest_id != quest_id);
        self.completed.push(quest_id.to_string());
        true
    }

    /// Выставляет прогресс (clamp к required). true если значение изменилось.
    pub fn update_objective(&mut self, quest_id: &str, index: usize, value: u32) -> bool {
        let Some(objective) = self
            .active
            .iter_mut()
            .find(|q| q.quest_id == quest_id)
            .and_then(|q| q.objectives.get_mut(index))
        else {
            return false;
        };
        let clamped = value.min(objective.required);
        if clamped == objective.current {
            return false;
        }
        objective.current = clamped;
        true
    }

    pub fn is_ready(&self, quest_id: &str) -> bool {
        self.active
            .iter()
            .find(|q| q.quest_id == quest_id)
            .is_some_and(|q| q.objectives.iter().all(Objective::is_done))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_xp_levels_up_with_points() {
        let mut stats = Stats::default();
        assert_eq!(stats.add_xp(10), 0);
        assert_eq!(stats.add_xp(45), 2, "55 XP → level 3");
        assert_eq!(stats.level, 3);
        assert_eq!(stats.stat_points, 6);
        assert!(stats.allocate(StatKind::Str));
        assert_eq!(stats.str, 6);
        assert_eq!(stats.stat_points, 5);
    }

    #[test]
    fn test_inventory_stacks_then_fills() {
        let content = ContentTables::default();
        let mut inv = Inventory::default();
        assert_eq!(inv.add_item("wood", 150, &content), 0);
        assert_eq!(inv.slots[0].as_ref().map(|s| s.count), Some(99));
        assert_eq!(inv.slots[1].as_ref().map(|s| s.count), Some(51));

        assert_eq!(inv.add_item("wood", 10, &content), 0);
        assert_eq!(inv.slots[1].as_ref().map(|s| s.count), Some(61));
        assert_eq!(inv.count_item("wood"), 160);

        assert_eq!(inv.remove_item("wood", 100), 100);
        assert_eq!(inv.count_item("wood"), 60);
        assert!(inv.slots[0].is_none(), "пустой стак освобождает слот");
    }

    #[test]
    fn test_inventory_full_returns_remainder() {
        let content = ContentTables::default();
        let mut inv = Inventory {
            slots: vec![None; 2],
        };
        assert_eq!(inv.add_item("bronze_sword", 3, &content), 1);
        assert_eq!(inv.count_item("bronze_sword"), 2);
    }

    #[test]
    fn test_ring_fallback() {
        let mut eq = Equipment::default();
        assert!(eq.equip(EquipSlot::Ring1, ItemStack::new("ring_a", 1)).is_none());
        assert!(eq.equip(EquipSlot::Ring1, ItemStack::new("ring_b", 1)).is_none());
        assert_eq!(eq.get(EquipSlot::Ring2).map(|s| s.item_id.as_str()), Some("ring_b"));

        let old = eq.equip(EquipSlot::Ring1, ItemStack::new("ring_c", 1));
        assert_eq!(old.map(|s| s.item_id), Some("ring_a".to_string()));
    }

    #[test]
    fn test_learn_skills_fills_hotbar() {
        let content = ContentTables::default();
        let mut skills = Skills::default();
        let learned = skills.learn_skills_for_level(3, &content);
        assert_eq!(learned.len(), 3);
        assert_eq!(skills.hotbar_skill(2), Some("dash"));
        assert!(skills.learn_skills_for_level(3, &content).is_empty());

        skills.start_cooldown("dash", 1.0);
        assert!(!skills.can_use("dash"));
        skills.tick_cooldowns(2.0);
        assert_eq!(skills.cooldowns["dash"], 0.0);
        assert!(skills.can_use("dash"));
        assert!(!skills.can_use("whirlwind"));
    }

    #[test]
    fn test_quest_objectives_clamp_and_complete() {
        let mut log = QuestLog::default();
        let quest = QuestProgress {
            quest_id: "rats".to_string(),
            objectives: vec![Objective::new(
                ObjectiveKind::Kill {
                    enemy_type: "rat".to_string(),
                },
                3,
            )],
        };
        assert!(log.accept(quest.clone()));
        assert!(!log.accept(quest), "повторно не берётся");
        assert!(!log.complete("rats"));

        assert!(log.update_objective("rats", 0, 10));
        assert_eq!(log.active[0].objectives[0].current, 3);
        assert!(!log.update_objective("rats", 0, 3));
        assert!(log.complete("rats"));
        assert_eq!(log.completed, vec!["rats".to_string()]);
    }
}
