//! Формулы урона: броня с убывающей отдачей, крит.

use crate::DeterministicRng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageResult {
    pub damage: f32,
    /// Сколько поглотила броня
    pub blocked: f32,
    pub is_crit: bool,
}

/// Доля поглощения бронёй: armor / (armor + 100). Всегда < 1.
pub fn damage_reduction(armor: f32) -> f32 {
    let armor = armor.max(0.0);
    armor / (armor + 100.0)
}

/// Итоговый урон. Если `base_damage > 0`, результат ≥ 1.
pub fn calculate(base_damage: f32, armor: f32, crit_mod: f32) -> DamageResult {
    let raw = base_damage * crit_mod;
    let reduced = (raw * (1.0 - damage_reduction(armor))).round();
    let damage = if base_damage > 0.0 { reduced.max(1.0) } else { 0.0 };
    DamageResult {
        damage,
        blocked: (raw - damage).round().max(0.0),
        is_crit: crit_mod > 1.0,
    }
}

/// Возвращает множитель: `crit_multiplier` при крите, иначе 1.0
pub fn roll_crit(rng: &mut DeterministicRng, crit_chance: f32, crit_multiplier: f32) -> f32 {
    if rng.chance(crit_chance) {
        crit_multiplier
    } else {
        1.0
    }
}
