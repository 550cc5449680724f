//! Статус-эффекты (баффы, дебаффы, DoT/HoT).
//!
//! Эффект идентифицируется строковым типом: повторное наложение того же типа
//! освежает таймер и мержит заданные поля, а не стакается.
//!
//! `next_hit` эффекты (power strike, precision strike, venom strike): одноразовые:
//! их потребляет следующий `apply_damage`, в постоянные модификаторы они не входят.

use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoisonOnHit {
    /// Доля max HP цели в секунду
    pub percent: f32,
    pub duration: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEffect {
    pub kind: String,
    pub duration: f32,
    pub remaining: f32,
    /// > 0 урон/сек, < 0 лечение/сек
    pub tick_damage: f32,
    pub speed_mod: f32,
    pub source: Option<Entity>,
    pub damage_mod: Option<f32>,
    pub armor_flat: Option<f32>,
    pub attack_speed_mod: Option<f32>,
    pub armor_mod: Option<f32>,
    pub damage_taken_mod: Option<f32>,
    pub dodge_chance: Option<f32>,
    pub guaranteed_crit: bool,
    pub crit_bonus: Option<f32>,
    pub shield: Option<f32>,
    pub poison_on_hit: Option<PoisonOnHit>,
    pub life_steal: Option<f32>,
    pub thorns_reflect: Option<f32>,
    pub next_hit: bool,
}

impl StatusEffect {
    pub fn new(kind: impl Into<String>, duration: f32) -> Self {
        Self {
            kind: kind.into(),
            duration,
            remaining: duration,
            tick_damage: 0.0,
            speed_mod: 1.0,
            source: None,
            damage_mod: None,
            armor_flat: None,
            attack_speed_mod: None,
            armor_mod: None,
            damage_taken_mod: None,
            dodge_chance: None,
            guaranteed_crit: false,
            crit_bonus: None,
            shield: None,
            poison_on_hit: None,
            life_steal: None,
            thorns_reflect: None,
            next_hit: false,
        }
    }

    pub fn tick_damage(mut self, per_second: f32) -> Self {
        self.tick_damage = per_second;
        self
    }

    pub fn speed(mut self, modifier: f32) -> Self {
        self.speed_mod = modifier;
        self
    }

    pub fn source(mut self, source: Entity) -> Self {
        self.source = Some(source);
        self
    }

    pub fn damage_mod(mut self, modifier: f32) -> Self {
        self.damage_mod = Some(modifier);
        self
    }

    pub fn armor_flat(mut self, armor: f32) -> Self {
        self.armor_flat = Some(armor);
        self
    }

    pub fn attack_speed_mod(mut self, modifier: f32) -> Self {
        self.attack_speed_mod = Some(modifier);
        self
    }

    pub fn armor_mod(mut self, modifier: f32) -> Self {
        self.armor_mod = Some(modifier);
        self
    }

    pub fn damage_taken_mod(mut self, modifier: f32) -> Self {
        self.damage_taken_mod = Some(modifier);
        self
    }

    pub fn dodge(mut self, chance: f32) -> Self {
        self.dodge_chance = Some(chance);
        self
    }

    pub fn guaranteed_crit(mut self, crit_bonus: f32) -> Self {
        self.guaranteed_crit = true;
        self.crit_bonus = Some(crit_bonus);
        self
    }

    pub fn shield(mut self, amount: f32) -> Self {
        self.shield = Some(amount);
        self
    }

    pub fn poison_on_hit(mut self, percent: f32, duration: f32) -> Self {
        self.poison_on_hit = Some(PoisonOnHit { percent, duration });
        self
    }

    pub fn life_steal(mut self, fraction: f32) -> Self {
        self.life_steal = Some(fraction);
        self
    }

    pub fn thorns(mut self, fraction: f32) -> Self {
        self.thorns_reflect = Some(fraction);
        self
    }

    pub fn next_hit(mut self) -> Self {
        self.next_hit = true;
        self
    }

    fn refresh_from(&mut self, other: StatusEffect) {
        self.remaining = other.duration;
        if other.tick_damage != 0.0 {
            self.tick_damage = other.tick_damage;
        }
        if other.speed_mod != 1.0 {
            self.speed_mod = other.speed_mod;
        }
        self.source = other.source.or(self.source);
        self.damage_mod = other.damage_mod.or(self.damage_mod);
        self.armor_flat = other.armor_flat.or(self.armor_flat);
        self.attack_speed_mod = other.attack_speed_mod.or(self.attack_speed_mod);
        self.armor_mod = other.armor_mod.or(self.armor_mod);
        self.damage_taken_mod = other.damage_taken_mod.or(self.damage_taken_mod);
        self.dodge_chance = other.dodge_chance.or(self.dodge_chance);
        self.guaranteed_crit |= other.guaranteed_crit;
        self.crit_bonus = other.crit_bonus.or(self.crit_bonus);
        self.shield = other.shield.or(self.shield);
        self.poison_on_hit = other.poison_on_hit.or(self.poison_on_hit);
        self.life_steal = other.life_steal.or(self.life_steal);
        self.thorns_reflect = other.thorns_reflect.or(self.thorns_reflect);
        self.next_hit |= other.next_hit;
    }
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct StatusEffects {
    pub effects: Vec<StatusEffect>,
}

impl StatusEffects {
    pub fn add(&mut self, effect: StatusEffect) {
        if let Some(existing) = self.effects.iter_mut().find(|e| e.kind == effect.kind) {
            existing.refresh_from(effect);
            return;
        }
        self.effects.push(effect);
    }

    pub fn remove(&mut self, kind: &str) {
        self.effects.retain(|e| e.kind != kind);
    }

    pub fn has(&self, kind: &str) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    pub fn get(&self, kind: &str) -> Option<&StatusEffect> {
        self.effects.iter().find(|e| e.kind == kind)
    }

    fn persistent(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter().filter(|e| !e.next_hit)
    }

    pub fn speed_modifier(&self) -> f32 {
        self.effects.iter().map(|e| e.speed_mod).product()
    }

    pub fn damage_mod(&self) -> f32 {
        self.persistent().filter_map(|e| e.damage_mod).product()
    }

    pub fn armor_flat(&self) -> f32 {
        self.persistent().filter_map(|e| e.armor_flat).sum()
    }

    pub fn attack_speed_mod(&self) -> f32 {
        self.persistent().filter_map(|e| e.attack_speed_mod).product()
    }

    pub fn armor_mod(&self) -> f32 {
        self.persistent().filter_map(|e| e.armor_mod).product()
    }

    pub fn damage_taken_mod(&self) -> f32 {
        self.persistent().filter_map(|e| e.damage_taken_mod).product()
    }

    /// Cap 90%
    pub fn dodge_chance(&self) -> f32 {
        self.persistent()
            .filter_map(|e| e.dodge_chance)
            .sum::<f32>()
            .min(0.9)
    }

    pub fn life_steal(&self) -> f32 {
        self.persistent().filter_map(|e| e.life_steal).sum()
    }

    /// Cap 50%
    pub fn thorns_reflect(&self) -> f32 {
        self.persistent()
            .filter_map(|e| e.thorns_reflect)
            .sum::<f32>()
            .min(0.5)
    }

    /// Поглощает урон первым активным щитом; пустой щит снимается.
    /// Возвращает поглощённое количество.
    pub fn consume_shield(&mut self, amount: f32) -> f32 {
        let Some(index) = self
            .effects
            .iter()
            .position(|e| e.shield.is_some_and(|s| s > 0.0))
        else {
            return 0.0;
        };

        let effect = &mut self.effects[index];
        let shield = effect.shield.unwrap_or(0.0);
        let absorbed = shield.min(amount);
        let left = shield - absorbed;
        effect.shield = Some(left);
        if left <= 0.0 {
            self.effects.remove(index);
        }
        absorbed
    }

    /// Снимает все одноразовые next-hit эффекты.
    pub fn take_next_hit(&mut self) -> Vec<StatusEffect> {
        let (taken, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.effects).into_iter().partition(|e| e.next_hit);
        self.effects = kept;
        taken
    }
}
