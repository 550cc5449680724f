//! Базовые компоненты живых сущностей: Health, Combat

use bevy::prelude::*;

/// Здоровье
///
/// Инвариант: 0 ≤ current ≤ max
/// `last_damage_time`: в секундах симуляции (TickClock.elapsed), не wall-clock.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    pub regen_rate: f32, // HP per second
    pub last_damage_time: f32,
    pub invulnerable: bool,
    /// Смерть уже обработана (death handlers вызываются ровно один раз)
    pub death_handled: bool,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            regen_rate: 0.0,
            last_damage_time: f32::NEG_INFINITY,
            invulnerable: false,
            death_handled: false,
        }
    }

    pub fn with_regen(mut self, regen_rate: f32) -> Self {
        self.regen_rate = regen_rate;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn percent(&self) -> f32 {
        if self.max > 0.0 {
            self.current / self.max
        } else {
            0.0
        }
    }

    /// Возвращает реально снятое HP (0 если неуязвим).
    pub fn damage(&mut self, amount: f32, now: f32) -> f32 {
        if self.invulnerable {
            return 0.0;
        }
        let actual = self.current.min(amount.max(0.0));
        self.current -= actual;
        self.last_damage_time = now;
        actual
    }

    /// Возвращает реально восстановленное HP.
    pub fn heal(&mut self, amount: f32) -> f32 {
        let actual = (self.max - self.current).min(amount.max(0.0));
        self.current += actual;
        actual
    }
}

/// Боевые параметры + короткое окно "атакую" (attack_timer).
///
/// Окно нужно, чтобы enemy-атака резолвилась ровно в одном кадре:
/// CombatSystem потребляет `target` после удара.
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Combat {
    pub damage: f32,
    pub attack_speed: f32, // attacks per second
    pub range: f32,
    pub knockback: f32,
    pub armor: f32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub cooldown_timer: f32,
    pub is_attacking: bool,
    pub attack_timer: f32,
    pub attack_duration: f32,
    pub target: Option<Entity>,
    /// Some(тип снаряда) → дальнобойное оружие
    pub projectile: Option<String>,
}

impl Default for Combat {
    fn default() -> Self {
        Self {
            damage: 10.0,
            attack_speed: 1.0,
            range: 32.0,
            knockback: 0.0,
            armor: 0.0,
            crit_chance: 0.05,
            crit_multiplier: 1.5,
            cooldown_timer: 0.0,
            is_attacking: false,
            attack_timer: 0.0,
            attack_duration: 0.2,
            target: None,
            projectile: None,
        }
    }
}

impl Combat {
    pub fn can_attack(&self) -> bool {
        self.cooldown_timer <= 0.0
    }

    pub fn start_attack(&mut self) {
        self.is_attacking = true;
        self.attack_timer = self.attack_duration;
        self.cooldown_timer = 1.0 / self.attack_speed.max(0.01);
    }

    pub fn update(&mut self, dt: f32) {
        if self.cooldown_timer > 0.0 {
            self.cooldown_timer -= dt;
        }
        if self.attack_timer > 0.0 {
            self.attack_timer -= dt;
            if self.attack_timer <= 0.0 {
                self.is_attacking = false;
            }
        }
    }

    pub fn is_ranged(&self) -> bool {
        self.projectile.is_some()
    }
}

/// Боевые числа врага без баффов (из шаблона спавна).
///
/// У врагов нет Stats: stat pass пересчитывает их Combat от этой базы
/// и текущих статус-эффектов (фазовый бафф босса, copper shell).
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct BaseCombat {
    pub damage: f32,
    pub armor: f32,
    pub attack_speed: f32,
}

impl BaseCombat {
    pub fn of(combat: &Combat) -> Self {
        Self {
            damage: combat.damage,
            armor: combat.armor,
            attack_speed: combat.attack_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage_and_heal() {
        let mut health = Health::new(100.0);
        assert_eq!(health.damage(30.0, 1.0), 30.0);
        assert_eq!(health.current, 70.0);
        assert_eq!(health.last_damage_time, 1.0);

        // Overkill возвращает только то, что было
        assert_eq!(health.damage(500.0, 2.0), 70.0);
        assert!(!health.is_alive());

        assert_eq!(health.heal(40.0), 40.0);
        assert_eq!(health.heal(400.0), 60.0);
        assert_eq!(health.current, 100.0);
    }

    #[test]
    fn test_invulnerable_takes_nothing() {
        let mut health = Health::new(50.0);
        health.invulnerable = true;
        assert_eq!(health.damage(20.0, 0.0), 0.0);
        assert_eq!(health.current, 50.0);
    }

    #[test]
    fn test_attack_cooldown_cycle() {
        let mut combat = Combat {
            attack_speed: 2.0,
            ..Default::default()
        };
        assert!(combat.can_attack());

        combat.start_attack();
        assert!(combat.is_attacking);
        assert!(!combat.can_attack());
        assert!((combat.cooldown_timer - 0.5).abs() < 1e-6);

        combat.update(0.25);
        assert!(!combat.is_attacking, "окно атаки 0.2s закрылось");
        assert!(!combat.can_attack());

        combat.update(0.25);
        assert!(combat.can_attack());
    }
}
