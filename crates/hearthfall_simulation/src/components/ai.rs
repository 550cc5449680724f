//! AI компоненты: FSM state, behavior, boss/caster "мозги".

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Состояние FSM (одно на актора)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Reflect)]
pub enum AiState {
    #[default]
    Idle,
    Patrol,
    Chase,
    Attack,
    Flee,
    Return,
}

impl AiState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiState::Idle => "idle",
            AiState::Patrol => "patrol",
            AiState::Chase => "chase",
            AiState::Attack => "attack",
            AiState::Flee => "flee",
            AiState::Return => "return",
        }
    }
}

/// Поведение: закрытый enum, диспатч через match (без строковых тегов).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Reflect, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    #[default]
    Aggressive,
    /// Не агрится, убегает после удара
    Passive,
    Patrol,
    Pack,
    /// Охраняет точку: атакует врагов (enemy), не игроков
    Guard,
    /// Лошадь: убегает от игрока в aggro range
    Horse,
    /// Горожане: idle/patrol без агра
    Wander,
    Boss,
}

/// AI актора.
///
/// Инвариант: `leash_range` доминирует, вне Return актор дальше leash от дома
/// сбрасывает цель и уходит в Return.
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Ai {
    pub state: AiState,
    pub behavior: Behavior,
    pub target: Option<Entity>,
    /// Кто ударил passive-существо (от кого убегать)
    pub threat: Option<Entity>,
    pub aggro_range: f32,
    pub deaggro_range: f32,
    pub attack_range: f32,
    pub leash_range: f32,
    pub home: Vec2,
    pub state_timer: f32,
    pub patrol_timer: f32,
    pub patrol_dir: Vec2,
    pub idle_duration: f32,
    pub patrol_duration: f32,
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            state: AiState::Idle,
            behavior: Behavior::Aggressive,
            target: None,
            threat: None,
            aggro_range: 160.0,
            deaggro_range: 288.0,
            attack_range: 32.0,
            leash_range: 640.0,
            home: Vec2::ZERO,
            state_timer: 0.0,
            patrol_timer: 0.0,
            patrol_dir: Vec2::ZERO,
            idle_duration: 2.0,
            patrol_duration: 2.0,
        }
    }
}

impl Ai {
    pub fn new(behavior: Behavior, home: Vec2) -> Self {
        Self {
            behavior,
            home,
            ..Default::default()
        }
    }

    /// Смена состояния всегда обнуляет state_timer.
    pub fn transition(&mut self, state: AiState) {
        self.state = state;
        self.state_timer = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum BossAbility {
    GroundPound,
    CopperShards,
    CopperShell,
}

/// Состояние босса: фаза, кулдауны способностей, windup.
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub struct BossBrain {
    pub phase: u8,
    pub ground_pound_cd: f32,
    pub shards_cd: f32,
    pub shell_cd: f32,
    pub windup: Option<(BossAbility, f32)>,
}

impl Default for BossBrain {
    fn default() -> Self {
        Self {
            phase: 1,
            ground_pound_cd: 0.0,
            shards_cd: 0.0,
            shell_cd: 0.0,
            windup: None,
        }
    }
}

impl BossBrain {
    pub fn is_winding_up(&self) -> bool {
        self.windup.is_some()
    }
}

/// Эффект скилла вражеского кастера.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CasterEffect {
    RangedProjectile {
        #[serde(default = "default_projectile_speed")]
        speed: f32,
        #[serde(default = "default_caster_damage")]
        damage: f32,
        #[serde(default = "default_projectile_type")]
        projectile_type: String,
    },
    AoeDamage {
        #[serde(default = "default_aoe_radius")]
        radius: f32,
        #[serde(default = "default_caster_damage")]
        damage: f32,
        #[serde(default)]
        dot: Option<CasterDot>,
    },
    Dot(CasterDot),
    SelfBuff {
        #[serde(default = "default_buff_type")]
        buff_type: String,
        #[serde(default = "default_buff_duration")]
        duration: f32,
        #[serde(default)]
        modifiers: CasterModifiers,
    },
    Debuff {
        #[serde(default = "default_debuff_type")]
        debuff_type: String,
        #[serde(default = "default_debuff_duration")]
        duration: f32,
        #[serde(default)]
        modifiers: CasterModifiers,
    },
    SelfHeal {
        #[serde(default = "default_heal_percent")]
        percent: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasterDot {
    #[serde(default = "default_dot_type")]
    pub dot_type: String,
    #[serde(default = "default_dot_duration")]
    pub duration: f32,
    #[serde(default = "default_dot_damage")]
    pub damage: f32,
}

impl Default for CasterDot {
    fn default() -> Self {
        Self {
            dot_type: default_dot_type(),
            duration: default_dot_duration(),
            damage: default_dot_damage(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasterModifiers {
    pub armor_flat: Option<f32>,
    pub damage_mod: Option<f32>,
    pub speed_mod: Option<f32>,
    pub attack_speed_mod: Option<f32>,
    pub damage_taken_mod: Option<f32>,
}

fn default_projectile_speed() -> f32 {
    400.0
}
fn default_caster_damage() -> f32 {
    10.0
}
fn default_projectile_type() -> String {
    "shadow_bolt".to_string()
}
fn default_aoe_radius() -> f32 {
    64.0
}
fn default_buff_type() -> String {
    "enemy_buff".to_string()
}
fn default_buff_duration() -> f32 {
    8.0
}
fn default_debuff_type() -> String {
    "enemy_debuff".to_string()
}
fn default_debuff_duration() -> f32 {
    6.0
}
fn default_heal_percent() -> f32 {
    0.15
}
fn default_dot_type() -> String {
    "enemy_curse".to_string()
}
fn default_dot_duration() -> f32 {
    6.0
}
fn default_dot_damage() -> f32 {
    5.0
}
fn default_cast_chance() -> f32 {
    0.3
}
fn default_windup() -> f32 {
    0.5
}
fn default_cooldown() -> f32 {
    8.0
}

/// Скилл кастера (из шаблона врага)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasterSkill {
    pub id: String,
    #[serde(default)]
    pub cast_range: Option<f32>,
    /// Кастует только когда HP% ниже порога
    #[serde(default)]
    pub hp_threshold: Option<f32>,
    #[serde(default = "default_cast_chance")]
    pub cast_chance: f32,
    #[serde(default = "default_windup")]
    pub windup: f32,
    #[serde(default = "default_cooldown")]
    pub cooldown: f32,
    #[serde(flatten)]
    pub effect: CasterEffect,
}

/// Состояние кастера: кулдауны по индексу скилла + текущий windup.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct CasterBrain {
    pub skills: Vec<CasterSkill>,
    pub cooldowns: Vec<f32>,
    pub windup: Option<(usize, f32)>,
}

impl CasterBrain {
    pub fn new(skills: Vec<CasterSkill>) -> Self {
        let cooldowns = vec![0.0; skills.len()];
        Self {
            skills,
            cooldowns,
            windup: None,
        }
    }
}
