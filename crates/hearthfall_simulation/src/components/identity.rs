//! Идентичность сущностей: теги, имя, внешний вид, player/npc/enemy маркеры.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ObserverId;

/// Классификация сущности (для getByTag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Player,
    Enemy,
    Resource,
    Npc,
    Station,
    Guard,
    Horse,
    Boss,
    Projectile,
    DamageZone,
}

impl Tag {
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Набор тегов как битовая маска
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tags(u16);

impl Tags {
    pub fn of(tags: &[Tag]) -> Self {
        let mut set = Self::default();
        for &tag in tags {
            set.insert(tag);
        }
        set
    }

    pub fn insert(&mut self, tag: Tag) {
        self.0 |= tag.bit();
    }

    pub fn remove(&mut self, tag: Tag) {
        self.0 &= !tag.bit();
    }

    pub fn has(&self, tag: Tag) -> bool {
        self.0 & tag.bit() != 0
    }
}

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(pub String);

impl DisplayName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Цвет + размер спрайта (только для клиента)
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Appearance {
    pub color: String,
    pub size: f32,
}

impl Appearance {
    pub fn new(color: impl Into<String>, size: f32) -> Self {
        Self {
            color: color.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Facing {
    /// Доминирующая ось движения; None при нулевом векторе.
    pub fn from_motion(motion: Vec2) -> Option<Facing> {
        if motion.length_squared() < f32::EPSILON {
            return None;
        }
        Some(if motion.x.abs() > motion.y.abs() {
            if motion.x > 0.0 {
                Facing::Right
            } else {
                Facing::Left
            }
        } else if motion.y > 0.0 {
            Facing::Down
        } else {
            Facing::Up
        })
    }

    pub fn direction(self) -> Vec2 {
        match self {
            Facing::Up => Vec2::new(0.0, -1.0),
            Facing::Down => Vec2::new(0.0, 1.0),
            Facing::Left => Vec2::new(-1.0, 0.0),
            Facing::Right => Vec2::new(1.0, 0.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }
}

/// Игрок, привязанный к наблюдателю (соединению).
#[derive(Component, Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub observer: ObserverId,
    pub facing: Facing,
    pub last_input_seq: u64,
}

impl PlayerInfo {
    pub fn new(observer: ObserverId) -> Self {
        Self {
            observer,
            facing: Facing::Down,
            last_input_seq: 0,
        }
    }
}

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Npc {
    /// citizen / guard / merchant ...
    pub npc_type: String,
    pub npc_id: String,
}

/// Тип врага (для квестов kill и шаблонов спавна)
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct EnemyKind {
    pub enemy_type: String,
    pub is_boss: bool,
}
