//! Позиция, скорость, коллайдер.

use bevy::prelude::*;

use crate::config::CHUNK_PIXEL_SIZE;

/// Позиция в мировых пикселях.
///
/// Инвариант: `chunk` всегда = floor(x / 512), floor(y / 512).
/// Поэтому поля приватные, а вся запись идёт через `set` / `translate`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Position {
    x: f32,
    y: f32,
    prev_x: f32,
    prev_y: f32,
    chunk: IVec2,
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            prev_x: x,
            prev_y: y,
            chunk: chunk_of(x, y),
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn prev(&self) -> Vec2 {
        Vec2::new(self.prev_x, self.prev_y)
    }

    pub fn chunk(&self) -> IVec2 {
        self.chunk
    }

    pub fn set(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.chunk = chunk_of(x, y);
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.set(self.x + dx, self.y + dy);
    }

    /// Запоминает позицию до перемещения (для tile sweep в collision).
    pub fn save_prev(&mut self) {
        self.prev_x = self.x;
        self.prev_y = self.y;
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        self.xy().distance(other.xy())
    }
}

pub fn chunk_of(x: f32, y: f32) -> IVec2 {
    IVec2::new(
        (x / CHUNK_PIXEL_SIZE).floor() as i32,
        (y / CHUNK_PIXEL_SIZE).floor() as i32,
    )
}

/// Скорость (px/s). `speed`: базовая скорость, её выставляют factory и AI.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
    pub speed: f32,
}

impl Velocity {
    pub fn with_speed(speed: f32) -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            speed,
        }
    }

    pub fn stop(&mut self) {
        self.dx = 0.0;
        self.dy = 0.0;
    }

    pub fn set(&mut self, dx: f32, dy: f32) {
        self.dx = dx;
        self.dy = dy;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum ColliderShape {
    Aabb { width: f32, height: f32 },
    Circle { radius: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum CollisionLayer {
    Default,
    Player,
    Enemy,
    Resource,
    Station,
    Npc,
}

/// Коллайдер. `trigger`: пересечение детектится, но не расталкивается.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Collider {
    pub shape: ColliderShape,
    pub offset: Vec2,
    pub solid: bool,
    pub trigger: bool,
    pub layer: CollisionLayer,
}

impl Collider {
    pub fn aabb(width: f32, height: f32, layer: CollisionLayer) -> Self {
        Self {
            shape: ColliderShape::Aabb { width, height },
            offset: Vec2::ZERO,
            solid: true,
            trigger: false,
            layer,
        }
    }

    pub fn circle(radius: f32, layer: CollisionLayer) -> Self {
        Self {
            shape: ColliderShape::Circle { radius },
            offset: Vec2::ZERO,
            solid: true,
            trigger: false,
            layer,
        }
    }

    pub fn non_solid(mut self) -> Self {
        self.solid = false;
        self
    }

    /// Полуразмеры для tile-коллизий (круг → описанный квадрат)
    pub fn half_extents(&self) -> Vec2 {
        match self.shape {
            ColliderShape::Aabb { width, height } => Vec2::new(width / 2.0, height / 2.0),
            ColliderShape::Circle { radius } => Vec2::splat(radius),
        }
    }

    pub fn center(&self, pos: &Position) -> Vec2 {
        pos.xy() + self.offset
    }
}
