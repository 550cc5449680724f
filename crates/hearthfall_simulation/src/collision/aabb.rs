//! AABB / circle overlap и minimum translation vector.

use bevy::prelude::*;

use crate::components::{Collider, ColliderShape, Position};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_center(center: Vec2, half: Vec2) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn of(pos: &Position, collider: &Collider) -> Self {
        Self::from_center(collider.center(pos), collider.half_extents())
    }

    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Строгое пересечение: касание краями не считается.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Минимальный вектор, выталкивающий `self` из `other`. None если не пересекаются.
    pub fn mtv(&self, other: &Aabb) -> Option<Vec2> {
        let push_right = other.max.x - self.min.x;
        let push_left = self.max.x - other.min.x;
        let push_down = other.max.y - self.min.y;
        let push_up = self.max.y - other.min.y;

        if push_right <= 0.0 || push_left <= 0.0 || push_down <= 0.0 || push_up <= 0.0 {
            return None;
        }

        let candidates = [
            (push_right, Vec2::new(push_right, 0.0)),
            (push_left, Vec2::new(-push_left, 0.0)),
            (push_down, Vec2::new(0.0, push_down)),
            (push_up, Vec2::new(0.0, -push_up)),
        ];
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.0 < best.0 {
                best = *candidate;
            }
        }
        Some(best.1)
    }
}

pub fn circle_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let sum = ra + rb;
    a.distance_squared(b) < sum * sum
}

pub fn circle_vs_aabb(center: Vec2, radius: f32, rect: &Aabb) -> bool {
    let closest = center.clamp(rect.min, rect.max);
    center.distance_squared(closest) < radius * radius
}

/// Пересечение двух коллайдеров с учётом формы.
pub fn colliders_overlap(pa: &Position, ca: &Collider, pb: &Position, cb: &Collider) -> bool {
    match (ca.shape, cb.shape) {
        (ColliderShape::Aabb { .. }, ColliderShape::Aabb { .. }) => {
            Aabb::of(pa, ca).overlaps(&Aabb::of(pb, cb))
        }
        (ColliderShape::Circle { radius: ra }, ColliderShape::Circle { radius: rb }) => {
            circle_overlap(ca.center(pa), ra, cb.center(pb), rb)
        }
        (ColliderShape::Circle { radius }, ColliderShape::Aabb { .. }) => {
            circle_vs_aabb(ca.center(pa), radius, &Aabb::of(pb, cb))
        }
        (ColliderShape::Aabb { .. }, ColliderShape::Circle { radius }) => {
            circle_vs_aabb(cb.center(pb), radius, &Aabb::of(pa, ca))
        }
    }
}

/// MTV выталкивания A из B. Нулевой вектор = нет коллизии (None).
pub fn colliders_mtv(pa: &Position, ca: &Collider, pb: &Position, cb: &Collider) -> Option<Vec2> {
    let mtv = match (ca.shape, cb.shape) {
        (ColliderShape::Aabb { .. }, ColliderShape::Aabb { .. }) => {
            Aabb::of(pa, ca).mtv(&Aabb::of(pb, cb))?
        }
        _ => {
            // С кругами толкаем вдоль оси центр-центр
            let delta = ca.center(pa) - cb.center(pb);
            let ra = bounding_radius(ca);
            let rb = bounding_radius(cb);
            let dist = delta.length();
            let overlap = ra + rb - dist;
            if overlap <= 0.0 {
                return None;
            }
            if dist == 0.0 {
                Vec2::new(overlap, 0.0)
            } else {
                delta / dist * overlap
            }
        }
    };
    (mtv.length_squared() > f32::EPSILON).then_some(mtv)
}

fn bounding_radius(collider: &Collider) -> f32 {
    match collider.shape {
        ColliderShape::Circle { radius } => radius,
        ColliderShape::Aabb { width, height } => width.max(height) / 2.0,
    }
}
