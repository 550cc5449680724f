//! Uniform hash grid для broad-phase. Пересобирается с нуля каждый тик.

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

use super::aabb::Aabb;

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<IVec2, Vec<Entity>>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(128.0)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_of(&self, p: Vec2) -> IVec2 {
        (p / self.cell_size).floor().as_ivec2()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Кладёт сущность во все клетки, которые задевает AABB.
    pub fn insert(&mut self, entity: Entity, aabb: &Aabb) {
        let lo = self.cell_of(aabb.min);
        let hi = self.cell_of(aabb.max);
        for cy in lo.y..=hi.y {
            for cx in lo.x..=hi.x {
                self.cells.entry(IVec2::new(cx, cy)).or_default().push(entity);
            }
        }
    }

    /// Уникальные кандидаты из всех клеток, которые задевает AABB.
    /// Порядок детерминирован: клетки по строкам, внутри клетки по порядку вставки.
    pub fn query(&self, aabb: &Aabb) -> Vec<Entity> {
        let lo = self.cell_of(aabb.min);
        let hi = self.cell_of(aabb.max);
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for cy in lo.y..=hi.y {
            for cx in lo.x..=hi.x {
                let Some(cell) = self.cells.get(&IVec2::new(cx, cy)) else {
                    continue;
                };
                for &entity in cell {
                    if seen.insert(entity) {
                        result.push(entity);
                    }
                }
            }
        }
        result
    }

    /// Кандидаты около точки (клетка + 8 соседей)
    pub fn query_point(&self, p: Vec2) -> Vec<Entity> {
        let half = Vec2::splat(self.cell_size);
        self.query(&Aabb::from_center(p, half))
    }
}
