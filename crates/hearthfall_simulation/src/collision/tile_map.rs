//! Swept AABB против тайловой сетки: move-and-slide, corner assist, depenetration.
//!
//! Все координаты: центр AABB в пикселях. Тайл solid-ность спрашиваем у
//! `TerrainProvider` (незагруженный чанк = solid).

use bevy::prelude::*;

use crate::config::TILE_SIZE;
use crate::terrain::TerrainProvider;

const SKIN: f32 = 0.01;
const CORNER_THRESHOLD: f32 = 3.0;
const DEPENETRATE_ITERATIONS: usize = 4;
/// Отступ от дальнего края, чтобы край ровно на границе не захватывал соседний тайл
const EDGE_EPS: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideResult {
    pub pos: Vec2,
    pub hit_x: bool,
    pub hit_y: bool,
}

fn tile(v: f32) -> i32 {
    (v / TILE_SIZE).floor() as i32
}

/// Обёртка над террейном для tile-коллизий
pub struct TileCollision<'a> {
    terrain: &'a dyn TerrainProvider,
}

impl<'a> TileCollision<'a> {
    pub fn new(terrain: &'a dyn TerrainProvider) -> Self {
        Self { terrain }
    }

    fn solid(&self, axis: Axis, main: i32, cross: i32) -> bool {
        match axis {
            Axis::X => self.terrain.is_tile_solid(main, cross),
            Axis::Y => self.terrain.is_tile_solid(cross, main),
        }
    }

    /// Двигает AABB на `delta`: сначала X, потом Y; при упоре в угол
    /// пробует сдвинуть на ≤3px по другой оси; в конце выталкивает из стен.
    pub fn move_and_slide(&self, center: Vec2, half: Vec2, delta: Vec2) -> SlideResult {
        let (mut x, mut hit_x) = (center.x, false);
        if delta.x != 0.0 {
            (x, hit_x) = self.sweep_axis(Axis::X, center.x, center.y, half.x, half.y, delta.x);
        }

        let (mut y, mut hit_y) = (center.y, false);
        if delta.y != 0.0 {
            (y, hit_y) = self.sweep_axis(Axis::Y, center.y, x, half.y, half.x, delta.y);
        }

        if delta.x != 0.0 && delta.y != 0.0 {
            if hit_x && !hit_y {
                let nudge = self.corner_assist(Axis::X, x, y, half.x, half.y, delta.x);
                if nudge != 0.0 {
                    let (retry, blocked) =
                        self.sweep_axis(Axis::X, center.x, y + nudge, half.x, half.y, delta.x);
                    if !blocked {
                        x = retry;
                        y += nudge;
                        hit_x = false;
                    }
                }
            } else if hit_y && !hit_x {
                let nudge = self.corner_assist(Axis::Y, y, x, half.y, half.x, delta.y);
                if nudge != 0.0 {
                    let (retry, blocked) =
                        self.sweep_axis(Axis::Y, center.y, x + nudge, half.y, half.x, delta.y);
                    if !blocked {
                        y = retry;
                        x += nudge;
                        hit_y = false;
                    }
                }
            }
        }

        SlideResult {
            pos: self.depenetrate(Vec2::new(x, y), half),
            hit_x,
            hit_y,
        }
    }

    /// Сдвиг по одной оси с остановкой перед первым solid тайлом на пути.
    /// `main`/`half_main` по оси движения, `cross`/`half_cross` поперечные.
    fn sweep_axis(
        &self,
        axis: Axis,
        main: f32,
        cross: f32,
        half_main: f32,
        half_cross: f32,
        delta: f32,
    ) -> (f32, bool) {
        let target = main + delta;
        let cross_min = tile(cross - half_cross);
        let cross_max = tile(cross + half_cross - EDGE_EPS);
        let mut clamped = target;
        let mut hit = false;

        if delta > 0.0 {
            let leading = main + half_main;
            for t in tile(leading)..=tile(target + half_main) {
                for c in cross_min..=cross_max {
                    if !self.solid(axis, t, c) {
                        continue;
                    }
                    let near_edge = t as f32 * TILE_SIZE;
                    if leading <= near_edge + SKIN {
                        let max_pos = near_edge - half_main - SKIN;
                        if max_pos < clamped {
                            clamped = max_pos;
                            hit = true;
                        }
                    }
                }
            }
        } else {
            let leading = main - half_main;
            for t in tile(target - half_main)..=tile(leading) {
                for c in cross_min..=cross_max {
                    if !self.solid(axis, t, c) {
                        continue;
                    }
                    let far_edge = (t + 1) as f32 * TILE_SIZE;
                    if leading >= far_edge - SKIN {
                        let min_pos = far_edge + half_main + SKIN;
                        if min_pos > clamped {
                            clamped = min_pos;
                            hit = true;
                        }
                    }
                }
            }
        }

        (clamped, hit)
    }

    /// Если путь перекрыт ровно одним тайлом и перекрытие ≤ CORNER_THRESHOLD,
    /// возвращает сдвиг по поперечной оси, иначе 0.
    fn corner_assist(
        &self,
        axis: Axis,
        main: f32,
        cross: f32,
        half_main: f32,
        half_cross: f32,
        delta: f32,
    ) -> f32 {
        let t = if delta > 0.0 {
            tile(main + half_main + SKIN * 2.0)
        } else {
            tile(main - half_main - SKIN * 2.0)
        };

        let mut blocked = 0;
        let mut nudge = 0.0;
        for c in tile(cross - half_cross)..=tile(cross + half_cross - EDGE_EPS) {
            if !self.solid(axis, t, c) {
                continue;
            }
            blocked += 1;
            if blocked > 1 {
                return 0.0;
            }

            let tile_lo = c as f32 * TILE_SIZE;
            let tile_hi = tile_lo + TILE_SIZE;
            let over_lo = cross + half_cross - tile_lo;
            let over_hi = tile_hi - (cross - half_cross);
            if over_lo.min(over_hi) > CORNER_THRESHOLD {
                return 0.0;
            }
            nudge = if over_lo < over_hi {
                -(over_lo + SKIN)
            } else {
                over_hi + SKIN
            };
        }
        nudge
    }

    /// До 4 итераций: выталкивание из первого пересечённого solid тайла
    /// по оси минимального перекрытия.
    pub fn depenetrate(&self, center: Vec2, half: Vec2) -> Vec2 {
        let mut p = center;
        for _ in 0..DEPENETRATE_ITERATIONS {
            match self.first_penetration(p, half) {
                Some(push) => p += push,
                None => break,
            }
        }
        p
    }

    fn first_penetration(&self, center: Vec2, half: Vec2) -> Option<Vec2> {
        let (left, right) = (center.x - half.x, center.x + half.x);
        let (top, bottom) = (center.y - half.y, center.y + half.y);

        for ty in tile(top)..=tile(bottom - EDGE_EPS) {
            for tx in tile(left)..=tile(right - EDGE_EPS) {
                if !self.terrain.is_tile_solid(tx, ty) {
                    continue;
                }
                let tile_left = tx as f32 * TILE_SIZE;
                let tile_right = tile_left + TILE_SIZE;
                let tile_top = ty as f32 * TILE_SIZE;
                let tile_bottom = tile_top + TILE_SIZE;

                if right <= tile_left || left >= tile_right || bottom <= tile_top || top >= tile_bottom
                {
                    continue;
                }

                let o_left = right - tile_left;
                let o_right = tile_right - left;
                let o_top = bottom - tile_top;
                let o_bottom = tile_bottom - top;
                let min = o_left.min(o_right).min(o_top).min(o_bottom);

                let push = if min == o_left {
                    Vec2::new(-(o_left + SKIN), 0.0)
                } else if min == o_right {
                    Vec2::new(o_right + SKIN, 0.0)
                } else if min == o_top {
                    Vec2::new(0.0, -(o_top + SKIN))
                } else {
                    Vec2::new(0.0, o_bottom + SKIN)
                };
                return Some(push);
            }
        }
        None
    }

    /// Пересекает ли AABB хоть один solid тайл (строго).
    pub fn overlaps_solid(&self, center: Vec2, half: Vec2) -> bool {
        self.first_penetration(center, half).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{GridTerrain, TILE_WALL};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    const HALF: Vec2 = Vec2::splat(12.0);

    /// Чанк 0,0 открыт, по периметру стена, в центре колонна 2x2
    fn arena() -> GridTerrain {
        let mut terrain = GridTerrain::open_area(IVec2::ZERO, IVec2::ZERO);
        terrain.fill_tiles(0, 0, 15, 0, TILE_WALL);
        terrain.fill_tiles(0, 15, 15, 15, TILE_WALL);
        terrain.fill_tiles(0, 0, 0, 15, TILE_WALL);
        terrain.fill_tiles(15, 0, 15, 15, TILE_WALL);
        terrain.fill_tiles(7, 7, 8, 8, TILE_WALL);
        terrain
    }

    #[test]
    fn test_slide_stops_at_wall() {
        let terrain = arena();
        let tiles = TileCollision::new(&terrain);
        // Стена справа начинается с x = 15*32 = 480
        let res = tiles.move_and_slide(Vec2::new(440.0, 100.0), HALF, Vec2::new(100.0, 0.0));
        assert!(res.hit_x);
        assert!(!res.hit_y);
        assert!(res.pos.x + HALF.x <= 480.0);
        assert!((res.pos.x - (480.0 - 12.0 - SKIN)).abs() < 1e-3);
    }

    #[test]
    fn test_diagonal_slides_along_wall() {
        let terrain = arena();
        let tiles = TileCollision::new(&terrain);
        let res = tiles.move_and_slide(Vec2::new(440.0, 100.0), HALF, Vec2::new(100.0, 20.0));
        assert!(res.hit_x);
        assert!((res.pos.y - 120.0).abs() < 1e-3, "по Y скользим свободно");
    }

    #[test]
    fn test_corner_assist_nudges_past_edge() {
        let mut terrain = GridTerrain::open_area(IVec2::ZERO, IVec2::ZERO);
        terrain.fill_tiles(0, 0, 15, 0, TILE_WALL);
        // Одиночный блок; AABB задевает его нижний край на 2px
        terrain.set_world_tile(5, 5, TILE_WALL);
        let tiles = TileCollision::new(&terrain);
        let start = Vec2::new(140.0, 192.0 + 12.0 - 2.0);
        let res = tiles.move_and_slide(start, HALF, Vec2::new(30.0, 0.5));
        assert!(!res.hit_x, "угол должен быть обойдён");
        assert!(res.pos.x > start.x + 20.0);
        assert!(!tiles.overlaps_solid(res.pos, HALF));
    }

    #[test]
    fn test_depenetrate_pushes_out() {
        let terrain = arena();
        let tiles = TileCollision::new(&terrain);
        // Залезли в колонну на 4px слева
        let inside = Vec2::new(224.0 - 12.0 + 4.0, 240.0);
        assert!(tiles.overlaps_solid(inside, HALF));
        let out = tiles.depenetrate(inside, HALF);
        assert!(!tiles.overlaps_solid(out, HALF));
        assert!(out.x < inside.x);
    }

    #[test]
    fn test_random_walk_never_enters_solid() {
        let terrain = arena();
        let tiles = TileCollision::new(&terrain);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut pos = Vec2::new(100.0, 100.0);

        for step in 0..5000 {
            let delta = Vec2::new(rng.gen_range(-12.0..12.0), rng.gen_range(-12.0..12.0));
            pos = tiles.move_and_slide(pos, HALF, delta).pos;
            assert!(
                !tiles.overlaps_solid(pos, HALF),
                "шаг {step}: AABB {pos:?} пересёк стену"
            );
        }
    }
}
