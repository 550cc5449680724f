//! Terrain/World provider: внешний коллаборатор симуляции.
//!
//! Симуляция террейн не генерирует и не хранит. Ей нужны синхронные ответы:
//! solid ли тайл, город ли чанк, какие точки спавна/ресурсов в чанке.
//! `GridTerrain`: in-memory реализация для headless запуска и тестов.

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{chunk_of, LootDrop};
use crate::config::{CHUNK_TILES, TILE_SIZE};
use crate::factory::EnemyTemplate;

/// Точка спавна врага/лошади в чанке
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
    pub template: EnemyTemplate,
}

/// Ресурс, размещённый генератором мира
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePoint {
    pub resource_id: String,
    pub name: String,
    #[serde(default = "default_resource_color")]
    pub color: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_resource_size")]
    pub size: f32,
    #[serde(default = "default_resource_health")]
    pub health: f32,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub tool_tier: u8,
    #[serde(default = "default_respawn_time")]
    pub respawn_time: f32,
    #[serde(default)]
    pub drops: Vec<LootDrop>,
}

fn default_resource_color() -> String {
    "#8b5a2b".to_string()
}
fn default_resource_size() -> f32 {
    24.0
}
fn default_resource_health() -> f32 {
    50.0
}
fn default_respawn_time() -> f32 {
    300.0
}

/// Уведомление о смене тайла (разрушаемый террейн)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileChange {
    pub chunk_x: i32,
    pub chunk_y: i32,
    pub local_x: u32,
    pub local_y: u32,
    pub new_tile: u16,
}

pub trait TerrainProvider: Send + Sync {
    fn is_tile_solid(&self, tile_x: i32, tile_y: i32) -> bool;

    fn is_town(&self, chunk: IVec2) -> bool;

    fn spawn_points(&self, chunk: IVec2) -> &[SpawnPoint];

    fn resource_points(&self, chunk: IVec2) -> &[ResourcePoint];

    /// None если чанк не загружен, координаты вне чанка или тайл не изменился.
    fn set_tile(&mut self, chunk: IVec2, local_x: u32, local_y: u32, tile: u16)
        -> Option<TileChange>;

    fn is_solid_at(&self, x: f32, y: f32) -> bool {
        self.is_tile_solid(
            (x / TILE_SIZE).floor() as i32,
            (y / TILE_SIZE).floor() as i32,
        )
    }
}

/// Террейн как ресурс мира
#[derive(Resource)]
pub struct Terrain(pub Box<dyn TerrainProvider>);

impl Terrain {
    pub fn new(provider: impl TerrainProvider + 'static) -> Self {
        Self(Box::new(provider))
    }
}

impl std::ops::Deref for Terrain {
    type Target = dyn TerrainProvider;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::ops::DerefMut for Terrain {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

pub const TILE_GRASS: u16 = 0;
pub const TILE_WALL: u16 = 1;
pub const TILE_WATER: u16 = 2;
/// Разрушаемая скала → превращается в TILE_RUBBLE
pub const TILE_ROCK: u16 = 3;
pub const TILE_RUBBLE: u16 = 4;

#[derive(Debug, Clone, Default)]
pub struct ChunkData {
    pub tiles: Vec<u16>,
    pub town: bool,
    pub spawn_points: Vec<SpawnPoint>,
    pub resource_points: Vec<ResourcePoint>,
}

impl ChunkData {
    pub fn filled(tile: u16) -> Self {
        Self {
            tiles: vec![tile; (CHUNK_TILES * CHUNK_TILES) as usize],
            ..Default::default()
        }
    }

    fn index(local_x: u32, local_y: u32) -> Option<usize> {
        let n = CHUNK_TILES as u32;
        (local_x < n && local_y < n).then(|| (local_y * n + local_x) as usize)
    }
}

/// In-memory террейн. Незагруженный чанк считается solid.
#[derive(Debug, Clone)]
pub struct GridTerrain {
    chunks: HashMap<IVec2, ChunkData>,
    solid_tiles: HashSet<u16>,
}

impl Default for GridTerrain {
    fn default() -> Self {
        Self {
            chunks: HashMap::new(),
            solid_tiles: [TILE_WALL, TILE_WATER, TILE_ROCK].into_iter().collect(),
        }
    }
}

static NO_SPAWNS: [SpawnPoint; 0] = [];
static NO_RESOURCES: [ResourcePoint; 0] = [];

impl GridTerrain {
    /// Прямоугольник открытых (grass) чанков min..=max
    pub fn open_area(min: IVec2, max: IVec2) -> Self {
        let mut terrain = Self::default();
        for cy in min.y..=max.y {
            for cx in min.x..=max.x {
                terrain.chunks.insert(IVec2::new(cx, cy), ChunkData::filled(TILE_GRASS));
            }
        }
        terrain
    }

    pub fn chunk_mut(&mut self, chunk: IVec2) -> Option<&mut ChunkData> {
        self.chunks.get_mut(&chunk)
    }

    pub fn insert_chunk(&mut self, chunk: IVec2, data: ChunkData) {
        self.chunks.insert(chunk, data);
    }

    /// Ставит тайл по мировым тайловым координатам (если чанк загружен).
    pub fn set_world_tile(&mut self, tile_x: i32, tile_y: i32, tile: u16) {
        let (chunk, local) = split_tile(tile_x, tile_y);
        if let Some(index) = ChunkData::index(local.x, local.y) {
            if let Some(data) = self.chunks.get_mut(&chunk) {
                data.tiles[index] = tile;
            }
        }
    }

    /// Заливает прямоугольник тайлов [x0..=x1] × [y0..=y1]
    pub fn fill_tiles(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, tile: u16) {
        for ty in y0..=y1 {
            for tx in x0..=x1 {
                self.set_world_tile(tx, ty, tile);
            }
        }
    }

    pub fn set_town(&mut self, chunk: IVec2, town: bool) {
        if let Some(data) = self.chunks.get_mut(&chunk) {
            data.town = town;
        }
    }

    pub fn add_spawn_point(&mut self, point: SpawnPoint) {
        let chunk = chunk_of(point.x, point.y);
        if let Some(data) = self.chunks.get_mut(&chunk) {
            data.spawn_points.push(point);
        }
    }

    pub fn add_resource_point(&mut self, point: ResourcePoint) {
        let chunk = chunk_of(point.x, point.y);
        if let Some(data) = self.chunks.get_mut(&chunk) {
            data.resource_points.push(point);
        }
    }
}

fn split_tile(tile_x: i32, tile_y: i32) -> (IVec2, UVec2) {
    let n = CHUNK_TILES;
    let chunk = IVec2::new(tile_x.div_euclid(n), tile_y.div_euclid(n));
    let local = UVec2::new(tile_x.rem_euclid(n) as u32, tile_y.rem_euclid(n) as u32);
    (chunk, local)
}

impl TerrainProvider for GridTerrain {
    fn is_tile_solid(&self, tile_x: i32, tile_y: i32) -> bool {
        let (chunk, local) = split_tile(tile_x, tile_y);
        let Some(data) = self.chunks.get(&chunk) else {
            return true;
        };
        ChunkData::index(local.x, local.y)
            .and_then(|i| data.tiles.get(i))
            .is_none_or(|tile| self.solid_tiles.contains(tile))
    }

    fn is_town(&self, chunk: IVec2) -> bool {
        self.chunks.get(&chunk).is_some_and(|c| c.town)
    }

    fn spawn_points(&self, chunk: IVec2) -> &[SpawnPoint] {
        self.chunks
            .get(&chunk)
            .map(|c| c.spawn_points.as_slice())
            .unwrap_or(&NO_SPAWNS)
    }

    fn resource_points(&self, chunk: IVec2) -> &[ResourcePoint] {
        self.chunks
            .get(&chunk)
            .map(|c| c.resource_points.as_slice())
            .unwrap_or(&NO_RESOURCES)
    }

    fn set_tile(
        &mut self,
        chunk: IVec2,
        local_x: u32,
        local_y: u32,
        tile: u16,
    ) -> Option<TileChange> {
        let index = ChunkData::index(local_x, local_y)?;
        let data = self.chunks.get_mut(&chunk)?;
        if data.tiles[index] == tile {
            return None;
        }
        data.tiles[index] = tile;
        Some(TileChange {
            chunk_x: chunk.x,
            chunk_y: chunk.y,
            local_x,
            local_y,
            new_tile: tile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_chunk_is_solid() {
        let terrain = GridTerrain::open_area(IVec2::ZERO, IVec2::ZERO);
        assert!(!terrain.is_tile_solid(0, 0));
        assert!(!terrain.is_tile_solid(15, 15));
        assert!(terrain.is_tile_solid(16, 0), "соседний чанк не загружен");
        assert!(terrain.is_tile_solid(-1, 0));
    }

    #[test]
    fn test_set_tile_reports_change() {
        let mut terrain = GridTerrain::open_area(IVec2::ZERO, IVec2::ONE);
        let change = terrain.set_tile(IVec2::new(1, 0), 2, 3, TILE_WALL);
        assert_eq!(
            change,
            Some(TileChange {
                chunk_x: 1,
                chunk_y: 0,
                local_x: 2,
                local_y: 3,
                new_tile: TILE_WALL,
            })
        );
        assert!(terrain.is_tile_solid(18, 3));
        assert!(terrain.set_tile(IVec2::new(1, 0), 2, 3, TILE_WALL).is_none());
        assert!(terrain.set_tile(IVec2::new(9, 9), 0, 0, TILE_WALL).is_none());
        assert!(terrain.set_tile(IVec2::ZERO, 16, 0, TILE_WALL).is_none());
    }

    #[test]
    fn test_solid_at_world_point() {
        let mut terrain = GridTerrain::open_area(IVec2::ZERO, IVec2::ZERO);
        terrain.fill_tiles(2, 2, 3, 3, TILE_ROCK);
        assert!(terrain.is_solid_at(70.0, 100.0));
        assert!(!terrain.is_solid_at(130.0, 100.0));
    }
}
