//! Настройки симуляции (tunables) + геометрические константы мира.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

pub const TILE_SIZE: f32 = 32.0;
pub const CHUNK_TILES: i32 = 16;
pub const CHUNK_PIXEL_SIZE: f32 = TILE_SIZE * CHUNK_TILES as f32; // 512

pub const PLAYER_SPEED: f32 = 160.0;
pub const PLAYER_SIZE: f32 = 24.0;
pub const PLAYER_MELEE_RANGE: f32 = 40.0;

/// Tunables, которые можно переопределить JSON-файлом.
///
/// Все интервалы в секундах симуляции, расстояния в пикселях.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub tick_rate: u32,
    pub seed: u64,
    pub spatial_cell_size: f32,
    /// Задержка регена после последнего урона
    pub regen_delay: f32,
    /// Радиус активных чанков вокруг игрока
    pub view_distance: i32,
    pub despawn_interval: f32,
    /// Дополнительный запас чанков сверх view_distance до деспавна
    pub despawn_extra_chunks: i32,
    pub spawn_interval: f32,
    pub max_enemies_per_chunk: usize,
    pub max_enemy_spawns_per_check: usize,
    pub max_horses_per_chunk: usize,
    pub resource_respawn_interval: f32,
    pub quest_check_interval: f32,
    pub damage_zone_tick: f32,
    pub respawn_point: (f32, f32),
    pub boss: BossTuning,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            seed: 42,
            spatial_cell_size: 128.0,
            regen_delay: 5.0,
            view_distance: 3,
            despawn_interval: 10.0,
            despawn_extra_chunks: 3,
            spawn_interval: 5.0,
            max_enemies_per_chunk: 6,
            max_enemy_spawns_per_check: 2,
            max_horses_per_chunk: 2,
            resource_respawn_interval: 1.0,
            quest_check_interval: 2.0,
            damage_zone_tick: 0.5,
            respawn_point: (512.0, 512.0),
            boss: BossTuning::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        serde_json::from_str(json).map_err(SimError::ConfigParse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SimError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Длительность одного тика
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Враги дальше этого (по обеим осям) от всех игроков деспавнятся
    pub fn despawn_distance(&self) -> f32 {
        (self.view_distance + self.despawn_extra_chunks) as f32 * CHUNK_PIXEL_SIZE
    }
}

/// Параметры способностей босса.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BossTuning {
    pub phase2_threshold: f32,
    pub phase3_threshold: f32,
    pub ground_pound_cooldown: f32,
    pub ground_pound_windup: f32,
    pub ground_pound_radius: f32,
    pub ground_pound_damage: f32,
    pub ground_pound_knockback: f32,
    pub shards_cooldown: f32,
    pub shards_windup: f32,
    pub shards_range: f32,
    pub shell_cooldown: f32,
    pub shell_windup: f32,
}

impl Default for BossTuning {
    fn default() -> Self {
        Self {
            phase2_threshold: 0.6,
            phase3_threshold: 0.3,
            ground_pound_cooldown: 5.0,
            ground_pound_windup: 0.8,
            ground_pound_radius: 96.0,
            ground_pound_damage: 15.0,
            ground_pound_knockback: 12.0,
            shards_cooldown: 4.0,
            shards_windup: 0.4,
            shards_range: 160.0,
            shell_cooldown: 8.0,
            shell_windup: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.tick_rate, 20);
        assert!((config.tick_dt() - 0.05).abs() < 1e-6);
        assert_eq!(config.despawn_distance(), 3072.0);
        assert_eq!(CHUNK_PIXEL_SIZE, 512.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SimulationConfig::from_json_str(r#"{"tickRate": 10, "seed": 7}"#)
            .expect("valid config");
        assert_eq!(config.tick_rate, 10);
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_enemies_per_chunk, 6);
        assert_eq!(config.boss.ground_pound_radius, 96.0);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = SimulationConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SimError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = SimulationConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SimError::ConfigRead { .. }));
    }
}
