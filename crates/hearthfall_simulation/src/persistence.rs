//! Снапшот игрока для внешнего хранилища.
//!
//! Симуляция сама ничего не пишет на диск: отдаёт `PlayerSnapshot` по запросу
//! (join, autosave, leave) и принимает его обратно для свежей сущности.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::error::SimError;
use crate::registry::{entity_id, Registry};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub version: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub stats: Stats,
    pub inventory: Inventory,
    pub equipment: Equipment,
    pub skills: Skills,
    pub quests: QuestLog,
}

impl PlayerSnapshot {
    pub fn to_json(&self) -> Result<String, SimError> {
        serde_json::to_string(self).map_err(SimError::Encode)
    }

    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let snapshot: PlayerSnapshot =
            serde_json::from_str(json).map_err(SimError::SnapshotParse)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<(), SimError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SimError::SnapshotVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(())
    }
}

type PlayerParts<'a> = (
    &'a Position,
    &'a Health,
    &'a DisplayName,
    &'a Stats,
    &'a Inventory,
    &'a Equipment,
    &'a Skills,
    &'a QuestLog,
);

pub fn capture(world: &mut World, player: Entity) -> Result<PlayerSnapshot, SimError> {
    let mut query = world.query::<PlayerParts>();
    let (pos, health, name, stats, inventory, equipment, skills, quests) = query
        .get(world, player)
        .map_err(|_| SimError::UnknownEntity(entity_id(player)))?;

    Ok(PlayerSnapshot {
        version: SNAPSHOT_VERSION,
        name: name.as_str().to_string(),
        x: pos.x(),
        y: pos.y(),
        hp: health.current,
        max_hp: health.max,
        stats: stats.clone(),
        inventory: inventory.clone(),
        equipment: equipment.clone(),
        skills: skills.clone(),
        quests: quests.clone(),
    })
}

/// Перезаписывает прогресс свежесозданного игрока данными снапшота.
pub fn restore(world: &mut World, player: Entity, snapshot: &PlayerSnapshot) -> Result<(), SimError> {
    snapshot.check_version()?;
    if !world.is_live(player) {
        return Err(SimError::UnknownEntity(entity_id(player)));
    }

    let mut entity = world.entity_mut(player);
    if let Some(mut pos) = entity.get_mut::<Position>() {
        pos.set(snapshot.x, snapshot.y);
        pos.save_prev();
    }
    if let Some(mut health) = entity.get_mut::<Health>() {
        health.max = snapshot.max_hp.max(1.0);
        // Мёртвым не восстанавливаем: игрок заходит с 1 HP
        health.current = snapshot.hp.clamp(1.0, health.max);
    }
    entity.insert((
        snapshot.stats.clone(),
        snapshot.inventory.clone(),
        snapshot.equipment.clone(),
        snapshot.skills.clone(),
        snapshot.quests.clone(),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentTables;
    use crate::factory::spawn_player;

    #[test]
    fn test_capture_restore_carries_progress() {
        let mut world = World::new();
        let content = ContentTables::default();
        let old = spawn_player(&mut world, 1, "Ann", "#e74c3c", 300.0, 120.0);
        {
            let mut stats = world.get_mut::<Stats>(old).expect("stats");
            stats.add_xp(55);
        }
        world
            .get_mut::<Inventory>(old)
            .expect("inv")
            .add_item("wood", 12, &content);
        world.get_mut::<Health>(old).expect("hp").current = 40.0;

        let json = capture(&mut world, old).expect("capture").to_json().expect("json");
        let snapshot = PlayerSnapshot::from_json(&json).expect("parse");

        let fresh = spawn_player(&mut world, 2, "Ann", "#e74c3c", 0.0, 0.0);
        restore(&mut world, fresh, &snapshot).expect("restore");

        assert_eq!(world.get::<Stats>(fresh).map(|s| s.level), Some(3));
        assert_eq!(world.get::<Inventory>(fresh).map(|i| i.count_item("wood")), Some(12));
        assert_eq!(world.get::<Health>(fresh).map(|h| h.current), Some(40.0));
        assert_eq!(world.get::<Position>(fresh).map(|p| p.xy()), Some(Vec2::new(300.0, 120.0)));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut world = World::new();
        let player = spawn_player(&mut world, 1, "Ann", "#e74c3c", 0.0, 0.0);
        let mut snapshot = capture(&mut world, player).expect("capture");
        snapshot.version = 7;

        let err = restore(&mut world, player, &snapshot).expect_err("версия");
        assert!(matches!(
            err,
            SimError::SnapshotVersion {
                found: 7,
                expected: 1
            }
        ));
        let json = snapshot.to_json().expect("json");
        assert!(PlayerSnapshot::from_json(&json).is_err());
    }

    #[test]
    fn test_capture_unknown_entity() {
        let mut world = World::new();
        let ghost = world.spawn(Position::new(0.0, 0.0)).id();
        assert!(matches!(
            capture(&mut world, ghost),
            Err(SimError::UnknownEntity(_))
        ));
    }
}
