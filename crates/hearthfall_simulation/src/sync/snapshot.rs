//! Снапшот мира для клиентов: одна плоская запись на сущность.
//!
//! Каждое поле записи присутствует всегда (`null`, если данных нет),
//! поэтому дельта может выразить любое изменение, включая "стало null".

use std::collections::BTreeMap;

use bevy::ecs::query::QueryData;
use bevy::prelude::*;
use serde_json::{Map, Value};

use crate::components::*;
use crate::registry::{entity_id, Inactive};

/// Запись сущности: поле → значение
pub type EntityRecord = Map<String, Value>;

/// Все видимые сущности по wire-id
pub type Snapshot = BTreeMap<u64, EntityRecord>;

#[derive(QueryData)]
pub struct SyncQuery {
    entity: Entity,
    tags: &'static Tags,
    position: &'static Position,
    velocity: Option<&'static Velocity>,
    health: Option<&'static Health>,
    name: Option<&'static DisplayName>,
    appearance: Option<&'static Appearance>,
    ai: Option<&'static Ai>,
    player: Option<&'static PlayerInfo>,
    stats: Option<&'static Stats>,
    resource: Option<&'static ResourceNode>,
    npc: Option<&'static Npc>,
    station: Option<&'static CraftingStation>,
    projectile: Option<&'static Projectile>,
    zone: Option<&'static DamageZone>,
}

struct Record(EntityRecord);

impl Record {
    fn new(id: u64, kind: &str) -> Self {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(id));
        map.insert("type".to_string(), Value::from(kind));
        Self(map)
    }

    fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }
}

impl SyncQueryItem<'_> {
    fn common(&self, kind: &str) -> Record {
        Record::new(entity_id(self.entity), kind)
            .field("name", self.name.map(|n| n.as_str().to_string()))
            .field("color", self.appearance.map(|a| a.color.clone()))
    }

    fn with_size(&self, record: Record) -> Record {
        record.field("size", self.appearance.map(|a| a.size))
    }

    fn with_xy(&self, record: Record) -> Record {
        record
            .field("x", self.position.x())
            .field("y", self.position.y())
    }

    fn with_velocity(&self, record: Record) -> Record {
        record
            .field("velocityX", self.velocity.map(|v| v.dx))
            .field("velocityY", self.velocity.map(|v| v.dy))
    }

    fn with_hp(&self, record: Record) -> Record {
        record
            .field("hp", self.health.map(|h| h.current))
            .field("maxHp", self.health.map(|h| h.max))
    }

    fn to_record(&self) -> Option<EntityRecord> {
        let tags = self.tags;
        let record = if tags.has(Tag::Player) {
            let record = self.with_xy(self.common("player"));
            self.with_hp(self.with_velocity(record))
                .field("facing", self.player.map(|p| p.facing.as_str()))
                .field("level", self.stats.map(|s| s.level))
        } else if tags.has(Tag::Enemy) {
            let record = self.with_xy(self.with_size(self.common("enemy")));
            self.with_hp(self.with_velocity(record))
                .field("aiState", self.ai.map(|ai| ai.state.as_str()))
                .field("isBoss", tags.has(Tag::Boss))
        } else if tags.has(Tag::Horse) {
            let record = self.with_xy(self.with_size(self.common("horse")));
            self.with_hp(self.with_velocity(record))
                .field("aiState", self.ai.map(|ai| ai.state.as_str()))
        } else if tags.has(Tag::Resource) {
            let record = self.with_xy(self.with_size(self.common("resource")));
            self.with_hp(record)
                .field("resourceId", self.resource.map(|r| r.resource_id.clone()))
                .field("tool", self.resource.and_then(|r| r.tool.clone()))
        } else if tags.has(Tag::Npc) {
            self.with_hp(self.with_xy(self.with_size(self.common("npc"))))
                .field("npcType", self.npc.map(|n| n.npc_type.clone()))
                .field("npcId", self.npc.map(|n| n.npc_id.clone()))
        } else if tags.has(Tag::Station) {
            self.with_xy(self.with_size(self.common("station")))
                .field("stationId", self.station.map(|s| s.station_id.clone()))
                .field("stationLevel", self.station.map(|s| s.level))
                .field("isChest", self.station.map(|s| s.is_chest))
                .field("altarActive", self.station.map(|s| s.altar_active))
        } else if tags.has(Tag::Projectile) {
            let record = Record::new(entity_id(self.entity), "projectile");
            self.with_velocity(self.with_xy(record)).field(
                "projectileType",
                self.projectile.map(|p| p.projectile_type.clone()),
            )
        } else if tags.has(Tag::DamageZone) {
            let record = Record::new(entity_id(self.entity), "damageZone");
            self.with_xy(record)
                .field("radius", self.zone.map(|z| z.radius))
                .field("zoneType", self.zone.map(|z| z.zone_type.clone()))
        } else {
            return None;
        };
        Some(record.0)
    }
}

/// Полный снапшот всех активных сущностей с клиентским представлением.
pub fn build_snapshot(world: &mut World) -> Snapshot {
    let mut query = world.query_filtered::<SyncQuery, Without<Inactive>>();
    query
        .iter(world)
        .filter_map(|item| item.to_record().map(|record| (entity_id(item.entity), record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{spawn_player, spawn_station};

    #[test]
    fn test_player_record_has_every_field() {
        let mut world = World::new();
        let player = spawn_player(&mut world, 1, "Ann", "#e74c3c", 100.0, 50.0);

        let snapshot = build_snapshot(&mut world);
        let record = &snapshot[&entity_id(player)];
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        for key in [
            "id", "type", "name", "color", "x", "y", "velocityX", "velocityY", "facing", "hp",
            "maxHp", "level",
        ] {
            assert!(keys.contains(&key), "нет поля {key}");
        }
        assert_eq!(record["type"], "player");
        assert_eq!(record["name"], "Ann");
        assert_eq!(record["x"], 100.0);
    }

    #[test]
    fn test_missing_data_is_null_and_inactive_skipped() {
        let mut world = World::new();
        let bare = world
            .spawn((Position::new(0.0, 0.0), Tags::of(&[Tag::Enemy])))
            .id();
        let gone = spawn_station(&mut world, "forge", "Forge", 10.0, 10.0, 1);
        world.entity_mut(gone).insert(Inactive);

        let snapshot = build_snapshot(&mut world);
        assert_eq!(snapshot.len(), 1);
        let record = &snapshot[&entity_id(bare)];
        assert_eq!(record["hp"], Value::Null);
        assert_eq!(record["aiState"], Value::Null);
        assert_eq!(record["isBoss"], false);
    }
}
