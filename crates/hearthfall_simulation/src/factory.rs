//! Entity factory: фиксированный набор компонентов на каждый архетип.
//!
//! Все `spawn_*` функции принимают `&mut World` и возвращают созданный `Entity`.
//! Шаблоны (EnemyTemplate, NpcDef) приходят от террейна/контента как данные.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::config::{PLAYER_MELEE_RANGE, PLAYER_SIZE, PLAYER_SPEED};
use crate::registry::Registry;
use crate::terrain::{ResourcePoint, SpawnPoint};
use crate::ObserverId;

/// Шаблон врага (или дикой лошади, если `is_horse`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnemyTemplate {
    pub id: String,
    pub name: Option<String>,
    pub color: String,
    pub size: f32,
    pub speed: f32,
    pub health: f32,
    pub damage: f32,
    pub attack_speed: f32,
    pub armor: f32,
    pub knockback: f32,
    pub behavior: Behavior,
    pub aggro_range: f32,
    pub deaggro_range: f32,
    pub leash_range: f32,
    pub drops: Vec<LootDrop>,
    pub xp_reward: u32,
    pub is_boss: bool,
    pub is_horse: bool,
    pub caster_skills: Vec<CasterSkill>,
}

impl Default for EnemyTemplate {
    fn default() -> Self {
        Self {
            id: "slime".to_string(),
            name: None,
            color: "#c0392b".to_string(),
            size: 24.0,
            speed: 60.0,
            health: 50.0,
            damage: 10.0,
            attack_speed: 0.8,
            armor: 0.0,
            knockback: 4.0,
            behavior: Behavior::Aggressive,
            aggro_range: 160.0,
            deaggro_range: 288.0,
            leash_range: 384.0,
            drops: Vec::new(),
            xp_reward: 0,
            is_boss: false,
            is_horse: false,
            caster_skills: Vec::new(),
        }
    }
}

impl EnemyTemplate {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Дальность атаки = размер + 12
    pub fn attack_range(&self) -> f32 {
        self.size + 12.0
    }
}

/// Описание NPC из контента города
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcDef {
    pub id: String,
    pub name: String,
    /// citizen / guard / merchant ...
    pub npc_type: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub size: Option<f32>,
    #[serde(default)]
    pub health: Option<f32>,
    #[serde(default)]
    pub damage: Option<f32>,
    #[serde(default)]
    pub aggro_range: Option<f32>,
    #[serde(default)]
    pub patrol_radius: Option<f32>,
    #[serde(default)]
    pub wander_radius: Option<f32>,
}

pub fn spawn_player(
    world: &mut World,
    observer: ObserverId,
    name: &str,
    color: &str,
    x: f32,
    y: f32,
) -> Entity {
    world.add((
        (
            Position::new(x, y),
            Velocity::with_speed(PLAYER_SPEED),
            Health::new(100.0).with_regen(2.0),
            Collider::aabb(PLAYER_SIZE, PLAYER_SIZE, CollisionLayer::Player),
            Combat {
                damage: 10.0,
                attack_speed: 1.5,
                range: PLAYER_MELEE_RANGE,
                knockback: 8.0,
                ..Default::default()
            },
            StatusEffects::default(),
        ),
        (
            DisplayName::new(name),
            Appearance::new(color, PLAYER_SIZE),
            PlayerInfo::new(observer),
            Stats::default(),
            Inventory::default(),
            Equipment::default(),
            Skills::default(),
            QuestLog::default(),
            Tags::of(&[Tag::Player]),
        ),
    ))
}

/// Враг по точке спавна. Лошадиный шаблон уходит в `spawn_horse`.
pub fn spawn_enemy(world: &mut World, spawn: &SpawnPoint) -> Entity {
    let t = &spawn.template;
    if t.is_horse {
        return spawn_horse(world, spawn);
    }

    let home = Vec2::new(spawn.x, spawn.y);
    let mut ai = Ai::new(t.behavior, home);
    ai.aggro_range = t.aggro_range;
    ai.deaggro_range = t.deaggro_range;
    ai.attack_range = t.attack_range();
    ai.leash_range = t.leash_range;

    let mut tags = Tags::of(&[Tag::Enemy]);
    if t.is_boss {
        tags.insert(Tag::Boss);
    }

    let combat = Combat {
        damage: t.damage,
        attack_speed: t.attack_speed,
        range: t.attack_range(),
        knockback: t.knockback,
        armor: t.armor,
        ..Default::default()
    };
    let entity = world.add((
        (
            Position::new(spawn.x, spawn.y),
            Velocity::with_speed(t.speed),
            Health::new(t.health),
            Collider::aabb(t.size, t.size, CollisionLayer::Enemy),
            BaseCombat::of(&combat),
            combat,
            ai,
            StatusEffects::default(),
        ),
        (
            DisplayName::new(t.display_name()),
            Appearance::new(t.color.clone(), t.size),
            EnemyKind {
                enemy_type: t.id.clone(),
                is_boss: t.is_boss,
            },
            LootTable {
                drops: t.drops.clone(),
                xp_reward: t.xp_reward,
            },
            tags,
        ),
    ));

    if t.is_boss || t.behavior == Behavior::Boss {
        world.entity_mut(entity).insert(BossBrain::default());
    }
    if !t.caster_skills.is_empty() {
        world
            .entity_mut(entity)
            .insert(CasterBrain::new(t.caster_skills.clone()));
    }
    entity
}

/// Дикая лошадь: убегает от игроков, не атакует.
pub fn spawn_horse(world: &mut World, spawn: &SpawnPoint) -> Entity {
    let t = &spawn.template;
    let mut ai = Ai::new(Behavior::Horse, Vec2::new(spawn.x, spawn.y));
    ai.aggro_range = t.aggro_range;
    ai.deaggro_range = t.deaggro_range;
    ai.leash_range = t.leash_range;

    world.add((
        Position::new(spawn.x, spawn.y),
        Velocity::with_speed(t.speed),
        Health::new(t.health),
        Collider::aabb(t.size, t.size, CollisionLayer::Npc),
        ai,
        StatusEffects::default(),
        DisplayName::new(t.display_name()),
        Appearance::new(t.color.clone(), t.size),
        Horse::default(),
        Tags::of(&[Tag::Horse]),
    ))
}

pub fn spawn_resource_node(
    world: &mut World,
    point: &ResourcePoint,
    chunk: IVec2,
    index: usize,
) -> Entity {
    let mut node = ResourceNode::new(point.resource_id.clone(), chunk, index);
    if let Some(tool) = &point.tool {
        node = node.requiring(tool.clone(), point.tool_tier);
    }
    node.respawn_time = point.respawn_time;

    world.add((
        Position::new(point.x, point.y),
        Health::new(point.health),
        Collider::aabb(point.size, point.size, CollisionLayer::Resource),
        DisplayName::new(point.name.clone()),
        Appearance::new(point.color.clone(), point.size),
        node,
        LootTable {
            drops: point.drops.clone(),
            xp_reward: 0,
        },
        Tags::of(&[Tag::Resource]),
    ))
}

pub fn spawn_station(
    world: &mut World,
    station_id: &str,
    name: &str,
    x: f32,
    y: f32,
    level: u32,
) -> Entity {
    world.add((
        Position::new(x, y),
        Collider::aabb(40.0, 40.0, CollisionLayer::Station),
        DisplayName::new(name),
        Appearance::new("#7f8c8d", 40.0),
        CraftingStation::new(station_id, level),
        Tags::of(&[Tag::Station]),
    ))
}

pub fn spawn_chest(world: &mut World, station_id: &str, name: &str, x: f32, y: f32) -> Entity {
    let mut station = CraftingStation::new(station_id, 1);
    station.is_chest = true;
    world.add((
        Position::new(x, y),
        Collider::aabb(32.0, 32.0, CollisionLayer::Station),
        DisplayName::new(name),
        Appearance::new("#a0522d", 32.0),
        station,
        Tags::of(&[Tag::Station]),
    ))
}

/// NPC. Горожане получают wander AI, стражники: боевой набор и AI guard.
pub fn spawn_npc(world: &mut World, def: &NpcDef) -> Entity {
    let size = def.size.unwrap_or(26.0);
    let home = Vec2::new(def.x, def.y);

    let entity = world.add((
        Position::new(def.x, def.y),
        Collider::aabb(size, size, CollisionLayer::Npc),
        DisplayName::new(def.name.clone()),
        Appearance::new("#3498db", size),
        Npc {
            npc_type: def.npc_type.clone(),
            npc_id: def.id.clone(),
        },
        Tags::of(&[Tag::Npc]),
    ));

    match def.npc_type.as_str() {
        "citizen" => {
            let mut ai = Ai::new(Behavior::Wander, home);
            ai.aggro_range = 0.0;
            ai.deaggro_range = 0.0;
            ai.attack_range = 0.0;
            ai.leash_range = def.wander_radius.unwrap_or(800.0);
            world
                .entity_mut(entity)
                .insert((Velocity::with_speed(40.0), ai));
        }
        "guard" => {
            let aggro = def.aggro_range.unwrap_or(256.0);
            let mut ai = Ai::new(Behavior::Guard, home);
            ai.aggro_range = aggro;
            ai.deaggro_range = aggro + 64.0;
            ai.attack_range = 40.0;
            ai.leash_range = def.patrol_radius.unwrap_or(128.0);

            world.entity_mut(entity).insert((
                Velocity::with_speed(120.0),
                Health::new(def.health.unwrap_or(500.0)).with_regen(20.0),
                Combat {
                    damage: def.damage.unwrap_or(50.0),
                    attack_speed: 1.5,
                    range: 40.0,
                    knockback: 12.0,
                    ..Default::default()
                },
                ai,
                StatusEffects::default(),
                Tags::of(&[Tag::Npc, Tag::Guard]),
            ));
        }
        _ => {}
    }
    entity
}

/// Снаряд летит с постоянной скоростью (MovementSystem), без коллайдера.
pub fn spawn_projectile(
    world: &mut World,
    origin: Vec2,
    velocity: Vec2,
    projectile: Projectile,
) -> Entity {
    world.add((
        Position::new(origin.x, origin.y),
        Velocity {
            dx: velocity.x,
            dy: velocity.y,
            speed: velocity.length(),
        },
        projectile,
        Tags::of(&[Tag::Projectile]),
    ))
}

pub fn spawn_damage_zone(world: &mut World, center: Vec2, zone: DamageZone) -> Entity {
    world.add((
        Position::new(center.x, center.y),
        zone,
        Tags::of(&[Tag::DamageZone]),
    ))
}
