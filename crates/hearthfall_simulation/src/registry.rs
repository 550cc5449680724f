//! Entity Registry поверх bevy `World`.
//!
//! Идентичность = `Entity` (index + generation): переиспользованный слот получает
//! новую generation и не путается со старой сущностью.
//!
//! Удаление отложенное: `mark_for_destroy` вешает `Inactive`, все запросы такие
//! сущности пропускают, а `flush_destroyed` физически удаляет их в конце тика.

use bevy::prelude::*;

use crate::components::*;

/// Сущность помечена на удаление (active flag снят).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Inactive;

/// Закрытый набор видов компонентов для `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Position,
    Velocity,
    Health,
    Collider,
    Combat,
    Ai,
    StatusEffects,
    Stats,
    Inventory,
    Equipment,
    Skills,
    ResourceNode,
    CraftingStation,
    LootTable,
    Projectile,
    DamageZone,
    Quests,
    Player,
}

impl ComponentKind {
    fn present(self, entity: &EntityRef) -> bool {
        match self {
            ComponentKind::Position => entity.contains::<Position>(),
            ComponentKind::Velocity => entity.contains::<Velocity>(),
            ComponentKind::Health => entity.contains::<Health>(),
            ComponentKind::Collider => entity.contains::<Collider>(),
            ComponentKind::Combat => entity.contains::<Combat>(),
            ComponentKind::Ai => entity.contains::<Ai>(),
            ComponentKind::StatusEffects => entity.contains::<StatusEffects>(),
            ComponentKind::Stats => entity.contains::<Stats>(),
            ComponentKind::Inventory => entity.contains::<Inventory>(),
            ComponentKind::Equipment => entity.contains::<Equipment>(),
            ComponentKind::Skills => entity.contains::<Skills>(),
            ComponentKind::ResourceNode => entity.contains::<ResourceNode>(),
            ComponentKind::CraftingStation => entity.contains::<CraftingStation>(),
            ComponentKind::LootTable => entity.contains::<LootTable>(),
            ComponentKind::Projectile => entity.contains::<Projectile>(),
            ComponentKind::DamageZone => entity.contains::<DamageZone>(),
            ComponentKind::Quests => entity.contains::<QuestLog>(),
            ComponentKind::Player => entity.contains::<PlayerInfo>(),
        }
    }
}

/// Wire id сущности
pub fn entity_id(entity: Entity) -> u64 {
    entity.to_bits()
}

pub fn entity_from_id(id: u64) -> Option<Entity> {
    Entity::try_from_bits(id).ok()
}

/// Registry-операции над `World`.
///
/// Все выборки возвращают сущности в порядке возрастания `Entity`,
/// чтобы порядок обработки не зависел от раскладки архетипов.
pub trait Registry {
    fn add<B: Bundle>(&mut self, bundle: B) -> Entity;

    /// Сущность существует и не помечена на удаление
    fn is_live(&self, entity: Entity) -> bool;

    fn get_live(&self, entity: Entity) -> Option<EntityRef<'_>>;

    fn get_by_tag(&self, tag: Tag) -> Vec<Entity>;

    /// Живые сущности, у которых есть все перечисленные компоненты
    fn query_kinds(&self, kinds: &[ComponentKind]) -> Vec<Entity>;

    /// Идемпотентно. true если пометка новая.
    fn mark_for_destroy(&mut self, entity: Entity) -> bool;

    /// Удаляет все помеченные сущности, возвращает сколько удалено.
    fn flush_destroyed(&mut self) -> usize;

    fn live_count(&self) -> usize;
}

impl Registry for World {
    fn add<B: Bundle>(&mut self, bundle: B) -> Entity {
        self.spawn(bundle).id()
    }

    fn is_live(&self, entity: Entity) -> bool {
        self.entities().contains(entity) && self.get::<Inactive>(entity).is_none()
    }

    fn get_live(&self, entity: Entity) -> Option<EntityRef<'_>> {
        if !self.is_live(entity) {
            return None;
        }
        Some(self.entity(entity))
    }

    fn get_by_tag(&self, tag: Tag) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .iter_entities()
            .filter(|e| !e.contains::<Inactive>())
            .filter(|e| e.get::<Tags>().is_some_and(|t| t.has(tag)))
            .map(|e| e.id())
            .collect();
        found.sort();
        found
    }

    fn query_kinds(&self, kinds: &[ComponentKind]) -> Vec<Entity> {
        let mut found: Vec<Entity> = self
            .iter_entities()
            .filter(|e| !e.contains::<Inactive>())
            .filter(|e| kinds.iter().all(|kind| kind.present(e)))
            .map(|e| e.id())
            .collect();
        found.sort();
        found
    }

    fn mark_for_destroy(&mut self, entity: Entity) -> bool {
        if !self.entities().contains(entity) || self.get::<Inactive>(entity).is_some() {
            return false;
        }
        self.entity_mut(entity).insert(Inactive);
        true
    }

    fn flush_destroyed(&mut self) -> usize {
        let mut marked: Vec<Entity> = self
            .query_filtered::<Entity, With<Inactive>>()
            .iter(self)
            .collect();
        marked.sort();

        let mut removed = 0;
        for entity in marked {
            // Повторный despawn уже удалённой сущности: тихий no-op
            if self.entities().contains(entity) && self.despawn(entity) {
                removed += 1;
            }
        }
        removed
    }

    fn live_count(&self) -> usize {
        self.iter_entities()
            .filter(|e| !e.contains::<Inactive>())
            .count()
    }
}
