//! Снимок целей на начало AI-тика: живые игроки и живые враги.

use bevy::prelude::*;

use super::fsm::{nearest, Sighting};
use crate::components::{Behavior, Health, Position, Tag, Tags};
use crate::registry::Inactive;

#[derive(Debug, Default)]
pub struct Perception {
    players: Vec<(Entity, Vec2)>,
    enemies: Vec<(Entity, Vec2)>,
}

impl Perception {
    pub fn gather(world: &mut World) -> Self {
        let mut query =
            world.query_filtered::<(Entity, &Position, &Tags, &Health), Without<Inactive>>();
        let mut perception = Perception::default();
        for (entity, pos, tags, health) in query.iter(world) {
            if !health.is_alive() {
                continue;
            }
            if tags.has(Tag::Player) {
                perception.players.push((entity, pos.xy()));
            } else if tags.has(Tag::Enemy) {
                perception.enemies.push((entity, pos.xy()));
            }
        }
        perception.players.sort_by_key(|(entity, _)| *entity);
        perception.enemies.sort_by_key(|(entity, _)| *entity);
        perception
    }

    pub fn players(&self) -> &[(Entity, Vec2)] {
        &self.players
    }

    /// Стража охотится на врагов, все остальные на игроков.
    pub fn targets_for(&self, behavior: Behavior) -> &[(Entity, Vec2)] {
        match behavior {
            Behavior::Guard => &self.enemies,
            _ => &self.players,
        }
    }

    pub fn nearest_for(&self, behavior: Behavior, from: Vec2) -> Option<Sighting> {
        nearest(from, self.targets_for(behavior))
    }

    /// Конкретная сущность, если она жива.
    pub fn sighting(&self, from: Vec2, entity: Entity) -> Option<Sighting> {
        self.players
            .iter()
            .chain(self.enemies.iter())
            .find(|(e, _)| *e == entity)
            .map(|&(entity, pos)| Sighting {
                entity,
                pos,
                dist: from.distance(pos),
            })
    }
}
