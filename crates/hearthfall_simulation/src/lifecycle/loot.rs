//! Лут и XP.
//!
//! Дропы роллятся в момент смерти, доставляются системой (26) ближайшему
//! игроку. Босс роллит независимо для каждого игрока.

use bevy::prelude::*;

use super::health::DeathRecord;
use super::player_positions;
use crate::combat::{CombatEvents, Notice};
use crate::components::*;
use crate::content::ContentTables;
use crate::DeterministicRng;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDrop {
    pub source: Entity,
    pub pos: Vec2,
    /// Уже выпавшие предметы (не босс)
    pub items: Vec<(String, u32)>,
    /// Таблица босса: ролл на каждого игрока при доставке
    pub boss_table: Option<LootTable>,
    pub xp: u32,
}

#[derive(Resource, Debug, Default)]
pub struct PendingLoot(pub Vec<PendingDrop>);

pub fn on_death(world: &mut World, record: &DeathRecord) {
    if record.is_player() {
        return;
    }
    let Some(table) = world.get::<LootTable>(record.entity).cloned() else {
        return;
    };

    let (items, boss_table) = if record.is_boss {
        (Vec::new(), Some(table.clone()))
    } else {
        let mut rng = world.resource_mut::<DeterministicRng>();
        (table.roll_drops(&mut rng.rng), None)
    };

    world.resource_mut::<PendingLoot>().0.push(PendingDrop {
        source: record.entity,
        pos: record.pos,
        items,
        boss_table,
        xp: table.xp_reward,
    });
}

pub fn loot_system(world: &mut World) {
    let drops = std::mem::take(&mut world.resource_mut::<PendingLoot>().0);
    if drops.is_empty() {
        return;
    }
    let players = player_positions(world);

    for drop in drops {
        match &drop.boss_table {
            Some(table) => {
                for &(player, _) in &players {
                    let items = {
                        let mut rng = world.resource_mut::<DeterministicRng>();
                        table.roll_drops(&mut rng.rng)
                    };
                    deliver(world, player, &items, drop.xp);
                }
            }
            None => {
                let nearest = players
                    .iter()
                    .fold(None::<(Entity, f32)>, |best, &(player, pos)| {
                        let dist = pos.distance_squared(drop.pos);
                        match best {
                            Some((_, best_dist)) if best_dist <= dist => best,
                            _ => Some((player, dist)),
                        }
                    });
                if let Some((player, _)) = nearest {
                    deliver(world, player, &drop.items, drop.xp);
                }
            }
        }
    }
}

/// Предметы в инвентарь, XP в статы, новые скиллы при level up.
pub fn deliver(world: &mut World, player: Entity, items: &[(String, u32)], xp: u32) {
    let notices = world.resource_scope(|world, content: Mut<ContentTables>| {
        let mut notices = Vec::new();
        let mut query =
            world.query::<(Option<&mut Inventory>, Option<&mut Stats>, Option<&mut Skills>)>();
        let Ok((inventory, stats, skills)) = query.get_mut(world, player) else {
            return notices;
        };

        if let Some(mut inventory) = inventory {
            for (item_id, count) in items {
                let lost = inventory.add_item(item_id, *count, &content);
                let added = count - lost;
                if added > 0 {
                    notices.push(Notice::ItemPickup {
                        item_id: item_id.clone(),
                        count: added,
                    });
                }
                if lost > 0 {
                    notices.push(Notice::InventoryFull {
                        item_id: item_id.clone(),
                        lost,
                    });
                }
            }
        }

        if let (Some(mut stats), true) = (stats, xp > 0) {
            let gained = stats.add_xp(xp);
            notices.push(Notice::XpGain {
                amount: xp,
                total: stats.xp,
            });
            if gained > 0 {
                let new_skills = skills
                    .map(|mut skills| skills.learn_skills_for_level(stats.level, &content))
                    .unwrap_or_default();
                crate::log(&format!(
                    "⭐ {:?} reached level {} (new skills: {:?})",
                    player, stats.level, new_skills
                ));
                notices.push(Notice::LevelUp {
                    level: stats.level,
                    stat_points: stats.stat_points,
                    new_skills,
                });
            }
        }
        notices
    });

    let mut events = world.resource_mut::<CombatEvents>();
    for notice in notices {
        events.notify(player, notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::death_system;
    use crate::lifecycle::ResourceLedger;
    use crate::scheduler::TickClock;
    use crate::config::SimulationConfig;
    use bevy::ecs::system::RunSystemOnce;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(TickClock::default());
        world.insert_resource(SimulationConfig::default());
        world.insert_resource(ContentTables::default());
        world.insert_resource(DeterministicRng::new(11));
        world.init_resource::<CombatEvents>();
        world.init_resource::<PendingLoot>();
        world.init_resource::<ResourceLedger>();
        world
    }

    fn player(world: &mut World, x: f32) -> Entity {
        world
            .spawn((
                Position::new(x, 0.0),
                Health::new(100.0),
                Stats::default(),
                Inventory::default(),
                Skills::default(),
                Tags::of(&[Tag::Player]),
            ))
            .id()
    }

    fn corpse(world: &mut World, is_boss: bool, xp: u32) -> Entity {
        let mut hp = Health::new(40.0);
        hp.current = 0.0;
        let mut tags = Tags::of(&[Tag::Enemy]);
        if is_boss {
            tags.insert(Tag::Boss);
        }
        world
            .spawn((
                hp,
                Position::new(0.0, 0.0),
                tags,
                EnemyKind {
                    enemy_type: "wolf".to_string(),
                    is_boss,
                },
                LootTable {
                    drops: vec![LootDrop {
                        item: "hide".to_string(),
                        chance: 1.0,
                        min: 2,
                        max: 2,
                    }],
                    xp_reward: xp,
                },
            ))
            .id()
    }

    #[test]
    fn test_loot_goes_to_nearest_player() {
        let mut world = world();
        let far = player(&mut world, 300.0);
        let near = player(&mut world, 50.0);
        corpse(&mut world, false, 10);

        world.run_system_once(death_system).expect("death");
        world.run_system_once(loot_system).expect("loot");

        assert_eq!(world.get::<Inventory>(near).map(|i| i.count_item("hide")), Some(2));
        assert_eq!(world.get::<Inventory>(far).map(|i| i.count_item("hide")), Some(0));
        assert_eq!(world.get::<Stats>(near).map(|s| s.xp), Some(10));

        let notices = &world.resource::<CombatEvents>().notices;
        assert!(notices.iter().all(|(to, _)| *to == near));
        assert!(notices.contains(&(
            near,
            Notice::ItemPickup {
                item_id: "hide".to_string(),
                count: 2
            }
        )));
        assert!(world.resource::<PendingLoot>().0.is_empty());
    }

    #[test]
    fn test_boss_rewards_every_player() {
        let mut world = world();
        let a = player(&mut world, 50.0);
        let b = player(&mut world, 900.0);
        corpse(&mut world, true, 55);

        world.run_system_once(death_system).expect("death");
        world.run_system_once(loot_system).expect("loot");

        for p in [a, b] {
            assert_eq!(world.get::<Inventory>(p).map(|i| i.count_item("hide")), Some(2));
            let stats = world.get::<Stats>(p).expect("stats");
            assert_eq!(stats.level, 3, "55 XP → уровень 3");
            assert_eq!(stats.stat_points, 6);
        }
        let level_ups = world
            .resource::<CombatEvents>()
            .notices
            .iter()
            .filter(|(_, n)| matches!(n, Notice::LevelUp { .. }))
            .count();
        assert_eq!(level_ups, 2);
    }

    #[test]
    fn test_full_inventory_reports_lost_items() {
        let mut world = world();
        let p = player(&mut world, 0.0);
        {
            let mut inventory = world.get_mut::<Inventory>(p).expect("inv");
            for slot in inventory.slots.iter_mut() {
                *slot = Some(ItemStack::new("bronze_sword", 1));
            }
        }
        deliver(&mut world, p, &[("stone".to_string(), 3)], 0);

        let notices = &world.resource::<CombatEvents>().notices;
        assert_eq!(
            notices[0].1,
            Notice::InventoryFull {
                item_id: "stone".to_string(),
                lost: 3
            }
        );
    }
}
