//! Stat derivation: базовые статы + экипировка + баффы → Health.max и Combat.
//!
//! Запускается каждый тик (priority 8), до движения и боя, чтобы
//! броня/урон в бою всегда были актуальны.

use bevy::prelude::*;

use crate::components::{BaseCombat, Combat, Equipment, Health, Stats, StatusEffects};
use crate::config::PLAYER_MELEE_RANGE;
use crate::content::{upgrade_multiplier, ContentTables, EquipSlot, StatBonuses, StatKind};
use crate::registry::Inactive;
use crate::scheduler::{priority, TickSystemAppExt};

pub const UNARMED_DAMAGE: f32 = 10.0;
const BASE_ATTACK_SPEED: f32 = 1.5;

pub fn derive_max_hp(vit: f32) -> f32 {
    80.0 + vit * 20.0
}

pub fn derive_damage_bonus(str: f32) -> f32 {
    str * 0.6
}

pub fn derive_armor(end: f32) -> f32 {
    end * 2.5
}

/// Множитель скорости атаки от DEX (5 = нейтрально)
pub fn derive_attack_speed_mod(dex: f32) -> f32 {
    1.0 + (dex - 5.0) * 0.02
}

pub fn derive_crit_chance(dex: f32, lck: f32) -> f32 {
    (0.03 + dex * 0.003 + lck * 0.005).min(0.5)
}

pub fn derive_crit_multiplier(lck: f32) -> f32 {
    1.5 + lck * 0.02
}

/// Суммарные бонусы экипировки (с заточкой и камнями).
///
/// Неизвестные в content table предметы пропускаются.
pub fn equipment_bonuses(equipment: &Equipment, content: &ContentTables) -> StatBonuses {
    let mut total = StatBonuses::default();
    for stack in equipment.items() {
        let Some(def) = content.item(&stack.item_id) else {
            continue;
        };
        total.add(&def.stat_bonuses.scaled_floor(upgrade_multiplier(stack.upgrade_level)));

        let gem = stack
            .gem
            .as_deref()
            .and_then(|id| content.item(id))
            .and_then(|gem| gem.gem_bonus);
        if let Some(bonus) = gem {
            total.add(&bonus);
        }
    }
    total
}

/// Пересчитывает производные характеристики одной сущности.
pub fn derive_stats(
    stats: &mut Stats,
    health: &mut Health,
    combat: &mut Combat,
    equipment: Option<&Equipment>,
    effects: Option<&StatusEffects>,
    content: &ContentTables,
) {
    if let Some(equipment) = equipment {
        stats.equip_bonuses = equipment_bonuses(equipment, content);
    }

    let max_hp = derive_max_hp(stats.total(StatKind::Vit));
    if health.max != max_hp {
        let ratio = if health.max > 0.0 { health.current / health.max } else { 1.0 };
        health.max = max_hp;
        health.current = (ratio * max_hp).round().clamp(0.0, max_hp);
    }

    let weapon = equipment
        .and_then(|e| e.get(EquipSlot::Weapon))
        .and_then(|stack| content.item(&stack.item_id));

    let weapon_base = if stats.equip_bonuses.base_damage > 0.0 {
        stats.equip_bonuses.base_damage
    } else {
        UNARMED_DAMAGE
    };
    let base_speed = weapon.and_then(|w| w.attack_speed).unwrap_or(BASE_ATTACK_SPEED);

    let dex = stats.total(StatKind::Dex);
    let lck = stats.total(StatKind::Lck);

    combat.damage = (weapon_base + derive_damage_bonus(stats.total(StatKind::Str))).round();
    combat.attack_speed = (base_speed * derive_attack_speed_mod(dex)).max(0.5);
    combat.armor = (derive_armor(stats.total(StatKind::End)) + stats.equip_bonuses.armor).round();
    combat.crit_chance = derive_crit_chance(dex, lck);
    combat.crit_multiplier = derive_crit_multiplier(lck);
    combat.projectile = weapon.and_then(|w| w.projectile_type.clone());
    combat.range = weapon.and_then(|w| w.range).unwrap_or(PLAYER_MELEE_RANGE);

    // War cry, iron skin, berserker rage и т.п.
    if let Some(se) = effects {
        combat.damage = (combat.damage * se.damage_mod()).round();
        combat.armor = ((combat.armor + se.armor_flat()) * se.armor_mod()).round();
        combat.attack_speed = (combat.attack_speed * se.attack_speed_mod()).max(0.3);
    }
}

/// Combat врага = база + статус-модификаторы.
///
/// Без модификатора значение базы не округляется.
pub fn apply_buffs(base: &BaseCombat, combat: &mut Combat, effects: Option<&StatusEffects>) {
    let Some(se) = effects else {
        combat.damage = base.damage;
        combat.armor = base.armor;
        combat.attack_speed = base.attack_speed;
        return;
    };

    let damage_mod = se.damage_mod();
    combat.damage = if damage_mod != 1.0 {
        (base.damage * damage_mod).round()
    } else {
        base.damage
    };

    let (armor_flat, armor_mod) = (se.armor_flat(), se.armor_mod());
    combat.armor = if armor_flat != 0.0 || armor_mod != 1.0 {
        ((base.armor + armor_flat) * armor_mod).round()
    } else {
        base.armor
    };

    let speed_mod = se.attack_speed_mod();
    combat.attack_speed = if speed_mod != 1.0 {
        (base.attack_speed * speed_mod).max(0.3)
    } else {
        base.attack_speed
    };
}

/// Система: stat derivation для всех сущностей со Stats
pub fn stat_system(
    content: Res<ContentTables>,
    mut query: Query<
        (
            &mut Stats,
            &mut Health,
            &mut Combat,
            Option<&Equipment>,
            Option<&StatusEffects>,
        ),
        Without<Inactive>,
    >,
) {
    for (mut stats, mut health, mut combat, equipment, effects) in query.iter_mut() {
        derive_stats(
            &mut stats,
            &mut health,
            &mut combat,
            equipment,
            effects,
            &content,
        );
    }
}

/// Система: баффы врагов (фаза босса, copper shell, баффы кастеров)
pub fn enemy_buff_system(
    mut query: Query<
        (&BaseCombat, &mut Combat, Option<&StatusEffects>),
        (Without<Stats>, Without<Inactive>),
    >,
) {
    for (base, mut combat, effects) in query.iter_mut() {
        apply_buffs(base, &mut combat, effects);
    }
}

pub struct StatsPlugin;

impl Plugin for StatsPlugin {
    fn build(&self, app: &mut App) {
        app.add_tick_system("stats", priority::STATS, stat_system)
            .add_tick_system("enemy_buffs", priority::STATS, enemy_buff_system);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ItemStack, StatusEffect};
    use bevy::ecs::system::RunSystemOnce;

    fn derive(
        stats: &mut Stats,
        equipment: Option<&Equipment>,
        effects: Option<&StatusEffects>,
    ) -> (Health, Combat) {
        let mut health = Health::new(100.0);
        let mut combat = Combat::default();
        derive_stats(
            stats,
            &mut health,
            &mut combat,
            equipment,
            effects,
            &ContentTables::default(),
        );
        (health, combat)
    }

    #[test]
    fn test_base_stats_derivation() {
        let mut stats = Stats::default();
        let (health, combat) = derive(&mut stats, None, None);

        // VIT 5 → 180 HP, полное HP сохраняется
        assert_eq!(health.max, 180.0);
        assert_eq!(health.current, 180.0);
        assert_eq!(combat.damage, 13.0, "10 + 0.6·5 = 13");
        assert_eq!(combat.attack_speed, 1.5);
        assert_eq!(combat.armor, 13.0, "round(12.5)");
        assert!((combat.crit_chance - 0.07).abs() < 1e-6);
        assert!((combat.crit_multiplier - 1.6).abs() < 1e-6);
        assert_eq!(combat.range, PLAYER_MELEE_RANGE);
        assert!(combat.projectile.is_none());
    }

    #[test]
    fn test_max_hp_change_keeps_ratio() {
        let mut stats = Stats::default();
        let mut health = Health::new(100.0);
        health.current = 50.0;
        let mut combat = Combat::default();
        derive_stats(&mut stats, &mut health, &mut combat, None, None, &ContentTables::default());
        assert_eq!(health.current, 90.0, "50% от 180");
    }

    #[test]
    fn test_crit_chance_capped() {
        assert_eq!(derive_crit_chance(200.0, 200.0), 0.5);
        assert!(derive_attack_speed_mod(5.0) == 1.0);
    }

    #[test]
    fn test_weapon_upgrade_and_gem() {
        let content = ContentTables::default();
        let sword = content.item("bronze_sword").expect("bronze_sword");
        let base = sword.stat_bonuses.base_damage;

        let mut equipment = Equipment::default();
        equipment.equip(
            EquipSlot::Weapon,
            ItemStack {
                upgrade_level: 5,
                gem: Some("ruby".to_string()),
                ..ItemStack::new("bronze_sword", 1)
            },
        );

        let bonuses = equipment_bonuses(&equipment, &content);
        assert_eq!(bonuses.base_damage, (base * 1.7).floor());
        assert_eq!(
            bonuses.str,
            (sword.stat_bonuses.str * 1.7).floor() + 2.0,
            "ruby +2 STR без заточки"
        );
    }

    #[test]
    fn test_ranged_weapon_sets_projectile() {
        let mut equipment = Equipment::default();
        equipment.equip(EquipSlot::Weapon, ItemStack::new("hunting_bow", 1));
        let mut stats = Stats::default();
        let (_, combat) = derive(&mut stats, Some(&equipment), None);

        assert_eq!(combat.projectile.as_deref(), Some("arrow"));
        assert_eq!(combat.range, 96.0);
    }

    #[test]
    fn test_status_modifiers_apply() {
        let mut effects = StatusEffects::default();
        effects.add(StatusEffect::new("skill_war_cry", 10.0).damage_mod(2.0));
        effects.add(StatusEffect::new("skill_iron_skin", 10.0).armor_flat(7.0).armor_mod(2.0));
        effects.add(StatusEffect::new("frozen", 10.0).attack_speed_mod(0.1));
        // next-hit не влияет на статы
        effects.add(StatusEffect::new("skill_power_strike", 10.0).damage_mod(3.0).next_hit());

        let mut stats = Stats::default();
        let (_, combat) = derive(&mut stats, None, Some(&effects));
        assert_eq!(combat.damage, 26.0);
        assert_eq!(combat.armor, 40.0, "(13 + 7) × 2");
        assert_eq!(combat.attack_speed, 0.3, "floor 0.3");
    }

    #[test]
    fn test_stat_system_runs_over_world() {
        let mut world = World::new();
        world.init_resource::<ContentTables>();
        let mut stats = Stats::default();
        stats.vit = 10;
        let e = world.spawn((stats, Health::new(100.0), Combat::default())).id();

        world.run_system_once(stat_system).expect("stat_system");
        assert_eq!(world.get::<Health>(e).map(|h| h.max), Some(280.0));
    }

    #[test]
    fn test_enemy_buffs_follow_base_combat() {
        let base = BaseCombat {
            damage: 20.0,
            armor: 5.0,
            attack_speed: 1.0,
        };
        let mut combat = Combat::default();
        let mut effects = StatusEffects::default();
        effects.add(crate::ai::boss::phase_buff(2).expect("phase 2"));
        effects.add(StatusEffect::new("copper_shell", 5.0).armor_flat(10.0));

        apply_buffs(&base, &mut combat, Some(&effects));
        assert_eq!(combat.damage, 25.0, "фаза 2: ×1.25");
        assert_eq!(combat.armor, 15.0, "copper shell +10");
        assert_eq!(combat.attack_speed, 1.0);

        // Баффы спали → обратно к базе, без накопления
        effects.remove("copper_shell");
        effects.remove(crate::ai::boss::PHASE_BUFF);
        apply_buffs(&base, &mut combat, Some(&effects));
        assert_eq!((combat.damage, combat.armor), (20.0, 5.0));
    }

    #[test]
    fn test_enemy_buff_system_skips_players_and_inactive() {
        let mut world = World::new();
        let base = BaseCombat {
            damage: 7.5,
            armor: 0.0,
            attack_speed: 1.0,
        };
        let mut effects = StatusEffects::default();
        effects.add(crate::ai::boss::phase_buff(3).expect("phase 3"));

        let boss = world
            .spawn((base, Combat::default(), effects.clone()))
            .id();
        let gone = world
            .spawn((base, Combat::default(), effects, Inactive))
            .id();
        let plain = world.spawn((base, Combat::default())).id();

        world.run_system_once(enemy_buff_system).expect("enemy buffs");
        assert_eq!(world.get::<Combat>(boss).map(|c| c.damage), Some(11.0), "round(7.5 × 1.5)");
        assert_eq!(world.get::<Combat>(gone).map(|c| c.damage), Some(10.0), "Inactive не трогаем");
        assert_eq!(world.get::<Combat>(plain).map(|c| c.damage), Some(7.5), "без баффов база как есть");
    }

    #[test]
    fn test_stat_system_skips_inactive() {
        let mut world = World::new();
        world.init_resource::<ContentTables>();
        let e = world
            .spawn((Stats::default(), Health::new(100.0), Combat::default(), Inactive))
            .id();

        world.run_system_once(stat_system).expect("stat_system");
        assert_eq!(world.get::<Health>(e).map(|h| h.max), Some(100.0));
    }
}
