//! AI сценарии в полной симуляции: leash и смена фазы босса

use bevy::prelude::*;
use hearthfall_simulation::ai::boss::PHASE_BUFF;
use hearthfall_simulation::factory::{spawn_enemy, EnemyTemplate};
use hearthfall_simulation::terrain::SpawnPoint;
use hearthfall_simulation::*;

fn sim_with_player_at(x: f32, y: f32) -> Simulation {
    let config = SimulationConfig {
        respawn_point: (x, y),
        ..Default::default()
    };
    let mut sim = Simulation::new(
        config,
        GridTerrain::open_area(IVec2::new(-3, -3), IVec2::new(3, 3)),
    );
    sim.join(1, "Ann", "#e74c3c", None).expect("join");
    sim
}

fn spawn(sim: &mut Simulation, x: f32, y: f32, template: EnemyTemplate) -> Entity {
    spawn_enemy(sim.world_mut(), &SpawnPoint { x, y, template })
}

fn ai_of(sim: &Simulation, entity: Entity) -> Ai {
    sim.world().get::<Ai>(entity).expect("ai").clone()
}

#[test]
fn test_leash_pull_forces_return() {
    let mut sim = sim_with_player_at(100.0, 0.0);
    let player = sim.player_of(1).expect("player");
    let wolf = spawn(
        &mut sim,
        0.0,
        0.0,
        EnemyTemplate {
            id: "wolf".to_string(),
            aggro_range: 200.0,
            deaggro_range: 2000.0,
            leash_range: 640.0,
            ..Default::default()
        },
    );

    for _ in 0..3 {
        sim.tick().expect("tick");
    }
    let ai = ai_of(&sim, wolf);
    assert_eq!(ai.state, AiState::Chase);
    assert_eq!(ai.target, Some(player));

    // Игрок увёл волка на 700 от дома
    sim.world_mut()
        .get_mut::<Position>(wolf)
        .expect("pos")
        .set(700.0, 0.0);
    sim.handle_input(
        1,
        &PlayerInput {
            seq: 1,
            position: Some(Vec2::new(740.0, 0.0)),
            ..Default::default()
        },
    )
    .expect("input");
    sim.tick().expect("tick");

    let ai = ai_of(&sim, wolf);
    assert_eq!(ai.state, AiState::Return, "leash доминирует над aggro");
    assert_eq!(ai.target, None);
}

#[test]
fn test_boss_phase_transition_applies_buff() {
    let mut sim = sim_with_player_at(600.0, 600.0);
    let boss = spawn(
        &mut sim,
        -300.0,
        -300.0,
        EnemyTemplate {
            id: "copper_golem".to_string(),
            health: 500.0,
            damage: 20.0,
            aggro_range: 0.0,
            is_boss: true,
            ..Default::default()
        },
    );

    sim.world_mut().get_mut::<Health>(boss).expect("hp").current = 325.0;
    sim.tick().expect("tick");
    assert_eq!(sim.world().get::<BossBrain>(boss).map(|b| b.phase), Some(1));
    assert_eq!(sim.world().get::<Combat>(boss).map(|c| c.damage), Some(20.0));
    assert!(!sim
        .world()
        .get::<StatusEffects>(boss)
        .is_some_and(|se| se.has(PHASE_BUFF)));

    sim.world_mut().get_mut::<Health>(boss).expect("hp").current = 275.0;
    sim.tick().expect("tick");
    assert_eq!(sim.world().get::<BossBrain>(boss).map(|b| b.phase), Some(2));

    let effects = sim.world().get::<StatusEffects>(boss).expect("effects");
    let buff = effects.get(PHASE_BUFF).expect("phase buff");
    assert_eq!(buff.damage_mod, Some(1.25));
    assert_eq!(buff.speed_mod, 1.2);
    assert_eq!(
        sim.world().get::<Combat>(boss).map(|c| c.damage),
        Some(25.0),
        "бафф фазы доходит до Combat в том же тике"
    );
}
