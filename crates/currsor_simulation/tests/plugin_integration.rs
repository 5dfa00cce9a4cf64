//! CombatCorePlugin integration test
//!
//! Headless App: ручной шаг FixedUpdate (Time<Fixed>::advance_by)
//!
//! Проверяем:
//! - Added<ActorSpec> → регистрация в GameSystemManager
//! - CharacterIntent/Velocity → derived state
//! - Death → LootGenerated event, destroy timer → despawn
//! - Despawn вне core → lazy pruning

use std::time::Duration;

use bevy::ecs::event::Events;
use bevy::prelude::*;

use currsor_simulation::*;

const TICK: Duration = Duration::from_micros(16_667);

fn create_combat_app(seed: u64) -> App {
    let mut app = create_headless_app(seed);
    app.world_mut()
        .resource_mut::<GameSystemManager>()
        .loot_mut()
        .set_global_drop_multiplier(10.0);
    app
}

fn tick(app: &mut App, ticks: u32) {
    for _ in 0..ticks {
        app.world_mut().resource_mut::<Time<Fixed>>().advance_by(TICK);
        app.world_mut().run_schedule(FixedUpdate);
    }
}

fn events<E: Event + Clone>(app: &App) -> Vec<E> {
    app.world()
        .resource::<Events<E>>()
        .iter_current_update_events()
        .cloned()
        .collect()
}

fn spawn_enemy(app: &mut App, position: Vec3) -> Entity {
    let health = app.world().resource::<GameConfig>().health.clone();
    app.world_mut()
        .spawn((
            ActorSpec::enemy(&health),
            Transform::from_translation(position),
            CharacterIntent::default(),
            Velocity::default(),
        ))
        .id()
}

#[test]
fn test_spawned_actor_is_registered() {
    let mut app = create_combat_app(42);
    let enemy = spawn_enemy(&mut app, Vec3::new(1.0, 0.0, 2.0));

    tick(&mut app, 1);

    let manager = app.world().resource::<GameSystemManager>();
    assert_eq!(manager.actor(enemy).map(|spec| spec.kind), Some(ActorKind::Enemy));
    assert_eq!(manager.health().current_health(enemy), 50.0);
    assert_eq!(manager.location(enemy), Vec3::new(1.0, 0.0, 2.0));
    assert!(manager.now() > 0.0);
}

#[test]
fn test_intent_drives_state_and_forwards_events() {
    let mut app = create_combat_app(42);
    let enemy = spawn_enemy(&mut app, Vec3::ZERO);
    tick(&mut app, 1);

    app.world_mut().entity_mut(enemy).insert(Velocity(Vec3::new(50.0, 0.0, 0.0)));
    tick(&mut app, 1);

    let manager = app.world().resource::<GameSystemManager>();
    assert_eq!(manager.states().current_state(enemy), CharacterState::Walk);

    let changes = events::<StateChanged>(&app);
    assert!(changes.contains(&StateChanged {
        entity: enemy,
        new_state: CharacterState::Walk,
        old_state: CharacterState::Idle,
    }));
}

#[test]
fn test_killed_enemy_drops_loot_and_is_despawned() {
    let mut app = create_combat_app(42);
    let enemy = spawn_enemy(&mut app, Vec3::new(3.0, 0.0, 0.0));
    tick(&mut app, 1);

    app.world_mut()
        .resource_mut::<GameSystemManager>()
        .deal_damage(enemy, 500.0, None);
    tick(&mut app, 1);

    let deaths = events::<Death>(&app);
    assert_eq!(deaths.len(), 1);
    let loot = events::<LootGenerated>(&app);
    assert_eq!(loot.len(), 1);
    assert_eq!(loot[0].source, enemy);
    assert_eq!(loot[0].location, Vec3::new(3.0, 0.0, 0.0));

    // destroy_delay 2s ≈ 120 тиков
    tick(&mut app, 125);
    assert!(app.world().get_entity(enemy).is_err());
    let manager = app.world().resource::<GameSystemManager>();
    assert!(manager.actor(enemy).is_none());
    assert_eq!(manager.states().tracked_count(), 0);
}

#[test]
fn test_external_despawn_is_pruned() {
    let mut app = create_combat_app(42);
    let enemy = spawn_enemy(&mut app, Vec3::ZERO);
    let survivor = spawn_enemy(&mut app, Vec3::X);
    tick(&mut app, 1);

    app.world_mut().despawn(enemy);
    tick(&mut app, 1);

    let manager = app.world().resource::<GameSystemManager>();
    assert!(manager.actor(enemy).is_none());
    assert!(manager.actor(survivor).is_some());
    assert_eq!(manager.health().tracked_count(), 1);
}

#[test]
fn test_same_seed_same_duel() {
    let run = |seed: u64| {
        let mut app = create_combat_app(seed);
        let attacker = spawn_enemy(&mut app, Vec3::ZERO);
        let target = spawn_enemy(&mut app, Vec3::X);
        tick(&mut app, 1);

        let mut log = Vec::new();
        for _ in 0..20 {
            let mut manager = app.world_mut().resource_mut::<GameSystemManager>();
            let intent = manager.attacks().default_intent(3.0).with_critical(0.5, 2.0);
            if let Ok(report) = manager.try_attack(attacker, target, &intent) {
                log.push((report.damage, report.critical));
            }
            drop(manager);
            tick(&mut app, 40);
        }
        log
    };

    let first = run(42);
    assert!(!first.is_empty());
    assert_eq!(first, run(42));
}
