//! Core scenarios через GameSystemManager (без Bevy App)
//!
//! Проверяем:
//! - Health clamp + одна смерть на depletion
//! - Dead terminal, forced transitions, idempotence
//! - Attack dwell (обе политики RunAttack)
//! - Cooldown gating + damage bound
//! - Loot: гарантированные таблицы, детерминизм по seed

use approx::assert_relative_eq;
use bevy::prelude::*;
use rstest::rstest;
use std::sync::{Arc, Mutex};

use currsor_simulation::*;

fn manager_with(config: GameConfig) -> GameSystemManager {
    GameSystemManager::new(config)
}

fn spawn(manager: &mut GameSystemManager, index: u32, max_health: f32) -> Entity {
    let entity = Entity::from_raw(index);
    let spec = ActorSpec::enemy(&manager.config().health)
        .with_max_health(max_health)
        .without_loot()
        .with_destroy_delay(None);
    manager.spawn_actor(entity, spec).unwrap();
    entity
}

#[test]
fn test_damage_clamps_and_death_fires_once() {
    let mut manager = manager_with(GameConfig::default());
    let target = spawn(&mut manager, 1, 100.0);
    let deaths = Arc::new(Mutex::new(0));

    let counter = deaths.clone();
    manager
        .health_mut()
        .on_death
        .subscribe(move |_| *counter.lock().unwrap() += 1);

    let change = manager.deal_damage(target, 30.0, None).unwrap();
    assert_relative_eq!(change.current, 70.0);
    assert_eq!(*deaths.lock().unwrap(), 0);

    let change = manager.deal_damage(target, 80.0, None).unwrap();
    assert_relative_eq!(change.current, 0.0);
    assert_eq!(*deaths.lock().unwrap(), 1);

    assert!(manager.deal_damage(target, 10.0, None).is_none());
    assert_eq!(*deaths.lock().unwrap(), 1);
    assert_eq!(manager.states().current_state(target), CharacterState::Dead);
}

#[rstest]
#[case(Vec::from([5.0, 5.0, 5.0]))]
#[case(Vec::from([99.0, 0.5]))]
#[case(Vec::from([250.0]))]
#[case(Vec::from([10.0, 40.0, 30.0, 20.0, 1.0]))]
fn test_damage_matches_clamp_formula(#[case] hits: Vec<f32>) {
    let mut manager = manager_with(GameConfig::default());
    let target = spawn(&mut manager, 1, 100.0);

    for amount in hits {
        let before = manager.health().current_health(target);
        let was_dead = manager.health().is_dead(target);
        let change = manager.deal_damage(target, amount, None);

        if was_dead {
            assert!(change.is_none());
            continue;
        }
        let expected = (before - amount).clamp(0.0, 100.0);
        assert_relative_eq!(manager.health().current_health(target), expected);
        assert_eq!(change.map(|c| c.died).unwrap_or(false), expected == 0.0 && before > 0.0);
    }
}

#[test]
fn test_dead_rejects_every_exit_unless_forced() {
    let mut manager = manager_with(GameConfig::default());
    let e = spawn(&mut manager, 1, 10.0);
    manager.kill(e);

    for state in CharacterState::ALL {
        if state == CharacterState::Dead {
            continue;
        }
        assert!(!manager.change_state(e, state, false));
        assert_eq!(manager.states().current_state(e), CharacterState::Dead);
    }

    for state in CharacterState::ALL {
        assert!(manager.change_state(e, state, true));
        assert_eq!(manager.states().current_state(e), state);
    }
}

#[test]
fn test_change_state_twice_emits_once() {
    let mut manager = manager_with(GameConfig::default());
    let e = spawn(&mut manager, 1, 10.0);
    let before = manager.states().on_state_changed.emitted();

    assert!(manager.change_state(e, CharacterState::Jump, false));
    assert!(manager.change_state(e, CharacterState::Jump, false));
    assert_eq!(manager.states().on_state_changed.emitted(), before + 1);
}

#[test]
fn test_attack_dwell_scenario() {
    let mut manager = manager_with(GameConfig::default());
    let e = spawn(&mut manager, 1, 10.0);

    assert!(manager.change_state(e, CharacterState::Attack, false));
    manager.advance(0.1);
    assert!(!manager.change_state(e, CharacterState::Idle, false));
    manager.advance(0.21);
    assert!(manager.change_state(e, CharacterState::Idle, false));
}

#[rstest]
#[case(RunAttackExitPolicy::Independent, false)]
#[case(RunAttackExitPolicy::InheritAttackDwell, true)]
fn test_run_attack_exit_policy(#[case] policy: RunAttackExitPolicy, #[case] waits_for_dwell: bool) {
    let mut config = GameConfig::default();
    config.state.run_attack_exit = policy;
    config.state.recovery_rules = true;
    let mut manager = manager_with(config);
    let e = spawn(&mut manager, 1, 10.0);

    assert!(manager.change_state(e, CharacterState::RunAttack, false));
    manager.advance(0.1);
    assert_eq!(manager.change_state(e, CharacterState::Idle, false), !waits_for_dwell);

    manager.advance(0.25);
    assert!(manager.change_state(e, CharacterState::Idle, false));
}

#[test]
fn test_run_attack_without_recovery_rules_cannot_drop_to_idle() {
    let mut manager = manager_with(GameConfig::default());
    let e = spawn(&mut manager, 1, 10.0);

    manager.change_state(e, CharacterState::RunAttack, false);
    manager.advance(5.0);
    assert!(!manager.change_state(e, CharacterState::Idle, false));
}

#[test]
fn test_attack_cooldown_scenario() {
    let mut manager = manager_with(GameConfig::default());
    let attacker = spawn(&mut manager, 1, 100.0);
    let target = spawn(&mut manager, 2, 100.0);
    let intent = AttackIntent::new(5.0);

    assert!(manager.attack(attacker, target, &intent));
    manager.advance(0.2);
    assert!(!manager.attacks().can_attack(attacker, manager.now()));
    assert!(!manager.attack(attacker, target, &intent));
    manager.advance(0.4);
    assert!(manager.attack(attacker, target, &intent));

    assert_eq!(manager.attacks().total_attacks(), 2);
    assert_relative_eq!(manager.attacks().total_damage(), 10.0);
}

#[test]
fn test_attack_damage_bound() {
    let mut config = GameConfig::default();
    config.attack.global_damage_multiplier = 1.25;
    config.attack.cooldown = 0.0;
    let mut manager = manager_with(config);
    let attacker = spawn(&mut manager, 1, 100.0);
    let target = spawn(&mut manager, 2, 1.0e4);
    let intent = AttackIntent::new(8.0).with_critical(0.4, 3.0);
    let bound = intent.max_damage(1.25);

    for _ in 0..100 {
        let before = manager.health().current_health(target);
        manager.try_attack(attacker, target, &intent).unwrap();
        let lost = before - manager.health().current_health(target);
        assert!(lost >= 0.0);
        assert!(lost <= bound + 1e-3);
    }
}

#[test]
fn test_attack_on_untracked_target_fails_cleanly() {
    let mut manager = manager_with(GameConfig::default());
    let attacker = spawn(&mut manager, 1, 100.0);
    let ghost = Entity::from_raw(50);

    let err = manager.try_attack(attacker, ghost, &AttackIntent::new(5.0)).unwrap_err();
    assert_eq!(err, AttackError::NotDamageable(ghost));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(manager.attacks().total_attacks(), 0);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(8)]
fn test_guaranteed_loot_table_drops_all_entries(#[case] entries: u32) {
    let mut manager = manager_with(GameConfig::default());
    let source = spawn(&mut manager, 1, 10.0);
    let table: Vec<LootEntry> = (0..entries)
        .map(|i| LootEntry::new(format!("Item{}", i), i, 1.0).quantity(i, i + 2))
        .collect();
    manager.loot_mut().register_table("Guaranteed", table).unwrap();

    let drops = manager.generate_loot(source, "Guaranteed");
    assert_eq!(drops.len(), entries as usize);
    for (i, drop) in drops.iter().enumerate() {
        let i = i as u32;
        assert_eq!(drop.id, i);
        assert!((i..=i + 2).contains(&drop.quantity));
    }
}

#[test]
fn test_loot_is_deterministic_per_seed() {
    let run = |seed: u64| {
        let mut manager = manager_with(GameConfig::default().with_seed(seed));
        let source = spawn(&mut manager, 1, 10.0);
        (0..50)
            .flat_map(|_| manager.generate_default_loot(source))
            .map(|drop| (drop.id, drop.quantity))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(42), run(42));
}

#[test]
fn test_enemy_death_drops_loot_at_location_then_is_destroyed() {
    let mut config = GameConfig::default();
    config.loot.global_drop_multiplier = 10.0;
    let mut manager = manager_with(config);
    manager.enable_event_journal();

    let enemy = Entity::from_raw(9);
    manager
        .spawn_actor(enemy, ActorSpec::enemy(&manager.config().health))
        .unwrap();
    manager.set_location(enemy, Vec3::new(4.0, 0.0, -2.0));

    manager.deal_damage(enemy, 1000.0, Some(Entity::from_raw(1)));
    let signals = manager.drain_signals();
    assert_eq!(signals.loot_generated.len(), 1);
    assert_eq!(signals.loot_generated[0].location, Vec3::new(4.0, 0.0, -2.0));
    assert_eq!(signals.loot_generated[0].items.len(), 2);

    manager.advance(1.9);
    assert!(manager.take_destroyed().is_empty());
    manager.advance(0.2);
    assert_eq!(manager.take_destroyed(), vec![enemy]);
    assert!(manager.actor(enemy).is_none());
    assert_eq!(manager.health().tracked_count(), 0);
    assert_eq!(manager.drain_signals().destroyed, vec![EntityDestroyed { entity: enemy }]);
}

#[test]
fn test_prune_reaps_stale_handles_and_timers() {
    let mut manager = manager_with(GameConfig::default());
    let keep = spawn(&mut manager, 1, 10.0);
    let gone = Entity::from_raw(2);
    manager
        .spawn_actor(gone, ActorSpec::player(&manager.config().health))
        .unwrap();
    manager.kill(gone);
    assert_eq!(manager.timers().pending_for(gone), vec![TimerAction::Respawn]);

    let pruned = manager.prune_stale(|entity| entity == keep);
    assert!(pruned >= 1);
    assert!(manager.timers().is_empty());
    assert_eq!(manager.states().tracked_count(), 1);
    assert_eq!(manager.actor_count(), 1);
}

#[test]
fn test_reset_all_keeps_tables_and_actors() {
    let mut manager = manager_with(GameConfig::default());
    let attacker = spawn(&mut manager, 1, 100.0);
    let target = spawn(&mut manager, 2, 100.0);
    manager
        .loot_mut()
        .register_table("Boss", vec![LootEntry::new("Crown", 7, 1.0)])
        .unwrap();
    manager.attack(attacker, target, &AttackIntent::new(40.0));
    manager.generate_loot(target, "Boss");

    manager.reset_all();

    assert_eq!(manager.attacks().total_attacks(), 0);
    assert_eq!(manager.loot().total_drops(), 0);
    assert!(manager.loot().table("Boss").is_some());
    assert_relative_eq!(manager.health().current_health(target), 100.0);
    assert_eq!(manager.states().current_state(target), CharacterState::Idle);
    assert_eq!(manager.actor_count(), 2);
}
