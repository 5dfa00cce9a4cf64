//! Tests for StateManager transitions.

use bevy::prelude::*;
use std::sync::{Arc, Mutex};

use super::*;
use crate::config::{RunAttackExitPolicy, StateConfig};
use crate::error::TransitionError;

fn entity(index: u32) -> Entity {
    Entity::from_raw(index)
}

#[test]
fn test_first_request_creates_idle_record() {
    let mut states = StateManager::default();
    let e = entity(1);

    assert!(states.record(e).is_none());
    assert!(states.change_state(e, CharacterState::Idle, false, 0.0));

    let record = states.record(e).unwrap();
    assert_eq!(record.current, CharacterState::Idle);
    assert_eq!(record.previous, CharacterState::Idle);
    assert_eq!(states.on_state_changed.emitted(), 0);
}

#[test]
fn test_same_state_is_idempotent() {
    let mut states = StateManager::default();
    let e = entity(1);

    assert!(states.change_state(e, CharacterState::Walk, false, 0.0));
    assert!(states.change_state(e, CharacterState::Walk, false, 0.1));
    assert_eq!(states.on_state_changed.emitted(), 1);
}

#[test]
fn test_dead_is_terminal() {
    let mut states = StateManager::default();
    let e = entity(1);
    assert!(states.change_state(e, CharacterState::Dead, false, 0.0));

    for to in CharacterState::ALL {
        if to == CharacterState::Dead {
            continue;
        }
        assert!(!states.change_state(e, to, false, 10.0), "Dead -> {:?} must fail", to);
        assert_eq!(states.current_state(e), CharacterState::Dead);
    }
    assert_eq!(states.on_transition_failed.emitted(), 9);
}

#[test]
fn test_forced_transition_bypasses_rules() {
    let mut states = StateManager::default();
    let e = entity(1);
    states.change_state(e, CharacterState::Dead, false, 0.0);

    assert!(states.change_state(e, CharacterState::Idle, true, 0.0));
    assert_eq!(states.current_state(e), CharacterState::Idle);
    assert_eq!(states.previous_state(e), CharacterState::Dead);
}

#[test]
fn test_attack_exit_waits_for_min_duration() {
    let mut states = StateManager::default();
    let e = entity(1);
    assert!(states.change_state(e, CharacterState::Attack, false, 0.0));

    let err = states
        .try_change_state(e, CharacterState::Idle, false, 0.1)
        .unwrap_err();
    assert!(matches!(err, TransitionError::MinDurationUnmet { .. }));
    assert_eq!(states.current_state(e), CharacterState::Attack);

    assert!(states.change_state(e, CharacterState::Idle, false, 0.31));
    assert_eq!(states.current_state(e), CharacterState::Idle);
}

#[test]
fn test_lower_priority_cannot_preempt_without_rule() {
    let mut states = StateManager::default();
    let e = entity(1);
    states.change_state(e, CharacterState::Dash, false, 0.0);

    let err = states
        .try_change_state(e, CharacterState::Walk, false, 5.0)
        .unwrap_err();
    assert_eq!(
        err,
        TransitionError::PriorityPreempted {
            from: CharacterState::Dash,
            to: CharacterState::Walk,
        }
    );

    states.add_rule(TransitionRule::allow(CharacterState::Dash, CharacterState::Walk));
    assert!(states.change_state(e, CharacterState::Walk, false, 5.0));
}

#[test]
fn test_idle_never_blocks_by_priority() {
    let mut states = StateManager::default();
    let e = entity(1);
    states.set_priority(CharacterState::Idle, 500);

    assert!(states.change_state(e, CharacterState::Walk, false, 0.0));
}

#[test]
fn test_higher_priority_preempts() {
    let mut states = StateManager::default();
    let e = entity(1);

    assert!(states.change_state(e, CharacterState::Walk, false, 0.0));
    assert!(states.change_state(e, CharacterState::Attack, false, 0.0));
    assert!(states.change_state(e, CharacterState::Hurt, false, 0.0));
    assert!(states.change_state(e, CharacterState::Dead, false, 0.0));
}

#[test]
fn test_add_rule_replaces_existing_pair() {
    let mut states = StateManager::default();
    let before = states.rules().len();

    states.add_rule(TransitionRule::min_dwell(CharacterState::Attack, CharacterState::Idle, 1.0));
    assert_eq!(states.rules().len(), before);
    assert_eq!(
        states
            .rule(CharacterState::Attack, CharacterState::Idle)
            .map(|rule| rule.min_duration),
        Some(1.0)
    );

    assert!(states.remove_rule(CharacterState::Attack, CharacterState::Idle));
    assert!(states.rule(CharacterState::Attack, CharacterState::Idle).is_none());
}

#[test]
fn test_forbidding_rule_vetoes_upgrade() {
    let mut states = StateManager::default();
    let e = entity(1);
    states.add_rule(TransitionRule::forbid(CharacterState::Idle, CharacterState::Dash));

    assert!(!states.change_state(e, CharacterState::Dash, false, 0.0));
    assert!(states.change_state(e, CharacterState::Jump, false, 0.0));
}

#[test]
fn test_signals_carry_old_and_new_state() {
    let mut states = StateManager::default();
    let e = entity(1);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    states
        .on_state_changed
        .subscribe(move |event| sink.lock().unwrap().push((event.old_state, event.new_state)));

    states.change_state(e, CharacterState::Walk, false, 0.0);
    states.change_state(e, CharacterState::Jump, false, 0.1);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (CharacterState::Idle, CharacterState::Walk),
            (CharacterState::Walk, CharacterState::Jump),
        ]
    );
}

#[test]
fn test_invalid_entity_is_rejected() {
    let mut states = StateManager::default();

    assert!(!states.change_state(Entity::PLACEHOLDER, CharacterState::Walk, false, 0.0));
    assert!(!states.change_state(Entity::PLACEHOLDER, CharacterState::Walk, true, 0.0));
    assert_eq!(states.tracked_count(), 0);
    assert_eq!(states.on_transition_failed.emitted(), 0);
}

#[test]
fn test_entered_at_is_monotonic_and_elapsed_tracks_clock() {
    let mut states = StateManager::default();
    let e = entity(1);

    states.change_state(e, CharacterState::Walk, false, 2.0);
    assert_eq!(states.state_elapsed(e, 2.5), 0.5);
    assert!(states.has_min_duration_passed(e, 2.5));
    assert!(!states.has_min_duration_passed(e, 2.05));

    // Часы "назад": entered_at не уменьшается
    states.change_state(e, CharacterState::Run, false, 1.0);
    assert_eq!(states.record(e).unwrap().entered_at, 2.0);
}

#[test]
fn test_attack_dwell_after_long_uptime() {
    let config = StateConfig::default();
    let dwell = f64::from(config.attack_min_duration);
    let mut states = StateManager::new(&config);
    let e = entity(1);
    // ~12.7 дней
    let start = 1_100_000.0;

    states.change_state(e, CharacterState::Idle, true, start);
    assert!(states.change_state(e, CharacterState::Attack, false, start));
    assert!(!states.change_state(e, CharacterState::Idle, false, start + dwell * 0.5));
    assert!(states.change_state(e, CharacterState::Idle, false, start + dwell + 0.01));
    assert!((states.state_elapsed(e, start + dwell + 1.01) - 1.0).abs() < 1e-4);
}

#[test]
fn test_recovery_rules_allow_downgrades() {
    let config = StateConfig { recovery_rules: true, ..Default::default() };
    let mut states = StateManager::new(&config);
    let e = entity(1);

    states.change_state(e, CharacterState::Hurt, false, 0.0);
    assert!(states.change_state(e, CharacterState::Idle, false, 0.0));

    states.change_state(e, CharacterState::Attack, false, 1.0);
    // Attack → Idle всё ещё ждёт dwell
    assert!(!states.change_state(e, CharacterState::Idle, false, 1.1));
    assert!(states.change_state(e, CharacterState::Idle, false, 1.4));

    states.change_state(e, CharacterState::Dead, false, 2.0);
    assert!(!states.change_state(e, CharacterState::Idle, false, 9.0));
}

#[test]
fn test_run_attack_inherit_policy() {
    let config = StateConfig {
        run_attack_exit: RunAttackExitPolicy::InheritAttackDwell,
        ..Default::default()
    };
    let mut states = StateManager::new(&config);
    let e = entity(1);

    states.change_state(e, CharacterState::RunAttack, false, 0.0);
    assert!(!states.change_state(e, CharacterState::Idle, false, 0.1));
    assert!(states.change_state(e, CharacterState::Idle, false, 0.31));
}

#[test]
fn test_prune_drops_stale_records() {
    let mut states = StateManager::default();
    let alive = entity(1);
    let stale = entity(2);
    states.change_state(alive, CharacterState::Walk, false, 0.0);
    states.change_state(stale, CharacterState::Walk, false, 0.0);

    assert_eq!(states.prune(|e| e == alive), 1);
    assert_eq!(states.tracked_count(), 1);
    assert_eq!(states.current_state(stale), CharacterState::Idle);
}

#[test]
fn test_update_derived_state_only_changes_when_needed() {
    let mut states = StateManager::default();
    let e = entity(1);
    let thresholds = LocomotionThresholds::default();
    let intent = CharacterIntent::default();

    assert!(states.update_derived_state(e, &intent, Vec3::new(50.0, 0.0, 0.0), &thresholds, false, 0.0));
    assert_eq!(states.current_state(e), CharacterState::Walk);
    assert!(states.update_derived_state(e, &intent, Vec3::new(50.0, 0.0, 0.0), &thresholds, false, 0.1));
    assert_eq!(states.on_state_changed.emitted(), 1);

    assert!(states.update_derived_state(e, &intent, Vec3::ZERO, &thresholds, true, 0.2));
    assert_eq!(states.current_state(e), CharacterState::Dead);
}
