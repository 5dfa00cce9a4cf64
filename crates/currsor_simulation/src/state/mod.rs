//! Priority-gated character state machine.
//!
//! StateManager хранит StateRecord на каждую entity и валидирует переходы:
//! 1. Priority check: higher priority state cannot be preempted by a lower one
//!    (except from Idle) unless an explicit allowing rule exists
//! 2. Rule scan: forbidding rules veto, min-duration rules veto until dwell passed
//! 3. No rule → priority check alone decides
//!
//! Forced transitions skip validation entirely.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{RunAttackExitPolicy, StateConfig};
use crate::error::TransitionError;
use crate::events::{StateChanged, TransitionFailed};
use crate::logger;
use crate::manager::CoreSystem;
use crate::signal::Signal;

pub mod locomotion;

#[cfg(test)]
mod manager_tests;

pub use locomotion::{derive_state, CharacterIntent, LocomotionThresholds, Velocity};

// ============================================================================
// CharacterState
// ============================================================================

/// Closed set of combat/locomotion modes. Exactly one is active per entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Reflect, Serialize, Deserialize,
)]
pub enum CharacterState {
    #[default]
    Idle,
    Walk,
    Run,
    Jump,
    Fall,
    Attack,
    RunAttack,
    Dash,
    Hurt,
    /// Terminal, max priority. Left only through a forced transition (respawn).
    Dead,
}

impl CharacterState {
    pub const ALL: [CharacterState; 10] = [
        CharacterState::Idle,
        CharacterState::Walk,
        CharacterState::Run,
        CharacterState::Jump,
        CharacterState::Fall,
        CharacterState::Attack,
        CharacterState::RunAttack,
        CharacterState::Dash,
        CharacterState::Hurt,
        CharacterState::Dead,
    ];

    /// Default priority table (higher = less preemptable).
    pub fn default_priority(self) -> i32 {
        match self {
            CharacterState::Dead => 100,
            CharacterState::Hurt => 90,
            CharacterState::Dash => 80,
            CharacterState::RunAttack => 75,
            CharacterState::Attack => 70,
            CharacterState::Jump => 60,
            CharacterState::Fall => 50,
            CharacterState::Run => 30,
            CharacterState::Walk => 20,
            CharacterState::Idle => 10,
        }
    }

    pub fn is_attacking(self) -> bool {
        matches!(self, CharacterState::Attack | CharacterState::RunAttack)
    }

    pub fn is_moving(self) -> bool {
        matches!(self, CharacterState::Walk | CharacterState::Run)
    }

    pub fn is_airborne(self) -> bool {
        matches!(self, CharacterState::Jump | CharacterState::Fall)
    }
}

// ============================================================================
// TransitionRule / StateRecord
// ============================================================================

/// Explicit allow/deny + min-dwell override for one (from, to) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: CharacterState,
    pub to: CharacterState,
    pub allowed: bool,
    /// Seconds that must pass in `from` before the transition is accepted.
    pub min_duration: f32,
}

impl TransitionRule {
    pub fn allow(from: CharacterState, to: CharacterState) -> Self {
        Self { from, to, allowed: true, min_duration: 0.0 }
    }

    pub fn forbid(from: CharacterState, to: CharacterState) -> Self {
        Self { from, to, allowed: false, min_duration: 0.0 }
    }

    pub fn min_dwell(from: CharacterState, to: CharacterState, seconds: f32) -> Self {
        Self { from, to, allowed: true, min_duration: seconds.max(0.0) }
    }

    fn matches(&self, from: CharacterState, to: CharacterState) -> bool {
        self.from == from && self.to == to
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateRecord {
    pub current: CharacterState,
    pub previous: CharacterState,
    /// Simulation time (seconds) when `current` was entered. Never decreases.
    pub entered_at: f64,
}

impl StateRecord {
    fn fresh(now: f64) -> Self {
        Self {
            current: CharacterState::Idle,
            previous: CharacterState::Idle,
            entered_at: now,
        }
    }

    pub fn elapsed(&self, now: f64) -> f32 {
        (now - self.entered_at).max(0.0) as f32
    }
}

// ============================================================================
// StateManager
// ============================================================================

pub struct StateManager {
    priorities: HashMap<CharacterState, i32>,
    rules: Vec<TransitionRule>,
    records: HashMap<Entity, StateRecord>,
    default_min_duration: f32,
    debug_logging: bool,
    pub on_state_changed: Signal<StateChanged>,
    pub on_transition_failed: Signal<TransitionFailed>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(&StateConfig::default())
    }
}

impl StateManager {
    pub fn new(config: &StateConfig) -> Self {
        let mut priorities: HashMap<CharacterState, i32> = CharacterState::ALL
            .iter()
            .map(|state| (*state, state.default_priority()))
            .collect();
        for (state, priority) in &config.priority_overrides {
            priorities.insert(*state, *priority);
        }

        let mut manager = Self {
            priorities,
            rules: Vec::new(),
            records: HashMap::new(),
            default_min_duration: config.default_min_state_duration,
            debug_logging: config.debug_logging,
            on_state_changed: Signal::new(),
            on_transition_failed: Signal::new(),
        };
        manager.install_default_rules(config);

        logger::log(&format!(
            "StateManager initialized with {} priorities and {} transition rules",
            manager.priorities.len(),
            manager.rules.len()
        ));
        manager
    }

    /// Default seed: Dead forbids every exit, Attack→Idle waits for its dwell.
    fn install_default_rules(&mut self, config: &StateConfig) {
        for to in CharacterState::ALL {
            if to != CharacterState::Dead {
                self.add_rule(TransitionRule::forbid(CharacterState::Dead, to));
            }
        }

        if config.recovery_rules {
            // Разрешаем "откат" к низшему приоритету (Hurt → Idle, Fall → Idle, Run → Walk...)
            for from in CharacterState::ALL {
                if from == CharacterState::Idle || from == CharacterState::Dead {
                    continue;
                }
                for to in CharacterState::ALL {
                    if self.priority(from) > self.priority(to) {
                        self.add_rule(TransitionRule::allow(from, to));
                    }
                }
            }
        }

        self.add_rule(TransitionRule::min_dwell(
            CharacterState::Attack,
            CharacterState::Idle,
            config.attack_min_duration,
        ));
        if config.run_attack_exit == RunAttackExitPolicy::InheritAttackDwell {
            self.add_rule(TransitionRule::min_dwell(
                CharacterState::RunAttack,
                CharacterState::Idle,
                config.attack_min_duration,
            ));
        }
    }

    // --- Priorities & rules ---

    pub fn priority(&self, state: CharacterState) -> i32 {
        self.priorities.get(&state).copied().unwrap_or(0)
    }

    pub fn set_priority(&mut self, state: CharacterState, priority: i32) {
        self.priorities.insert(state, priority);
    }

    /// Adds a rule, replacing any existing rule for the same pair.
    pub fn add_rule(&mut self, rule: TransitionRule) {
        self.remove_rule(rule.from, rule.to);
        self.rules.push(rule);
    }

    pub fn remove_rule(&mut self, from: CharacterState, to: CharacterState) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| !rule.matches(from, to));
        self.rules.len() != before
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    pub fn rule(&self, from: CharacterState, to: CharacterState) -> Option<&TransitionRule> {
        self.rules.iter().find(|rule| rule.matches(from, to))
    }

    // --- Transitions ---

    /// Boolean contract: true if the entity ends up in `new_state`.
    pub fn change_state(&mut self, entity: Entity, new_state: CharacterState, force: bool, now: f64) -> bool {
        self.try_change_state(entity, new_state, force, now).is_ok()
    }

    /// Returns `Ok(true)` when a transition was applied, `Ok(false)` for the
    /// same-state no-op.
    pub fn try_change_state(
        &mut self,
        entity: Entity,
        new_state: CharacterState,
        force: bool,
        now: f64,
    ) -> Result<bool, TransitionError> {
        if entity == Entity::PLACEHOLDER {
            logger::log_error("ChangeState: invalid entity handle");
            return Err(TransitionError::InvalidEntity);
        }

        let record = *self
            .records
            .entry(entity)
            .or_insert_with(|| StateRecord::fresh(now));
        let old_state = record.current;

        if old_state == new_state && !force {
            return Ok(false);
        }

        if !force {
            if let Err(err) = self.check_transition(old_state, new_state, record.elapsed(now)) {
                self.on_transition_failed.emit(&TransitionFailed {
                    entity,
                    attempted: new_state,
                });
                if self.debug_logging {
                    logger::log_warning(&format!(
                        "State transition failed: {:?} -> {:?} for {:?} ({})",
                        old_state, new_state, entity, err
                    ));
                }
                return Err(err);
            }
        }

        if let Some(record) = self.records.get_mut(&entity) {
            record.previous = old_state;
            record.current = new_state;
            record.entered_at = record.entered_at.max(now);
        }

        self.on_state_changed.emit(&StateChanged {
            entity,
            new_state,
            old_state,
        });
        logger::log(&format!(
            "State changed: {:?} -> {:?} for {:?}",
            old_state, new_state, entity
        ));
        Ok(true)
    }

    pub fn validate_transition(
        &self,
        entity: Entity,
        from: CharacterState,
        to: CharacterState,
        now: f64,
    ) -> Result<(), TransitionError> {
        if entity == Entity::PLACEHOLDER {
            return Err(TransitionError::InvalidEntity);
        }
        self.check_transition(from, to, self.state_elapsed(entity, now))
    }

    pub fn can_transition_to(&self, entity: Entity, to: CharacterState, now: f64) -> bool {
        let from = self.current_state(entity);
        self.validate_transition(entity, from, to, now).is_ok()
    }

    fn check_transition(
        &self,
        from: CharacterState,
        to: CharacterState,
        elapsed: f32,
    ) -> Result<(), TransitionError> {
        if self.priority(from) > self.priority(to) && from != CharacterState::Idle {
            let has_allowing_rule = self
                .rules
                .iter()
                .any(|rule| rule.matches(from, to) && rule.allowed);
            if !has_allowing_rule {
                return Err(TransitionError::PriorityPreempted { from, to });
            }
        }

        for rule in self.rules.iter().filter(|rule| rule.matches(from, to)) {
            if !rule.allowed {
                return Err(TransitionError::RuleForbidden { from, to });
            }
            if rule.min_duration > 0.0 && elapsed < rule.min_duration {
                return Err(TransitionError::MinDurationUnmet {
                    from,
                    to,
                    elapsed,
                    required: rule.min_duration,
                });
            }
        }

        Ok(())
    }

    /// Recomputes the desired state from intents and calls `change_state`
    /// only when it differs from the current one.
    pub fn update_derived_state(
        &mut self,
        entity: Entity,
        intent: &CharacterIntent,
        velocity: Vec3,
        thresholds: &LocomotionThresholds,
        is_dead: bool,
        now: f64,
    ) -> bool {
        if entity == Entity::PLACEHOLDER {
            return false;
        }

        let desired = derive_state(intent, velocity, thresholds, is_dead);
        if self.current_state(entity) == desired && self.records.contains_key(&entity) {
            return true;
        }
        self.change_state(entity, desired, false, now)
    }

    // --- Queries ---

    pub fn record(&self, entity: Entity) -> Option<&StateRecord> {
        self.records.get(&entity)
    }

    pub fn current_state(&self, entity: Entity) -> CharacterState {
        self.records
            .get(&entity)
            .map(|record| record.current)
            .unwrap_or_default()
    }

    pub fn previous_state(&self, entity: Entity) -> CharacterState {
        self.records
            .get(&entity)
            .map(|record| record.previous)
            .unwrap_or_default()
    }

    pub fn state_elapsed(&self, entity: Entity, now: f64) -> f32 {
        self.records
            .get(&entity)
            .map(|record| record.elapsed(now))
            .unwrap_or(0.0)
    }

    pub fn has_min_duration_passed(&self, entity: Entity, now: f64) -> bool {
        self.state_elapsed(entity, now) >= self.default_min_duration
    }

    pub fn is_in_state(&self, entity: Entity, state: CharacterState) -> bool {
        self.current_state(entity) == state
    }

    pub fn is_in_any_state(&self, entity: Entity, states: &[CharacterState]) -> bool {
        states.contains(&self.current_state(entity))
    }

    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }

    // --- Lifecycle ---

    pub fn forget(&mut self, entity: Entity) -> bool {
        self.records.remove(&entity).is_some()
    }

    /// Lazy reaping of entities whose handle is no longer valid.
    pub fn prune(&mut self, is_alive: impl Fn(Entity) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|entity, _| is_alive(*entity));
        before - self.records.len()
    }

    pub fn enable_journal(&mut self) {
        self.on_state_changed.enable_journal();
        self.on_transition_failed.enable_journal();
    }
}

impl CoreSystem for StateManager {
    fn name(&self) -> &'static str {
        "StateManager"
    }

    fn reset(&mut self) {
        self.records.clear();
        logger::log("StateManager reset - cleared all actor states");
    }

    fn status(&self) -> String {
        format!(
            "{}: {} tracked, {} rules",
            self.name(),
            self.records.len(),
            self.rules.len()
        )
    }
}
