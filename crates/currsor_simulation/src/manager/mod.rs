//! GameSystemManager: composition root одного simulation world
//!
//! # Порядок конструирования
//!
//! HealthModel → StateManager → AttackResolver → LootResolver.
//!
//! # Death pipeline (в пределах одного вызова)
//!
//! 1. HealthModel применяет урон, фиксирует смерть и ставит её в очередь
//!    (любой путь: deal_damage, try_attack, kill, `health_mut()`)
//! 2. StateManager: forced transition → Dead
//! 3. LootResolver: таблица из ActorSpec (если есть)
//! 4. TimerQueue: Respawn (auto_respawn) или Destroy (destroy_delay)
//!
//! Один экземпляр на world. `ManagerRegistry` ищет его по `WorldId`, без
//! глобального состояния.

use bevy::ecs::world::WorldId;
use bevy::prelude::*;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::combat::{AttackIntent, AttackReport, AttackResolver};
use crate::config::GameConfig;
use crate::error::{AttackError, HealthError};
use crate::events::{
    AttackEnded, AttackHit, AttackStarted, Death, EntityDestroyed, HealthChanged, LootGenerated, Respawned,
    StateChanged, TransitionFailed,
};
use crate::health::{HealthChange, HealthModel};
use crate::logger;
use crate::loot::{LootDrop, LootResolver, DEFAULT_TABLE};
use crate::signal::Signal;
use crate::state::{CharacterIntent, CharacterState, LocomotionThresholds, StateManager};
use crate::timers::{FiredTimer, SimClock, TimerAction, TimerQueue};
use crate::DeterministicRng;

pub mod actor;

pub use actor::{ActorKind, ActorSpec};

/// Lifecycle contract shared by every core subsystem.
pub trait CoreSystem {
    fn name(&self) -> &'static str;
    /// Clears per-entity runtime data and counters. Configuration stays.
    fn reset(&mut self);
    fn status(&self) -> String;
}

/// Every payload emitted since the last drain, grouped by signal.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoreSignals {
    pub state_changed: Vec<StateChanged>,
    pub transition_failed: Vec<TransitionFailed>,
    pub health_changed: Vec<HealthChanged>,
    pub deaths: Vec<Death>,
    pub respawned: Vec<Respawned>,
    pub attack_started: Vec<AttackStarted>,
    pub attack_ended: Vec<AttackEnded>,
    pub attack_hits: Vec<AttackHit>,
    pub loot_generated: Vec<LootGenerated>,
    pub destroyed: Vec<EntityDestroyed>,
}

impl CoreSignals {
    pub fn is_empty(&self) -> bool {
        self.state_changed.is_empty()
            && self.transition_failed.is_empty()
            && self.health_changed.is_empty()
            && self.deaths.is_empty()
            && self.respawned.is_empty()
            && self.attack_started.is_empty()
            && self.attack_ended.is_empty()
            && self.attack_hits.is_empty()
            && self.loot_generated.is_empty()
            && self.destroyed.is_empty()
    }
}

#[derive(Resource)]
pub struct GameSystemManager {
    config: GameConfig,
    clock: SimClock,
    timers: TimerQueue,
    rng: DeterministicRng,

    health: HealthModel,
    states: StateManager,
    attacks: AttackResolver,
    loot: LootResolver,

    actors: HashMap<Entity, ActorSpec>,
    locations: HashMap<Entity, Vec3>,
    destroyed: Vec<Entity>,
    pub on_entity_destroyed: Signal<EntityDestroyed>,
}

impl Default for GameSystemManager {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

impl GameSystemManager {
    pub fn new(config: GameConfig) -> Self {
        logger::log_info("GameSystemManager: initializing core systems");

        // Health/State раньше Attack/Loot
        let health = HealthModel::new();
        let states = StateManager::new(&config.state);
        let attacks = AttackResolver::new(&config.attack);
        let loot = LootResolver::new(&config.loot);

        let manager = Self {
            rng: DeterministicRng::new(config.rng_seed),
            clock: SimClock::new(),
            timers: TimerQueue::new(),
            health,
            states,
            attacks,
            loot,
            actors: HashMap::new(),
            locations: HashMap::new(),
            destroyed: Vec::new(),
            on_entity_destroyed: Signal::new(),
            config,
        };

        logger::log_info(&format!(
            "GameSystemManager: {} systems ready (seed {})",
            manager.systems().len(),
            manager.rng.seed
        ));
        manager
    }

    // --- Actors ---

    /// Registers health, a fresh Idle state record and the archetype.
    pub fn spawn_actor(&mut self, entity: Entity, spec: ActorSpec) -> Result<(), HealthError> {
        self.health.register(entity, spec.max_health, spec.auto_respawn)?;
        let now = self.clock.now();
        self.states.change_state(entity, CharacterState::Idle, true, now);
        logger::log(&format!("Actor spawned: {:?} ({:?}, {} HP)", entity, spec.kind, spec.max_health));
        self.actors.insert(entity, spec);
        Ok(())
    }

    pub fn actor(&self, entity: Entity) -> Option<&ActorSpec> {
        self.actors.get(&entity)
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn set_location(&mut self, entity: Entity, location: Vec3) {
        self.locations.insert(entity, location);
    }

    pub fn location(&self, entity: Entity) -> Vec3 {
        self.locations.get(&entity).copied().unwrap_or(Vec3::ZERO)
    }

    // --- Clock ---

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Advances the clock and runs every timer that became due, earliest first.
    pub fn advance(&mut self, delta: f32) -> Vec<FiredTimer> {
        self.process_deaths();
        let now = self.clock.advance(delta);
        let fired = self.timers.drain_due(now);

        for timer in &fired {
            match timer.action {
                TimerAction::Respawn => self.respawn_actor(timer.owner),
                TimerAction::Destroy => self.destroy_actor(timer.owner),
            }
        }
        fired
    }

    fn respawn_actor(&mut self, entity: Entity) {
        if let Err(err) = self.health.respawn(entity) {
            logger::log_warning(&format!("Respawn skipped: {}", err));
            return;
        }
        let now = self.clock.now();
        self.states.change_state(entity, CharacterState::Idle, true, now);
    }

    fn destroy_actor(&mut self, entity: Entity) {
        self.forget(entity);
        self.destroyed.push(entity);
        self.on_entity_destroyed.emit(&EntityDestroyed { entity });
        logger::log_info(&format!("{:?} destroyed", entity));
    }

    /// Entities destroyed by timers since the last call (the ECS bridge despawns them).
    pub fn take_destroyed(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.destroyed)
    }

    // --- State ---

    pub fn change_state(&mut self, entity: Entity, state: CharacterState, force: bool) -> bool {
        let now = self.clock.now();
        self.states.change_state(entity, state, force, now)
    }

    /// Per-tick derived state from intents + velocity. Thresholds fall back to config.
    pub fn update_character_state(
        &mut self,
        entity: Entity,
        intent: &CharacterIntent,
        velocity: Vec3,
        thresholds: Option<&LocomotionThresholds>,
    ) -> bool {
        let thresholds = thresholds.copied().unwrap_or(self.config.locomotion);
        let is_dead = self.health.is_dead(entity);
        let now = self.clock.now();
        self.states
            .update_derived_state(entity, intent, velocity, &thresholds, is_dead, now)
    }

    // --- Health ---

    pub fn deal_damage(&mut self, target: Entity, amount: f32, instigator: Option<Entity>) -> Option<HealthChange> {
        let change = self.health.take_damage(target, amount, instigator);
        self.process_deaths();
        change
    }

    pub fn heal(&mut self, entity: Entity, amount: f32) -> Option<HealthChange> {
        self.health.heal(entity, amount)
    }

    /// Scripted death (falling out of the world, traps...).
    pub fn kill(&mut self, entity: Entity) -> bool {
        let result = self.health.set_current_health(entity, 0.0);
        self.process_deaths();
        match result {
            Ok(Some(change)) => change.died,
            Ok(None) => false,
            Err(err) => {
                logger::log_error(&format!("Kill: {}", err));
                false
            }
        }
    }

    /// Runs the death pipeline for every death the health model queued.
    fn process_deaths(&mut self) {
        while self.health.has_pending_deaths() {
            for entity in self.health.take_pending_deaths() {
                // Уже респавнен/удалён до обработки
                if self.health.is_dead(entity) {
                    self.handle_death(entity);
                }
            }
        }
    }

    fn handle_death(&mut self, entity: Entity) {
        let now = self.clock.now();
        self.states.change_state(entity, CharacterState::Dead, true, now);
        self.attacks.end_attack(entity);

        let spec = self.actors.get(&entity).cloned();
        if let Some(table) = spec.as_ref().and_then(|spec| spec.loot_table.clone()) {
            self.generate_loot(entity, &table);
        }

        if let Some(delay) = self.health.auto_respawn_delay(entity) {
            self.timers.schedule(entity, now, delay, TimerAction::Respawn);
        } else if let Some(delay) = spec.and_then(|spec| spec.destroy_delay) {
            self.timers.schedule(entity, now, delay, TimerAction::Destroy);
        }
    }

    // --- Attacks ---

    pub fn attack(&mut self, attacker: Entity, target: Entity, intent: &AttackIntent) -> bool {
        match self.try_attack(attacker, target, intent) {
            Ok(_) => true,
            Err(err) => {
                logger::log_warning(&format!("Attack rejected: {}", err));
                false
            }
        }
    }

    pub fn try_attack(
        &mut self,
        attacker: Entity,
        target: Entity,
        intent: &AttackIntent,
    ) -> Result<AttackReport, AttackError> {
        let now = self.clock.now();
        let hit_location = self.locations.get(&target).copied();
        let result = self.attacks.try_process_attack(
            attacker,
            target,
            intent,
            hit_location,
            now,
            &mut self.rng,
            &mut self.health,
        );
        self.process_deaths();
        result
    }

    /// Enters Attack (RunAttack while moving) and opens the attack window.
    pub fn begin_attack(&mut self, attacker: Entity) -> bool {
        let current = self.states.current_state(attacker);
        if matches!(current, CharacterState::Dead | CharacterState::Hurt) {
            return false;
        }

        // Окно атаки уже открыто: состояние не трогаем
        if self.attacks.is_attacking(attacker) {
            return false;
        }

        let attack_state = if current.is_moving() {
            CharacterState::RunAttack
        } else {
            CharacterState::Attack
        };
        let now = self.clock.now();
        if !self.states.change_state(attacker, attack_state, false, now) {
            return false;
        }
        self.attacks.start_attack(attacker, &format!("{:?}", attack_state), now)
    }

    pub fn end_attack(&mut self, attacker: Entity) -> bool {
        self.attacks.end_attack(attacker)
    }

    // --- Loot ---

    pub fn generate_loot(&mut self, source: Entity, table: &str) -> Vec<LootDrop> {
        let location = self.location(source);
        self.loot.generate_loot(source, table, location, &mut self.rng)
    }

    pub fn generate_default_loot(&mut self, source: Entity) -> Vec<LootDrop> {
        self.generate_loot(source, DEFAULT_TABLE)
    }

    // --- Lifecycle ---

    /// Drops the entity from every table and cancels its pending timers.
    pub fn forget(&mut self, entity: Entity) -> bool {
        let cancelled = self.timers.cancel_owner(entity);
        if cancelled > 0 {
            logger::log(&format!("Cancelled {} timers for {:?}", cancelled, entity));
        }
        let tracked = self.actors.remove(&entity).is_some();
        self.locations.remove(&entity);
        self.health.unregister(entity);
        self.states.forget(entity);
        self.attacks.forget(entity);
        tracked
    }

    /// Lazy reaping of entities that no longer exist.
    pub fn prune_stale(&mut self, is_alive: impl Fn(Entity) -> bool) -> usize {
        let stale: Vec<Entity> = self
            .actors
            .keys()
            .copied()
            .filter(|entity| !is_alive(*entity))
            .collect();
        for entity in &stale {
            self.forget(*entity);
        }

        let pruned = self.states.prune(&is_alive) + self.health.prune(&is_alive) + self.attacks.prune(&is_alive);
        self.locations.retain(|entity, _| is_alive(*entity));

        let total = stale.len() + pruned;
        if total > 0 {
            logger::log(&format!("Pruned {} stale entries", total));
        }
        total
    }

    pub fn reset_all(&mut self) {
        self.timers.clear();
        self.destroyed.clear();
        self.health.reset();
        self.states.reset();
        self.attacks.reset();
        self.loot.reset();

        // Актёры остаются зарегистрированными: заново в Idle
        let now = self.clock.now();
        for entity in self.actors.keys() {
            self.states.change_state(*entity, CharacterState::Idle, true, now);
        }
        logger::log_info("GameSystemManager: all systems reset");
    }

    pub fn systems(&self) -> [&dyn CoreSystem; 4] {
        [&self.health, &self.states, &self.attacks, &self.loot]
    }

    pub fn status_report(&self) -> String {
        let mut lines = vec![format!(
            "GameSystemManager @ {:.3}s: {} actors, {} pending timers",
            self.clock.now(),
            self.actors.len(),
            self.timers.len()
        )];
        lines.extend(self.systems().iter().map(|system| system.status()));
        lines.join("\n")
    }

    // --- Signals ---

    pub fn enable_event_journal(&mut self) {
        self.states.enable_journal();
        self.health.enable_journal();
        self.attacks.enable_journal();
        self.loot.enable_journal();
        self.on_entity_destroyed.enable_journal();
    }

    pub fn drain_signals(&mut self) -> CoreSignals {
        CoreSignals {
            state_changed: self.states.on_state_changed.drain_journal(),
            transition_failed: self.states.on_transition_failed.drain_journal(),
            health_changed: self.health.on_health_changed.drain_journal(),
            deaths: self.health.on_death.drain_journal(),
            respawned: self.health.on_respawned.drain_journal(),
            attack_started: self.attacks.on_attack_started.drain_journal(),
            attack_ended: self.attacks.on_attack_ended.drain_journal(),
            attack_hits: self.attacks.on_attack_hit.drain_journal(),
            loot_generated: self.loot.on_loot_generated.drain_journal(),
            destroyed: self.on_entity_destroyed.drain_journal(),
        }
    }

    // --- Accessors ---

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn rng_mut(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn states(&self) -> &StateManager {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StateManager {
        &mut self.states
    }

    pub fn health(&self) -> &HealthModel {
        &self.health
    }

    /// Direct health access. Deaths caused through the guard run the death
    /// pipeline when it is dropped.
    pub fn health_mut(&mut self) -> HealthMut<'_> {
        HealthMut { manager: self }
    }

    pub fn attacks(&self) -> &AttackResolver {
        &self.attacks
    }

    pub fn attacks_mut(&mut self) -> &mut AttackResolver {
        &mut self.attacks
    }

    pub fn loot(&self) -> &LootResolver {
        &self.loot
    }

    pub fn loot_mut(&mut self) -> &mut LootResolver {
        &mut self.loot
    }
}

/// Mutable `HealthModel` borrowed from a `GameSystemManager`.
pub struct HealthMut<'a> {
    manager: &'a mut GameSystemManager,
}

impl Deref for HealthMut<'_> {
    type Target = HealthModel;

    fn deref(&self) -> &HealthModel {
        &self.manager.health
    }
}

impl DerefMut for HealthMut<'_> {
    fn deref_mut(&mut self) -> &mut HealthModel {
        &mut self.manager.health
    }
}

impl Drop for HealthMut<'_> {
    fn drop(&mut self) {
        self.manager.process_deaths();
    }
}

// ============================================================================
// ManagerRegistry
// ============================================================================

/// One `GameSystemManager` per simulation world, looked up by world identity.
#[derive(Default)]
pub struct ManagerRegistry {
    managers: HashMap<WorldId, GameSystemManager>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, world: WorldId, config: impl FnOnce() -> GameConfig) -> &mut GameSystemManager {
        self.managers.entry(world).or_insert_with(|| {
            logger::log_info(&format!("ManagerRegistry: creating manager for {:?}", world));
            GameSystemManager::new(config())
        })
    }

    pub fn get(&self, world: WorldId) -> Option<&GameSystemManager> {
        self.managers.get(&world)
    }

    pub fn get_mut(&mut self, world: WorldId) -> Option<&mut GameSystemManager> {
        self.managers.get_mut(&world)
    }

    /// World torn down: its manager goes with it.
    pub fn remove(&mut self, world: WorldId) -> Option<GameSystemManager> {
        self.managers.remove(&world)
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
