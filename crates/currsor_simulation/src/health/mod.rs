//! Health model: current/max per entity, death latch.
//!
//! Invariant: `0 <= current <= max`, dead ⇔ `current == 0`.
//! Death fires once per depletion; `can_take_damage` stays latched false
//! until `respawn`.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::error::HealthError;
use crate::events::{Death, HealthChanged, Respawned};
use crate::logger;
use crate::manager::CoreSystem;
use crate::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthRecord {
    pub current: f32,
    pub max: f32,
    pub can_take_damage: bool,
    /// Respawn delay in seconds (None = no auto-respawn).
    pub auto_respawn: Option<f32>,
}

impl HealthRecord {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            can_take_damage: true,
            auto_respawn: None,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    pub fn percentage(&self) -> f32 {
        if self.max > 0.0 {
            self.current / self.max
        } else {
            0.0
        }
    }
}

/// Outcome of one applied health mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthChange {
    pub previous: f32,
    pub current: f32,
    pub max: f32,
    pub delta: f32,
    /// This mutation depleted health (death fired).
    pub died: bool,
}

impl HealthChange {
    /// Health actually removed by this change.
    pub fn applied(&self) -> f32 {
        (self.previous - self.current).max(0.0)
    }
}

/// Damage capability: AttackResolver checks for it before applying damage.
pub trait Damageable {
    fn can_receive_damage(&self, target: Entity) -> bool;

    /// Returns the applied change, `None` when the hit was a no-op
    /// (already dead, invulnerable, non-positive amount).
    fn apply_damage(
        &mut self,
        target: Entity,
        amount: f32,
        instigator: Option<Entity>,
        hit_location: Option<Vec3>,
    ) -> Option<HealthChange>;
}

pub struct HealthModel {
    records: HashMap<Entity, HealthRecord>,
    /// Deaths not yet handed to the composition root, in death order.
    pending_deaths: Vec<Entity>,
    pub on_health_changed: Signal<HealthChanged>,
    pub on_death: Signal<Death>,
    pub on_respawned: Signal<Respawned>,
}

impl Default for HealthModel {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthModel {
    pub fn new() -> Self {
        logger::log("HealthModel initialized");
        Self {
            records: HashMap::new(),
            pending_deaths: Vec::new(),
            on_health_changed: Signal::new(),
            on_death: Signal::new(),
            on_respawned: Signal::new(),
        }
    }

    /// Starts tracking `entity` at full health. Re-registering resets the record.
    pub fn register(&mut self, entity: Entity, max: f32, auto_respawn: Option<f32>) -> Result<(), HealthError> {
        if entity == Entity::PLACEHOLDER {
            return Err(HealthError::InvalidEntity);
        }
        if !(max > 0.0) {
            logger::log_warning(&format!("MaxHealth must be greater than 0 (got {})", max));
            return Err(HealthError::NonPositiveMax(max));
        }

        let mut record = HealthRecord::new(max);
        record.auto_respawn = auto_respawn.filter(|delay| *delay > 0.0);
        self.records.insert(entity, record);
        Ok(())
    }

    pub fn unregister(&mut self, entity: Entity) -> bool {
        self.pending_deaths.retain(|pending| *pending != entity);
        self.records.remove(&entity).is_some()
    }

    pub fn take_damage(&mut self, entity: Entity, amount: f32, instigator: Option<Entity>) -> Option<HealthChange> {
        match self.try_take_damage(entity, amount, instigator) {
            Ok(change) => change,
            Err(err) => {
                logger::log_error(&format!("TakeDamage: {}", err));
                None
            }
        }
    }

    /// `Ok(None)` = precondition not met (dead, invulnerable, amount <= 0)
    /// or clamped to no change.
    pub fn try_take_damage(
        &mut self,
        entity: Entity,
        amount: f32,
        instigator: Option<Entity>,
    ) -> Result<Option<HealthChange>, HealthError> {
        let record = self.record_mut(entity)?;
        if !record.can_take_damage || record.is_dead() || !(amount > 0.0) {
            return Ok(None);
        }

        let previous = record.current;
        record.current = (record.current - amount).clamp(0.0, record.max);
        let snapshot = *record;
        if snapshot.current == previous {
            return Ok(None);
        }

        let died = snapshot.current <= 0.0;
        self.on_health_changed.emit(&HealthChanged {
            entity,
            current: snapshot.current,
            max: snapshot.max,
            delta: amount,
        });
        if died {
            self.handle_death(entity, instigator);
        }

        Ok(Some(HealthChange {
            previous,
            current: snapshot.current,
            max: snapshot.max,
            delta: amount,
            died,
        }))
    }

    pub fn heal(&mut self, entity: Entity, amount: f32) -> Option<HealthChange> {
        match self.try_heal(entity, amount) {
            Ok(change) => change,
            Err(err) => {
                logger::log_error(&format!("Heal: {}", err));
                None
            }
        }
    }

    pub fn try_heal(&mut self, entity: Entity, amount: f32) -> Result<Option<HealthChange>, HealthError> {
        let record = self.record_mut(entity)?;
        if record.is_dead() || !(amount > 0.0) {
            return Ok(None);
        }

        let previous = record.current;
        record.current = (record.current + amount).clamp(0.0, record.max);
        let snapshot = *record;
        if snapshot.current == previous {
            return Ok(None);
        }

        // Отрицательная дельта = лечение
        self.on_health_changed.emit(&HealthChanged {
            entity,
            current: snapshot.current,
            max: snapshot.max,
            delta: -amount,
        });
        Ok(Some(HealthChange {
            previous,
            current: snapshot.current,
            max: snapshot.max,
            delta: -amount,
            died: false,
        }))
    }

    /// Absolute setter (scripted deaths). Same clamp and death semantics as damage.
    pub fn set_current_health(&mut self, entity: Entity, value: f32) -> Result<Option<HealthChange>, HealthError> {
        let record = self.record_mut(entity)?;
        let previous = record.current;
        let value = if value.is_nan() { previous } else { value };
        record.current = value.clamp(0.0, record.max);
        let snapshot = *record;
        if snapshot.current == previous {
            return Ok(None);
        }

        let died = snapshot.current <= 0.0 && previous > 0.0;
        self.on_health_changed.emit(&HealthChanged {
            entity,
            current: snapshot.current,
            max: snapshot.max,
            delta: 0.0,
        });
        if died {
            self.handle_death(entity, None);
        }

        Ok(Some(HealthChange {
            previous,
            current: snapshot.current,
            max: snapshot.max,
            delta: 0.0,
            died,
        }))
    }

    /// Rejects `new_max <= 0`. Clamps current down when it exceeds the new max.
    pub fn set_max_health(&mut self, entity: Entity, new_max: f32) -> Result<Option<HealthChange>, HealthError> {
        if !(new_max > 0.0) {
            logger::log_warning(&format!("MaxHealth must be greater than 0 (got {})", new_max));
            return Err(HealthError::NonPositiveMax(new_max));
        }

        let record = self.record_mut(entity)?;
        record.max = new_max;
        if record.current <= new_max {
            return Ok(None);
        }

        let previous = record.current;
        record.current = new_max;
        self.on_health_changed.emit(&HealthChanged {
            entity,
            current: new_max,
            max: new_max,
            delta: 0.0,
        });
        Ok(Some(HealthChange {
            previous,
            current: new_max,
            max: new_max,
            delta: 0.0,
            died: false,
        }))
    }

    /// Full reset: current = max, damage re-enabled.
    pub fn respawn(&mut self, entity: Entity) -> Result<(), HealthError> {
        let record = self.record_mut(entity)?;
        record.current = record.max;
        record.can_take_damage = true;
        let snapshot = *record;

        self.on_health_changed.emit(&HealthChanged {
            entity,
            current: snapshot.current,
            max: snapshot.max,
            delta: 0.0,
        });
        self.on_respawned.emit(&Respawned { entity });
        logger::log_info(&format!("{:?} respawned with {} health", entity, snapshot.max));
        Ok(())
    }

    fn handle_death(&mut self, entity: Entity, instigator: Option<Entity>) {
        if let Some(record) = self.records.get_mut(&entity) {
            record.can_take_damage = false;
        }
        self.pending_deaths.push(entity);
        self.on_death.emit(&Death { entity, instigator });
        logger::log_info(&format!("{:?} died (instigator: {:?})", entity, instigator));
    }

    fn record_mut(&mut self, entity: Entity) -> Result<&mut HealthRecord, HealthError> {
        if entity == Entity::PLACEHOLDER {
            return Err(HealthError::InvalidEntity);
        }
        self.records.get_mut(&entity).ok_or(HealthError::Untracked(entity))
    }

    // --- Queries ---

    pub fn record(&self, entity: Entity) -> Option<&HealthRecord> {
        self.records.get(&entity)
    }

    pub fn current_health(&self, entity: Entity) -> f32 {
        self.records.get(&entity).map(|record| record.current).unwrap_or(0.0)
    }

    pub fn max_health(&self, entity: Entity) -> f32 {
        self.records.get(&entity).map(|record| record.max).unwrap_or(0.0)
    }

    pub fn percentage(&self, entity: Entity) -> f32 {
        self.records.get(&entity).map(HealthRecord::percentage).unwrap_or(0.0)
    }

    /// Untracked entities are not dead.
    pub fn is_dead(&self, entity: Entity) -> bool {
        self.records.get(&entity).is_some_and(HealthRecord::is_dead)
    }

    pub fn auto_respawn_delay(&self, entity: Entity) -> Option<f32> {
        self.records.get(&entity).and_then(|record| record.auto_respawn)
    }

    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }

    /// Entities that died since the last call, whichever path killed them.
    pub fn take_pending_deaths(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.pending_deaths)
    }

    pub fn has_pending_deaths(&self) -> bool {
        !self.pending_deaths.is_empty()
    }

    pub fn prune(&mut self, is_alive: impl Fn(Entity) -> bool) -> usize {
        self.pending_deaths.retain(|entity| is_alive(*entity));
        let before = self.records.len();
        self.records.retain(|entity, _| is_alive(*entity));
        before - self.records.len()
    }

    pub fn enable_journal(&mut self) {
        self.on_health_changed.enable_journal();
        self.on_death.enable_journal();
        self.on_respawned.enable_journal();
    }
}

impl Damageable for HealthModel {
    fn can_receive_damage(&self, target: Entity) -> bool {
        self.records.contains_key(&target)
    }

    fn apply_damage(
        &mut self,
        target: Entity,
        amount: f32,
        instigator: Option<Entity>,
        _hit_location: Option<Vec3>,
    ) -> Option<HealthChange> {
        self.take_damage(target, amount, instigator)
    }
}

impl CoreSystem for HealthModel {
    fn name(&self) -> &'static str {
        "HealthModel"
    }

    /// Restores every tracked entity to full health.
    fn reset(&mut self) {
        for record in self.records.values_mut() {
            record.current = record.max;
            record.can_take_damage = true;
        }
        self.pending_deaths.clear();
        logger::log("HealthModel reset - restored all tracked entities");
    }

    fn status(&self) -> String {
        let dead = self.records.values().filter(|record| record.is_dead()).count();
        format!("{}: {} tracked, {} dead", self.name(), self.records.len(), dead)
    }
}
