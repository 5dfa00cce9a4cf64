//! Combat module: attack gating и damage resolution
//!
//! Архитектура:
//! - `StartAttack` / `EndAttack` (animation layer) держат active-attacker set + combo
//! - `ProcessAttack` (hitbox hit) проверяет cooldown, считает урон, применяет
//!   его через `Damageable` capability
//!
//! Damage formula: `max(0, base × global_multiplier)`, × `critical_multiplier`
//! when the critical roll succeeds.

use bevy::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::config::AttackConfig;
use crate::error::AttackError;
use crate::events::{AttackEnded, AttackHit, AttackStarted};
use crate::health::{Damageable, HealthChange};
use crate::logger;
use crate::manager::CoreSystem;
use crate::signal::Signal;
use crate::DeterministicRng;


/// Per-call attack parameters. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackIntent {
    pub base_damage: f32,
    /// Clamped to [0, 1]
    pub critical_chance: f32,
    /// Clamped to >= 1
    pub critical_multiplier: f32,
    pub tag: String,
}

impl AttackIntent {
    pub fn new(base_damage: f32) -> Self {
        Self {
            base_damage,
            critical_chance: 0.0,
            critical_multiplier: 1.0,
            tag: String::from("Attack"),
        }
    }

    pub fn with_critical(mut self, chance: f32, multiplier: f32) -> Self {
        self.critical_chance = if chance.is_nan() { 0.0 } else { chance.clamp(0.0, 1.0) };
        self.critical_multiplier = if multiplier.is_nan() { 1.0 } else { multiplier.max(1.0) };
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Upper bound on damage this intent can deal under `global_multiplier`.
    pub fn max_damage(&self, global_multiplier: f32) -> f32 {
        (self.base_damage * global_multiplier).max(0.0) * self.critical_multiplier
    }
}

/// Outcome of a successful `ProcessAttack`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackReport {
    pub damage: f32,
    pub critical: bool,
    /// `None` when the target's HealthModel ignored the hit (already dead / invulnerable).
    pub applied: Option<HealthChange>,
}

impl AttackReport {
    pub fn killed_target(&self) -> bool {
        self.applied.is_some_and(|change| change.died)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ComboState {
    count: u32,
    last_start: f64,
}

pub struct AttackResolver {
    cooldown: f32,
    global_damage_multiplier: f32,
    combo_reset_window: f32,
    max_combo: u32,
    default_critical_chance: f32,
    default_critical_multiplier: f32,
    debug_logging: bool,

    active_attackers: HashSet<Entity>,
    last_attack: HashMap<Entity, f64>,
    combos: HashMap<Entity, ComboState>,
    total_attacks: u64,
    total_damage: f64,

    pub on_attack_started: Signal<AttackStarted>,
    pub on_attack_ended: Signal<AttackEnded>,
    pub on_attack_hit: Signal<AttackHit>,
}

impl Default for AttackResolver {
    fn default() -> Self {
        Self::new(&AttackConfig::default())
    }
}

impl AttackResolver {
    pub fn new(config: &AttackConfig) -> Self {
        logger::log(&format!(
            "AttackSystem initialized (cooldown {}s, multiplier {})",
            config.cooldown, config.global_damage_multiplier
        ));
        Self {
            cooldown: config.cooldown.max(0.0),
            global_damage_multiplier: config.global_damage_multiplier.max(0.0),
            combo_reset_window: config.combo_reset_window,
            max_combo: config.max_combo.max(1),
            default_critical_chance: config.default_critical_chance,
            default_critical_multiplier: config.default_critical_multiplier,
            debug_logging: config.debug_logging,
            active_attackers: HashSet::new(),
            last_attack: HashMap::new(),
            combos: HashMap::new(),
            total_attacks: 0,
            total_damage: 0.0,
            on_attack_started: Signal::new(),
            on_attack_ended: Signal::new(),
            on_attack_hit: Signal::new(),
        }
    }

    /// Intent with the configured default critical parameters.
    pub fn default_intent(&self, base_damage: f32) -> AttackIntent {
        AttackIntent::new(base_damage)
            .with_critical(self.default_critical_chance, self.default_critical_multiplier)
    }

    // --- Gating ---

    pub fn can_attack(&self, attacker: Entity, now: f64) -> bool {
        self.check_can_attack(attacker, now).is_ok()
    }

    fn check_can_attack(&self, attacker: Entity, now: f64) -> Result<(), AttackError> {
        if self.active_attackers.contains(&attacker) {
            return Err(AttackError::AlreadyAttacking(attacker));
        }
        if let Some(last) = self.last_attack.get(&attacker) {
            let elapsed = (now - last) as f32;
            if elapsed < self.cooldown {
                return Err(AttackError::CooldownActive {
                    remaining: self.cooldown - elapsed,
                });
            }
        }
        Ok(())
    }

    pub fn cooldown_remaining(&self, attacker: Entity, now: f64) -> f32 {
        self.last_attack
            .get(&attacker)
            .map(|last| (self.cooldown - (now - last) as f32).max(0.0))
            .unwrap_or(0.0)
    }

    // --- Damage ---

    /// Returns (damage, critical). Rolls only when the chance is positive.
    pub fn calculate_damage(&self, intent: &AttackIntent, rng: &mut DeterministicRng) -> (f32, bool) {
        let damage = (intent.base_damage * self.global_damage_multiplier).max(0.0);
        if intent.critical_chance > 0.0 && rng.roll_chance(intent.critical_chance) {
            (damage * intent.critical_multiplier.max(1.0), true)
        } else {
            (damage, false)
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn process_attack(
        &mut self,
        attacker: Entity,
        target: Entity,
        intent: &AttackIntent,
        hit_location: Option<Vec3>,
        now: f64,
        rng: &mut DeterministicRng,
        targets: &mut impl Damageable,
    ) -> bool {
        match self.try_process_attack(attacker, target, intent, hit_location, now, rng, targets) {
            Ok(_) => true,
            Err(err) => {
                match err {
                    AttackError::InvalidEntity | AttackError::NotDamageable(_) => {
                        logger::log_error(&format!("ProcessAttack: {}", err));
                    }
                    _ if self.debug_logging => {
                        logger::log_warning(&format!("ProcessAttack rejected for {:?}: {}", attacker, err));
                    }
                    _ => {}
                }
                false
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn try_process_attack(
        &mut self,
        attacker: Entity,
        target: Entity,
        intent: &AttackIntent,
        hit_location: Option<Vec3>,
        now: f64,
        rng: &mut DeterministicRng,
        targets: &mut impl Damageable,
    ) -> Result<AttackReport, AttackError> {
        if attacker == Entity::PLACEHOLDER || target == Entity::PLACEHOLDER {
            return Err(AttackError::InvalidEntity);
        }
        self.check_can_attack(attacker, now)?;
        if !targets.can_receive_damage(target) {
            return Err(AttackError::NotDamageable(target));
        }

        let (damage, critical) = self.calculate_damage(intent, rng);
        let applied = targets.apply_damage(target, damage, Some(attacker), hit_location);

        self.total_attacks += 1;
        self.total_damage += f64::from(damage);
        self.last_attack.insert(attacker, now);

        self.on_attack_hit.emit(&AttackHit {
            attacker,
            target,
            damage,
            critical,
        });
        if self.debug_logging {
            logger::log(&format!(
                "Attack hit: {:?} -> {:?}, damage {:.1}{}",
                attacker,
                target,
                damage,
                if critical { " (CRITICAL)" } else { "" }
            ));
        }

        Ok(AttackReport {
            damage,
            critical,
            applied,
        })
    }

    // --- Attack window (animation driven) ---

    pub fn start_attack(&mut self, attacker: Entity, attack_type: &str, now: f64) -> bool {
        match self.try_start_attack(attacker, attack_type, now) {
            Ok(_) => true,
            Err(err) => {
                logger::log_warning(&format!("StartAttack: {}", err));
                false
            }
        }
    }

    /// Returns the new combo count.
    pub fn try_start_attack(&mut self, attacker: Entity, attack_type: &str, now: f64) -> Result<u32, AttackError> {
        if attacker == Entity::PLACEHOLDER {
            return Err(AttackError::InvalidEntity);
        }
        if !self.active_attackers.insert(attacker) {
            return Err(AttackError::AlreadyAttacking(attacker));
        }

        let combo = match self.combos.get(&attacker) {
            Some(state) if ((now - state.last_start) as f32) <= self.combo_reset_window => {
                (state.count + 1).min(self.max_combo)
            }
            _ => 1,
        };
        self.combos.insert(
            attacker,
            ComboState {
                count: combo,
                last_start: now,
            },
        );

        self.on_attack_started.emit(&AttackStarted {
            attacker,
            attack_type: attack_type.to_string(),
            combo,
        });
        if self.debug_logging {
            logger::log(&format!(
                "Attack started: {:?}, Type: {}, Combo: {}",
                attacker, attack_type, combo
            ));
        }
        Ok(combo)
    }

    /// False when the attacker was not mid-attack.
    pub fn end_attack(&mut self, attacker: Entity) -> bool {
        if !self.active_attackers.remove(&attacker) {
            return false;
        }
        self.on_attack_ended.emit(&AttackEnded { attacker });
        true
    }

    // --- Queries ---

    pub fn is_attacking(&self, attacker: Entity) -> bool {
        self.active_attackers.contains(&attacker)
    }

    pub fn combo_count(&self, attacker: Entity) -> u32 {
        self.combos.get(&attacker).map(|state| state.count).unwrap_or(0)
    }

    pub fn total_attacks(&self) -> u64 {
        self.total_attacks
    }

    pub fn total_damage(&self) -> f64 {
        self.total_damage
    }

    pub fn cooldown(&self) -> f32 {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: f32) {
        self.cooldown = cooldown.max(0.0);
    }

    pub fn global_damage_multiplier(&self) -> f32 {
        self.global_damage_multiplier
    }

    pub fn set_global_damage_multiplier(&mut self, multiplier: f32) {
        self.global_damage_multiplier = multiplier.max(0.0);
    }

    // --- Lifecycle ---

    pub fn forget(&mut self, entity: Entity) {
        self.active_attackers.remove(&entity);
        self.last_attack.remove(&entity);
        self.combos.remove(&entity);
    }

    pub fn prune(&mut self, is_alive: impl Fn(Entity) -> bool) -> usize {
        let before = self.active_attackers.len() + self.last_attack.len() + self.combos.len();
        self.active_attackers.retain(|entity| is_alive(*entity));
        self.last_attack.retain(|entity, _| is_alive(*entity));
        self.combos.retain(|entity, _| is_alive(*entity));
        before - (self.active_attackers.len() + self.last_attack.len() + self.combos.len())
    }

    pub fn enable_journal(&mut self) {
        self.on_attack_started.enable_journal();
        self.on_attack_ended.enable_journal();
        self.on_attack_hit.enable_journal();
    }
}

impl CoreSystem for AttackResolver {
    fn name(&self) -> &'static str {
        "AttackSystem"
    }

    fn reset(&mut self) {
        self.active_attackers.clear();
        self.last_attack.clear();
        self.combos.clear();
        self.total_attacks = 0;
        self.total_damage = 0.0;
        logger::log("AttackSystem reset");
    }

    fn status(&self) -> String {
        format!(
            "{}: {} attacks, {:.1} total damage, {} mid-attack",
            self.name(),
            self.total_attacks,
            self.total_damage,
            self.active_attackers.len()
        )
    }
}
