//! GameConfig: все игровые параметры в одном месте
//!
//! Defaults are the shipped values; a JSON file may override any subset of
//! fields (missing fields fall back to defaults).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::loot::LootEntry;
use crate::state::{CharacterState, LocomotionThresholds};

/// Open question policy: does RunAttack → Idle inherit Attack's dwell rule?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunAttackExitPolicy {
    /// RunAttack has no dwell rule of its own.
    #[default]
    Independent,
    /// RunAttack → Idle waits `attack_min_duration`, same as Attack → Idle.
    InheritAttackDwell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub priority_overrides: HashMap<CharacterState, i32>,
    /// Attack → Idle dwell (seconds)
    pub attack_min_duration: f32,
    /// Used by `has_min_duration_passed`
    pub default_min_state_duration: f32,
    pub run_attack_exit: RunAttackExitPolicy,
    /// Seeds allowing rules for every downgrade (Hurt → Idle, Fall → Idle...).
    /// Off by default: only Dead/Attack rules are seeded.
    pub recovery_rules: bool,
    pub debug_logging: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            priority_overrides: HashMap::new(),
            attack_min_duration: 0.3,
            default_min_state_duration: 0.1,
            run_attack_exit: RunAttackExitPolicy::Independent,
            recovery_rules: false,
            debug_logging: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Seconds between successful hits of one attacker
    pub cooldown: f32,
    pub global_damage_multiplier: f32,
    /// Combo counter resets if the previous attack started longer ago than this
    pub combo_reset_window: f32,
    pub max_combo: u32,
    pub default_critical_chance: f32,
    pub default_critical_multiplier: f32,
    pub debug_logging: bool,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            cooldown: 0.5,
            global_damage_multiplier: 1.0,
            combo_reset_window: 2.0,
            max_combo: 5,
            default_critical_chance: 0.1,
            default_critical_multiplier: 2.0,
            debug_logging: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub player_max_health: f32,
    pub enemy_max_health: f32,
    pub destructible_max_health: f32,
    /// Delay for actors spawned with auto-respawn
    pub respawn_delay: f32,
    /// Leftover delay before a destroyed actor is removed
    pub destroy_delay: f32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            player_max_health: 100.0,
            enemy_max_health: 50.0,
            destructible_max_health: 50.0,
            respawn_delay: 3.0,
            destroy_delay: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootConfig {
    pub global_drop_multiplier: f32,
    pub history_capacity: usize,
    /// Extra tables registered at start-up (same name replaces the default)
    pub tables: HashMap<String, Vec<LootEntry>>,
    pub debug_logging: bool,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            global_drop_multiplier: 1.0,
            history_capacity: 50,
            tables: HashMap::new(),
            debug_logging: true,
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub state: StateConfig,
    pub locomotion: LocomotionThresholds,
    pub attack: AttackConfig,
    pub health: HealthConfig,
    pub loot: LootConfig,
    pub rng_seed: u64,
    pub tick_hz: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            state: StateConfig::default(),
            locomotion: LocomotionThresholds::default(),
            attack: AttackConfig::default(),
            health: HealthConfig::default(),
            loot: LootConfig::default(),
            rng_seed: 42,
            tick_hz: 60.0,
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid(reason));

        if !(self.tick_hz > 0.0) {
            return invalid(format!("tick_hz must be positive (got {})", self.tick_hz));
        }
        for (name, value) in [
            ("player_max_health", self.health.player_max_health),
            ("enemy_max_health", self.health.enemy_max_health),
            ("destructible_max_health", self.health.destructible_max_health),
        ] {
            if !(value > 0.0) {
                return invalid(format!("health.{} must be positive (got {})", name, value));
            }
        }
        if self.health.respawn_delay < 0.0 || self.health.destroy_delay < 0.0 {
            return invalid("health delays must not be negative".to_string());
        }
        if self.locomotion.walk < 0.0 || self.locomotion.run < self.locomotion.walk {
            return invalid(format!(
                "locomotion thresholds must satisfy 0 <= walk <= run (walk {}, run {})",
                self.locomotion.walk, self.locomotion.run
            ));
        }
        if self.attack.cooldown < 0.0 {
            return invalid(format!("attack.cooldown must not be negative (got {})", self.attack.cooldown));
        }
        if self.attack.global_damage_multiplier < 0.0 {
            return invalid("attack.global_damage_multiplier must not be negative".to_string());
        }
        if self.state.attack_min_duration < 0.0 {
            return invalid("state.attack_min_duration must not be negative".to_string());
        }
        if self.loot.global_drop_multiplier < 0.0 {
            return invalid("loot.global_drop_multiplier must not be negative".to_string());
        }
        if self.loot.history_capacity == 0 {
            return invalid("loot.history_capacity must be at least 1".to_string());
        }
        for (table, entries) in &self.loot.tables {
            for entry in entries {
                if let Err(reason) = entry.check() {
                    return invalid(format!("loot table '{}' entry '{}': {}", table, entry.name, reason));
                }
            }
        }

        Ok(())
    }
}
