//! Actor archetypes (player / enemy / destructible).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::HealthConfig;
use crate::loot::DEFAULT_TABLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum ActorKind {
    Player,
    Enemy,
    Destructible,
}

/// What the core needs to know about an actor at spawn time.
///
/// Attach to an entity and `CombatCorePlugin` registers it on the next tick.
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub struct ActorSpec {
    pub kind: ActorKind,
    pub max_health: f32,
    /// Respawn delay after death (seconds). Takes precedence over `destroy_delay`.
    pub auto_respawn: Option<f32>,
    /// Table rolled on death
    pub loot_table: Option<String>,
    /// Remove from the core this long after death (seconds)
    pub destroy_delay: Option<f32>,
}

impl ActorSpec {
    /// Игрок: респавн через respawn_delay, без лута
    pub fn player(config: &HealthConfig) -> Self {
        Self {
            kind: ActorKind::Player,
            max_health: config.player_max_health,
            auto_respawn: Some(config.respawn_delay),
            loot_table: None,
            destroy_delay: None,
        }
    }

    pub fn enemy(config: &HealthConfig) -> Self {
        Self {
            kind: ActorKind::Enemy,
            max_health: config.enemy_max_health,
            auto_respawn: None,
            loot_table: Some(DEFAULT_TABLE.to_string()),
            destroy_delay: Some(config.destroy_delay),
        }
    }

    pub fn destructible(config: &HealthConfig) -> Self {
        Self {
            kind: ActorKind::Destructible,
            max_health: config.destructible_max_health,
            auto_respawn: None,
            loot_table: Some(DEFAULT_TABLE.to_string()),
            destroy_delay: Some(config.destroy_delay),
        }
    }

    pub fn with_max_health(mut self, max_health: f32) -> Self {
        self.max_health = max_health;
        self
    }

    pub fn with_loot_table(mut self, table: impl Into<String>) -> Self {
        self.loot_table = Some(table.into());
        self
    }

    pub fn without_loot(mut self) -> Self {
        self.loot_table = None;
        self
    }

    pub fn with_auto_respawn(mut self, delay: Option<f32>) -> Self {
        self.auto_respawn = delay;
        self
    }

    pub fn with_destroy_delay(mut self, delay: Option<f32>) -> Self {
        self.destroy_delay = delay;
        self
    }
}
