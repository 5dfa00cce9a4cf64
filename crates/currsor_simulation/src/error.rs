//! Error types for every core subsystem.
//!
//! Nothing here is fatal. Each error maps onto one [`ErrorKind`] so callers
//! (UI feedback, scripting) can react by category without matching variants.

use bevy::prelude::*;
use thiserror::Error;

use crate::state::CharacterState;

/// Failure category shared by all subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Null/invalid entity or target. Operation is a no-op.
    InvalidArgument,
    /// Cooldown active, already attacking, already dead, transition disallowed.
    PreconditionNotMet,
    /// Bad configuration value. The call degrades gracefully.
    ConfigurationError,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("invalid entity handle")]
    InvalidEntity,
    #[error("{from:?} (higher priority) cannot be preempted by {to:?}")]
    PriorityPreempted {
        from: CharacterState,
        to: CharacterState,
    },
    #[error("transition {from:?} -> {to:?} is forbidden by rule")]
    RuleForbidden {
        from: CharacterState,
        to: CharacterState,
    },
    #[error("{from:?} -> {to:?} needs {required:.3}s in state, only {elapsed:.3}s elapsed")]
    MinDurationUnmet {
        from: CharacterState,
        to: CharacterState,
        elapsed: f32,
        required: f32,
    },
}

impl TransitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransitionError::InvalidEntity => ErrorKind::InvalidArgument,
            _ => ErrorKind::PreconditionNotMet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HealthError {
    #[error("invalid entity handle")]
    InvalidEntity,
    #[error("entity {0:?} has no health record")]
    Untracked(Entity),
    #[error("max health must be greater than 0 (got {0})")]
    NonPositiveMax(f32),
}

impl HealthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HealthError::InvalidEntity | HealthError::Untracked(_) => ErrorKind::InvalidArgument,
            HealthError::NonPositiveMax(_) => ErrorKind::ConfigurationError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttackError {
    #[error("invalid attacker or target handle")]
    InvalidEntity,
    #[error("attacker {0:?} is already mid-attack")]
    AlreadyAttacking(Entity),
    #[error("attack on cooldown ({remaining:.3}s remaining)")]
    CooldownActive { remaining: f32 },
    #[error("target {0:?} cannot receive damage")]
    NotDamageable(Entity),
}

impl AttackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AttackError::InvalidEntity | AttackError::NotDamageable(_) => ErrorKind::InvalidArgument,
            AttackError::AlreadyAttacking(_) | AttackError::CooldownActive { .. } => {
                ErrorKind::PreconditionNotMet
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LootError {
    #[error("invalid loot source handle")]
    InvalidSource,
    #[error("loot table name is empty")]
    EmptyTableName,
    #[error("loot table '{0}' has no entries")]
    EmptyTable(String),
    #[error("loot entry '{name}' is invalid: {reason}")]
    InvalidEntry { name: String, reason: String },
    #[error("no loot table resolves for '{0}'")]
    NoTable(String),
}

impl LootError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LootError::InvalidSource => ErrorKind::InvalidArgument,
            _ => ErrorKind::ConfigurationError,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigurationError
    }
}
