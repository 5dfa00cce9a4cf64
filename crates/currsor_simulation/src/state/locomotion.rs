//! Per-tick intent → desired state.
//!
//! Контроллер (player input / AI) пишет CharacterIntent + Velocity,
//! `recompute_character_states` раз в тик вызывает `derive_state`.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::CharacterState;

/// Boolean intents supplied by the controller every tick.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct CharacterIntent {
    pub dashing: bool,
    pub attacking: bool,
    pub jumping: bool,
    /// Forced walk (e.g. walk toggle) even below the walk threshold.
    pub walking: bool,
    pub hurt: bool,
}

/// Linear velocity (units/s) reported by the physics layer. Y is up.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Velocity(pub Vec3);

/// Speed thresholds per entity class.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct LocomotionThresholds {
    pub walk: f32,
    pub run: f32,
    /// Attacking above this speed selects RunAttack instead of Attack.
    pub run_attack: f32,
}

impl Default for LocomotionThresholds {
    fn default() -> Self {
        Self {
            walk: 10.0,
            run: 700.0,
            run_attack: 10.0,
        }
    }
}

/// Fixed priority order:
/// Dead > Hurt > Dash > Attack/RunAttack > Jump > Fall > Run > Walk > Idle
pub fn derive_state(
    intent: &CharacterIntent,
    velocity: Vec3,
    thresholds: &LocomotionThresholds,
    is_dead: bool,
) -> CharacterState {
    let speed = velocity.length();

    if is_dead {
        CharacterState::Dead
    } else if intent.hurt {
        CharacterState::Hurt
    } else if intent.dashing {
        CharacterState::Dash
    } else if intent.attacking {
        if speed > thresholds.run_attack {
            CharacterState::RunAttack
        } else {
            CharacterState::Attack
        }
    } else if intent.jumping {
        CharacterState::Jump
    } else if velocity.y < 0.0 {
        CharacterState::Fall
    } else if speed > thresholds.run {
        CharacterState::Run
    } else if speed > thresholds.walk || intent.walking {
        CharacterState::Walk
    } else {
        CharacterState::Idle
    }
}
