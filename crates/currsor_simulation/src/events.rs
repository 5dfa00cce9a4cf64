//! Signal payloads emitted by the core.
//!
//! Every payload is also a Bevy `Event`: `CombatCorePlugin` forwards the
//! journaled signals so ECS systems (UI, audio, VFX bridges) can read them
//! with `EventReader`.

use bevy::prelude::*;

use crate::loot::LootDrop;
use crate::state::CharacterState;

/// Состояние entity сменилось (после успешного ChangeState)
#[derive(Event, Debug, Clone, PartialEq)]
pub struct StateChanged {
    pub entity: Entity,
    pub new_state: CharacterState,
    pub old_state: CharacterState,
}

/// Переход отклонён валидацией (UI feedback, звуки)
#[derive(Event, Debug, Clone, PartialEq)]
pub struct TransitionFailed {
    pub entity: Entity,
    pub attempted: CharacterState,
}

/// Health changed.
///
/// `delta` convention: damage reports the requested amount (positive),
/// heals report the negated amount, absolute setters report 0.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct HealthChanged {
    pub entity: Entity,
    pub current: f32,
    pub max: f32,
    pub delta: f32,
}

/// Health reached 0. Fired once per depletion.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct Death {
    pub entity: Entity,
    pub instigator: Option<Entity>,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct Respawned {
    pub entity: Entity,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct AttackStarted {
    pub attacker: Entity,
    pub attack_type: String,
    pub combo: u32,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct AttackEnded {
    pub attacker: Entity,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct AttackHit {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: f32,
    pub critical: bool,
}

/// One per `GenerateLoot` call that dropped at least one item.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct LootGenerated {
    pub source: Entity,
    pub items: Vec<LootDrop>,
    pub location: Vec3,
}

/// Entity finished its destroy-on-death delay and left every core table.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct EntityDestroyed {
    pub entity: Entity,
}
