//! ECS bridge: GameSystemManager as a Bevy resource.
//!
//! FixedUpdate chain (один тик):
//! 1. advance_simulation_clock: Time<Fixed> delta, due timers fire
//! 2. register_spawned_actors: Added<ActorSpec>
//! 3. sync_actor_locations: Transform → loot drop location
//! 4. recompute_character_states: CharacterIntent + Velocity → state
//! 5. prune_stale_entities: lazy reaping against `Entities`
//! 6. despawn_destroyed_entities: actors whose destroy timer fired
//! 7. forward_core_signals: signal journal → Bevy events

use bevy::ecs::entity::Entities;
use bevy::prelude::*;

use crate::config::GameConfig;
use crate::events::{
    AttackEnded, AttackHit, AttackStarted, Death, EntityDestroyed, HealthChanged, LootGenerated, Respawned,
    StateChanged, TransitionFailed,
};
use crate::logger;
use crate::manager::{ActorSpec, GameSystemManager};
use crate::state::{CharacterIntent, CharacterState, LocomotionThresholds, Velocity};

pub struct CombatCorePlugin;

impl Plugin for CombatCorePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<GameConfig>() {
            app.insert_resource(GameConfig::default());
        }
        let config = app.world().resource::<GameConfig>().clone();
        let mut manager = GameSystemManager::new(config);
        manager.enable_event_journal();

        app.insert_resource(manager)
            .register_type::<ActorSpec>()
            .register_type::<CharacterIntent>()
            .register_type::<Velocity>()
            .register_type::<LocomotionThresholds>()
            .register_type::<CharacterState>()
            .add_event::<StateChanged>()
            .add_event::<TransitionFailed>()
            .add_event::<HealthChanged>()
            .add_event::<Death>()
            .add_event::<Respawned>()
            .add_event::<AttackStarted>()
            .add_event::<AttackEnded>()
            .add_event::<AttackHit>()
            .add_event::<LootGenerated>()
            .add_event::<EntityDestroyed>()
            .add_systems(
                FixedUpdate,
                (
                    advance_simulation_clock,
                    register_spawned_actors,
                    sync_actor_locations,
                    recompute_character_states,
                    prune_stale_entities,
                    despawn_destroyed_entities,
                    forward_core_signals,
                )
                    .chain(),
            );
    }
}

pub fn advance_simulation_clock(time: Res<Time<Fixed>>, mut manager: ResMut<GameSystemManager>) {
    manager.advance(time.delta_secs());
}

pub fn register_spawned_actors(
    query: Query<(Entity, &ActorSpec, Option<&Transform>), Added<ActorSpec>>,
    mut manager: ResMut<GameSystemManager>,
) {
    for (entity, spec, transform) in query.iter() {
        if let Err(err) = manager.spawn_actor(entity, spec.clone()) {
            logger::log_warning(&format!("Actor {:?} not registered: {}", entity, err));
            continue;
        }
        if let Some(transform) = transform {
            manager.set_location(entity, transform.translation);
        }
    }
}

pub fn sync_actor_locations(
    query: Query<(Entity, &Transform), (With<ActorSpec>, Changed<Transform>)>,
    mut manager: ResMut<GameSystemManager>,
) {
    for (entity, transform) in query.iter() {
        manager.set_location(entity, transform.translation);
    }
}

pub fn recompute_character_states(
    query: Query<(Entity, &CharacterIntent, Option<&Velocity>, Option<&LocomotionThresholds>), With<ActorSpec>>,
    mut manager: ResMut<GameSystemManager>,
) {
    for (entity, intent, velocity, thresholds) in query.iter() {
        // Уже уничтожен core (despawn ещё не применён)
        if manager.actor(entity).is_none() {
            continue;
        }
        let velocity = velocity.map(|v| v.0).unwrap_or(Vec3::ZERO);
        manager.update_character_state(entity, intent, velocity, thresholds);
    }
}

pub fn prune_stale_entities(entities: &Entities, mut manager: ResMut<GameSystemManager>) {
    manager.prune_stale(|entity| entities.contains(entity));
}

pub fn despawn_destroyed_entities(mut commands: Commands, mut manager: ResMut<GameSystemManager>) {
    for entity in manager.take_destroyed() {
        if let Ok(mut entity_commands) = commands.get_entity(entity) {
            entity_commands.despawn();
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn forward_core_signals(
    mut manager: ResMut<GameSystemManager>,
    mut state_changed: EventWriter<StateChanged>,
    mut transition_failed: EventWriter<TransitionFailed>,
    mut health_changed: EventWriter<HealthChanged>,
    mut deaths: EventWriter<Death>,
    mut respawned: EventWriter<Respawned>,
    mut attack_started: EventWriter<AttackStarted>,
    mut attack_ended: EventWriter<AttackEnded>,
    mut attack_hits: EventWriter<AttackHit>,
    mut loot_generated: EventWriter<LootGenerated>,
    mut destroyed: EventWriter<EntityDestroyed>,
) {
    let signals = manager.drain_signals();
    if signals.is_empty() {
        return;
    }

    state_changed.write_batch(signals.state_changed);
    transition_failed.write_batch(signals.transition_failed);
    health_changed.write_batch(signals.health_changed);
    deaths.write_batch(signals.deaths);
    respawned.write_batch(signals.respawned);
    attack_started.write_batch(signals.attack_started);
    attack_ended.write_batch(signals.attack_ended);
    attack_hits.write_batch(signals.attack_hits);
    loot_generated.write_batch(signals.loot_generated);
    destroyed.write_batch(signals.destroyed);
}
