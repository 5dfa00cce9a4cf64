//! Currsor Simulation Core
//!
//! Priority-gated combat simulation на Bevy 0.16 (strategic layer).
//!
//! HYBRID ARCHITECTURE:
//! - Core = game rules (state machine, health, attacks, loot)
//! - Host engine = rendering, animation, physics, input
//!
//! Host bridge вызывает контракты GameSystemManager и читает сигналы
//! (или Bevy events через `CombatCorePlugin`).

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod bridge;
pub mod combat;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod logger;
pub mod loot;
pub mod manager;
pub mod signal;
pub mod state;
pub mod timers;

// Re-export для удобства
pub use bridge::CombatCorePlugin;
pub use combat::{AttackIntent, AttackReport, AttackResolver};
pub use config::{GameConfig, RunAttackExitPolicy};
pub use error::{AttackError, ConfigError, ErrorKind, HealthError, LootError, TransitionError};
pub use events::*;
pub use health::{Damageable, HealthChange, HealthModel, HealthRecord};
pub use logger::{init_logger, log, log_error, log_info, log_warning, LogLevel, LogPrinter};
pub use loot::{LootDrop, LootEntry, LootResolver, Rarity, DEFAULT_TABLE};
pub use manager::{ActorKind, ActorSpec, CoreSystem, GameSystemManager, HealthMut, ManagerRegistry};
pub use state::{CharacterIntent, CharacterState, LocomotionThresholds, StateManager, TransitionRule, Velocity};
pub use timers::{SimClock, TimerAction, TimerHandle, TimerQueue};

/// Главный plugin симуляции: fixed timestep из конфига + combat core
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let tick_hz = app
            .world()
            .get_resource::<GameConfig>()
            .map(|config| config.tick_hz)
            .unwrap_or(60.0);

        app
            // Fixed timestep (60Hz по умолчанию) для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(tick_hz))
            .add_plugins(CombatCorePlugin);
    }
}

/// Детерминистичный RNG (seeded): все crit/loot броски идут через него
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Uniform draw in [0, 1), succeeds when `draw <= chance`.
    /// Chances are clamped to [0, 1]; `<= 0` never succeeds.
    pub fn roll_chance(&mut self, chance: f32) -> bool {
        if chance.is_nan() || chance <= 0.0 {
            return false;
        }
        let draw: f32 = self.rng.gen();
        draw <= chance.min(1.0)
    }

    /// Uniform integer in `[min, max]` (swapped if reversed).
    pub fn range_inclusive(&mut self, min: u32, max: u32) -> u32 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        self.rng.gen_range(low..=high)
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(GameConfig::default().with_seed(seed))
        .add_plugins(SimulationPlugin);

    app
}
