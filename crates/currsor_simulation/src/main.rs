//! Headless симуляция Currsor
//!
//! Дуэль player vs enemy + разрушаемый ящик, fixed timestep без рендера.
//! Usage: `currsor_simulation [config.json]`

use std::time::Duration;

use bevy::prelude::*;
use currsor_simulation::logger::{self, LogLevel};
use currsor_simulation::{ActorSpec, CharacterIntent, GameConfig, GameSystemManager, SimulationPlugin, Velocity};

const TICKS: u32 = 900;
const SWING_EVERY: u32 = 30;
const SWING_LENGTH: u32 = 20;

fn main() {
    let mut config = match std::env::args().nth(1) {
        Some(path) => match GameConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => GameConfig::default(),
    };
    // Харнесс возвращает персонажей в Idle после Hurt/Attack
    config.state.recovery_rules = true;

    logger::init_logger();
    logger::set_log_level(LogLevel::Info);
    println!("Starting Currsor headless simulation (seed: {})", config.rng_seed);

    let step = Duration::from_secs_f64(1.0 / config.tick_hz);
    let health = config.health.clone();

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(config)
        .add_plugins(SimulationPlugin);

    let player = app
        .world_mut()
        .spawn((
            ActorSpec::player(&health),
            Transform::from_xyz(0.0, 0.0, 0.0),
            CharacterIntent::default(),
            Velocity::default(),
        ))
        .id();
    let enemy = app
        .world_mut()
        .spawn((
            ActorSpec::enemy(&health),
            Transform::from_xyz(1.5, 0.0, 0.0),
            CharacterIntent::default(),
            Velocity::default(),
        ))
        .id();
    let crate_box = app
        .world_mut()
        .spawn((ActorSpec::destructible(&health), Transform::from_xyz(3.0, 0.0, 0.0)))
        .id();

    for tick in 0..TICKS {
        match tick % SWING_EVERY {
            0 if tick > 0 => swing(&mut app, player, &[enemy, crate_box]),
            SWING_LENGTH => {
                set_attacking(&mut app, player, false);
                app.world_mut().resource_mut::<GameSystemManager>().end_attack(player);
            }
            _ => {}
        }

        app.world_mut().resource_mut::<Time<Fixed>>().advance_by(step);
        app.world_mut().run_schedule(FixedUpdate);

        if tick % 100 == 0 {
            let entity_count = app.world().entities().len();
            println!("Tick {}: {} entities", tick, entity_count);
        }
    }

    let manager = app.world().resource::<GameSystemManager>();
    println!("{}", manager.status_report());
    for record in manager.loot().history().iter() {
        println!("  loot: {}", record);
    }
    println!("Simulation complete!");
}

/// Hit the first living target, then open the attack window.
fn swing(app: &mut App, attacker: Entity, targets: &[Entity]) {
    let mut manager = app.world_mut().resource_mut::<GameSystemManager>();
    let Some(target) = targets
        .iter()
        .copied()
        .find(|target| manager.actor(*target).is_some() && !manager.health().is_dead(*target))
    else {
        return;
    };

    let intent = manager.attacks().default_intent(18.0).with_tag("Slash");
    match manager.try_attack(attacker, target, &intent) {
        Ok(report) => println!(
            "{:?} hits {:?} for {:.1}{} ({:.0} HP left)",
            attacker,
            target,
            report.damage,
            if report.critical { " (CRITICAL)" } else { "" },
            manager.health().current_health(target)
        ),
        Err(err) => println!("{:?} swing rejected: {}", attacker, err),
    }
    manager.begin_attack(attacker);
    drop(manager);

    set_attacking(app, attacker, true);
}

fn set_attacking(app: &mut App, entity: Entity, attacking: bool) {
    if let Some(mut intent) = app.world_mut().get_mut::<CharacterIntent>(entity) {
        intent.attacking = attacking;
    }
}
