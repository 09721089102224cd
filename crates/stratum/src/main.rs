//! # STRATUM Driver
//!
//! Headless frame loop over the core ECS:
//!
//! ```text
//! Network thread:   CLIENT_<n> join/leave  ──► CommandSender
//!                                                  │
//! Frame N:          1. apply queued commands ◄─────┘
//!                   2. gravity → kinematic → camera
//! After last frame: backup, perturb, restore, report
//! ```
//!
//! ```bash
//! RUST_LOG=stratum=debug stratum --frames 300 --clients 8
//! stratum --config world.toml
//! ```

mod components;
mod systems;

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use stratum_core::sync::Command;
use stratum_core::{CommandQueue, CommandSender, Coordinator, WorldConfig};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::components::{Camera, Gravity, Kinematic, Transform, SCREEN_HEIGHT, SCREEN_WIDTH};

/// STRATUM headless driver
#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(about = "Runs the STRATUM ECS headless for a fixed number of frames", long_about = None)]
struct Args {
    /// Number of frames to simulate
    #[arg(short, long, default_value = "120")]
    frames: u32,

    /// Remote players the network thread spawns
    #[arg(short, long, default_value = "4")]
    clients: u32,

    /// Fixed timestep in seconds
    #[arg(long, default_value = "0.016666668")]
    dt: f32,

    /// World configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final snapshot as JSON to this path
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stratum=info,stratum_core=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting STRATUM v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config.as_ref())?;
    info!(
        "World: {} entities, {} component types",
        config.max_entities, config.max_components
    );

    let world = Coordinator::shared(config)?;
    world.register_component::<Transform>()?;
    world.register_component::<Kinematic>()?;
    world.register_component::<Gravity>()?;
    world.register_component::<Camera>()?;

    let systems = systems::register(&world)?;

    let camera = world.create_named_entity("CAMERA")?;
    world.add_component(camera, Camera::default())?;

    let player = world.create_named_entity("CHAR")?;
    world.add_component(player, Transform::new(SCREEN_WIDTH / 2.0, SCREEN_HEIGHT * 3.0 / 4.0, 32.0, 32.0))?;
    world.add_component(player, Kinematic { vx: 120.0, ..Kinematic::default() })?;
    world.add_component(player, Gravity { x: 0.0, y: 98.0 })?;
    systems.camera.lock().target = Some(player);

    let queue = CommandQueue::default();
    let network = spawn_network(queue.sender(), args.clients);

    // === FRAME LOOP ===
    for frame in 0..args.frames {
        let report = world.apply_commands(&queue);
        if report.total() > 0 {
            debug!(
                "Frame {}: applied {} commands ({} failed)",
                frame,
                report.applied,
                report.failed.len()
            );
        }
        systems.update(&world, args.dt)?;
    }

    // Keep draining so a blocked sender can finish
    let mut late = 0;
    while !network.is_finished() {
        late += world.apply_commands(&queue).total();
        thread::yield_now();
    }
    if network.join().is_err() {
        warn!("Network thread panicked");
    }
    late += world.apply_commands(&queue).total();
    info!(
        "Simulated {} frames; {} live entities, {} late commands",
        args.frames,
        world.live_entity_count(),
        late
    );

    // === SNAPSHOT DEMO ===
    let captured = world.backup(components::serialize)?;
    let before = world.component_cloned::<Transform>(player)?;
    world.with_component_mut::<Transform, _>(player, |t| {
        t.x = -1.0;
        t.y = -1.0;
    })?;
    let restored = world.restore(components::deserialize)?;
    let after = world.component_cloned::<Transform>(player)?;
    info!(
        "Backed up {} entities, restored {}; CHAR at ({:.1}, {:.1})",
        captured, restored, after.x, after.y
    );
    if after != before {
        warn!("Restore did not roll CHAR back: {:?} != {:?}", after, before);
    }

    if let Some(path) = &args.snapshot_out {
        let json = world.snapshot().to_json()?;
        std::fs::write(path, json).with_context(|| format!("writing snapshot to {}", path.display()))?;
        info!("Snapshot written to {}", path.display());
    }

    report_positions(&world);
    info!(
        "Updates: gravity {}, kinematic {}",
        systems.gravity.lock().updates,
        systems.kinematic.lock().updates
    );
    info!("Closing STRATUM");
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<WorldConfig> {
    let Some(path) = path else {
        return Ok(WorldConfig::default());
    };
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config = WorldConfig::from_toml_str(&source).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Simulates remote players joining over the network, then the first one
/// leaving. Every structural change goes through the command queue; sends
/// wait for room so a join is never half-recorded.
fn spawn_network(sender: CommandSender, clients: u32) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for n in 0..clients {
            let name = format!("CLIENT_{n}");
            #[allow(clippy::cast_precision_loss)]
            let offset = n as f32 * 40.0;

            let joined = [
                Command::create_named(name.as_str()),
                Command::insert(name.as_str(), Transform::new(offset, 0.0, 32.0, 32.0)),
                Command::insert(name.as_str(), Kinematic { vx: 30.0, vy: 0.0, ax: 0.0, ay: 0.0 }),
                Command::insert(name.as_str(), Gravity { x: 0.0, y: 49.0 }),
            ]
            .into_iter()
            .all(|command| sender.send_blocking(command));
            if !joined {
                warn!("Frame loop gone, {} not joined", name);
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        if clients > 0 && !sender.send_blocking(Command::destroy("CLIENT_0")) {
            warn!("Frame loop gone, CLIENT_0 not removed");
        }
    })
}

fn report_positions(world: &Coordinator) {
    let mut named: Vec<_> = world.entity_ids().into_iter().collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, entity) in named {
        match world.component_cloned::<Transform>(entity) {
            Ok(t) => info!("{:<10} {:>4} at ({:8.1}, {:8.1})", name, entity, t.x, t.y),
            Err(_) => info!("{:<10} {:>4}", name, entity),
        }
    }
}
