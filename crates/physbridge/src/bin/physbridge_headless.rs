//! # physbridge Headless
//!
//! Drops a stack of boxes onto a floor in the sandbox engine, driven
//! through the worker thread exactly like a scene would drive it.
//!
//! ## Usage
//!
//! ```bash
//! physbridge_headless --ticks 180 --boxes 5 --config backend.toml
//! ```

use std::time::Instant;

use physbridge::{BackendWorker, ClientEvent, ClientResult, PhysicsClient, WorkerMessage};
use physbridge_backend::{BackendConfig, SandboxEngine};
use physbridge_core::Vec3;
use physbridge_protocol::{BodyDesc, CreateCommand, MotionType, ShapeSettings};

const FLOOR: u32 = 0;

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         PHYSBRIDGE HEADLESS                                      ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let mut ticks = 180u32;
    let mut boxes = 5u32;
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" | "-t" => {
                if i + 1 < args.len() {
                    ticks = args[i + 1].parse().unwrap_or(180);
                    i += 1;
                }
            }
            "--boxes" | "-b" => {
                if i + 1 < args.len() {
                    boxes = args[i + 1].parse().unwrap_or(5);
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: physbridge_headless [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --ticks <N>        Ticks to run at 60 Hz (default: 180)");
                println!("  -b, --boxes <N>        Boxes to drop (default: 5)");
                println!("  -c, --config <PATH>    Backend config TOML");
                println!("  -h, --help             Show this help");
                return;
            }
            _ => {}
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => match BackendConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                std::process::exit(1);
            }
        },
        None => BackendConfig::default(),
    };

    if let Err(e) = run(config, ticks, boxes) {
        eprintln!("Headless run failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: BackendConfig, ticks: u32, boxes: u32) -> ClientResult<()> {
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Fixed step:   {:.5} s", config.fixed_step);
    println!("│ Sub steps:    {}", config.sub_steps);
    println!("│ Ticks:        {ticks}");
    println!("│ Boxes:        {boxes}");
    println!("└─────────────────────────────────────────────────────────────────┘");
    println!();

    let worker = BackendWorker::spawn(SandboxEngine::from_config(&config), config)?;
    if let WorkerMessage::Startup(constants) = worker.receive()? {
        println!(
            "Protocol v{}: {} commands, {} enums",
            constants.protocol_version,
            constants.commands.len(),
            constants.enums.len()
        );
    }

    let mut client = PhysicsClient::default();
    let floor = BodyDesc::new(FLOOR, ShapeSettings::cuboid(Vec3::new(20.0, 0.5, 20.0)), MotionType::Static)
        .at(Vec3::new(0.0, -0.5, 0.0));
    client.push(CreateCommand::Body(Box::new(floor)))?;
    for pcid in 1..=boxes {
        #[allow(clippy::cast_precision_loss)]
        let height = 2.0 + pcid as f32 * 2.5;
        let desc = BodyDesc::new(pcid, ShapeSettings::cuboid(Vec3::new(0.5, 0.5, 0.5)), MotionType::Dynamic)
            .at(Vec3::new(0.0, height, 0.0));
        client.push(CreateCommand::Body(Box::new(desc)))?;
    }

    let start = Instant::now();
    let mut contacts = 0usize;
    for _ in 0..ticks {
        let inbound = (client.queued() > 0).then(|| client.flush());
        let Some(output) = worker.step(inbound, 1.0 / 60.0)? else {
            continue;
        };
        for event in client.apply(&output)? {
            if let ClientEvent::Contacts(events) = event {
                contacts += events.len();
            }
        }
        if let Some(bytes) = output.recycled {
            client.recycle(bytes);
        }
    }
    let elapsed = start.elapsed();

    let status = worker.status();
    println!();
    println!("┌─ RESULT ────────────────────────────────────────────────────────┐");
    println!("│ Engine steps:   {}", status.steps);
    println!("│ Bodies:         {}", status.bodies);
    println!("│ Contact events: {contacts}");
    println!("│ Wall time:      {:.2} ms", elapsed.as_secs_f64() * 1000.0);
    println!("└─────────────────────────────────────────────────────────────────┘");

    for pcid in 1..=boxes {
        match client.transform(pcid) {
            Some(transform) => println!(
                "  box {:>3}: y = {:>7.3}  vy = {:>7.3}",
                pcid, transform.position.y, transform.linear_velocity.y
            ),
            None => println!("  box {pcid:>3}: no report"),
        }
    }

    worker.shutdown();
    Ok(())
}
