//! zone-runner: headless world runner.
//!
//! Usage:
//!   zone-runner --seed 12345 --ticks 200 --data-dir ./data
//!   zone-runner --seed 12345 --realtime-secs 10
//!   zone-runner --seed 12345 --ipc-mode
//!
//! In IPC mode every stdin line is one JSON command and every reply is
//! one JSON line on stdout.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::time::Duration;
use zonesim_core::{
    command::SpawnOrder,
    config::WorldConfig,
    event::SimEvent,
    snapshot::ZoneStats,
    types::{Vec2, ZoneId},
    world::World,
};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick { zone_id: ZoneId, count: u64 },
    Spawn { order: SpawnOrder },
    Mine { zone_id: ZoneId, position: Vec2 },
    Near { zone_id: ZoneId, position: Vec2, radius: f64 },
    Deposits { zone_id: ZoneId, min: Option<Vec2>, max: Option<Vec2> },
    Snapshot { zone_id: ZoneId },
    Quit,
}

#[derive(Serialize)]
struct ZoneLine {
    zone_id: ZoneId,
    #[serde(flatten)]
    stats: ZoneStats,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ticks = parse_arg(&args, "--ticks", 200u64);
    let realtime_secs = parse_arg(&args, "--realtime-secs", 0u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    let started_at = Utc::now();
    let run_id = format!("run-{seed}-{}", started_at.format("%Y%m%dT%H%M%S"));

    if !ipc_mode {
        println!("zone-runner");
        println!("  run_id:    {run_id}");
        println!("  seed:      {seed}");
        println!("  data_dir:  {data_dir}");
        println!("  started:   {}", started_at.to_rfc3339());
        println!();
    }

    let config = WorldConfig::load(data_dir)
        .with_context(|| format!("loading world data from {data_dir}"))?;
    let mut world = World::boot(&config, seed)?;

    if ipc_mode {
        run_ipc_loop(&world)?;
    } else if realtime_secs > 0 {
        run_realtime(&mut world, realtime_secs)?;
        print_summary(&world, &run_id);
    } else {
        println!("  ticks:     {ticks}");
        for zone_id in world.zone_ids() {
            let zone = world.zone(&zone_id)?;
            for _ in 0..ticks {
                zone.tick_now();
            }
        }
        print_summary(&world, &run_id);
    }

    Ok(())
}

/// Let every zone's own scheduler drive the world on the wall clock.
fn run_realtime(world: &mut World, secs: u64) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    for zone_id in world.zone_ids() {
        world.scheduler_mut(&zone_id)?.set_event_sink(tx.clone());
    }
    drop(tx);

    world.start_all()?;
    let deadline = std::time::Instant::now() + Duration::from_secs(secs);
    while let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now()) {
        match rx.recv_timeout(remaining) {
            Ok(event) => log_event(&event),
            Err(_) => break,
        }
    }
    world.stop_all();
    Ok(())
}

fn log_event(event: &SimEvent) {
    match event {
        SimEvent::TickStarted { .. } | SimEvent::TickCompleted { .. } => {
            log::trace!("{}", event.type_name())
        }
        other => log::info!("{}: {:?}", other.type_name(), other),
    }
}

fn run_ipc_loop(world: &World) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("unparseable command: {e}");
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }
        let reply = match handle_command(world, cmd) {
            Ok(v) => v,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(world: &World, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::GetState => serde_json::to_value(zone_lines(world))?,
        IpcCommand::Tick { zone_id, count } => {
            let zone = world.zone(&zone_id)?;
            let mut events = zone.drain_events();
            for _ in 0..count {
                events.extend(zone.tick_now().into_iter().filter(|e| {
                    !matches!(e, SimEvent::TickStarted { .. } | SimEvent::TickCompleted { .. })
                }));
            }
            serde_json::json!({ "stats": zone.stats(), "events": events })
        }
        IpcCommand::Spawn { order } => match world.submit_spawn_order(order)? {
            Ok(receipt) => serde_json::json!({ "accepted": receipt }),
            Err(reason) => serde_json::json!({ "rejected": reason.to_string() }),
        },
        IpcCommand::Mine { zone_id, position } => match world.zone(&zone_id)?.mine(position) {
            Ok(harvest) => serde_json::json!({ "mined": harvest }),
            Err(reason) => serde_json::json!({ "rejected": reason.to_string() }),
        },
        IpcCommand::Near { zone_id, position, radius } => {
            serde_json::to_value(world.zone(&zone_id)?.entities_near(position, radius))?
        }
        IpcCommand::Deposits { zone_id, min, max } => {
            let zone = world.zone(&zone_id)?;
            let deposits = match (min, max) {
                (Some(min), Some(max)) => zone.deposits_in_region(min, max),
                _ => zone.all_deposits(),
            };
            serde_json::to_value(deposits)?
        }
        IpcCommand::Snapshot { zone_id } => serde_json::to_value(world.zone(&zone_id)?.snapshot())?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn zone_lines(world: &World) -> Vec<ZoneLine> {
    world
        .stats()
        .into_iter()
        .map(|(zone_id, stats)| ZoneLine { zone_id, stats })
        .collect()
}

fn print_summary(world: &World, run_id: &str) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:   {run_id}");
    println!("  seed:     {}", world.seed());
    for line in zone_lines(world) {
        let s = line.stats;
        println!(
            "  {:<14} tick {:>6} | pop {:>3}/{:<3} | threat {:>4}/{:<4} | deposits {} ({} depleted)",
            line.zone_id,
            s.tick,
            s.population,
            s.budget.max_population,
            s.threat,
            s.budget.max_threat,
            s.deposits.total,
            s.deposits.depleted
        );
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
