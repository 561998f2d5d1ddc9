//! Zone scheduling and world boot.

use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use zonesim_core::{
    command::{SpawnOrder, SpawnRejection},
    config::WorldConfig,
    error::SimError,
    event::SimEvent,
    scheduler::{manual_ticks, ManualTrigger, TickSource, Wake, ZoneScheduler},
    types::Vec2,
    world::World,
    zone::ZoneRuntime,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn manual_scheduler(zone_id: &str) -> (ManualTrigger, ZoneScheduler) {
    let (trigger, source) = manual_ticks();
    let runtime = ZoneRuntime::build_test(zone_id, 42).unwrap();
    (trigger, ZoneScheduler::new(runtime, Box::new(source)))
}

#[test]
fn manual_trigger_steps_deterministically() {
    init_logs();
    let (trigger, mut scheduler) = manual_scheduler("meadow");
    let zone = scheduler.handle();

    scheduler.start().unwrap();
    assert_eq!(trigger.step(), Some(1));
    assert_eq!(trigger.step_n(4), Some(5));
    assert_eq!(zone.current_tick(), 5);
    scheduler.stop();
}

#[test]
fn start_and_stop_are_idempotent() {
    init_logs();
    let (trigger, mut scheduler) = manual_scheduler("meadow");

    scheduler.stop();
    assert!(!scheduler.is_running());

    scheduler.start().unwrap();
    scheduler.start().unwrap();
    assert!(scheduler.is_running());
    assert_eq!(trigger.step(), Some(1));

    scheduler.stop();
    scheduler.stop();
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.handle().current_tick(), 1);
}

#[test]
fn stopped_scheduler_does_not_tick_and_can_restart() {
    init_logs();
    let (trigger, mut scheduler) = manual_scheduler("meadow");
    scheduler.start().unwrap();
    trigger.step_n(3).unwrap();
    scheduler.stop();

    // Manual ticking still works while the worker is down.
    let zone = scheduler.handle();
    zone.tick_now();
    assert_eq!(zone.current_tick(), 4);

    scheduler.start().unwrap();
    assert_eq!(trigger.step(), Some(5));
    scheduler.stop();
}

#[test]
fn spawns_interleave_safely_with_worker_ticks() {
    init_logs();
    let (trigger, mut scheduler) = manual_scheduler("meadow");
    let zone = scheduler.handle();
    scheduler.start().unwrap();

    for i in 0..5 {
        let order = SpawnOrder {
            order_id: format!("o-{i}"),
            zone_id: "meadow".into(),
            template_id: "sentinel".into(),
            position: Vec2::new(10.0, 10.0),
            count: 1,
        };
        zone.submit_spawn_order(order).unwrap();
        trigger.step().unwrap();
    }
    let stats = zone.stats();
    assert_eq!(stats.population, 5);
    assert_eq!(stats.threat, 10);
    assert_eq!(stats.tick, 5);
    scheduler.stop();
}

struct PanickingTicks;

impl TickSource for PanickingTicks {
    fn wait(&mut self, _stop: &Receiver<()>) -> Wake {
        panic!("tick source failed");
    }
}

#[test]
fn restart_after_worker_panic_is_an_error() {
    init_logs();
    let runtime = ZoneRuntime::build_test("meadow", 42).unwrap();
    let mut scheduler = ZoneScheduler::new(runtime, Box::new(PanickingTicks));

    scheduler.start().unwrap();
    scheduler.stop();
    assert!(!scheduler.is_running());

    let err = scheduler.start().unwrap_err();
    assert!(matches!(err, SimError::TickSourceLost { ref zone_id } if zone_id == "meadow"));
    assert!(!scheduler.is_running());
}

#[test]
fn interval_scheduler_ticks_on_wall_clock() {
    init_logs();
    let mut config = WorldConfig::default_test();
    config.zones[0].tick_interval_ms = Some(2);
    let runtime = ZoneRuntime::build(&config, 0, 7).unwrap();
    let mut scheduler = ZoneScheduler::with_interval(runtime);
    let zone = scheduler.handle();

    scheduler.start().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while zone.current_tick() < 3 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    scheduler.stop();

    let stopped_at = zone.current_tick();
    assert!(stopped_at >= 3, "expected at least 3 ticks, got {stopped_at}");
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(zone.current_tick(), stopped_at, "no ticks after stop");
}

#[test]
fn event_sink_receives_worker_tick_events() {
    init_logs();
    let (trigger, mut scheduler) = manual_scheduler("meadow");
    let (tx, rx) = mpsc::channel();
    scheduler.set_event_sink(tx);
    scheduler.start().unwrap();
    trigger.step().unwrap();
    scheduler.stop();

    let events: Vec<SimEvent> = rx.try_iter().collect();
    assert!(matches!(events.first(), Some(SimEvent::TickStarted { tick: 1, .. })));
    assert!(matches!(events.last(), Some(SimEvent::TickCompleted { tick: 1, .. })));
}

#[test]
fn event_sink_receives_spawn_and_mine_events() {
    init_logs();
    let (trigger, mut scheduler) = manual_scheduler("meadow");
    let zone = scheduler.handle();
    let (tx, rx) = mpsc::channel();
    scheduler.set_event_sink(tx);
    scheduler.start().unwrap();

    let order = SpawnOrder {
        order_id: "o-1".into(),
        zone_id: "meadow".into(),
        template_id: "sentinel".into(),
        position: Vec2::new(10.0, 10.0),
        count: 1,
    };
    zone.submit_spawn_order(order.clone()).unwrap();
    for _ in 0..100 {
        let _ = zone.submit_spawn_order(order.clone());
    }
    zone.mine(Vec2::new(5.5, 5.5)).unwrap();
    trigger.step().unwrap();
    scheduler.stop();

    let names: Vec<&str> = rx.try_iter().map(|e| e.type_name()).collect();
    assert_eq!(names[0], "agents_spawned");
    assert_eq!(names.iter().filter(|n| **n == "spawn_rejected").count(), 100);
    assert!(names.contains(&"deposit_mined"));
    assert_eq!(names.last(), Some(&"tick_completed"));
    assert_eq!(zone.drain_events(), Vec::new());
}

#[test]
fn world_boots_every_zone_independently() {
    init_logs();
    let config = WorldConfig::default_test();
    let mut triggers = Vec::new();
    let mut world = World::boot_with_sources(&config, 42, |_| {
        let (trigger, source) = manual_ticks();
        triggers.push(trigger);
        Box::new(source) as Box<dyn TickSource>
    })
    .unwrap();
    assert_eq!(world.zone_ids(), vec!["meadow".to_string(), "caves".to_string()]);

    world.start_all().unwrap();
    triggers[0].step_n(3).unwrap();
    triggers[1].step().unwrap();
    world.stop_all();

    assert_eq!(world.zone("meadow").unwrap().current_tick(), 3);
    assert_eq!(world.zone("caves").unwrap().current_tick(), 1);
}

#[test]
fn world_routes_orders_and_reports_unknown_zones() {
    let world = World::boot(&WorldConfig::default_test(), 1).unwrap();

    let order = SpawnOrder {
        order_id: "o-1".into(),
        zone_id: "caves".into(),
        template_id: "wisp".into(),
        position: Vec2::new(0.5, 0.5),
        count: 2,
    };
    let receipt = world.submit_spawn_order(order.clone()).unwrap().unwrap();
    assert_eq!(receipt.agent_ids.len(), 2);
    assert_eq!(
        world.submit_spawn_order(order).unwrap().unwrap_err(),
        SpawnRejection::DuplicateOrder
    );

    // Same order id in another zone is a different order.
    let other = SpawnOrder {
        order_id: "o-1".into(),
        zone_id: "meadow".into(),
        template_id: "wisp".into(),
        position: Vec2::new(1.0, 1.0),
        count: 1,
    };
    assert!(world.submit_spawn_order(other).unwrap().is_ok());

    assert!(matches!(world.zone("atlantis"), Err(SimError::ZoneNotFound { .. })));
    let lost = SpawnOrder {
        order_id: "o-2".into(),
        zone_id: "atlantis".into(),
        template_id: "wisp".into(),
        position: Vec2::ZERO,
        count: 1,
    };
    assert!(world.submit_spawn_order(lost).is_err());
}
