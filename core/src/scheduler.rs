//! Per-zone tick scheduling.
//!
//! Every zone owns one scheduler and one worker thread. The worker blocks
//! on a `TickSource` and runs `ZoneRuntime::tick()` to completion under the
//! zone's mutex; spawn orders, mining and queries take the same mutex, so
//! nothing interleaves with a tick. Zones never share a lock.
//!
//! `stop()` signals the worker and joins it: the tick in flight (if any)
//! finishes, no further tick starts. The tick source is handed back on
//! join, so a stopped scheduler can be started again.

use crate::{
    agent::AgentSnapshot,
    command::{SpawnOrder, SpawnReceipt, SpawnRejection},
    error::{SimError, SimResult},
    event::SimEvent,
    resource_node::{DepositSnapshot, MineRejection, MineYield},
    snapshot::{ZoneSnapshot, ZoneStats},
    types::{AgentId, Tick, Vec2, ZoneId},
    zone::ZoneRuntime,
};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `ManualTrigger::step` waits for the worker before giving up.
pub const MANUAL_STEP_TIMEOUT: Duration = Duration::from_secs(5);
const MANUAL_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Tick,
    Stop,
}

/// Decides when the next tick happens.
pub trait TickSource: Send + 'static {
    /// Block until the next tick is due or `stop` fires.
    fn wait(&mut self, stop: &Receiver<()>) -> Wake;

    /// Called after each tick has completed.
    fn tick_finished(&mut self, _tick: Tick) {}

    /// Called by `start()` before the worker picks the source up.
    fn reset(&mut self) {}
}

/// Wall-clock ticks at a fixed rate. Overruns are not caught up.
pub struct IntervalTicks {
    interval: Duration,
    next_due: Option<Instant>,
}

impl IntervalTicks {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next_due: None }
    }
}

impl TickSource for IntervalTicks {
    fn wait(&mut self, stop: &Receiver<()>) -> Wake {
        let now = Instant::now();
        let due = *self.next_due.get_or_insert(now + self.interval);
        match stop.recv_timeout(due.saturating_duration_since(now)) {
            Err(RecvTimeoutError::Timeout) => {
                let after = Instant::now();
                let next = due + self.interval;
                self.next_due = Some(if next < after { after + self.interval } else { next });
                Wake::Tick
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Wake::Stop,
        }
    }

    fn reset(&mut self) {
        self.next_due = None;
    }
}

/// Ticks only when a `ManualTrigger` asks for one.
pub struct ManualTicks {
    steps: Receiver<SyncSender<Tick>>,
    pending_ack: Option<SyncSender<Tick>>,
}

/// Test-side handle that drives a `ManualTicks` source.
#[derive(Clone)]
pub struct ManualTrigger {
    steps: Sender<SyncSender<Tick>>,
}

/// A connected trigger/source pair.
pub fn manual_ticks() -> (ManualTrigger, ManualTicks) {
    let (tx, rx) = mpsc::channel();
    (
        ManualTrigger { steps: tx },
        ManualTicks { steps: rx, pending_ack: None },
    )
}

impl ManualTrigger {
    /// Ask the worker for one tick and wait until it has finished.
    /// Returns the completed tick, or None when no worker is running.
    pub fn step(&self) -> Option<Tick> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.steps.send(ack_tx).ok()?;
        ack_rx.recv_timeout(MANUAL_STEP_TIMEOUT).ok()
    }

    pub fn step_n(&self, n: u64) -> Option<Tick> {
        let mut last = None;
        for _ in 0..n {
            last = Some(self.step()?);
        }
        last
    }
}

impl TickSource for ManualTicks {
    fn wait(&mut self, stop: &Receiver<()>) -> Wake {
        loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return Wake::Stop,
                Err(TryRecvError::Empty) => {}
            }
            match self.steps.recv_timeout(MANUAL_POLL) {
                Ok(ack) => {
                    self.pending_ack = Some(ack);
                    return Wake::Tick;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Every trigger is gone; only stop can end the wait now.
                    let _ = stop.recv();
                    return Wake::Stop;
                }
            }
        }
    }

    fn tick_finished(&mut self, tick: Tick) {
        if let Some(ack) = self.pending_ack.take() {
            let _ = ack.send(tick);
        }
    }

    fn reset(&mut self) {
        // Requests left over from a previous run have already timed out.
        while self.steps.try_recv().is_ok() {}
        self.pending_ack = None;
    }
}

fn lock(runtime: &Mutex<ZoneRuntime>) -> MutexGuard<'_, ZoneRuntime> {
    // A panic mid-operation leaves the zone between operations, not
    // half-ticked, since every mutation finishes before unlocking.
    runtime.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cheap, cloneable access to one zone's runtime. Every call takes the
/// zone's mutex and returns owned data.
#[derive(Clone)]
pub struct ZoneHandle {
    zone_id: ZoneId,
    runtime: Arc<Mutex<ZoneRuntime>>,
}

impl ZoneHandle {
    pub fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }

    pub fn submit_spawn_order(&self, order: SpawnOrder) -> Result<SpawnReceipt, SpawnRejection> {
        lock(&self.runtime).submit_spawn_order(order)
    }

    pub fn entities_near(&self, position: Vec2, radius: f64) -> Vec<AgentSnapshot> {
        lock(&self.runtime).entities_near(position, radius)
    }

    pub fn agent(&self, id: AgentId) -> Option<AgentSnapshot> {
        lock(&self.runtime).agent(id)
    }

    pub fn agents(&self) -> Vec<AgentSnapshot> {
        lock(&self.runtime).agents()
    }

    pub fn stats(&self) -> ZoneStats {
        lock(&self.runtime).stats()
    }

    pub fn snapshot(&self) -> ZoneSnapshot {
        lock(&self.runtime).snapshot()
    }

    pub fn mine(&self, position: Vec2) -> Result<MineYield, MineRejection> {
        lock(&self.runtime).mine(position)
    }

    pub fn deposit_at(&self, position: Vec2) -> Option<DepositSnapshot> {
        lock(&self.runtime).deposit_at(position)
    }

    pub fn deposits_in_region(&self, min: Vec2, max: Vec2) -> Vec<DepositSnapshot> {
        lock(&self.runtime).deposits_in_region(min, max)
    }

    pub fn all_deposits(&self) -> Vec<DepositSnapshot> {
        lock(&self.runtime).all_deposits()
    }

    pub fn drain_events(&self) -> Vec<SimEvent> {
        lock(&self.runtime).drain_events()
    }

    /// Run one tick on the caller's thread. Serialized with the worker,
    /// so it is safe whether or not the scheduler is running.
    pub fn tick_now(&self) -> Vec<SimEvent> {
        lock(&self.runtime).tick()
    }

    pub fn current_tick(&self) -> Tick {
        lock(&self.runtime).current_tick()
    }
}

struct Worker {
    stop_tx: Sender<()>,
    thread:  JoinHandle<Box<dyn TickSource>>,
}

pub struct ZoneScheduler {
    handle:     ZoneHandle,
    source:     Option<Box<dyn TickSource>>,
    worker:     Option<Worker>,
    event_sink: Option<Sender<SimEvent>>,
}

impl ZoneScheduler {
    pub fn new(runtime: ZoneRuntime, source: Box<dyn TickSource>) -> Self {
        Self {
            handle: ZoneHandle {
                zone_id: runtime.zone_id().clone(),
                runtime: Arc::new(Mutex::new(runtime)),
            },
            source: Some(source),
            worker: None,
            event_sink: None,
        }
    }

    /// Scheduler ticking on the runtime's configured wall-clock interval.
    pub fn with_interval(runtime: ZoneRuntime) -> Self {
        let interval = runtime.clock.tick_interval();
        Self::new(runtime, Box::new(IntervalTicks::new(interval)))
    }

    /// Forward every event produced by worker ticks to `sink`, preceded
    /// by the zone's pending spawn and mining events.
    /// Takes effect on the next `start()`.
    pub fn set_event_sink(&mut self, sink: Sender<SimEvent>) {
        self.event_sink = Some(sink);
    }

    pub fn handle(&self) -> ZoneHandle {
        self.handle.clone()
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.handle.zone_id
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start the periodic tick. No-op when already running. Fails when a
    /// previous worker panicked and took the tick source with it.
    pub fn start(&mut self) -> SimResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let Some(mut source) = self.source.take() else {
            return Err(SimError::TickSourceLost { zone_id: self.handle.zone_id.clone() });
        };
        source.reset();

        let (stop_tx, stop_rx) = mpsc::channel();
        let runtime = Arc::clone(&self.handle.runtime);
        let sink = self.event_sink.clone();
        let zone_id = self.handle.zone_id.clone();

        let thread = thread::Builder::new()
            .name(format!("zone-{zone_id}"))
            .spawn(move || run_worker(runtime, source, stop_rx, sink))?;

        self.worker = Some(Worker { stop_tx, thread });
        log::info!("zone={zone_id} scheduler started");
        Ok(())
    }

    /// Stop scheduling ticks. Waits for a tick in flight to finish.
    /// No-op when already stopped.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.send(());
        match worker.thread.join() {
            Ok(source) => self.source = Some(source),
            Err(_) => log::error!("zone={} worker panicked; scheduler cannot restart", self.handle.zone_id),
        }
        log::info!("zone={} scheduler stopped", self.handle.zone_id);
    }
}

impl Drop for ZoneScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    runtime: Arc<Mutex<ZoneRuntime>>,
    mut source: Box<dyn TickSource>,
    stop_rx: Receiver<()>,
    sink: Option<Sender<SimEvent>>,
) -> Box<dyn TickSource> {
    while source.wait(&stop_rx) == Wake::Tick {
        let (tick, events) = {
            let mut zone = lock(&runtime);
            // Spawns and mines since the last tick go out ahead of it.
            let mut events = if sink.is_some() { zone.drain_events() } else { Vec::new() };
            events.extend(zone.tick());
            (zone.current_tick(), events)
        };
        if let Some(sink) = &sink {
            for event in events {
                if sink.send(event).is_err() {
                    break;
                }
            }
        }
        source.tick_finished(tick);
    }
    source
}
