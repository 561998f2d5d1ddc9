//! The zone runtime: one zone's authoritative simulation state.
//!
//! TICK ORDER (fixed, documented, never reordered):
//!   1. Advance every live agent one step.
//!   2. Remove every agent whose alive flag is now false.
//!   3. Run resource respawn checks.
//!
//! Because respawn runs last, a deposit depleted by a mine between ticks
//! is stamped with the previous tick and cannot refill in the tick that
//! stamped it.
//!
//! RULES:
//!   - Spawn admission is all-or-nothing: a rejected order creates nothing.
//!   - Every processed order id is remembered for the zone's lifetime.
//!   - All randomness flows through the zone's own ZoneRng.
//!   - Queries hand out copies, never references into live state.

use crate::{
    agent::{AgentInstance, AgentSnapshot, StepOutcome},
    clock::ZoneClock,
    command::{SpawnOrder, SpawnReceipt, SpawnRejection, MAX_SPAWN_COUNT, MIN_SPAWN_COUNT},
    config::{AgentTemplate, WorldConfig, ZoneConfig},
    error::{SimError, SimResult},
    event::SimEvent,
    resource_node::{DepositSnapshot, MineRejection, MineYield, ResourceNodeManager},
    rng::{RngBank, ZoneRng},
    snapshot::{ZoneSnapshot, ZoneStats},
    terrain::{OpenTerrain, TerrainGrid, TileGrid},
    types::{AgentId, OrderId, TemplateId, Tick, Vec2, ZoneId},
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Oldest pending events are dropped once the log holds this many.
pub const MAX_PENDING_EVENTS: usize = 1024;

pub struct ZoneRuntime {
    pub zone:         ZoneConfig,
    pub clock:        ZoneClock,
    rng:              ZoneRng,
    terrain:          Arc<dyn TerrainGrid>,
    templates:        HashMap<TemplateId, Arc<AgentTemplate>>,
    agents:           Vec<AgentInstance>,
    processed_orders: HashSet<OrderId>,
    deposits:         ResourceNodeManager,
    pending_events:   VecDeque<SimEvent>,
}

impl ZoneRuntime {
    pub fn new(
        zone: ZoneConfig,
        tick_interval_ms: u64,
        templates: HashMap<TemplateId, Arc<AgentTemplate>>,
        terrain: Arc<dyn TerrainGrid>,
        deposits: ResourceNodeManager,
        rng: ZoneRng,
    ) -> Self {
        Self {
            clock: ZoneClock::new(zone.id.clone(), tick_interval_ms),
            zone,
            rng,
            terrain,
            templates,
            agents: Vec::new(),
            processed_orders: HashSet::new(),
            deposits,
            pending_events: VecDeque::new(),
        }
    }

    /// Build the zone at `zone_index` in the layout, fully seeded.
    pub fn build(config: &WorldConfig, zone_index: usize, world_seed: u64) -> SimResult<Self> {
        let zone = config
            .zones
            .get(zone_index)
            .cloned()
            .ok_or_else(|| SimError::ZoneNotFound { zone_id: format!("#{zone_index}") })?;

        let terrain: Arc<dyn TerrainGrid> = match &zone.terrain {
            Some(key) => {
                let grid_config = config.terrains.get(key).ok_or_else(|| {
                    SimError::invalid_config(format!("zone '{}' references unknown terrain '{key}'", zone.id))
                })?;
                Arc::new(TileGrid::from_config(grid_config)?)
            }
            None => Arc::new(OpenTerrain::default()),
        };

        let deposits = ResourceNodeManager::new(&config.resource_types, config.deposits_for(&zone.id));
        let rng = RngBank::new(world_seed).for_zone(zone_index as u64, &zone.id);
        let tick_interval_ms = config.tick_interval_for(&zone);

        log::info!(
            "zone '{}' built: {} deposits, budget pop={} threat={}",
            zone.id,
            deposits.len(),
            zone.budget.max_population,
            zone.budget.max_threat
        );
        Ok(Self::new(zone, tick_interval_ms, config.templates.clone(), terrain, deposits, rng))
    }

    /// Zone from `WorldConfig::default_test()`, looked up by id.
    pub fn build_test(zone_id: &str, seed: u64) -> SimResult<Self> {
        let config = WorldConfig::default_test();
        let index = config
            .zones
            .iter()
            .position(|z| z.id == zone_id)
            .ok_or_else(|| SimError::ZoneNotFound { zone_id: zone_id.to_string() })?;
        Self::build(&config, index, seed)
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.zone.id
    }

    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick
    }

    pub fn terrain(&self) -> &dyn TerrainGrid {
        self.terrain.as_ref()
    }

    // ── Simulation step ─────────────────────────────────────────

    /// Advance one tick. This is the core simulation step.
    pub fn tick(&mut self) -> Vec<SimEvent> {
        let tick = self.clock.advance();
        let mut events = vec![SimEvent::TickStarted { zone_id: self.zone.id.clone(), tick }];

        // 1. Agents.
        let terrain = self.terrain.as_ref();
        let mut moved = 0usize;
        for agent in &mut self.agents {
            match agent.step(terrain, &mut self.rng) {
                StepOutcome::Moved => moved += 1,
                StepOutcome::Expired => events.push(SimEvent::AgentExpired {
                    tick,
                    agent_id: agent.id,
                    template_id: agent.template.id.clone(),
                    ticks_alive: agent.ticks_alive,
                }),
                StepOutcome::Aged | StepOutcome::Blocked => {}
            }
        }

        // 2. Prune.
        let before = self.agents.len();
        self.agents.retain(|a| a.alive);
        let pruned = before - self.agents.len();

        // 3. Resources.
        for tile in self.deposits.tick_respawn(tick) {
            events.push(SimEvent::DepositRespawned { tick, tile });
        }

        let population = self.population();
        let threat = self.threat();
        events.push(SimEvent::TickCompleted {
            zone_id: self.zone.id.clone(),
            tick,
            population,
            threat,
        });

        log::debug!(
            "zone={} tick={tick} pop={population} threat={threat} moved={moved} pruned={pruned}",
            self.zone.id
        );
        events
    }

    /// Run n ticks in a loop. Used for testing and fast-forward.
    pub fn run_ticks(&mut self, n: u64) -> Vec<SimEvent> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(self.tick());
        }
        events
    }

    // ── Admission ───────────────────────────────────────────────

    /// Validate and, if every stage passes, place the whole order.
    pub fn submit_spawn_order(&mut self, order: SpawnOrder) -> Result<SpawnReceipt, SpawnRejection> {
        let tick = self.clock.current_tick;

        let template = match self.admit(&order) {
            Ok(template) => template,
            Err(reason) => {
                if !reason.is_duplicate() {
                    self.processed_orders.insert(order.order_id.clone());
                }
                log::debug!("zone={} order={} rejected: {reason}", self.zone.id, order.order_id);
                self.record(SimEvent::SpawnRejected {
                    tick,
                    order_id: order.order_id,
                    reason,
                });
                return Err(reason);
            }
        };

        let mut agent_ids = Vec::with_capacity(order.count as usize);
        for _ in 0..order.count {
            let id = self.rng.uuid();
            self.agents.push(AgentInstance::new(id, Arc::clone(&template), order.position));
            agent_ids.push(id);
        }
        self.processed_orders.insert(order.order_id.clone());

        log::info!(
            "zone={} order={} spawned {}x {} (pop={} threat={})",
            self.zone.id,
            order.order_id,
            order.count,
            template.id,
            self.population(),
            self.threat()
        );
        self.record(SimEvent::AgentsSpawned {
            tick,
            order_id: order.order_id.clone(),
            template_id: template.id.clone(),
            agent_ids: agent_ids.clone(),
        });

        Ok(SpawnReceipt {
            order_id: order.order_id,
            agent_ids,
            accepted_at: tick,
        })
    }

    /// Admission stages, in order. Read-only: nothing changes until every
    /// stage has passed.
    fn admit(&self, order: &SpawnOrder) -> Result<Arc<AgentTemplate>, SpawnRejection> {
        if self.processed_orders.contains(&order.order_id) {
            return Err(SpawnRejection::DuplicateOrder);
        }
        if order.zone_id != self.zone.id {
            return Err(SpawnRejection::ZoneMismatch);
        }
        let template = self
            .templates
            .get(&order.template_id)
            .ok_or(SpawnRejection::UnknownTemplate)?;
        if !(MIN_SPAWN_COUNT..=MAX_SPAWN_COUNT).contains(&order.count) {
            return Err(SpawnRejection::InvalidCount);
        }
        if !order.position.within(self.zone.min, self.zone.max) {
            return Err(SpawnRejection::OutOfBounds);
        }
        if !self.terrain.is_walkable(order.position) {
            return Err(SpawnRejection::NotWalkable);
        }

        let count = u64::from(order.count);
        let budget = self.zone.budget;
        if u64::from(self.population()) + count > u64::from(budget.max_population) {
            return Err(SpawnRejection::PopulationBudgetExceeded);
        }
        let added_threat = u64::from(template.threat) * count;
        if self.threat_sum() + added_threat > u64::from(budget.max_threat) {
            return Err(SpawnRejection::ThreatBudgetExceeded);
        }
        Ok(Arc::clone(template))
    }

    pub fn is_processed(&self, order_id: &str) -> bool {
        self.processed_orders.contains(order_id)
    }

    // ── Resources ───────────────────────────────────────────────

    /// Mine the deposit under `position` at the current tick.
    pub fn mine(&mut self, position: Vec2) -> Result<MineYield, MineRejection> {
        let tick = self.clock.current_tick;
        let result = self.deposits.mine(self.terrain.as_ref(), position, tick);
        if let Ok(y) = &result {
            self.record(SimEvent::DepositMined {
                tick,
                tile: y.tile,
                resource_type: y.resource_type.clone(),
                charges_remaining: y.charges_remaining,
            });
            if y.depleted {
                self.record(SimEvent::DepositDepleted {
                    tick,
                    tile: y.tile,
                    resource_type: y.resource_type.clone(),
                });
            }
        }
        result
    }

    pub fn deposit_at(&self, position: Vec2) -> Option<DepositSnapshot> {
        self.deposits.deposit_at(self.terrain.as_ref(), position)
    }

    pub fn deposits_in_region(&self, min: Vec2, max: Vec2) -> Vec<DepositSnapshot> {
        self.deposits.deposits_in_region(self.terrain.as_ref(), min, max)
    }

    pub fn all_deposits(&self) -> Vec<DepositSnapshot> {
        self.deposits.all_deposits(self.terrain.as_ref())
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Live agents within `radius` of `position`, boundary inclusive.
    /// Order is unspecified.
    pub fn entities_near(&self, position: Vec2, radius: f64) -> Vec<AgentSnapshot> {
        let r2 = radius * radius;
        self.agents
            .iter()
            .filter(|a| a.alive && a.position.distance_sq(position) <= r2)
            .map(AgentInstance::snapshot)
            .collect()
    }

    pub fn agents(&self) -> Vec<AgentSnapshot> {
        self.agents.iter().map(AgentInstance::snapshot).collect()
    }

    pub fn agent(&self, id: AgentId) -> Option<AgentSnapshot> {
        self.agents.iter().find(|a| a.id == id).map(AgentInstance::snapshot)
    }

    pub fn population(&self) -> u32 {
        self.agents.iter().filter(|a| a.alive).count() as u32
    }

    pub fn threat(&self) -> u32 {
        u32::try_from(self.threat_sum()).unwrap_or(u32::MAX)
    }

    fn threat_sum(&self) -> u64 {
        self.agents
            .iter()
            .filter(|a| a.alive)
            .map(|a| u64::from(a.threat()))
            .sum()
    }

    pub fn stats(&self) -> ZoneStats {
        ZoneStats {
            population: self.population(),
            threat: self.threat(),
            tick: self.clock.current_tick,
            budget: self.zone.budget,
            deposits: self.deposits.counts(),
        }
    }

    pub fn snapshot(&self) -> ZoneSnapshot {
        ZoneSnapshot {
            zone_id: self.zone.id.clone(),
            stats: self.stats(),
            agents: self.agents(),
            deposits: self.all_deposits(),
        }
    }

    /// Events from spawns and mining since the last drain, oldest first.
    /// A running scheduler with an event sink drains these every tick.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.pending_events.drain(..).collect()
    }

    pub fn pending_event_count(&self) -> usize {
        self.pending_events.len()
    }

    fn record(&mut self, event: SimEvent) {
        if self.pending_events.len() >= MAX_PENDING_EVENTS {
            self.pending_events.pop_front();
            log::debug!("zone={} pending event log full; dropping oldest", self.zone.id);
        }
        self.pending_events.push_back(event);
    }
}
