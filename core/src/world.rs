//! World boot: one scheduler per zone in the static layout.
//!
//! Zones are fully independent: each gets its own runtime, RNG stream,
//! terrain and worker. The world only routes lookups by zone id.

use crate::{
    command::{SpawnOrder, SpawnReceipt, SpawnRejection},
    config::{WorldConfig, ZoneConfig},
    error::{SimError, SimResult},
    scheduler::{TickSource, ZoneHandle, ZoneScheduler},
    snapshot::ZoneStats,
    types::ZoneId,
    zone::ZoneRuntime,
};
use std::collections::HashMap;

pub struct World {
    seed:       u64,
    schedulers: Vec<ZoneScheduler>,
    index:      HashMap<ZoneId, usize>,
}

impl World {
    /// Build every zone with a wall-clock scheduler. Nothing ticks until
    /// `start_all()` (or a zone's own `start()`).
    pub fn boot(config: &WorldConfig, seed: u64) -> SimResult<Self> {
        Self::boot_with(config, seed, |runtime, _| ZoneScheduler::with_interval(runtime))
    }

    /// Build every zone, letting the caller choose each zone's tick source.
    pub fn boot_with_sources(
        config: &WorldConfig,
        seed: u64,
        mut source_for: impl FnMut(&ZoneConfig) -> Box<dyn TickSource>,
    ) -> SimResult<Self> {
        Self::boot_with(config, seed, |runtime, zone| ZoneScheduler::new(runtime, source_for(zone)))
    }

    fn boot_with(
        config: &WorldConfig,
        seed: u64,
        mut make: impl FnMut(ZoneRuntime, &ZoneConfig) -> ZoneScheduler,
    ) -> SimResult<Self> {
        config.validate()?;
        let mut schedulers = Vec::with_capacity(config.zones.len());
        let mut index = HashMap::new();
        for (i, zone) in config.zones.iter().enumerate() {
            let runtime = ZoneRuntime::build(config, i, seed)?;
            schedulers.push(make(runtime, zone));
            index.insert(zone.id.clone(), i);
        }
        log::info!("world booted: seed={seed} zones={}", schedulers.len());
        Ok(Self { seed, schedulers, index })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Zone ids in layout order.
    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.schedulers.iter().map(|s| s.zone_id().clone()).collect()
    }

    pub fn zone(&self, zone_id: &str) -> SimResult<ZoneHandle> {
        self.index
            .get(zone_id)
            .map(|&i| self.schedulers[i].handle())
            .ok_or_else(|| SimError::ZoneNotFound { zone_id: zone_id.to_string() })
    }

    pub fn scheduler_mut(&mut self, zone_id: &str) -> SimResult<&mut ZoneScheduler> {
        match self.index.get(zone_id) {
            Some(&i) => Ok(&mut self.schedulers[i]),
            None => Err(SimError::ZoneNotFound { zone_id: zone_id.to_string() }),
        }
    }

    /// Route an order to the zone it names. An unknown zone is a caller
    /// error, not a rejection.
    pub fn submit_spawn_order(
        &self,
        order: SpawnOrder,
    ) -> SimResult<Result<SpawnReceipt, SpawnRejection>> {
        let zone = self.zone(&order.zone_id)?;
        Ok(zone.submit_spawn_order(order))
    }

    pub fn start_all(&mut self) -> SimResult<()> {
        for scheduler in &mut self.schedulers {
            scheduler.start()?;
        }
        Ok(())
    }

    pub fn stop_all(&mut self) {
        for scheduler in &mut self.schedulers {
            scheduler.stop();
        }
    }

    pub fn stats(&self) -> Vec<(ZoneId, ZoneStats)> {
        self.schedulers
            .iter()
            .map(|s| (s.zone_id().clone(), s.handle().stats()))
            .collect()
    }
}
