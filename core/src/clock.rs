//! Zone clock. Owns the tick counter and the tick interval.

use crate::types::{Tick, ZoneId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoneClock {
    pub zone_id:          ZoneId,
    pub current_tick:     Tick,
    pub tick_interval_ms: u64,
}

impl ZoneClock {
    pub fn new(zone_id: ZoneId, tick_interval_ms: u64) -> Self {
        Self {
            zone_id,
            current_tick: 0,
            tick_interval_ms: tick_interval_ms.max(1),
        }
    }

    /// Advance one tick. Returns the new tick number.
    pub fn advance(&mut self) -> Tick {
        self.current_tick += 1;
        self.current_tick
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
