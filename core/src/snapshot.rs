//! Read-only views of a zone.
//!
//! Everything here is an owned copy. Callers can keep, serialize, or
//! mutate these freely without touching the simulation.

use crate::{
    agent::AgentSnapshot,
    config::ZoneBudget,
    resource_node::{DepositCounts, DepositSnapshot},
    types::{Tick, ZoneId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStats {
    pub population: u32,
    pub threat: u32,
    pub tick: Tick,
    pub budget: ZoneBudget,
    pub deposits: DepositCounts,
}

impl ZoneStats {
    pub fn population_headroom(&self) -> u32 {
        self.budget.max_population.saturating_sub(self.population)
    }

    pub fn threat_headroom(&self) -> u32 {
        self.budget.max_threat.saturating_sub(self.threat)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub zone_id: ZoneId,
    pub stats: ZoneStats,
    pub agents: Vec<AgentSnapshot>,
    pub deposits: Vec<DepositSnapshot>,
}
