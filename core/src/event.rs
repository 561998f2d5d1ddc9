//! Zone event log.
//!
//! RULE: every state change a zone makes is reported as an event, either
//! in the list returned by `ZoneRuntime::tick()` or in the pending log
//! drained by `ZoneRuntime::drain_events()` (spawns and mining, which
//! happen between ticks). A scheduler with an event sink forwards both.

use crate::{
    command::SpawnRejection,
    types::{AgentId, OrderId, ResourceTypeId, TemplateId, Tick, TileCoord, ZoneId},
};
use serde::{Deserialize, Serialize};

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Clock ──────────────────────────────────────
    TickStarted {
        zone_id: ZoneId,
        tick: Tick,
    },
    TickCompleted {
        zone_id: ZoneId,
        tick: Tick,
        population: u32,
        threat: u32,
    },

    // ── Agents ─────────────────────────────────────
    AgentsSpawned {
        tick: Tick,
        order_id: OrderId,
        template_id: TemplateId,
        agent_ids: Vec<AgentId>,
    },
    SpawnRejected {
        tick: Tick,
        order_id: OrderId,
        reason: SpawnRejection,
    },
    AgentExpired {
        tick: Tick,
        agent_id: AgentId,
        template_id: TemplateId,
        ticks_alive: Tick,
    },

    // ── Resources ──────────────────────────────────
    DepositMined {
        tick: Tick,
        tile: TileCoord,
        resource_type: ResourceTypeId,
        charges_remaining: u32,
    },
    DepositDepleted {
        tick: Tick,
        tile: TileCoord,
        resource_type: ResourceTypeId,
    },
    DepositRespawned {
        tick: Tick,
        tile: TileCoord,
    },
}

impl SimEvent {
    /// Stable string name of the variant, for log lines and tooling.
    pub fn type_name(&self) -> &'static str {
        match self {
            SimEvent::TickStarted { .. }      => "tick_started",
            SimEvent::TickCompleted { .. }    => "tick_completed",
            SimEvent::AgentsSpawned { .. }    => "agents_spawned",
            SimEvent::SpawnRejected { .. }    => "spawn_rejected",
            SimEvent::AgentExpired { .. }     => "agent_expired",
            SimEvent::DepositMined { .. }     => "deposit_mined",
            SimEvent::DepositDepleted { .. }  => "deposit_depleted",
            SimEvent::DepositRespawned { .. } => "deposit_respawned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = SimEvent::DepositRespawned { tick: 4, tile: TileCoord::new(1, 2) };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"deposit_respawned""#));
        assert_eq!(event.type_name(), "deposit_respawned");
    }

    #[test]
    fn rejection_reason_serializes_as_snake_case() {
        let event = SimEvent::SpawnRejected {
            tick: 0,
            order_id: "o".into(),
            reason: SpawnRejection::ThreatBudgetExceeded,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""reason":"threat_budget_exceeded""#));
    }
}
