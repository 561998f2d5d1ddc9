use crate::types::{AgentId, OrderId, TemplateId, Tick, Vec2, ZoneId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_SPAWN_COUNT: u32 = 1;
pub const MAX_SPAWN_COUNT: u32 = 10;

/// An external request to place `count` instances of a template.
/// `order_id` is the idempotency token: a zone processes it at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnOrder {
    pub order_id:    OrderId,
    pub zone_id:     ZoneId,
    pub template_id: TemplateId,
    pub position:    Vec2,
    pub count:       u32,
}

/// Result of an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnReceipt {
    pub order_id:    OrderId,
    pub agent_ids:   Vec<AgentId>,
    pub accepted_at: Tick,
}

/// Why an order was turned away. Variants are listed in admission order;
/// the first failing stage wins. `Display` is the stable reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnRejection {
    #[error("duplicate order")]
    DuplicateOrder,
    #[error("zone mismatch")]
    ZoneMismatch,
    #[error("unknown template")]
    UnknownTemplate,
    #[error("count must be 1-10")]
    InvalidCount,
    #[error("position out of bounds")]
    OutOfBounds,
    #[error("position not walkable")]
    NotWalkable,
    #[error("population budget exceeded")]
    PopulationBudgetExceeded,
    #[error("threat budget exceeded")]
    ThreatBudgetExceeded,
}

impl SpawnRejection {
    /// Replays of an already-processed order. Every other rejection is a
    /// policy decision about this order's contents.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateOrder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(SpawnRejection::DuplicateOrder.to_string(), "duplicate order");
        assert_eq!(SpawnRejection::InvalidCount.to_string(), "count must be 1-10");
        assert_eq!(SpawnRejection::ThreatBudgetExceeded.to_string(), "threat budget exceeded");
    }

    #[test]
    fn only_duplicate_is_duplicate() {
        assert!(SpawnRejection::DuplicateOrder.is_duplicate());
        assert!(!SpawnRejection::ZoneMismatch.is_duplicate());
    }

    #[test]
    fn order_parses_from_json() {
        let order: SpawnOrder = serde_json::from_str(
            r#"{"order_id":"o-1","zone_id":"meadow","template_id":"wolf",
                "position":{"x":1.0,"y":2.0},"count":2}"#,
        )
        .unwrap();
        assert_eq!(order.count, 2);
        assert_eq!(order.position, Vec2::new(1.0, 2.0));
    }
}
