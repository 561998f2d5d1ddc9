//! Resource nodes: depletable, respawning deposits keyed by tile.
//!
//! A node is seeded once with full charge and never removed. Mining takes
//! one charge at a time; the tick a node hits zero is stamped on it, and
//! after the resource type's respawn delay it refills completely in one go.
//! There is no partial regeneration.

use crate::{
    config::{DepositSeed, Rarity, ResourceTypeConfig},
    terrain::TerrainGrid,
    types::{ResourceTypeId, Tick, TileCoord, Vec2},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Units handed out per successful mine.
pub const HARVEST_QUANTITY: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    pub resource_type: ResourceTypeId,
    pub charge: u32,
    pub max_charge: u32,
    pub depleted_at: Option<Tick>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MineRejection {
    #[error("no ore deposit at this position")]
    NoDeposit,
    #[error("deposit depleted")]
    Depleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineYield {
    pub tile: TileCoord,
    pub resource_type: ResourceTypeId,
    pub quantity: u32,
    pub charges_remaining: u32,
    /// True when this mine took the last charge.
    pub depleted: bool,
}

/// Presentation copy of a node. Never aliases internal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositSnapshot {
    pub tile: TileCoord,
    pub position: Vec2,
    pub resource_type: ResourceTypeId,
    pub label: String,
    pub rarity: Rarity,
    pub charge: u32,
    pub max_charge: u32,
    pub depleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DepositCounts {
    pub total: usize,
    pub depleted: usize,
}

pub struct ResourceNodeManager {
    // BTreeMap so listings and respawn reports come out in tile order.
    nodes: BTreeMap<TileCoord, ResourceNode>,
    types: HashMap<ResourceTypeId, ResourceTypeConfig>,
}

impl ResourceNodeManager {
    /// Seed nodes for one zone. Seeds naming an unknown resource type are
    /// skipped; `WorldConfig::validate` rejects those before boot.
    pub fn new<'a>(
        types: &HashMap<ResourceTypeId, ResourceTypeConfig>,
        seeds: impl IntoIterator<Item = &'a DepositSeed>,
    ) -> Self {
        let mut nodes = BTreeMap::new();
        let mut used_types = HashMap::new();
        for seed in seeds {
            let Some(rt) = types.get(&seed.resource_type) else {
                log::warn!("skipping deposit at {:?}: unknown resource type '{}'", seed.tile, seed.resource_type);
                continue;
            };
            nodes.insert(
                seed.tile,
                ResourceNode {
                    resource_type: rt.id.clone(),
                    charge: rt.max_charge,
                    max_charge: rt.max_charge,
                    depleted_at: None,
                },
            );
            used_types.insert(rt.id.clone(), rt.clone());
        }
        Self { nodes, types: used_types }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Take one unit from the node under `position`.
    pub fn mine(
        &mut self,
        terrain: &dyn TerrainGrid,
        position: Vec2,
        current_tick: Tick,
    ) -> Result<MineYield, MineRejection> {
        let tile = terrain.world_to_tile(position);
        let node = self.nodes.get_mut(&tile).ok_or(MineRejection::NoDeposit)?;

        // Marker and charge are checked independently.
        if node.depleted_at.is_some() {
            return Err(MineRejection::Depleted);
        }
        if node.charge == 0 {
            return Err(MineRejection::Depleted);
        }

        node.charge -= 1;
        let depleted = node.charge == 0;
        if depleted {
            node.depleted_at = Some(current_tick);
            log::info!("deposit {:?} ({}) depleted at tick {current_tick}", tile, node.resource_type);
        }

        Ok(MineYield {
            tile,
            resource_type: node.resource_type.clone(),
            quantity: HARVEST_QUANTITY,
            charges_remaining: node.charge,
            depleted,
        })
    }

    /// Refill every node whose respawn delay has elapsed.
    /// Returns the tiles restored this call.
    pub fn tick_respawn(&mut self, current_tick: Tick) -> Vec<TileCoord> {
        let mut restored = Vec::new();
        for (tile, node) in self.nodes.iter_mut() {
            let Some(depleted_at) = node.depleted_at else {
                continue;
            };
            let Some(rt) = self.types.get(&node.resource_type) else {
                continue;
            };
            if current_tick.saturating_sub(depleted_at) >= rt.respawn_ticks {
                node.charge = node.max_charge;
                node.depleted_at = None;
                restored.push(*tile);
            }
        }
        if !restored.is_empty() {
            log::info!("tick={current_tick} respawned {} deposits", restored.len());
        }
        restored
    }

    pub fn deposit_at(&self, terrain: &dyn TerrainGrid, position: Vec2) -> Option<DepositSnapshot> {
        let tile = terrain.world_to_tile(position);
        self.nodes.get(&tile).map(|node| self.snapshot(terrain, tile, node))
    }

    /// Every node whose tile center lies inside the inclusive box.
    pub fn deposits_in_region(
        &self,
        terrain: &dyn TerrainGrid,
        min: Vec2,
        max: Vec2,
    ) -> Vec<DepositSnapshot> {
        self.nodes
            .iter()
            .filter(|(tile, _)| terrain.tile_to_world(**tile).within(min, max))
            .map(|(tile, node)| self.snapshot(terrain, *tile, node))
            .collect()
    }

    pub fn all_deposits(&self, terrain: &dyn TerrainGrid) -> Vec<DepositSnapshot> {
        self.nodes
            .iter()
            .map(|(tile, node)| self.snapshot(terrain, *tile, node))
            .collect()
    }

    pub fn counts(&self) -> DepositCounts {
        DepositCounts {
            total: self.nodes.len(),
            depleted: self.nodes.values().filter(|n| n.depleted_at.is_some()).count(),
        }
    }

    fn snapshot(&self, terrain: &dyn TerrainGrid, tile: TileCoord, node: &ResourceNode) -> DepositSnapshot {
        let (label, rarity) = self
            .types
            .get(&node.resource_type)
            .map(|rt| (rt.label.clone(), rt.rarity))
            .unwrap_or_else(|| (node.resource_type.clone(), Rarity::Common));
        DepositSnapshot {
            tile,
            position: terrain.tile_to_world(tile),
            resource_type: node.resource_type.clone(),
            label,
            rarity,
            charge: node.charge,
            max_charge: node.max_charge,
            depleted: node.depleted_at.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::terrain::OpenTerrain;

    fn meadow() -> ResourceNodeManager {
        let config = WorldConfig::default_test();
        ResourceNodeManager::new(&config.resource_types, config.deposits_for("meadow"))
    }

    #[test]
    fn seeds_start_full() {
        let terrain = OpenTerrain::default();
        let mgr = meadow();
        let all = mgr.all_deposits(&terrain);
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|d| d.charge == d.max_charge && !d.depleted));
    }

    #[test]
    fn mining_empty_tile_reports_no_deposit() {
        let terrain = OpenTerrain::default();
        let mut mgr = meadow();
        let err = mgr.mine(&terrain, Vec2::new(0.5, 0.5), 1).unwrap_err();
        assert_eq!(err, MineRejection::NoDeposit);
        assert_eq!(err.to_string(), "no ore deposit at this position");
    }

    #[test]
    fn inconsistent_zero_charge_without_marker_is_still_depleted() {
        let terrain = OpenTerrain::default();
        let mut mgr = meadow();
        let tile = TileCoord::new(5, 5);
        if let Some(node) = mgr.nodes.get_mut(&tile) {
            node.charge = 0;
        }
        let err = mgr.mine(&terrain, terrain.tile_to_world(tile), 1).unwrap_err();
        assert_eq!(err, MineRejection::Depleted);
    }

    #[test]
    fn marker_without_zero_charge_is_still_depleted() {
        let terrain = OpenTerrain::default();
        let mut mgr = meadow();
        let tile = TileCoord::new(5, 5);
        if let Some(node) = mgr.nodes.get_mut(&tile) {
            node.depleted_at = Some(0);
        }
        let err = mgr.mine(&terrain, terrain.tile_to_world(tile), 1).unwrap_err();
        assert_eq!(err.to_string(), "deposit depleted");
    }

    #[test]
    fn region_query_is_inclusive_on_tile_centers() {
        let terrain = OpenTerrain::default();
        let mgr = meadow();
        // (5,5) center is (5.5,5.5)
        let hits = mgr.deposits_in_region(&terrain, Vec2::new(5.5, 5.5), Vec2::new(12.5, 5.5));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tile, TileCoord::new(5, 5));
        assert_eq!(hits[0].label, "Iron Ore");
        assert_eq!(hits[0].rarity, Rarity::Common);
    }

    #[test]
    fn counts_track_depletion() {
        let terrain = OpenTerrain::default();
        let mut mgr = meadow();
        let crystal = terrain.tile_to_world(TileCoord::new(40, 40));
        mgr.mine(&terrain, crystal, 2).unwrap();
        assert_eq!(mgr.counts(), DepositCounts { total: 3, depleted: 1 });
    }
}
