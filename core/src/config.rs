use crate::{
    clock::DEFAULT_TICK_INTERVAL_MS,
    error::{SimError, SimResult},
    types::{ResourceTypeId, TemplateId, Tick, TileCoord, Vec2, ZoneId},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

// ── Zones ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneBudget {
    pub max_population: u32,
    pub max_threat: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: ZoneId,
    #[serde(default)]
    pub label: String,
    /// Inclusive lower corner of the zone in world space.
    pub min: Vec2,
    /// Inclusive upper corner of the zone in world space.
    pub max: Vec2,
    pub budget: ZoneBudget,
    /// Key into `WorldConfig::terrains`. None = open ground.
    #[serde(default)]
    pub terrain: Option<String>,
    /// Per-zone override of the world tick interval.
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ZonesFile {
    #[serde(default = "default_tick_interval")]
    tick_interval_ms: u64,
    zones: Vec<ZoneConfig>,
}

fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

// ── Agent templates ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorMode {
    Idle,
    Territorial,
    Patrol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub id: TemplateId,
    pub name: String,
    pub category: String,
    pub tier: u32,
    /// Budget cost charged against the zone's max_threat per live instance.
    pub threat: u32,
    pub health: u32,
    /// World units per tick at movement cost 1.0.
    pub speed: f64,
    pub leash_radius: f64,
    pub perception_radius: f64,
    /// 0 = immortal.
    #[serde(default)]
    pub ttl_ticks: Tick,
    pub behavior: BehaviorMode,
}

#[derive(Debug, Clone, Deserialize)]
struct TemplatesFile {
    templates: Vec<AgentTemplate>,
}

// ── Resources ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTypeConfig {
    pub id: ResourceTypeId,
    pub label: String,
    pub rarity: Rarity,
    pub max_charge: u32,
    /// Ticks a depleted node waits before it refills completely.
    pub respawn_ticks: Tick,
}

/// One deposit placed at world boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositSeed {
    pub zone_id: ZoneId,
    pub resource_type: ResourceTypeId,
    pub tile: TileCoord,
}

#[derive(Debug, Clone, Deserialize)]
struct ResourcesFile {
    resource_types: Vec<ResourceTypeConfig>,
    deposits: Vec<DepositSeed>,
}

// ── Terrain ────────────────────────────────────────────────────────

/// A rectangular tile grid. Each row is a string of tile glyphs;
/// see `terrain::TileKind::from_glyph` for the legend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainConfig {
    pub id: String,
    pub tile_size: f64,
    #[serde(default)]
    pub origin: Vec2,
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TerrainFile {
    grids: Vec<TerrainConfig>,
}

// ── World ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub tick_interval_ms: u64,
    /// Layout order. A zone's index here selects its RNG stream.
    pub zones: Vec<ZoneConfig>,
    pub templates: HashMap<TemplateId, Arc<AgentTemplate>>,
    pub resource_types: HashMap<ResourceTypeId, ResourceTypeConfig>,
    pub deposits: Vec<DepositSeed>,
    pub terrains: HashMap<String, TerrainConfig>,
}

impl WorldConfig {
    /// Load from the data/ directory.
    /// In tests, use WorldConfig::default_test().
    pub fn load(data_dir: impl AsRef<Path>) -> SimResult<Self> {
        let dir = data_dir.as_ref();

        let zones_file: ZonesFile = read_json(&dir.join("zones.json"))?;
        let templates_file: TemplatesFile = read_json(&dir.join("templates.json"))?;
        let resources_file: ResourcesFile = read_json(&dir.join("resources.json"))?;

        // Terrain is optional: a world made only of open ground has no file.
        let terrain_path = dir.join("terrain.json");
        let terrains = if terrain_path.exists() {
            let file: TerrainFile = read_json(&terrain_path)?;
            file.grids.into_iter().map(|g| (g.id.clone(), g)).collect()
        } else {
            HashMap::new()
        };

        let config = Self {
            tick_interval_ms: zones_file.tick_interval_ms,
            zones: zones_file.zones,
            templates: templates_file
                .templates
                .into_iter()
                .map(|t| (t.id.clone(), Arc::new(t)))
                .collect(),
            resource_types: resources_file
                .resource_types
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            deposits: resources_file.deposits,
            terrains,
        };
        config.validate()?;
        log::info!(
            "loaded world config from {}: {} zones, {} templates, {} deposits",
            dir.display(),
            config.zones.len(),
            config.templates.len(),
            config.deposits.len()
        );
        Ok(config)
    }

    /// Reject layouts that would break runtime invariants before any
    /// zone is built.
    pub fn validate(&self) -> SimResult<()> {
        let mut zone_ids = HashSet::new();
        for zone in &self.zones {
            if !zone_ids.insert(zone.id.as_str()) {
                return Err(SimError::invalid_config(format!("duplicate zone id '{}'", zone.id)));
            }
            if zone.min.x > zone.max.x || zone.min.y > zone.max.y {
                return Err(SimError::invalid_config(format!(
                    "zone '{}' has min corner above max corner",
                    zone.id
                )));
            }
            if let Some(key) = &zone.terrain {
                if !self.terrains.contains_key(key) {
                    return Err(SimError::invalid_config(format!(
                        "zone '{}' references unknown terrain '{key}'",
                        zone.id
                    )));
                }
            }
        }

        for template in self.templates.values() {
            if template.speed.is_nan() || template.speed <= 0.0 {
                return Err(SimError::invalid_config(format!(
                    "template '{}' must have positive speed",
                    template.id
                )));
            }
            let bad_radius = |r: f64| !r.is_finite() || r < 0.0;
            if bad_radius(template.leash_radius) || bad_radius(template.perception_radius) {
                return Err(SimError::invalid_config(format!(
                    "template '{}' needs finite, non-negative radii",
                    template.id
                )));
            }
        }

        for rt in self.resource_types.values() {
            if rt.max_charge == 0 {
                return Err(SimError::invalid_config(format!(
                    "resource type '{}' must have max_charge > 0",
                    rt.id
                )));
            }
        }

        let mut seeded = HashSet::new();
        for seed in &self.deposits {
            if !zone_ids.contains(seed.zone_id.as_str()) {
                return Err(SimError::invalid_config(format!(
                    "deposit at {:?} references unknown zone '{}'",
                    seed.tile, seed.zone_id
                )));
            }
            if !self.resource_types.contains_key(&seed.resource_type) {
                return Err(SimError::invalid_config(format!(
                    "deposit at {:?} references unknown resource type '{}'",
                    seed.tile, seed.resource_type
                )));
            }
            if !seeded.insert((seed.zone_id.as_str(), seed.tile)) {
                return Err(SimError::invalid_config(format!(
                    "zone '{}' seeds two deposits on tile {:?}",
                    seed.zone_id, seed.tile
                )));
            }
        }
        Ok(())
    }

    pub fn zone(&self, zone_id: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.id == zone_id)
    }

    pub fn deposits_for(&self, zone_id: &str) -> impl Iterator<Item = &DepositSeed> + '_ {
        let zone_id = zone_id.to_string();
        self.deposits.iter().filter(move |d| d.zone_id == zone_id)
    }

    /// Effective tick interval for a zone.
    pub fn tick_interval_for(&self, zone: &ZoneConfig) -> u64 {
        zone.tick_interval_ms.unwrap_or(self.tick_interval_ms)
    }

    /// Config with hardcoded defaults for use in unit tests.
    ///
    /// One open-ground zone "meadow" spanning (0,0)-(100,100) with a
    /// population budget of 5 and a threat budget of 10, plus a second
    /// zone "caves" on a small tile grid with water and rock.
    pub fn default_test() -> Self {
        let templates = vec![
            AgentTemplate {
                id: "wolf".into(),
                name: "Grey Wolf".into(),
                category: "beast".into(),
                tier: 1,
                threat: 3,
                health: 40,
                speed: 2.0,
                leash_radius: 10.0,
                perception_radius: 8.0,
                ttl_ticks: 0,
                behavior: BehaviorMode::Patrol,
            },
            AgentTemplate {
                id: "sentinel".into(),
                name: "Stone Sentinel".into(),
                category: "construct".into(),
                tier: 2,
                threat: 2,
                health: 120,
                speed: 1.0,
                leash_radius: 4.0,
                perception_radius: 12.0,
                ttl_ticks: 0,
                behavior: BehaviorMode::Territorial,
            },
            AgentTemplate {
                id: "wisp".into(),
                name: "Marsh Wisp".into(),
                category: "spirit".into(),
                tier: 1,
                threat: 1,
                health: 5,
                speed: 1.5,
                leash_radius: 6.0,
                perception_radius: 4.0,
                ttl_ticks: 3,
                behavior: BehaviorMode::Idle,
            },
        ];

        let resource_types = vec![
            ResourceTypeConfig {
                id: "iron_ore".into(),
                label: "Iron Ore".into(),
                rarity: Rarity::Common,
                max_charge: 3,
                respawn_ticks: 10,
            },
            ResourceTypeConfig {
                id: "crystal".into(),
                label: "Shard Crystal".into(),
                rarity: Rarity::Rare,
                max_charge: 1,
                respawn_ticks: 40,
            },
        ];

        let deposits = vec![
            DepositSeed { zone_id: "meadow".into(), resource_type: "iron_ore".into(), tile: TileCoord::new(5, 5) },
            DepositSeed { zone_id: "meadow".into(), resource_type: "iron_ore".into(), tile: TileCoord::new(12, 3) },
            DepositSeed { zone_id: "meadow".into(), resource_type: "crystal".into(), tile: TileCoord::new(40, 40) },
            DepositSeed { zone_id: "caves".into(), resource_type: "crystal".into(), tile: TileCoord::new(1, 1) },
        ];

        let caves_terrain = TerrainConfig {
            id: "caves".into(),
            tile_size: 1.0,
            origin: Vec2::ZERO,
            rows: vec![
                "........".into(),
                "..==....".into(),
                "..==.~~.".into(),
                "....#~~.".into(),
                "....#...".into(),
                "WWWW#...".into(),
                "WWWW....".into(),
                "WWWW..,,".into(),
            ],
        };

        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            zones: vec![
                ZoneConfig {
                    id: "meadow".into(),
                    label: "Quiet Meadow".into(),
                    min: Vec2::new(0.0, 0.0),
                    max: Vec2::new(100.0, 100.0),
                    budget: ZoneBudget { max_population: 5, max_threat: 10 },
                    terrain: None,
                    tick_interval_ms: None,
                },
                ZoneConfig {
                    id: "caves".into(),
                    label: "Flooded Caves".into(),
                    min: Vec2::new(0.0, 0.0),
                    max: Vec2::new(8.0, 8.0),
                    budget: ZoneBudget { max_population: 20, max_threat: 40 },
                    terrain: Some("caves".into()),
                    tick_interval_ms: Some(50),
                },
            ],
            templates: templates.into_iter().map(|t| (t.id.clone(), Arc::new(t))).collect(),
            resource_types: resource_types.into_iter().map(|r| (r.id.clone(), r)).collect(),
            deposits,
            terrains: [(caves_terrain.id.clone(), caves_terrain)].into_iter().collect(),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> SimResult<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let parsed: T = serde_json::from_str(&content).map_err(|e| {
        log::error!("cannot parse {}: {e}", path.display());
        SimError::Serialization(e)
    })?;
    Ok(parsed)
}
