//! Terrain contract consumed by zones, and the two grids the crate ships.
//!
//! Zones never look at tiles directly. Everything they need about the
//! ground goes through `TerrainGrid`, so the host can plug in its own
//! map representation.

use crate::{
    config::TerrainConfig,
    error::{SimError, SimResult},
    types::{TileCoord, Vec2},
};

/// Queries a zone makes against the ground it sits on.
pub trait TerrainGrid: Send + Sync {
    fn is_walkable(&self, pos: Vec2) -> bool;

    /// Movement cost multiplier at `pos`. 1.0 = full speed, higher = slower.
    fn movement_cost(&self, pos: Vec2) -> f64;

    /// Nearest walkable position to `pos`; `pos` itself when already walkable.
    fn clamp_to_walkable(&self, pos: Vec2) -> Vec2;

    fn world_to_tile(&self, pos: Vec2) -> TileCoord;

    /// Center of the tile in world space.
    fn tile_to_world(&self, tile: TileCoord) -> Vec2;
}

/// Unbounded open ground: everything walkable at cost 1.0.
#[derive(Debug, Clone, Copy)]
pub struct OpenTerrain {
    pub tile_size: f64,
}

impl Default for OpenTerrain {
    fn default() -> Self {
        Self { tile_size: 1.0 }
    }
}

impl TerrainGrid for OpenTerrain {
    fn is_walkable(&self, _pos: Vec2) -> bool {
        true
    }

    fn movement_cost(&self, _pos: Vec2) -> f64 {
        1.0
    }

    fn clamp_to_walkable(&self, pos: Vec2) -> Vec2 {
        pos
    }

    fn world_to_tile(&self, pos: Vec2) -> TileCoord {
        TileCoord::new(
            (pos.x / self.tile_size).floor() as i32,
            (pos.y / self.tile_size).floor() as i32,
        )
    }

    fn tile_to_world(&self, tile: TileCoord) -> Vec2 {
        Vec2::new(
            (tile.x as f64 + 0.5) * self.tile_size,
            (tile.y as f64 + 0.5) * self.tile_size,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Grass,
    Road,
    Sand,
    Swamp,
    Water,
    Rock,
}

impl TileKind {
    /// Legend: `.` grass, `=` road, `,` sand, `~` swamp, `W` water, `#` rock.
    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(Self::Grass),
            '=' => Some(Self::Road),
            ',' => Some(Self::Sand),
            '~' => Some(Self::Swamp),
            'W' => Some(Self::Water),
            '#' => Some(Self::Rock),
            _ => None,
        }
    }

    pub fn walkable(&self) -> bool {
        !matches!(self, Self::Water | Self::Rock)
    }

    pub fn cost(&self) -> f64 {
        match self {
            Self::Road => 0.75,
            Self::Grass => 1.0,
            Self::Sand => 1.5,
            Self::Swamp => 2.5,
            // Never entered, but a value is needed if something sits there.
            Self::Water | Self::Rock => 1.0,
        }
    }
}

/// A finite rectangular tile grid. Row 0 is the lowest y.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: i32,
    height: i32,
    tile_size: f64,
    origin: Vec2,
    tiles: Vec<TileKind>,
}

impl TileGrid {
    pub fn from_config(config: &TerrainConfig) -> SimResult<Self> {
        if config.tile_size.is_nan() || config.tile_size <= 0.0 {
            return Err(SimError::invalid_config(format!(
                "terrain '{}' must have positive tile_size",
                config.id
            )));
        }
        let height = config.rows.len();
        let width = config.rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if width == 0 {
            return Err(SimError::invalid_config(format!("terrain '{}' is empty", config.id)));
        }

        let mut tiles = Vec::with_capacity(width * height);
        for (y, row) in config.rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(SimError::invalid_config(format!(
                    "terrain '{}' row {y} has {} tiles, expected {width}",
                    config.id,
                    row.chars().count()
                )));
            }
            for glyph in row.chars() {
                let kind = TileKind::from_glyph(glyph).ok_or_else(|| {
                    SimError::invalid_config(format!(
                        "terrain '{}' row {y} has unknown glyph '{glyph}'",
                        config.id
                    ))
                })?;
                tiles.push(kind);
            }
        }

        Ok(Self {
            width: width as i32,
            height: height as i32,
            tile_size: config.tile_size,
            origin: config.origin,
            tiles,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tile(&self, tile: TileCoord) -> Option<TileKind> {
        if tile.x < 0 || tile.y < 0 || tile.x >= self.width || tile.y >= self.height {
            return None;
        }
        self.tiles.get((tile.y * self.width + tile.x) as usize).copied()
    }

    fn tile_walkable(&self, tile: TileCoord) -> bool {
        self.tile(tile).is_some_and(|k| k.walkable())
    }
}

impl TerrainGrid for TileGrid {
    fn is_walkable(&self, pos: Vec2) -> bool {
        self.tile_walkable(self.world_to_tile(pos))
    }

    fn movement_cost(&self, pos: Vec2) -> f64 {
        self.tile(self.world_to_tile(pos)).map(|k| k.cost()).unwrap_or(1.0)
    }

    fn clamp_to_walkable(&self, pos: Vec2) -> Vec2 {
        let start = self.world_to_tile(pos);
        if self.tile_walkable(start) {
            return pos;
        }

        // Search outward in square rings from the nearest in-grid tile.
        let anchor = TileCoord::new(
            start.x.clamp(0, self.width - 1),
            start.y.clamp(0, self.height - 1),
        );
        let max_ring = self.width.max(self.height);
        for ring in 0..=max_ring {
            let mut best: Option<(f64, Vec2)> = None;
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let tile = TileCoord::new(anchor.x + dx, anchor.y + dy);
                    if !self.tile_walkable(tile) {
                        continue;
                    }
                    let center = self.tile_to_world(tile);
                    let d = center.distance_sq(pos);
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, center));
                    }
                }
            }
            if let Some((_, center)) = best {
                return center;
            }
        }
        pos
    }

    fn world_to_tile(&self, pos: Vec2) -> TileCoord {
        TileCoord::new(
            ((pos.x - self.origin.x) / self.tile_size).floor() as i32,
            ((pos.y - self.origin.y) / self.tile_size).floor() as i32,
        )
    }

    fn tile_to_world(&self, tile: TileCoord) -> Vec2 {
        Vec2::new(
            self.origin.x + (tile.x as f64 + 0.5) * self.tile_size,
            self.origin.y + (tile.y as f64 + 0.5) * self.tile_size,
        )
    }
}
