//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! All randomness flows through ZoneRng instances derived from the
//! single world seed.
//!
//! Each zone gets its own stream, seeded from (world_seed XOR mixed
//! zone index). Adding a zone at the end of the layout never changes
//! the streams of existing zones, and a zone replays identically in
//! isolation.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use uuid::Uuid;

/// A named, deterministic RNG stream owned by one zone.
pub struct ZoneRng {
    pub name: String,
    inner: Pcg64Mcg,
}

impl ZoneRng {
    /// Create a stream from the world seed and a stable stream index.
    pub fn new(world_seed: u64, stream_index: u64) -> Self {
        let derived_seed = world_seed ^ (stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed".into(),
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll a float in [lo, hi).
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// A random (version 4) UUID drawn from this stream, so entity ids
    /// replay with the seed.
    pub fn uuid(&mut self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.inner.fill_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Hands out per-zone streams for one world.
pub struct RngBank {
    world_seed: u64,
}

impl RngBank {
    pub fn new(world_seed: u64) -> Self {
        Self { world_seed }
    }

    pub fn world_seed(&self) -> u64 {
        self.world_seed
    }

    /// Stream for the zone at `zone_index` in layout order.
    /// The index must never change once a zone is published.
    pub fn for_zone(&self, zone_index: u64, zone_id: &str) -> ZoneRng {
        ZoneRng::new(self.world_seed, zone_index).with_name(zone_id)
    }
}
