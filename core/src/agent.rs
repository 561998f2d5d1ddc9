//! Agent instances and their per-tick behavior.
//!
//! Behavior is fixed per template for the life of an instance:
//!   - idle, territorial: age only, never move
//!   - patrol: roam around the spawn point inside the leash radius
//!
//! Per-tick order for every behavior (never reordered):
//!   1. Age; expire when ttl is reached (no movement on the expiring tick).
//!   2. Patrol only: choose the active target (home if leashed out,
//!      otherwise the patrol target, picking a fresh one when needed).
//!   3. Patrol only: take one terrain-weighted step toward it.
//!   4. Clamp the final position to walkable ground.

use crate::{
    config::{AgentTemplate, BehaviorMode},
    rng::ZoneRng,
    terrain::TerrainGrid,
    types::{AgentId, TemplateId, Tick, Vec2},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fraction of the leash radius a patrol target may be placed at.
pub const PATROL_RADIUS_FACTOR: f64 = 0.8;
/// Walkability attempts before a patrol target falls back to spawn.
pub const PATROL_PICK_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Aged without attempting to move.
    Aged,
    Moved,
    /// The step landed on unwalkable ground and was discarded.
    Blocked,
    /// ttl reached this tick; the agent is now dead.
    Expired,
}

#[derive(Debug, Clone)]
pub struct AgentInstance {
    pub id: AgentId,
    pub template: Arc<AgentTemplate>,
    pub position: Vec2,
    pub spawn_position: Vec2,
    pub health: u32,
    pub ticks_alive: Tick,
    pub alive: bool,
    patrol_target: Option<Vec2>,
}

impl AgentInstance {
    pub fn new(id: AgentId, template: Arc<AgentTemplate>, position: Vec2) -> Self {
        Self {
            id,
            health: template.health,
            template,
            position,
            spawn_position: position,
            ticks_alive: 0,
            alive: true,
            patrol_target: None,
        }
    }

    pub fn threat(&self) -> u32 {
        self.template.threat
    }

    pub fn behavior(&self) -> BehaviorMode {
        self.template.behavior
    }

    pub fn patrol_target(&self) -> Option<Vec2> {
        self.patrol_target
    }

    /// Advance one simulated step.
    pub fn step(&mut self, terrain: &dyn TerrainGrid, rng: &mut ZoneRng) -> StepOutcome {
        if !self.alive {
            return StepOutcome::Expired;
        }

        self.ticks_alive += 1;
        let ttl = self.template.ttl_ticks;
        if ttl > 0 && self.ticks_alive >= ttl {
            self.alive = false;
            return StepOutcome::Expired;
        }

        let outcome = match self.template.behavior {
            BehaviorMode::Idle | BehaviorMode::Territorial => StepOutcome::Aged,
            BehaviorMode::Patrol => self.patrol(terrain, rng),
        };

        self.position = terrain.clamp_to_walkable(self.position);
        outcome
    }

    fn patrol(&mut self, terrain: &dyn TerrainGrid, rng: &mut ZoneRng) -> StepOutcome {
        let leash = self.template.leash_radius;
        let cost = terrain.movement_cost(self.position);
        let cost = if cost.is_finite() && cost > 0.0 { cost } else { 1.0 };
        let step_len = self.template.speed / cost;

        let target = if self.position.distance(self.spawn_position) > leash {
            // Returning home always overrides free roaming.
            self.patrol_target = None;
            self.spawn_position
        } else {
            match self.patrol_target {
                Some(t) if self.position.distance(t) > step_len => t,
                _ => {
                    let t = self.pick_patrol_target(terrain, rng);
                    self.patrol_target = Some(t);
                    t
                }
            }
        };

        let to_target = target - self.position;
        let remaining = to_target.length();
        if remaining <= f64::EPSILON {
            return StepOutcome::Aged;
        }

        let step = step_len.min(remaining);
        let destination = self.position + to_target.normalized() * step;

        if terrain.is_walkable(destination) {
            self.position = destination;
            StepOutcome::Moved
        } else {
            // No detours: drop the target and pick again next tick.
            self.patrol_target = None;
            StepOutcome::Blocked
        }
    }

    fn pick_patrol_target(&self, terrain: &dyn TerrainGrid, rng: &mut ZoneRng) -> Vec2 {
        let max_radius = self.template.leash_radius * PATROL_RADIUS_FACTOR;
        for _ in 0..PATROL_PICK_ATTEMPTS {
            let angle = rng.range_f64(0.0, std::f64::consts::TAU);
            let radius = rng.next_f64() * max_radius;
            let candidate = self.spawn_position + Vec2::new(angle.cos(), angle.sin()) * radius;
            if terrain.is_walkable(candidate) {
                return candidate;
            }
        }
        self.spawn_position
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            template_id: self.template.id.clone(),
            name: self.template.name.clone(),
            category: self.template.category.clone(),
            tier: self.template.tier,
            behavior: self.template.behavior,
            threat: self.template.threat,
            position: self.position,
            spawn_position: self.spawn_position,
            health: self.health,
            ticks_alive: self.ticks_alive,
            alive: self.alive,
        }
    }
}

/// Read-only copy of an agent handed to callers outside the zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub template_id: TemplateId,
    pub name: String,
    pub category: String,
    pub tier: u32,
    pub behavior: BehaviorMode,
    pub threat: u32,
    pub position: Vec2,
    pub spawn_position: Vec2,
    pub health: u32,
    pub ticks_alive: Tick,
    pub alive: bool,
}
