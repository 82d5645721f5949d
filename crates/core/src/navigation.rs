//! Navigation adapter.
//!
//! The agent never plans paths itself. It talks to a navigation service through
//! the [`Navigator`] trait: snap a point onto the walkable surface, hand over a
//! destination, and poll for arrival. [`NavMesh`] and [`NavMeshAgent`] are a
//! small in-process implementation (flat walkable rectangles and straight-line
//! steering) used by the service binary and by tests.

use crate::math::Vec3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Search radius used when snapping a requested point onto the walkable surface.
pub const SNAP_RADIUS: f32 = 5.0;

/// Contract over an external navigation-mesh query and steering service.
pub trait Navigator: Send {
    /// Current world position of the steered body.
    fn position(&self) -> Vec3;

    /// Current facing direction (unit length, flat).
    fn forward(&self) -> Vec3;

    /// Whether the body currently stands on the walkable surface.
    fn is_on_navmesh(&self) -> bool;

    /// Nearest walkable point within `radius` of `point`, if any.
    fn try_snap(&self, point: Vec3, radius: f32) -> Option<Vec3>;

    fn set_destination(&mut self, point: Vec3);

    fn reset_destination(&mut self);

    /// The live destination, or `None` when no path is active.
    fn destination(&self) -> Option<Vec3>;

    fn remaining_distance(&self) -> f32;

    /// Distance from the destination at which the body counts as arrived.
    fn stopping_distance(&self) -> f32;

    fn velocity(&self) -> Vec3;

    /// True while the service is still computing a path.
    fn path_pending(&self) -> bool {
        false
    }

    /// Turn the body to face `point`.
    fn look_at(&mut self, point: Vec3);

    /// Advance steering by `dt` seconds. Services that steer on their own
    /// schedule leave this as a no-op.
    fn advance(&mut self, _dt: f32) {}

    /// Arrival check: no pending path, within stopping distance, and either
    /// the path is gone or the body has come to rest.
    fn has_arrived(&self) -> bool {
        !self.path_pending()
            && self.remaining_distance() <= self.stopping_distance()
            && (self.destination().is_none() || self.velocity().length_squared() == 0.0)
    }
}

/// An axis-aligned walkable rectangle at a fixed elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkableArea {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
    #[serde(default)]
    pub elevation: f32,
}

impl WalkableArea {
    pub fn new(a: (f32, f32), b: (f32, f32), elevation: f32) -> Self {
        Self {
            min_x: a.0.min(b.0),
            max_x: a.0.max(b.0),
            min_z: a.1.min(b.1),
            max_z: a.1.max(b.1),
            elevation,
        }
    }

    /// Closest point of the area to `point`. Tolerates swapped bounds.
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let (lo_x, hi_x) = (self.min_x.min(self.max_x), self.min_x.max(self.max_x));
        let (lo_z, hi_z) = (self.min_z.min(self.max_z), self.min_z.max(self.max_z));
        Vec3::new(
            point.x.max(lo_x).min(hi_x),
            self.elevation,
            point.z.max(lo_z).min(hi_z),
        )
    }
}

/// A walkable surface made of one or more rectangles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavMesh {
    pub areas: Vec<WalkableArea>,
}

impl NavMesh {
    pub fn new(areas: Vec<WalkableArea>) -> Self {
        Self { areas }
    }

    /// Nearest walkable point within `radius`. The first area wins ties.
    pub fn sample(&self, point: Vec3, radius: f32) -> Option<Vec3> {
        let mut best: Option<(Vec3, f32)> = None;
        for area in &self.areas {
            let candidate = area.closest_point(point);
            let dist = candidate.distance(point);
            if dist.is_nan() || dist > radius {
                continue;
            }
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((candidate, dist));
            }
        }
        best.map(|(p, _)| p)
    }
}

const ON_MESH_TOLERANCE: f32 = 0.1;

/// A body steered in straight lines across a [`NavMesh`].
#[derive(Debug, Clone)]
pub struct NavMeshAgent {
    mesh: Arc<NavMesh>,
    position: Vec3,
    forward: Vec3,
    destination: Option<Vec3>,
    velocity: Vec3,
    speed: f32,
    stopping_distance: f32,
}

impl NavMeshAgent {
    pub fn new(mesh: Arc<NavMesh>, position: Vec3) -> Self {
        Self {
            mesh,
            position,
            forward: Vec3::FORWARD,
            destination: None,
            velocity: Vec3::ZERO,
            speed: 3.5,
            stopping_distance: 0.1,
        }
    }

    pub fn with_forward(mut self, forward: Vec3) -> Self {
        let dir = forward.flat().normalized();
        if dir != Vec3::ZERO {
            self.forward = dir;
        }
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    pub fn with_stopping_distance(mut self, stopping_distance: f32) -> Self {
        self.stopping_distance = stopping_distance.max(0.0);
        self
    }
}

impl Navigator for NavMeshAgent {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn forward(&self) -> Vec3 {
        self.forward
    }

    fn is_on_navmesh(&self) -> bool {
        self.mesh.sample(self.position, ON_MESH_TOLERANCE).is_some()
    }

    fn try_snap(&self, point: Vec3, radius: f32) -> Option<Vec3> {
        self.mesh.sample(point, radius)
    }

    fn set_destination(&mut self, point: Vec3) {
        self.destination = Some(point);
    }

    fn reset_destination(&mut self) {
        self.destination = None;
        self.velocity = Vec3::ZERO;
    }

    fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    fn remaining_distance(&self) -> f32 {
        self.destination
            .map(|d| self.position.distance(d))
            .unwrap_or(0.0)
    }

    fn stopping_distance(&self) -> f32 {
        self.stopping_distance
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn look_at(&mut self, point: Vec3) {
        let dir = (point - self.position).flat().normalized();
        if dir != Vec3::ZERO {
            self.forward = dir;
        }
    }

    fn advance(&mut self, dt: f32) {
        let Some(dest) = self.destination else {
            return;
        };
        let to_dest = dest - self.position;
        let dist = to_dest.length();
        if dist <= self.stopping_distance {
            self.destination = None;
            self.velocity = Vec3::ZERO;
            return;
        }

        let step = self.speed * dt.max(0.0);
        let dir = to_dest.normalized();
        if step >= dist {
            self.position = dest;
            self.destination = None;
            self.velocity = Vec3::ZERO;
        } else {
            self.position = self.position + dir * step;
            self.velocity = dir * self.speed;
        }
        let facing = dir.flat().normalized();
        if facing != Vec3::ZERO {
            self.forward = facing;
        }
    }
}
