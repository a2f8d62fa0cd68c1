//! Forward gaze ray tracking.
//!
//! A [`GazeTracker`] owns one ray per actor. Every tick it asks a
//! [`RayHost`] for the nearest hit and turns identity changes into exit and
//! enter events, exit always first.

use std::panic::{self, AssertUnwindSafe};

use glam::Vec3;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::CastError;
use crate::scene::ObjectId;

/// Bit set of layers a ray may hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(u32);

impl LayerMask {
    pub const ALL: Self = Self(u32::MAX);
    pub const NONE: Self = Self(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn without(self, layer: u32) -> Self {
        Self(self.0 & !(1u32.checked_shl(layer).unwrap_or(0)))
    }

    pub fn with(self, layer: u32) -> Self {
        Self(self.0 | 1u32.checked_shl(layer).unwrap_or(0))
    }

    pub fn contains(self, layer: u32) -> bool {
        1u32.checked_shl(layer)
            .map(|bit| self.0 & bit != 0)
            .unwrap_or(false)
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
    /// Object the ray starts inside of, never reported as a hit.
    pub exclude: Option<ObjectId>,
}

/// Nearest object along a ray.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub target: ObjectId,
    pub distance: f32,
    pub tag: String,
    pub name: String,
}

/// Scene or physics host able to answer a single ray query.
pub trait RayHost {
    fn cast(&self, ray: &Ray, mask: LayerMask) -> Result<Option<HitRecord>, CastError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GazeEvent {
    Exit(HitRecord),
    Enter(HitRecord),
}

/// Result of one tracker tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GazeUpdate {
    pub exited: Option<HitRecord>,
    pub entered: Option<HitRecord>,
}

impl GazeUpdate {
    pub fn is_unchanged(&self) -> bool {
        self.exited.is_none() && self.entered.is_none()
    }

    /// Events in delivery order: exit before enter.
    pub fn events(&self) -> Vec<GazeEvent> {
        self.exited
            .iter()
            .cloned()
            .map(GazeEvent::Exit)
            .chain(self.entered.iter().cloned().map(GazeEvent::Enter))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GazeTracker {
    ray_length: f32,
    mask: LayerMask,
    current: Option<HitRecord>,
}

impl GazeTracker {
    pub fn new(ray_length: f32, mask: LayerMask) -> Self {
        Self {
            ray_length: ray_length.max(0.0),
            mask,
            current: None,
        }
    }

    pub fn ray_length(&self) -> f32 {
        self.ray_length
    }

    pub fn mask(&self) -> LayerMask {
        self.mask
    }

    /// Hit currently holding the gaze, refreshed every tick.
    pub fn current(&self) -> Option<&HitRecord> {
        self.current.as_ref()
    }

    /// Casts the ray once and reports any change of target.
    ///
    /// A host error or a panicking host counts as "no hit" for this tick.
    pub fn tick(
        &mut self,
        host: &dyn RayHost,
        origin: Vec3,
        forward: Vec3,
        exclude: Option<ObjectId>,
    ) -> GazeUpdate {
        let ray = Ray {
            origin,
            direction: forward.normalize_or_zero(),
            max_distance: self.ray_length,
            exclude,
        };
        let hit = match panic::catch_unwind(AssertUnwindSafe(|| host.cast(&ray, self.mask))) {
            Ok(Ok(hit)) => hit,
            Ok(Err(err)) => {
                warn!("Exception Processing Raycast: {err}");
                None
            }
            Err(_) => {
                warn!("Exception Processing Raycast: host panicked");
                None
            }
        };
        self.observe(hit)
    }

    /// Feeds an already computed hit into the tracker.
    pub fn observe(&mut self, hit: Option<HitRecord>) -> GazeUpdate {
        let previous = self.current.as_ref().map(|hit| hit.target);
        let next = hit.as_ref().map(|hit| hit.target);
        if previous == next {
            self.current = hit;
            return GazeUpdate::default();
        }

        let exited = std::mem::replace(&mut self.current, hit.clone());
        if let Some(exited) = &exited {
            debug!("Gaze left {} ({})", exited.name, exited.target);
        }
        if let Some(entered) = &hit {
            debug!(
                "Gaze entered {} ({}) at {:.2}",
                entered.name, entered.target, entered.distance
            );
        }
        GazeUpdate {
            exited,
            entered: hit,
        }
    }

    /// Forgets the current target, reporting it as exited.
    pub fn clear(&mut self) -> GazeUpdate {
        self.observe(None)
    }
}
