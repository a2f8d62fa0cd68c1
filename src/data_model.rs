use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use crate::error::CastError;
use crate::gaze::{HitRecord, LayerMask, Ray, RayHost};
use crate::scene::{ObjectId, SceneObject};

/// Thread-safe container mirroring the mutable state of the scene graph.
///
/// Doubles as the ray-cast host: every object is treated as an axis-aligned
/// box of its `scale` centred on its `position`.
#[derive(Debug, Default)]
pub struct DataModel {
    objects: Arc<RwLock<Vec<SceneObject>>>,
}

impl Clone for DataModel {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
        }
    }
}

impl DataModel {
    /// Creates an empty data model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a data model from an initial set of objects.
    pub fn from_objects(objects: Vec<SceneObject>) -> Self {
        Self {
            objects: Arc::new(RwLock::new(objects)),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Returns a clone of the requested object.
    pub fn get(&self, id: ObjectId) -> Option<SceneObject> {
        self.objects
            .read()
            .iter()
            .find(|object| object.id == id)
            .cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<SceneObject> {
        self.objects
            .read()
            .iter()
            .find(|object| object.name == name)
            .cloned()
    }

    pub fn find_by_entity(&self, entity: &str) -> Option<SceneObject> {
        self.objects
            .read()
            .iter()
            .find(|object| object.entity.as_deref() == Some(entity))
            .cloned()
    }

    /// Removes an object from the scene, returning it.
    pub fn remove(&self, id: ObjectId) -> Option<SceneObject> {
        let mut guard = self.objects.write();
        let index = guard.iter().position(|object| object.id == id)?;
        Some(guard.remove(index))
    }

    /// Applies a mutation to the requested object.
    pub fn update<F, R>(&self, id: ObjectId, mut updater: F) -> Option<R>
    where
        F: FnMut(&mut SceneObject) -> R,
    {
        let mut guard = self.objects.write();
        let object = guard.iter_mut().find(|object| object.id == id)?;
        Some(updater(object))
    }

    pub fn set_rotation(&self, id: ObjectId, rotation: Vec3) -> bool {
        self.update(id, |obj| obj.rotation = rotation).is_some()
    }
}

impl RayHost for DataModel {
    fn cast(&self, ray: &Ray, mask: LayerMask) -> Result<Option<HitRecord>, CastError> {
        if !ray.direction.is_finite() || ray.direction.length_squared() <= f32::EPSILON {
            return Err(CastError::new("ray direction is degenerate"));
        }
        let guard = self.objects.read();
        let nearest = guard
            .iter()
            .filter(|object| Some(object.id) != ray.exclude && mask.contains(object.layer))
            .filter_map(|object| {
                let (min, max) = object.bounds();
                ray_box_distance(ray.origin, ray.direction, min, max)
                    .filter(|distance| *distance <= ray.max_distance)
                    .map(|distance| (distance, object))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));
        Ok(nearest.map(|(distance, object)| HitRecord {
            target: object.id,
            distance,
            tag: object.tag.clone(),
            name: object.name.clone(),
        }))
    }
}

/// Slab test. Returns the entry distance, or zero when the origin is inside.
fn ray_box_distance(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let inverse = direction.recip();
    let t1 = (min - origin) * inverse;
    let t2 = (max - origin) * inverse;
    let near = t1.min(t2);
    let far = t1.max(t2);
    // Axis-parallel rays yield NaN on the slabs they start inside of.
    let enter = [near.x, near.y, near.z]
        .into_iter()
        .filter(|t| !t.is_nan())
        .fold(f32::NEG_INFINITY, f32::max);
    let exit = [far.x, far.y, far.z]
        .into_iter()
        .filter(|t| !t.is_nan())
        .fold(f32::INFINITY, f32::min);
    if exit < enter.max(0.0) {
        return None;
    }
    Some(enter.max(0.0))
}
