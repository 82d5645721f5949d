//! Taggable world objects the agent can look up by name or tag.

use crate::math::Vec3;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// An object placed in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
    pub position: Vec3,
}

impl WorldObject {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            tag: None,
            position,
        }
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }

    pub fn to_ref(&self) -> ObjectRef {
        ObjectRef {
            name: self.name.clone(),
            position: self.position,
        }
    }
}

/// A resolved reference to a world object, captured at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRef {
    pub name: String,
    pub position: Vec3,
}

/// Read-only queries the agent runs against the scene.
///
/// Implementations must enumerate objects in a stable order so that nearest
/// target selection is deterministic.
pub trait World: Send + Sync {
    fn find_by_name(&self, name: &str) -> Option<ObjectRef>;

    fn find_with_tag(&self, tag: &str) -> Vec<ObjectRef>;
}

/// In-memory scene. Objects keep their insertion order.
#[derive(Debug, Default)]
pub struct Scene {
    objects: RwLock<Vec<WorldObject>>,
}

impl Scene {
    pub fn new(objects: Vec<WorldObject>) -> Self {
        Self {
            objects: RwLock::new(objects),
        }
    }

    pub fn insert(&self, object: WorldObject) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(object);
    }

    /// Removes the first object with `name`. Returns whether one was removed.
    pub fn remove(&self, name: &str) -> bool {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        match objects.iter().position(|o| o.name == name) {
            Some(idx) => {
                objects.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn set_position(&self, name: &str, position: Vec3) -> bool {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        match objects.iter_mut().find(|o| o.name == name) {
            Some(object) => {
                object.position = position;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl World for Scene {
    fn find_by_name(&self, name: &str) -> Option<ObjectRef> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|o| o.name == name)
            .map(WorldObject::to_ref)
    }

    fn find_with_tag(&self, tag: &str) -> Vec<ObjectRef> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|o| o.has_tag(tag))
            .map(WorldObject::to_ref)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_queries() {
        let scene = Scene::new(vec![
            WorldObject::new("Raider", Vec3::new(1.0, 0.0, 0.0)).tagged("enemy"),
            WorldObject::new("Crate", Vec3::new(2.0, 0.0, 0.0)).tagged("cover"),
            WorldObject::new("Brute", Vec3::new(3.0, 0.0, 0.0)).tagged("enemy"),
        ]);

        let enemies: Vec<_> = scene
            .find_with_tag("enemy")
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(enemies, vec!["Raider", "Brute"]);
        assert!(scene.find_with_tag("Enemy").is_empty());
        assert_eq!(
            scene.find_by_name("Crate").map(|o| o.position),
            Some(Vec3::new(2.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_scene_mutation() {
        let scene = Scene::default();
        assert!(scene.is_empty());
        scene.insert(WorldObject::new("Raider", Vec3::ZERO).tagged("enemy"));
        assert!(scene.set_position("Raider", Vec3::new(5.0, 0.0, 5.0)));
        assert_eq!(
            scene.find_by_name("Raider").map(|o| o.position),
            Some(Vec3::new(5.0, 0.0, 5.0))
        );
        assert!(scene.remove("Raider"));
        assert!(!scene.remove("Raider"));
        assert_eq!(scene.len(), 0);
    }
}
