//! Target resolution for commands that act on a world object.

use crate::math::Vec3;
use crate::world::{ObjectRef, World};

/// Resolves the object a command should act on.
///
/// An explicit `name` wins when it matches an object exactly. Otherwise the
/// object tagged `tag` closest to `origin` is chosen, with ties going to the
/// first one the world enumerates.
pub fn resolve(world: &dyn World, origin: Vec3, name: Option<&str>, tag: &str) -> Option<ObjectRef> {
    if let Some(found) = name.and_then(|n| world.find_by_name(n)) {
        return Some(found);
    }
    nearest(origin, world.find_with_tag(tag))
}

/// Closest candidate to `origin`. The earliest candidate wins ties.
pub fn nearest(origin: Vec3, candidates: impl IntoIterator<Item = ObjectRef>) -> Option<ObjectRef> {
    let mut best: Option<(ObjectRef, f32)> = None;
    for candidate in candidates {
        let dist = origin.distance(candidate.position);
        if best.as_ref().is_none_or(|(_, best_dist)| dist < *best_dist) {
            best = Some((candidate, dist));
        }
    }
    best.map(|(object, _)| object)
}
