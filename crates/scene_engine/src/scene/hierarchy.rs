//! Parent/child transform hierarchy
//!
//! Entities live in a flat handle table; the tree is expressed through
//! parent handles plus child lists kept in sync by [`set_parent`] and
//! [`detach`]. World matrices are cached on each entity and recomputed
//! top-down by [`update_world_transforms`] for every dirty subtree.

use crate::assets::EntityHandle;
use crate::foundation::collections::ScopedStorage;
use crate::foundation::math::Mat4;
use crate::scene::bounds::Aabb;
use crate::scene::entity::Entity;
use crate::scene::SceneError;

type EntityStorage = ScopedStorage<EntityHandle, Entity>;

/// Whether `ancestor` appears on the parent chain of `node`, `node` included
pub fn is_ancestor(entities: &EntityStorage, ancestor: EntityHandle, node: EntityHandle) -> bool {
    let mut current = Some(node);
    let mut steps = 0;
    while let Some(handle) = current {
        if handle == ancestor {
            return true;
        }
        steps += 1;
        if steps > entities.len() {
            break;
        }
        current = entities.get(handle).and_then(Entity::parent);
    }
    false
}

/// Re-parent `child`; `None` makes it a root
///
/// Fails when either handle is stale or when `parent` lies in `child`'s
/// subtree. On failure nothing changes.
pub fn set_parent(
    entities: &mut EntityStorage,
    child: EntityHandle,
    parent: Option<EntityHandle>,
) -> Result<(), SceneError> {
    if !entities.contains(child) {
        return Err(SceneError::MissingEntity);
    }
    if let Some(parent) = parent {
        if !entities.contains(parent) {
            return Err(SceneError::MissingEntity);
        }
        if is_ancestor(entities, child, parent) {
            let name = |h| entities.get(h).map(|e: &Entity| e.name().to_owned()).unwrap_or_default();
            return Err(SceneError::HierarchyCycle {
                child: name(child),
                parent: name(parent),
            });
        }
    }

    let old_parent = entities.get(child).and_then(Entity::parent);
    if old_parent == parent {
        return Ok(());
    }
    if let Some(old) = old_parent.and_then(|h| entities.get_mut(h)) {
        old.children.retain(|c| *c != child);
    }
    if let Some(new) = parent.and_then(|h| entities.get_mut(h)) {
        new.children.push(child);
    }
    if let Some(entity) = entities.get_mut(child) {
        entity.parent = parent;
        entity.transform_dirty = true;
    }

    debug_assert!(is_acyclic(entities), "transform hierarchy contains a cycle");
    Ok(())
}

/// Unlink an entity that is about to be erased
///
/// Removes it from its parent's child list and turns its children into roots.
pub fn detach(entities: &mut EntityStorage, handle: EntityHandle) {
    let Some(entity) = entities.get_mut(handle) else { return };
    let parent = entity.parent.take();
    let children = std::mem::take(&mut entity.children);

    if let Some(parent) = parent.and_then(|h| entities.get_mut(h)) {
        parent.children.retain(|c| *c != handle);
    }
    for child in children {
        if let Some(child) = entities.get_mut(child) {
            child.parent = None;
            child.transform_dirty = true;
        }
    }
}

/// Recompute cached world matrices and bounds of every dirty subtree
///
/// `mesh_bounds` maps an entity to the local-space bounds of its mesh; nodes
/// without a mesh get a degenerate box at their world position. Returns the
/// number of entities updated.
pub fn update_world_transforms<F>(entities: &mut EntityStorage, mesh_bounds: F) -> usize
where
    F: Fn(&Entity) -> Option<Aabb>,
{
    let mut roots: Vec<(u32, EntityHandle)> = entities
        .iter()
        .filter(|(_, e)| e.parent().map_or(true, |p| !entities.contains(p)))
        .map(|(h, e)| (e.id(), h))
        .collect();
    roots.sort_unstable_by_key(|(id, _)| *id);

    let mut stack: Vec<(EntityHandle, Mat4, bool)> = roots
        .into_iter()
        .rev()
        .map(|(_, h)| (h, Mat4::identity(), false))
        .collect();

    let mut updated = 0;
    while let Some((handle, parent_world, parent_changed)) = stack.pop() {
        let Some(entity) = entities.get_mut(handle) else { continue };

        let changed = parent_changed || entity.is_transform_dirty();
        if changed {
            let world = parent_world * entity.transform().to_matrix();
            entity.set_world_matrix(world);
            let bounds = mesh_bounds(entity)
                .map(|local| local.transformed(&world))
                .unwrap_or_else(|| Aabb::from_points([entity.world_position()]));
            entity.set_bounds(bounds);
            updated += 1;
        }

        let world = *entity.world_matrix();
        for child in entity.children().iter().rev() {
            stack.push((*child, world, changed));
        }
    }

    if updated > 0 {
        log::trace!("Updated {} world transforms", updated);
    }
    updated
}

/// Whether every parent chain terminates
pub fn is_acyclic(entities: &EntityStorage) -> bool {
    entities.iter().all(|(handle, _)| {
        let mut current = entities.get(handle).and_then(Entity::parent);
        for _ in 0..entities.len() {
            match current {
                Some(h) if h == handle => return false,
                Some(h) => current = entities.get(h).and_then(Entity::parent),
                None => return true,
            }
        }
        current.is_none()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::AssetScope;
    use crate::foundation::math::Vec3;
    use crate::scene::EntityKind;
    use approx::assert_relative_eq;

    fn storage_with(n: u32) -> (EntityStorage, Vec<EntityHandle>) {
        let mut storage = EntityStorage::new();
        let handles = (1..=n)
            .map(|id| storage.add(Entity::new(id, format!("e{id}"), EntityKind::GameObject), AssetScope::Scene))
            .collect();
        (storage, handles)
    }

    #[test]
    fn test_set_parent_links_both_sides() {
        let (mut storage, h) = storage_with(2);
        set_parent(&mut storage, h[1], Some(h[0])).unwrap();
        assert_eq!(storage.get(h[1]).unwrap().parent(), Some(h[0]));
        assert_eq!(storage.get(h[0]).unwrap().children(), &[h[1]]);

        set_parent(&mut storage, h[1], None).unwrap();
        assert!(storage.get(h[0]).unwrap().children().is_empty());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let (mut storage, h) = storage_with(3);
        set_parent(&mut storage, h[1], Some(h[0])).unwrap();
        set_parent(&mut storage, h[2], Some(h[1])).unwrap();

        let result = set_parent(&mut storage, h[0], Some(h[2]));
        assert!(matches!(result, Err(SceneError::HierarchyCycle { .. })));
        assert!(set_parent(&mut storage, h[0], Some(h[0])).is_err());
        assert_eq!(storage.get(h[0]).unwrap().parent(), None);
        assert!(is_acyclic(&storage));
    }

    #[test]
    fn test_world_transform_composes_parent() {
        let (mut storage, h) = storage_with(2);
        set_parent(&mut storage, h[1], Some(h[0])).unwrap();
        storage.get_mut(h[0]).unwrap().set_position(Vec3::new(1.0, 0.0, 0.0));
        storage.get_mut(h[1]).unwrap().set_position(Vec3::new(0.0, 2.0, 0.0));

        assert_eq!(update_world_transforms(&mut storage, |_| None), 2);
        let child = storage.get(h[1]).unwrap().world_position();
        assert_relative_eq!(child, Vec3::new(1.0, 2.0, 0.0));

        assert_eq!(update_world_transforms(&mut storage, |_| None), 0);
    }

    #[test]
    fn test_moving_parent_updates_children() {
        let (mut storage, h) = storage_with(2);
        set_parent(&mut storage, h[1], Some(h[0])).unwrap();
        update_world_transforms(&mut storage, |_| None);

        storage.get_mut(h[0]).unwrap().set_position(Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(update_world_transforms(&mut storage, |_| None), 2);
        assert_relative_eq!(storage.get(h[1]).unwrap().world_position().z, 3.0);
    }

    #[test]
    fn test_bounds_follow_transform() {
        let (mut storage, h) = storage_with(1);
        storage.get_mut(h[0]).unwrap().set_position(Vec3::new(5.0, 0.0, 0.0));
        update_world_transforms(&mut storage, |_| {
            Some(Aabb::new(Vec3::repeat(-1.0), Vec3::repeat(1.0)))
        });
        let bounds = storage.get(h[0]).unwrap().bounds();
        assert_relative_eq!(bounds.min.x, 4.0);
        assert_relative_eq!(bounds.max.x, 6.0);
    }

    #[test]
    fn test_detach_orphans_children() {
        let (mut storage, h) = storage_with(3);
        set_parent(&mut storage, h[1], Some(h[0])).unwrap();
        set_parent(&mut storage, h[2], Some(h[1])).unwrap();

        detach(&mut storage, h[1]);
        storage.erase(h[1]);
        assert!(storage.get(h[0]).unwrap().children().is_empty());
        assert_eq!(storage.get(h[2]).unwrap().parent(), None);
    }
}
