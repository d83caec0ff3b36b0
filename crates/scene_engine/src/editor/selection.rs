//! Editor selection set

use crate::assets::{Assets, EntityHandle};

/// Ordered set of selected entities; the last added is the primary one
#[derive(Debug, Default, Clone)]
pub struct Selection {
    entities: Vec<EntityHandle>,
}

impl Selection {
    /// Empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity; refused for stale handles and non-selectable entities
    pub fn add(&mut self, assets: &Assets, handle: EntityHandle) -> bool {
        if !assets.entity(handle).is_some_and(|e| e.is_selectable()) {
            return false;
        }
        if !self.entities.contains(&handle) {
            self.entities.push(handle);
        }
        true
    }

    /// Remove an entity; returns whether it was selected
    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        let before = self.entities.len();
        self.entities.retain(|h| *h != handle);
        self.entities.len() != before
    }

    /// Replace the selection with one entity
    pub fn select_only(&mut self, assets: &Assets, handle: EntityHandle) -> bool {
        self.clear();
        self.add(assets, handle)
    }

    /// Toggle membership of an entity
    pub fn toggle(&mut self, assets: &Assets, handle: EntityHandle) -> bool {
        if self.remove(handle) {
            false
        } else {
            self.add(assets, handle)
        }
    }

    /// Deselect everything
    pub fn clear(&mut self) {
        if !self.entities.is_empty() {
            log::debug!("Selection cleared ({} entities)", self.entities.len());
        }
        self.entities.clear();
    }

    /// Drop handles whose entity no longer exists
    pub fn retain_live(&mut self, assets: &Assets) {
        self.entities.retain(|h| assets.entity(*h).is_some());
    }

    /// Whether an entity is selected
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.entities.contains(&handle)
    }

    /// Most recently added entity
    pub fn primary(&self) -> Option<EntityHandle> {
        self.entities.last().copied()
    }

    /// Selected entities in selection order
    pub fn iter(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.entities.iter().copied()
    }

    /// Number of selected entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::AssetScope;
    use crate::scene::EntityKind;

    #[test]
    fn test_selection_respects_selectable_flag() {
        let mut assets = Assets::new();
        let a = assets.create_entity(AssetScope::Scene, "a", EntityKind::GameObject).unwrap();
        let locked = assets.create_entity(AssetScope::Scene, "locked", EntityKind::GameObject).unwrap();
        assets.entity_mut(locked).unwrap().set_selectable(false);

        let mut selection = Selection::new();
        assert!(selection.add(&assets, a));
        assert!(selection.add(&assets, a));
        assert!(!selection.add(&assets, locked));
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.primary(), Some(a));
    }

    #[test]
    fn test_toggle_and_retain_live() {
        let mut assets = Assets::new();
        let a = assets.create_entity(AssetScope::Scene, "a", EntityKind::GameObject).unwrap();
        let b = assets.create_entity(AssetScope::Scene, "b", EntityKind::GameObject).unwrap();

        let mut selection = Selection::new();
        assert!(selection.toggle(&assets, a));
        assert!(selection.toggle(&assets, b));
        assert!(!selection.toggle(&assets, a));
        assert!(!selection.contains(a));

        assets.destroy_entity(b);
        selection.retain_live(&assets);
        assert!(selection.is_empty());
    }
}
