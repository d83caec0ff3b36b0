//! Specialized collection types
//!
//! [`ScopedStorage`] is the handle table behind every asset kind. It is a
//! generational slot map: a handle is a slot index plus a version, freed slots
//! are recycled for the next insertion, and a handle captured before its slot
//! was recycled resolves to `None` instead of aliasing the new occupant.
//!
//! Every entry also carries an [`AssetScope`]. `Global` entries live for the
//! whole engine run, `Scene` entries are drained in bulk on scene teardown.

pub use slotmap::{Key, KeyData, SecondaryMap, SlotMap};

use serde::{Deserialize, Serialize};

/// Resource lifetime class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetScope {
    /// Created once at engine start, destroyed at shutdown
    Global,
    /// Created in a scene's setup, destroyed when the scene is torn down
    Scene,
}

/// Slot index of a handle, ignoring its version
///
/// Two handles with the same slot index but different versions refer to
/// different generations of the same slot.
pub fn slot_index<K: Key>(key: K) -> u32 {
    (key.data().as_ffi() & 0xFFFF_FFFF) as u32
}

/// Generational handle table partitioned into global and scene entries
pub struct ScopedStorage<K: Key, T> {
    items: SlotMap<K, T>,
    scopes: SecondaryMap<K, AssetScope>,
    global_count: usize,
}

impl<K: Key, T> ScopedStorage<K, T> {
    /// Create an empty storage
    pub fn new() -> Self {
        Self {
            items: SlotMap::with_key(),
            scopes: SecondaryMap::new(),
            global_count: 0,
        }
    }

    /// Take ownership of `item` and return its handle
    ///
    /// Recycles the most recently freed slot before growing.
    pub fn add(&mut self, item: T, scope: AssetScope) -> K {
        let key = self.items.insert(item);
        self.scopes.insert(key, scope);
        if scope == AssetScope::Global {
            self.global_count += 1;
        }
        key
    }

    /// Look up a live entry; unknown, null and stale handles yield `None`
    pub fn get(&self, key: K) -> Option<&T> {
        self.items.get(key)
    }

    /// Mutable lookup
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.items.get_mut(key)
    }

    /// Whether `key` refers to a live entry
    pub fn contains(&self, key: K) -> bool {
        self.items.contains_key(key)
    }

    /// Scope the entry was added with
    pub fn scope_of(&self, key: K) -> Option<AssetScope> {
        self.scopes.get(key).copied()
    }

    /// Remove an entry and hand ownership back to the caller
    ///
    /// A second call with the same handle returns `None`.
    pub fn erase(&mut self, key: K) -> Option<T> {
        let item = self.items.remove(key)?;
        if self.scopes.remove(key) == Some(AssetScope::Global) {
            self.global_count -= 1;
        }
        Some(item)
    }

    /// Remove every entry of one scope, leaving the other partition intact
    ///
    /// The drained objects are returned in handle order so the caller can
    /// release their GPU objects.
    pub fn erase_all(&mut self, scope: AssetScope) -> Vec<(K, T)> {
        let mut keys: Vec<K> = self
            .scopes
            .iter()
            .filter(|(_, s)| **s == scope)
            .map(|(k, _)| k)
            .collect();
        keys.sort_by_key(|k| slot_index(*k));

        keys.into_iter()
            .filter_map(|key| self.erase(key).map(|item| (key, item)))
            .collect()
    }

    /// Number of live entries across both scopes
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the storage holds no entries
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of live entries in one scope
    pub fn len_in(&self, scope: AssetScope) -> usize {
        match scope {
            AssetScope::Global => self.global_count,
            AssetScope::Scene => self.items.len() - self.global_count,
        }
    }

    /// Number of slots ever allocated, live or free
    ///
    /// Stays flat while freed slots are being recycled.
    pub fn slot_capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Iterate every live entry
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.items.iter()
    }

    /// Iterate every live entry mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> {
        self.items.iter_mut()
    }

    /// Iterate the entries of one scope
    pub fn iter_scope(&self, scope: AssetScope) -> impl Iterator<Item = (K, &T)> {
        self.items
            .iter()
            .filter(move |(k, _)| self.scopes.get(*k) == Some(&scope))
    }

    /// All live handles
    pub fn keys(&self) -> Vec<K> {
        self.items.keys().collect()
    }
}

impl<K: Key, T> Default for ScopedStorage<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    slotmap::new_key_type! {
        struct TestHandle;
    }

    #[test]
    fn test_add_then_get_returns_item() {
        let mut storage: ScopedStorage<TestHandle, &str> = ScopedStorage::new();
        let handle = storage.add("mesh", AssetScope::Scene);
        assert_eq!(storage.get(handle), Some(&"mesh"));
        assert_eq!(storage.scope_of(handle), Some(AssetScope::Scene));
    }

    #[test]
    fn test_erase_twice_returns_none_second_time() {
        let mut storage: ScopedStorage<TestHandle, u32> = ScopedStorage::new();
        let handle = storage.add(7, AssetScope::Scene);
        assert_eq!(storage.erase(handle), Some(7));
        assert_eq!(storage.erase(handle), None);
        assert!(storage.get(handle).is_none());
    }

    #[test]
    fn test_null_handle_resolves_to_none() {
        let mut storage: ScopedStorage<TestHandle, u32> = ScopedStorage::new();
        storage.add(1, AssetScope::Global);
        assert!(storage.get(TestHandle::null()).is_none());
    }

    #[test]
    fn test_freed_slot_is_reused_but_stale_handle_is_rejected() {
        let mut storage: ScopedStorage<TestHandle, &str> = ScopedStorage::new();
        let old = storage.add("first", AssetScope::Scene);
        storage.erase(old);

        let new = storage.add("second", AssetScope::Scene);
        assert_eq!(slot_index(old), slot_index(new));
        assert_ne!(old, new);
        assert!(storage.get(old).is_none());
        assert_eq!(storage.get(new), Some(&"second"));
    }

    #[test]
    fn test_erase_all_scene_keeps_global_entries() {
        let mut storage: ScopedStorage<TestHandle, u32> = ScopedStorage::new();
        let globals: Vec<_> = (0..3).map(|i| storage.add(i, AssetScope::Global)).collect();
        let scenes: Vec<_> = (10..14).map(|i| storage.add(i, AssetScope::Scene)).collect();

        let drained = storage.erase_all(AssetScope::Scene);
        assert_eq!(drained.len(), scenes.len());
        assert_eq!(storage.len(), globals.len());
        assert_eq!(storage.len_in(AssetScope::Scene), 0);
        assert_eq!(storage.len_in(AssetScope::Global), 3);

        for handle in globals {
            assert!(storage.contains(handle));
        }
        for handle in scenes {
            assert!(!storage.contains(handle));
        }
    }

    #[test]
    fn test_iter_scope_filters_partition() {
        let mut storage: ScopedStorage<TestHandle, u32> = ScopedStorage::new();
        storage.add(1, AssetScope::Global);
        storage.add(2, AssetScope::Scene);
        storage.add(3, AssetScope::Scene);

        let mut scene_values: Vec<u32> = storage
            .iter_scope(AssetScope::Scene)
            .map(|(_, v)| *v)
            .collect();
        scene_values.sort_unstable();
        assert_eq!(scene_values, vec![2, 3]);
    }
}
