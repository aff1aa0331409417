//! # Indexed Registry
//!
//! Tables keyed by a `u32` wire index.
//!
//! The caller side uses [`IndexedRegistry::allocate`] to hand out indices
//! (shape numbers, constraint numbers, query callbacks). The backend side
//! mirrors them in a [`WireMap`] at the index it received. Received indices
//! are arbitrary, so the mirror never sizes storage by index.

use std::collections::HashMap;

/// A growable free-list table mapping wire indices to values.
///
/// # Thread Safety
///
/// This registry is NOT thread-safe. Each side of the boundary owns its own.
///
/// # Example
///
/// ```rust,ignore
/// let mut callbacks: IndexedRegistry<Box<dyn FnOnce(QueryResult)>> = IndexedRegistry::new();
///
/// // Allocate - O(1), reuses freed slots first
/// let index = callbacks.allocate(Box::new(|result| println!("{result:?}")));
///
/// // Free - O(1)
/// let callback = callbacks.free(index);
/// ```
#[derive(Debug)]
pub struct IndexedRegistry<T> {
    /// The storage array.
    storage: Vec<Option<T>>,
    /// Free list - indices of available slots.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> IndexedRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Creates a registry with `capacity` pre-allocated slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let storage: Vec<Option<T>> = (0..capacity).map(|_| None).collect();
        let free_list: Vec<u32> = (0..to_index(capacity)).rev().collect();

        Self {
            storage,
            free_list,
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value in the first free slot and returns its index.
    ///
    /// Freed slots are reused before the table grows.
    pub fn allocate(&mut self, value: T) -> u32 {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                self.storage.push(None);
                to_index(self.storage.len() - 1)
            }
        };

        self.storage[index as usize] = Some(value);
        self.len += 1;
        index
    }

    /// Frees a slot.
    ///
    /// Returns the stored value, or None if the slot was already empty.
    pub fn free(&mut self, index: u32) -> Option<T> {
        let value = self.storage.get_mut(index as usize)?.take()?;
        self.free_list.push(index);
        self.len -= 1;
        Some(value)
    }

    /// Gets a reference to a stored value.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.storage.get(index as usize)?.as_ref()
    }

    /// Gets a mutable reference to a stored value.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.storage.get_mut(index as usize)?.as_mut()
    }

    /// Returns true if the slot is occupied.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Removes every value, keeping the allocated slots.
    pub fn clear(&mut self) {
        for slot in &mut self.storage {
            *slot = None;
        }
        self.free_list.clear();
        self.free_list.extend((0..to_index(self.storage.len())).rev());
        self.len = 0;
    }

    /// Removes and returns every stored value with its index.
    pub fn drain(&mut self) -> Vec<(u32, T)> {
        let drained: Vec<(u32, T)> = self
            .storage
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.take().map(|v| (to_index(index), v)))
            .collect();
        self.clear();
        drained
    }

    /// Iterates over all stored values.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.storage
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|v| (to_index(index), v)))
    }

    /// Iterates mutably over all stored values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.storage
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|v| (to_index(index), v)))
    }
}

impl<T> Default for IndexedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// WIRE MAP
// =============================================================================

/// Values stored at indices chosen by the other side of the boundary.
///
/// Any `u32` is a valid key; memory follows the number of entries only.
#[derive(Debug)]
pub struct WireMap<T> {
    entries: HashMap<u32, T>,
}

impl<T> WireMap<T> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Number of stored values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores a value at `index`, returning the one it replaces.
    pub fn insert(&mut self, index: u32, value: T) -> Option<T> {
        self.entries.insert(index, value)
    }

    /// Removes the value at `index`.
    pub fn remove(&mut self, index: u32) -> Option<T> {
        self.entries.remove(&index)
    }

    /// Gets a reference to a stored value.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.entries.get(&index)
    }

    /// Gets a mutable reference to a stored value.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.entries.get_mut(&index)
    }

    /// Returns true if `index` holds a value.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.entries.contains_key(&index)
    }

    /// Removes and returns every value, lowest index first.
    pub fn drain(&mut self) -> Vec<(u32, T)> {
        let mut drained: Vec<(u32, T)> = self.entries.drain().collect();
        drained.sort_unstable_by_key(|&(index, _)| index);
        drained
    }

    /// Iterates over all stored values in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entries.iter().map(|(&index, value)| (index, value))
    }
}

impl<T> Default for WireMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_index(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_free() {
        let mut registry: IndexedRegistry<u32> = IndexedRegistry::new();

        let a = registry.allocate(42);
        assert_eq!(*registry.get(a).unwrap(), 42);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.free(a), Some(42));
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.free(a), None);
    }

    #[test]
    fn test_reuse() {
        let mut registry: IndexedRegistry<u32> = IndexedRegistry::new();

        let first = registry.allocate(1);
        let _second = registry.allocate(2);
        registry.free(first);

        let third = registry.allocate(3);
        assert_eq!(first, third); // Same slot reused
        assert_eq!(*registry.get(third).unwrap(), 3);
    }

    #[test]
    fn test_wire_map_far_index() {
        let mut map: WireMap<&str> = WireMap::new();

        assert_eq!(map.insert(u32::MAX, "last"), None);
        assert_eq!(map.insert(3_000_000_000, "far"), None);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(u32::MAX), Some(&"last"));

        assert_eq!(map.insert(u32::MAX, "again"), Some("last"));
        assert_eq!(map.remove(3_000_000_000), Some("far"));
        assert!(!map.contains(3_000_000_000));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_wire_map_drain_in_index_order() {
        let mut map: WireMap<u8> = WireMap::new();
        map.insert(9, 90);
        map.insert(2, 20);
        map.insert(5, 50);

        assert_eq!(map.drain(), vec![(2, 20), (5, 50), (9, 90)]);
        assert!(map.is_empty());
    }

    #[test]
    fn test_drain() {
        let mut registry: IndexedRegistry<u8> = IndexedRegistry::new();
        let a = registry.allocate(0);
        let b = registry.allocate(10);
        let c = registry.allocate(20);
        registry.free(b);

        let drained = registry.drain();
        assert_eq!(drained, vec![(a, 0), (c, 20)]);
        assert!(registry.is_empty());
        assert!(!registry.contains(c));
        // Every slot is free again, lowest first
        assert_eq!(registry.allocate(30), 0);
    }
}
