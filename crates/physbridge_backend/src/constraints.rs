//! # Constraint Table
//!
//! Wire constraint indices mapped to engine handles, with the reverse
//! per-body lists the cascading destroy needs.
//!
//! Vehicles live in the same table: they are constraints with a single
//! body and no second endpoint.

use std::collections::HashMap;

use physbridge_core::WireMap;

use crate::engine::{BodyHandle, ConstraintHandle};

/// One registered constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstraintEntry {
    /// Engine handle.
    pub handle: ConstraintHandle,
    /// First endpoint (the chassis for vehicles).
    pub body1: BodyHandle,
    /// Second endpoint. `None` for vehicles.
    pub body2: Option<BodyHandle>,
}

impl ConstraintEntry {
    /// True for vehicle entries.
    #[must_use]
    pub const fn is_vehicle(&self) -> bool {
        self.body2.is_none()
    }

    /// The endpoint that is not `body`, if any.
    #[must_use]
    pub fn other(&self, body: BodyHandle) -> Option<BodyHandle> {
        if self.body1 == body {
            self.body2
        } else {
            Some(self.body1)
        }
    }
}

/// Constraint registry keyed by wire index.
#[derive(Debug, Default)]
pub struct ConstraintTable {
    entries: WireMap<ConstraintEntry>,
    by_body: HashMap<BodyHandle, Vec<u32>>,
}

impl ConstraintTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constraint at `index` and links it to both endpoints.
    ///
    /// Returns the entry previously stored at that index, already unlinked.
    pub fn insert(&mut self, index: u32, entry: ConstraintEntry) -> Option<ConstraintEntry> {
        let previous = self.remove(index);
        self.link(entry.body1, index);
        if let Some(body2) = entry.body2 {
            self.link(body2, index);
        }
        self.entries.insert(index, entry);
        previous
    }

    /// Removes a constraint and unlinks it from both endpoints.
    pub fn remove(&mut self, index: u32) -> Option<ConstraintEntry> {
        let entry = self.entries.remove(index)?;
        self.unlink(entry.body1, index);
        if let Some(body2) = entry.body2 {
            self.unlink(body2, index);
        }
        Some(entry)
    }

    /// Entry at a wire index.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&ConstraintEntry> {
        self.entries.get(index)
    }

    /// Wire indices of every constraint touching `body`.
    #[must_use]
    pub fn of_body(&self, body: BodyHandle) -> &[u32] {
        self.by_body.get(&body).map_or(&[], Vec::as_slice)
    }

    /// Removes every constraint touching `body` and returns them with
    /// their indices.
    pub fn detach_body(&mut self, body: BodyHandle) -> Vec<(u32, ConstraintEntry)> {
        let indices = self.by_body.remove(&body).unwrap_or_default();
        indices
            .into_iter()
            .filter_map(|index| self.remove(index).map(|entry| (index, entry)))
            .collect()
    }

    /// Vehicle driven by a chassis body.
    #[must_use]
    pub fn vehicle_of(&self, body: BodyHandle) -> Option<ConstraintHandle> {
        self.of_body(body)
            .iter()
            .filter_map(|&index| self.entries.get(index))
            .find(|entry| entry.is_vehicle() && entry.body1 == body)
            .map(|entry| entry.handle)
    }

    /// Number of registered constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no constraint is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every entry.
    pub fn drain(&mut self) -> Vec<(u32, ConstraintEntry)> {
        self.by_body.clear();
        self.entries.drain()
    }

    fn link(&mut self, body: BodyHandle, index: u32) {
        let list = self.by_body.entry(body).or_default();
        if !list.contains(&index) {
            list.push(index);
        }
    }

    fn unlink(&mut self, body: BodyHandle, index: u32) {
        if let Some(list) = self.by_body.get_mut(&body) {
            list.retain(|&i| i != index);
            if list.is_empty() {
                self.by_body.remove(&body);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(raw: u32) -> BodyHandle {
        BodyHandle::from_raw(raw)
    }

    fn link(handle: u32, body1: u32, body2: u32) -> ConstraintEntry {
        ConstraintEntry {
            handle: ConstraintHandle::from_raw(handle),
            body1: body(body1),
            body2: Some(body(body2)),
        }
    }

    #[test]
    fn test_insert_links_both_endpoints() {
        let mut table = ConstraintTable::new();
        table.insert(4, link(0, 1, 2));

        assert_eq!(table.of_body(body(1)), &[4]);
        assert_eq!(table.of_body(body(2)), &[4]);
        assert_eq!(table.get(4).and_then(|e| e.other(body(2))), Some(body(1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_detach_body_clears_reverse_references() {
        let mut table = ConstraintTable::new();
        table.insert(0, link(0, 1, 2));
        table.insert(1, link(1, 1, 3));
        table.insert(2, link(2, 2, 3));

        let detached = table.detach_body(body(1));
        assert_eq!(detached.len(), 2);
        assert!(table.of_body(body(1)).is_empty());
        // Only the 2-3 link survives on the other endpoints
        assert_eq!(table.of_body(body(2)), &[2]);
        assert_eq!(table.of_body(body(3)), &[2]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reinsert_replaces_previous() {
        let mut table = ConstraintTable::new();
        table.insert(0, link(0, 1, 2));
        let previous = table.insert(0, link(9, 3, 4));

        assert_eq!(previous.map(|e| e.handle.raw()), Some(0));
        assert!(table.of_body(body(1)).is_empty());
        assert_eq!(table.of_body(body(4)), &[0]);
    }

    #[test]
    fn test_vehicle_lookup() {
        let mut table = ConstraintTable::new();
        table.insert(0, link(0, 5, 6));
        table.insert(
            1,
            ConstraintEntry {
                handle: ConstraintHandle::from_raw(7),
                body1: body(5),
                body2: None,
            },
        );

        assert_eq!(table.vehicle_of(body(5)), Some(ConstraintHandle::from_raw(7)));
        assert_eq!(table.vehicle_of(body(6)), None);
        assert_eq!(table.remove(1).map(|e| e.is_vehicle()), Some(true));
        assert_eq!(table.vehicle_of(body(5)), None);
    }

    #[test]
    fn test_drain() {
        let mut table = ConstraintTable::new();
        table.insert(0, link(0, 1, 2));
        table.insert(3, link(1, 2, 3));

        assert_eq!(table.drain().len(), 2);
        assert!(table.is_empty());
        assert!(table.of_body(body(2)).is_empty());
    }
}
