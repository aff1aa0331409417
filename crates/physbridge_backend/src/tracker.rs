//! # Tracker
//!
//! Bidirectional registry between wire pcids and engine body handles.
//!
//! ```text
//! by_pcid:   pcid   → handle
//! by_handle: handle → pcid        (always the exact inverse)
//!
//! dynamic ┐
//! kinematic├ disjoint, static bodies are in none of them
//! characters┘
//! debug      independent of the movement sets
//!
//! front_driven    ┐ isometry ownership, disjoint
//! always_reported ┘
//! flat            debug drawn without depth test
//! ```
//!
//! Movement sets are ordered so per-tick iteration is deterministic.

use std::collections::{BTreeSet, HashMap};

use physbridge_protocol::IsometryUpdate;

use crate::engine::{BodyHandle, BodyKind};

/// Pcid/handle bijection plus per-category membership sets.
#[derive(Debug, Default)]
pub struct Tracker {
    by_pcid: HashMap<u32, BodyHandle>,
    by_handle: HashMap<BodyHandle, u32>,
    dynamic: BTreeSet<BodyHandle>,
    kinematic: BTreeSet<BodyHandle>,
    characters: BTreeSet<BodyHandle>,
    debug: BTreeSet<BodyHandle>,
    front_driven: BTreeSet<BodyHandle>,
    always_reported: BTreeSet<BodyHandle>,
    flat: BTreeSet<BodyHandle>,
}

impl Tracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `pcid` to `handle` and files the handle under `kind`.
    ///
    /// Any previous binding of either id is dropped first, so the maps stay
    /// exact inverses.
    pub fn add(&mut self, handle: BodyHandle, pcid: u32, kind: BodyKind, debug: bool) {
        self.stop_tracking(handle);
        if let Some(previous) = self.by_pcid.get(&pcid).copied() {
            self.stop_tracking(previous);
        }

        self.by_pcid.insert(pcid, handle);
        self.by_handle.insert(handle, pcid);
        match kind {
            BodyKind::Dynamic => {
                self.dynamic.insert(handle);
            }
            BodyKind::Kinematic => {
                self.kinematic.insert(handle);
            }
            BodyKind::Character => {
                self.characters.insert(handle);
            }
            BodyKind::Static => {}
        }
        if debug {
            self.debug.insert(handle);
        }
    }

    /// Re-files a handle after its kind changed. Debug and isometry
    /// settings are kept.
    pub fn update(&mut self, handle: BodyHandle, pcid: u32, kind: BodyKind) {
        let debug = self.debug.contains(&handle);
        let mode = self.isometry_update(handle);
        let depth = self.debug_depth(handle);
        self.stop_tracking(handle);
        self.add(handle, pcid, kind, debug);
        self.set_isometry_update(handle, mode);
        self.set_debug_depth(handle, depth);
    }

    /// Forgets a handle. Returns the pcid it was bound to.
    pub fn stop_tracking(&mut self, handle: BodyHandle) -> Option<u32> {
        let pcid = self.by_handle.remove(&handle)?;
        self.by_pcid.remove(&pcid);
        self.dynamic.remove(&handle);
        self.kinematic.remove(&handle);
        self.characters.remove(&handle);
        self.debug.remove(&handle);
        self.front_driven.remove(&handle);
        self.always_reported.remove(&handle);
        self.flat.remove(&handle);
        Some(pcid)
    }

    /// Empties every map and set.
    pub fn clear(&mut self) {
        self.by_pcid.clear();
        self.by_handle.clear();
        self.dynamic.clear();
        self.kinematic.clear();
        self.characters.clear();
        self.debug.clear();
        self.front_driven.clear();
        self.always_reported.clear();
        self.flat.clear();
    }

    /// Pcid bound to a handle.
    #[must_use]
    pub fn pcid_of(&self, handle: BodyHandle) -> Option<u32> {
        self.by_handle.get(&handle).copied()
    }

    /// Handle bound to a pcid.
    #[must_use]
    pub fn handle_of(&self, pcid: u32) -> Option<BodyHandle> {
        self.by_pcid.get(&pcid).copied()
    }

    /// True if the pcid is bound.
    #[must_use]
    pub fn contains(&self, pcid: u32) -> bool {
        self.by_pcid.contains_key(&pcid)
    }

    /// Number of tracked bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_pcid.len()
    }

    /// True if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_pcid.is_empty()
    }

    /// Turns debug drawing of a tracked handle on or off.
    pub fn set_debug(&mut self, handle: BodyHandle, enabled: bool) {
        if enabled && self.by_handle.contains_key(&handle) {
            self.debug.insert(handle);
        } else {
            self.debug.remove(&handle);
        }
    }

    /// True if the handle is drawn.
    #[must_use]
    pub fn is_debug(&self, handle: BodyHandle) -> bool {
        self.debug.contains(&handle)
    }

    /// Sets which side owns the transform of a tracked handle.
    pub fn set_isometry_update(&mut self, handle: BodyHandle, mode: IsometryUpdate) {
        self.front_driven.remove(&handle);
        self.always_reported.remove(&handle);
        if !self.by_handle.contains_key(&handle) {
            return;
        }
        match mode {
            IsometryUpdate::Default => {}
            IsometryUpdate::FrontToBack => {
                self.front_driven.insert(handle);
            }
            IsometryUpdate::BackToFront => {
                self.always_reported.insert(handle);
            }
        }
    }

    /// Which side owns the transform of a handle.
    #[must_use]
    pub fn isometry_update(&self, handle: BodyHandle) -> IsometryUpdate {
        if self.front_driven.contains(&handle) {
            IsometryUpdate::FrontToBack
        } else if self.always_reported.contains(&handle) {
            IsometryUpdate::BackToFront
        } else {
            IsometryUpdate::Default
        }
    }

    /// Bodies reported every tick, asleep or not.
    pub fn always_reported(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.always_reported.iter().copied()
    }

    /// Turns depth testing of a tracked handle's debug triangles on or off.
    pub fn set_debug_depth(&mut self, handle: BodyHandle, depth: bool) {
        if !depth && self.by_handle.contains_key(&handle) {
            self.flat.insert(handle);
        } else {
            self.flat.remove(&handle);
        }
    }

    /// True unless the handle's debug triangles skip the depth test.
    #[must_use]
    pub fn debug_depth(&self, handle: BodyHandle) -> bool {
        !self.flat.contains(&handle)
    }

    /// True if the handle is a character.
    #[must_use]
    pub fn is_character(&self, handle: BodyHandle) -> bool {
        self.characters.contains(&handle)
    }

    /// Dynamic bodies.
    pub fn dynamic(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.dynamic.iter().copied()
    }

    /// Kinematic bodies.
    pub fn kinematic(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.kinematic.iter().copied()
    }

    /// Characters.
    pub fn characters(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.characters.iter().copied()
    }

    /// Bodies with debug drawing enabled.
    pub fn debug(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.debug.iter().copied()
    }

    /// Every tracked handle with its pcid, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, u32)> + '_ {
        self.by_handle.iter().map(|(&handle, &pcid)| (handle, pcid))
    }

    /// Checks that both maps are exact inverses and the movement sets are
    /// disjoint and tracked.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let inverse = self.by_pcid.len() == self.by_handle.len()
            && self
                .by_pcid
                .iter()
                .all(|(pcid, handle)| self.by_handle.get(handle) == Some(pcid));
        let tracked = [
            &self.dynamic,
            &self.kinematic,
            &self.characters,
            &self.debug,
            &self.front_driven,
            &self.always_reported,
            &self.flat,
        ]
        .iter()
        .all(|set| set.iter().all(|h| self.by_handle.contains_key(h)));
        let disjoint = self.dynamic.is_disjoint(&self.kinematic)
            && self.dynamic.is_disjoint(&self.characters)
            && self.kinematic.is_disjoint(&self.characters)
            && self.front_driven.is_disjoint(&self.always_reported);
        inverse && tracked && disjoint
    }
}
