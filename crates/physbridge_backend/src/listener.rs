//! # Contact Listener
//!
//! Turns the engine's raw contact events into response records.
//!
//! Events are drained every tick even when reporting is off, so the engine
//! never accumulates them. Handles are resolved to pcids through the
//! [`Tracker`]; an event whose two bodies are both unknown is dropped.

use physbridge_core::Vec3;
use physbridge_protocol::{
    CharacterContact, CharacterContacts, ContactEvent, ContactManifold, ContactPhase, ContactPoints, ContactType,
};

use crate::config::BackendConfig;
use crate::engine::{PhysicsEngine, RawCharacterContact, RawContact};
use crate::tracker::Tracker;

/// Which contact data is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactFilter {
    /// Report body contacts at all.
    pub enabled: bool,
    /// Report contacts that started.
    pub added: bool,
    /// Report contacts that continued.
    pub persisted: bool,
    /// Report contacts that ended.
    pub removed: bool,
    /// Attach points to added contacts.
    pub points: bool,
    /// Average the points into one.
    pub averaged: bool,
    /// Report character contacts.
    pub characters: bool,
}

impl ContactFilter {
    /// Filter described by the backend configuration.
    #[must_use]
    pub const fn from_config(config: &BackendConfig) -> Self {
        Self {
            enabled: config.contact_events_enabled,
            added: config.contact_added_events,
            persisted: config.contact_persisted_events,
            removed: config.contact_removed_events,
            points: config.contact_points,
            averaged: config.contact_points_averaged,
            characters: config.char_contact_events_enabled,
        }
    }

    /// True if events of this phase are reported.
    #[must_use]
    pub const fn accepts(&self, kind: ContactType) -> bool {
        self.enabled
            && match kind {
                ContactType::Added => self.added,
                ContactType::Persisted => self.persisted,
                ContactType::Removed => self.removed,
            }
    }
}

/// Per-tick contact collector.
#[derive(Debug)]
pub struct ContactListener {
    filter: ContactFilter,
    raw: Vec<RawContact>,
    raw_characters: Vec<RawCharacterContact>,
}

impl ContactListener {
    /// Creates a listener with the given filter.
    #[must_use]
    pub const fn new(filter: ContactFilter) -> Self {
        Self {
            filter,
            raw: Vec::new(),
            raw_characters: Vec::new(),
        }
    }

    /// Active filter.
    #[must_use]
    pub const fn filter(&self) -> &ContactFilter {
        &self.filter
    }

    /// Drains body contacts from the engine and appends the reported ones.
    pub fn collect<E: PhysicsEngine>(&mut self, engine: &mut E, tracker: &Tracker, out: &mut Vec<ContactEvent>) {
        self.raw.clear();
        engine.drain_contacts(&mut self.raw);

        for raw in self.raw.drain(..) {
            if !self.filter.accepts(raw.kind) {
                continue;
            }
            let body1 = tracker.pcid_of(raw.body1);
            let body2 = tracker.pcid_of(raw.body2);
            if body1.is_none() && body2.is_none() {
                continue;
            }
            let phase = match raw.kind {
                ContactType::Added => ContactPhase::Added(manifold(&raw, &self.filter)),
                ContactType::Persisted => ContactPhase::Persisted,
                ContactType::Removed => ContactPhase::Removed,
            };
            out.push(ContactEvent { body1, body2, phase });
        }
    }

    /// Drains character contacts and groups them per character, in the
    /// order each character first reported one.
    pub fn collect_characters<E: PhysicsEngine>(
        &mut self,
        engine: &mut E,
        tracker: &Tracker,
        out: &mut Vec<CharacterContacts>,
    ) {
        self.raw_characters.clear();
        engine.drain_character_contacts(&mut self.raw_characters);
        if !self.filter.characters {
            self.raw_characters.clear();
            return;
        }

        group_characters(self.raw_characters.drain(..), tracker, out);
    }
}

impl Default for ContactListener {
    fn default() -> Self {
        Self::new(ContactFilter::from_config(&BackendConfig::default()))
    }
}

/// Resolves character contacts and groups them per character pcid.
fn group_characters(
    raw: impl Iterator<Item = RawCharacterContact>,
    tracker: &Tracker,
    out: &mut Vec<CharacterContacts>,
) {
    let start = out.len();
    for raw in raw {
        let Some(pcid) = tracker.pcid_of(raw.character) else {
            continue;
        };
        let contact = CharacterContact {
            other: raw.other.and_then(|other| tracker.pcid_of(other)),
            position: raw.position,
            normal: raw.normal,
            velocity: raw.velocity,
            new_character_velocity: raw.new_character_velocity,
        };
        match out[start..].iter_mut().find(|group| group.pcid == pcid) {
            Some(group) => group.contacts.push(contact),
            None => out.push(CharacterContacts {
                pcid,
                contacts: vec![contact],
            }),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn manifold(raw: &RawContact, filter: &ContactFilter) -> ContactManifold {
    let points = filter.points.then(|| {
        if filter.averaged {
            let count = raw.points1.len() + raw.points2.len();
            let sum = raw
                .points1
                .iter()
                .chain(&raw.points2)
                .fold(Vec3::ZERO, |acc, &p| acc + p);
            let mean = if count == 0 { Vec3::ZERO } else { sum * (1.0 / count as f32) };
            ContactPoints::Averaged(raw.offset + mean)
        } else {
            ContactPoints::Full {
                offset: raw.offset,
                points1: raw.points1.clone(),
                points2: raw.points2.clone(),
            }
        }
    });

    ContactManifold {
        normal: raw.normal,
        depth: raw.depth,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BodyHandle, BodyKind};

    fn raw(kind: ContactType, body1: u32, body2: u32) -> RawContact {
        RawContact {
            kind,
            body1: BodyHandle::from_raw(body1),
            body2: BodyHandle::from_raw(body2),
            normal: Vec3::Y,
            depth: 0.2,
            offset: Vec3::new(1.0, 0.0, 0.0),
            points1: vec![Vec3::new(0.0, 0.1, 0.0)],
            points2: vec![Vec3::new(0.0, -0.1, 0.0)],
        }
    }

    fn tracker() -> Tracker {
        let mut tracker = Tracker::new();
        tracker.add(BodyHandle::from_raw(0), 100, BodyKind::Dynamic, false);
        tracker.add(BodyHandle::from_raw(1), 101, BodyKind::Static, false);
        tracker
    }

    #[test]
    fn test_filter_phases() {
        let filter = ContactFilter::from_config(&BackendConfig::default());
        assert!(filter.accepts(ContactType::Added));
        assert!(!filter.accepts(ContactType::Persisted));
        assert!(filter.accepts(ContactType::Removed));

        let disabled = ContactFilter {
            enabled: false,
            ..filter
        };
        assert!(!disabled.accepts(ContactType::Added));
    }

    #[test]
    fn test_averaged_point() {
        let filter = ContactFilter::from_config(&BackendConfig::default());
        let manifold = manifold(&raw(ContactType::Added, 0, 1), &filter);

        assert_eq!(manifold.points, Some(ContactPoints::Averaged(Vec3::new(1.0, 0.0, 0.0))));
        assert!((manifold.depth - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_full_points_and_no_points() {
        let mut filter = ContactFilter::from_config(&BackendConfig::default());
        filter.averaged = false;
        let contact = raw(ContactType::Added, 0, 1);

        match manifold(&contact, &filter).points {
            Some(ContactPoints::Full { points1, points2, .. }) => {
                assert_eq!(points1, contact.points1);
                assert_eq!(points2, contact.points2);
            }
            other => panic!("expected full points, got {other:?}"),
        }

        filter.points = false;
        assert_eq!(manifold(&contact, &filter).points, None);
    }

    #[test]
    fn test_destroyed_body_reported_as_none() {
        use crate::engine::SandboxEngine;
        use physbridge_core::AuxBuffers;
        use physbridge_protocol::{BodyDesc, MotionType, ShapeSettings};

        let mut engine = SandboxEngine::new(Vec3::ZERO, vec![[1, 1]]);
        let shape = engine
            .create_shape(&ShapeSettings::cuboid(Vec3::ONE), &AuxBuffers::new())
            .unwrap();
        let mut tracker = Tracker::new();
        for (pcid, x) in [(1u32, 0.0f32), (2, 1.5)] {
            let desc = BodyDesc::new(pcid, ShapeSettings::cuboid(Vec3::ONE), MotionType::Dynamic)
                .at(Vec3::new(x, 0.0, 0.0));
            let body = engine.create_body(&desc, shape).unwrap();
            tracker.add(body, pcid, BodyKind::Dynamic, false);
        }
        let mut listener = ContactListener::default();
        let mut events = Vec::new();

        engine.step(1.0 / 60.0, 1).unwrap();
        listener.collect(&mut engine, &tracker, &mut events);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].phase, ContactPhase::Added(_)));

        let doomed = tracker.handle_of(2).unwrap();
        tracker.stop_tracking(doomed);
        engine.destroy_body(doomed);
        events.clear();
        listener.collect(&mut engine, &tracker, &mut events);

        assert_eq!(events.len(), 1);
        assert_eq!((events[0].body1, events[0].body2), (Some(1), None));
        assert_eq!(events[0].phase, ContactPhase::Removed);
    }

    #[test]
    fn test_character_contacts_grouped() {
        let tracker = tracker();
        let contact = |character: u32, other: Option<u32>| RawCharacterContact {
            character: BodyHandle::from_raw(character),
            other: other.map(BodyHandle::from_raw),
            position: Vec3::ZERO,
            normal: Vec3::Y,
            velocity: Vec3::ZERO,
            new_character_velocity: Vec3::ZERO,
        };
        let raw = vec![
            contact(1, Some(0)),
            contact(0, None),
            contact(1, Some(9)),
            contact(5, Some(0)),
        ];

        let mut out = Vec::new();
        group_characters(raw.into_iter(), &tracker, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].pcid, 101);
        let others: Vec<_> = out[0].contacts.iter().map(|c| c.other).collect();
        assert_eq!(others, vec![Some(100), None]);
        assert_eq!(out[1].pcid, 100);
        assert_eq!(out[1].contacts.len(), 1);
    }
}
