//! # Motion States
//!
//! Render-rate interpolation between the last two engine steps.
//!
//! ```text
//! step n-1        step n        (leftover time)
//!    │──────────────│──── alpha ───→
//! previous       current
//! reported = lerp(previous, current, alpha)
//! ```

use std::collections::HashMap;

use physbridge_core::Isometry;

use crate::engine::BodyHandle;

/// Transforms at the last two engine steps of one body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionState {
    previous: Isometry,
    current: Isometry,
}

impl MotionState {
    /// Starts at rest on `isometry`.
    #[must_use]
    pub const fn new(isometry: Isometry) -> Self {
        Self {
            previous: isometry,
            current: isometry,
        }
    }

    /// Records the engine transform and returns the interpolated one.
    ///
    /// When no whole step ran this tick the stored pair is kept and only
    /// `alpha` moves.
    pub fn update(&mut self, engine: Isometry, alpha: f32, stepped: bool) -> Isometry {
        if stepped {
            self.previous = self.current;
            self.current = engine;
        }
        self.interpolate(alpha)
    }

    /// Interpolated transform at `alpha` in `[0, 1]`.
    #[must_use]
    pub fn interpolate(&self, alpha: f32) -> Isometry {
        self.previous.interpolate(self.current, alpha.clamp(0.0, 1.0))
    }

    /// Snaps both samples to `isometry`, e.g. after a teleport.
    pub fn reset(&mut self, isometry: Isometry) {
        *self = Self::new(isometry);
    }
}

/// Motion states of every body that asked for one.
#[derive(Debug, Default)]
pub struct MotionStates {
    states: HashMap<BodyHandle, MotionState>,
}

impl MotionStates {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts interpolating `body` from `isometry`.
    pub fn insert(&mut self, body: BodyHandle, isometry: Isometry) {
        self.states.insert(body, MotionState::new(isometry));
    }

    /// Stops interpolating `body`.
    pub fn remove(&mut self, body: BodyHandle) -> Option<MotionState> {
        self.states.remove(&body)
    }

    /// True if `body` is interpolated.
    #[must_use]
    pub fn contains(&self, body: BodyHandle) -> bool {
        self.states.contains_key(&body)
    }

    /// Motion state of `body`.
    pub fn get_mut(&mut self, body: BodyHandle) -> Option<&mut MotionState> {
        self.states.get_mut(&body)
    }

    /// Number of interpolated bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if nothing is interpolated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forgets every state.
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physbridge_core::{Quat, Vec3};

    fn at(x: f32) -> Isometry {
        Isometry::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY)
    }

    #[test]
    fn test_interpolates_between_steps() {
        let mut state = MotionState::new(at(0.0));
        let reported = state.update(at(1.0), 0.25, true);
        assert!((reported.position.x - 0.25).abs() < 1e-6);

        let reported = state.update(at(2.0), 0.5, true);
        assert!((reported.position.x - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_no_step_keeps_samples() {
        let mut state = MotionState::new(at(0.0));
        state.update(at(1.0), 0.0, true);

        // The engine value is ignored when nothing stepped
        let reported = state.update(at(5.0), 0.5, false);
        assert!((reported.position.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reset_and_alpha_clamp() {
        let mut state = MotionState::new(at(0.0));
        state.update(at(1.0), 1.0, true);
        state.reset(at(3.0));
        assert_eq!(state.interpolate(0.3), at(3.0));

        let mut state = MotionState::new(at(0.0));
        state.update(at(1.0), 0.0, true);
        assert_eq!(state.interpolate(4.0).position, at(1.0).position);
    }

    #[test]
    fn test_state_set() {
        let mut states = MotionStates::new();
        let body = BodyHandle::from_raw(2);
        states.insert(body, at(1.0));

        assert!(states.contains(body));
        assert_eq!(states.len(), 1);
        assert!(states.remove(body).is_some());
        assert!(states.is_empty());
    }
}
