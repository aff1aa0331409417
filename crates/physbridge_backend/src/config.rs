//! # Backend Configuration
//!
//! Loaded once at startup, from TOML or from defaults.
//!
//! ```toml
//! fixed_step = 0.016666668
//! sub_steps = 2
//! contact_persisted_events = true
//! gravity = [0.0, -9.81, 0.0]
//! ```

use std::path::Path;

use physbridge_core::{Vec3, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

/// Backend tuning.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Engine integration step, in seconds.
    pub fixed_step: f32,
    /// Sub steps per fixed step.
    pub sub_steps: u32,
    /// Upper bound on fixed steps per tick. 0 means unbounded.
    pub max_steps_per_tick: u32,
    /// Report interpolated transforms for bodies that ask for it.
    pub use_motion_states: bool,
    /// Initial size of the inbound commands buffer.
    pub commands_buffer_size: usize,
    /// Initial size of the outbound buffer.
    pub out_buffer_size: usize,
    /// Let buffers grow instead of refusing writes.
    pub allow_buffer_growth: bool,
    /// Collect contact events at all.
    pub contact_events_enabled: bool,
    /// Report contacts that started.
    pub contact_added_events: bool,
    /// Report contacts that continued.
    pub contact_persisted_events: bool,
    /// Report contacts that ended.
    pub contact_removed_events: bool,
    /// Include contact points in added events.
    pub contact_points: bool,
    /// Average contact points into one.
    pub contact_points_averaged: bool,
    /// Collect character contacts.
    pub char_contact_events_enabled: bool,
    /// Produce debug draw views.
    pub debug_draw: bool,
    /// Treat a failed command like a failed step and halt.
    pub halt_on_command_failure: bool,
    /// Initial world gravity.
    pub gravity: [f32; 3],
    /// Object layer pairs that collide.
    pub layer_pairs: Vec<[u16; 2]>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            fixed_step: 1.0 / 60.0,
            sub_steps: 1,
            max_steps_per_tick: 0,
            use_motion_states: true,
            commands_buffer_size: DEFAULT_CAPACITY,
            out_buffer_size: 2_000,
            allow_buffer_growth: true,
            contact_events_enabled: true,
            contact_added_events: true,
            contact_persisted_events: false,
            contact_removed_events: true,
            contact_points: true,
            contact_points_averaged: true,
            char_contact_events_enabled: true,
            debug_draw: cfg!(debug_assertions),
            halt_on_command_failure: false,
            gravity: [0.0, -9.81, 0.0],
            layer_pairs: vec![[0, 1], [1, 1]],
        }
    }
}

impl BackendConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`BackendError::Config`] for malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> BackendResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BackendError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`BackendError::Io`] if the file cannot be read, otherwise as
    /// [`BackendConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Backend config loaded from {}", path.display());
        Ok(config)
    }

    /// Checks values the stepping loop depends on.
    ///
    /// # Errors
    ///
    /// [`BackendError::Config`] naming the first invalid field.
    pub fn validate(&self) -> BackendResult<()> {
        if !(self.fixed_step.is_finite() && self.fixed_step > 0.0) {
            return Err(BackendError::Config(format!(
                "fixed_step must be positive, got {}",
                self.fixed_step
            )));
        }
        if self.sub_steps == 0 {
            return Err(BackendError::Config("sub_steps must be at least 1".to_string()));
        }
        if self.commands_buffer_size < physbridge_core::HEADER_SIZE {
            return Err(BackendError::Config(format!(
                "commands_buffer_size must hold the header, got {}",
                self.commands_buffer_size
            )));
        }
        Ok(())
    }

    /// Initial gravity as a vector.
    #[must_use]
    pub const fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    /// True if objects on the two layers collide.
    #[must_use]
    pub fn layers_collide(&self, a: u16, b: u16) -> bool {
        self.layer_pairs
            .iter()
            .any(|&[x, y]| (x == a && y == b) || (x == b && y == a))
    }
}
