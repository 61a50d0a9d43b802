//! Audio Control Trait
//!
//! The interface a status display programs against. Reads come from the
//! last published snapshot and never touch the server; mutations are queued
//! for the event-loop thread and return as soon as they are submitted.

use std::sync::Arc;

use pulsebar_core::{AudioSnapshot, MuteAction, VolumeChange};

/// Invoked from the event-loop thread after every published state change
pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

/// Trait for audio-server control backends
pub trait AudioControl: Send + Sync {
    /// Get the name of this backend (e.g., "PulseAudio")
    fn name(&self) -> &'static str;

    /// Consistent copy of all published fields
    fn snapshot(&self) -> AudioSnapshot;

    /// Set the output volume to `target` percent, clamped into `[min, max]`
    fn set_volume(&self, target: u16, min: u16, max: u16);

    /// Move the output volume by `step` percent, never past `max`
    fn step_volume(&self, change: VolumeChange, step: f64, max: u16);

    fn set_sink_mute(&self, action: MuteAction);

    fn set_source_mute(&self, action: MuteAction);

    fn is_connected(&self) -> bool {
        self.snapshot().is_connected()
    }

    // === Output accessors ===

    fn volume(&self) -> u16 {
        self.snapshot().output.volume
    }

    fn muted(&self) -> bool {
        self.snapshot().output.muted
    }

    fn description(&self) -> String {
        self.snapshot().output.description
    }

    fn port_name(&self) -> String {
        self.snapshot().output.port_name
    }

    fn form_factor(&self) -> String {
        self.snapshot().output.form_factor
    }

    fn monitor_name(&self) -> String {
        self.snapshot().output.monitor_name
    }

    fn is_bluetooth(&self) -> bool {
        self.snapshot().output.is_bluetooth()
    }

    // === Input accessors ===

    fn source_volume(&self) -> u16 {
        self.snapshot().input.volume
    }

    fn source_muted(&self) -> bool {
        self.snapshot().input.muted
    }

    fn source_description(&self) -> String {
        self.snapshot().input.description
    }

    fn source_port_name(&self) -> String {
        self.snapshot().input.port_name
    }
}
