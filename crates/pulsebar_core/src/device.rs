//! Device and Server Descriptors
//!
//! Server-library-free representations of what the audio server reports.
//! The platform layer decodes raw server structures into these types before
//! anything in this crate looks at them.

use serde::{Deserialize, Serialize};

use crate::volume::ChannelVolume;

/// Direction of an audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Playback endpoint (sink)
    Output,
    /// Capture endpoint (source)
    Input,
}

/// Activity state reported by the server for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Running,
    Idle,
    Suspended,
    Invalid,
}

impl DeviceState {
    /// Running or idle devices count as "running" for resolution purposes
    pub fn is_active(self) -> bool {
        matches!(self, DeviceState::Running | DeviceState::Idle)
    }
}

/// Lifecycle of the link to the audio server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Connecting, authorizing or setting the client name
    Connecting,
    Ready,
    Failed,
    Terminated,
}

impl ConnectionState {
    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }
}

/// A server-assigned device index paired with the connection epoch it was
/// observed on.
///
/// Indices are recycled by the server after device removal, so a handle is
/// only meaningful while its epoch matches the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    pub index: u32,
    pub epoch: u64,
}

impl DeviceHandle {
    pub fn new(index: u32, epoch: u64) -> Self {
        Self { index, epoch }
    }

    /// Whether this handle was issued by the connection with the given epoch
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }
}

/// One output or input device as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    /// Server-assigned index (recyclable)
    pub index: u32,

    /// Stable internal name (e.g. "alsa_output.pci-0000_00_1f.3.analog-stereo")
    pub name: String,

    /// Human-readable description
    pub description: String,

    pub state: DeviceState,

    /// Per-channel volume in native units
    pub volume: ChannelVolume,

    pub muted: bool,

    /// Active port name, if the device has ports
    pub active_port: Option<String>,

    /// `device.form_factor` property, if set
    pub form_factor: Option<String>,

    /// Monitor source name (outputs only)
    pub monitor_source: Option<String>,
}

impl DeviceDescriptor {
    /// Create a descriptor with empty optional fields
    pub fn new(
        index: u32,
        name: impl Into<String>,
        description: impl Into<String>,
        state: DeviceState,
        volume: ChannelVolume,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            description: description.into(),
            state,
            volume,
            muted: false,
            active_port: None,
            form_factor: None,
            monitor_source: None,
        }
    }
}

/// Default device names announced by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub default_sink: String,
    pub default_source: String,
}

impl ServerInfo {
    pub fn new(default_sink: impl Into<String>, default_source: impl Into<String>) -> Self {
        Self {
            default_sink: default_sink.into(),
            default_source: default_source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(DeviceState::Running.is_active());
        assert!(DeviceState::Idle.is_active());
        assert!(!DeviceState::Suspended.is_active());
        assert!(!DeviceState::Invalid.is_active());
    }

    #[test]
    fn test_handle_epoch() {
        let handle = DeviceHandle::new(7, 2);
        assert!(handle.is_current(2));
        assert!(!handle.is_current(3));
    }

    #[test]
    fn test_connection_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::Failed.is_ready());
        assert!(ConnectionState::Ready.is_ready());
    }
}
