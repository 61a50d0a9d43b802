//! Published Device Snapshot
//!
//! Plain copies of the current output and input device state. The event-loop
//! thread owns the live values; readers only ever see one of these copies.

use serde::{Deserialize, Serialize};

use crate::device::ConnectionState;

/// Port name reported when a device has no active port
pub const UNKNOWN_PORT: &str = "Unknown";

/// Monitor-name fragments that identify wireless sinks:
/// PulseAudio's `a2dp_sink`, PipeWire's `a2dp-sink`, and the BlueZ prefix.
const BLUETOOTH_MONITOR_TOKENS: [&str; 3] = ["a2dp_sink", "a2dp-sink", "bluez"];

/// The output device currently displayed and controlled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDevice {
    /// Internal device name
    pub name: String,

    /// Rounded channel-average volume (0-100, may exceed 100 when boosted)
    pub volume: u16,

    pub muted: bool,

    pub description: String,

    pub port_name: String,

    /// Physical category such as "headset" or "speaker" (empty if unknown)
    pub form_factor: String,

    /// Name of the monitor source attached to this sink
    pub monitor_name: String,
}

impl OutputDevice {
    /// Whether the sink looks like a Bluetooth device, judged by its monitor name
    pub fn is_bluetooth(&self) -> bool {
        BLUETOOTH_MONITOR_TOKENS
            .iter()
            .any(|token| self.monitor_name.contains(token))
    }
}

/// The input device currently displayed and controlled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDevice {
    pub name: String,
    pub volume: u16,
    pub muted: bool,
    pub description: String,
    pub port_name: String,
}

/// Everything a status display needs, copied out in one piece
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSnapshot {
    pub connection: ConnectionState,
    pub output: OutputDevice,
    pub input: InputDevice,
}

impl AudioSnapshot {
    pub fn is_connected(&self) -> bool {
        self.connection.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_monitor(monitor: &str) -> OutputDevice {
        OutputDevice {
            monitor_name: monitor.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_bluetooth_detection() {
        assert!(with_monitor("bluez_sink.AA_BB_CC_DD_EE_FF.a2dp_sink.monitor").is_bluetooth());
        assert!(with_monitor("bluez_output.AA_BB_CC_DD_EE_FF.a2dp-sink.monitor").is_bluetooth());
        assert!(with_monitor("bluez_output.AA_BB_CC_DD_EE_FF.1.monitor").is_bluetooth());
        assert!(!with_monitor("alsa_output.pci-0000_00_1f.3.analog-stereo.monitor").is_bluetooth());
        assert!(!with_monitor("").is_bluetooth());
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = AudioSnapshot {
            connection: ConnectionState::Ready,
            output: OutputDevice {
                name: "alsa_output.usb".to_string(),
                volume: 65,
                description: "USB Headset".to_string(),
                ..Default::default()
            },
            input: InputDevice::default(),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("USB Headset"));

        let back: AudioSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
        assert!(back.is_connected());
    }
}
