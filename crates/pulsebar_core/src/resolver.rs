//! Device State Resolver
//!
//! Decides which output and which input device is "current" as descriptors
//! stream in from the server, in whatever order and frequency the server
//! chooses to deliver them.
//!
//! Output resolution prefers the server's default sink, falls back to any
//! running sink while the default is asleep or absent, and never adopts a
//! sink whose description is on the [`IgnoreList`]. Input resolution simply
//! follows the server's default source.

use tracing::{debug, error, trace};

use crate::device::{DeviceDescriptor, DeviceHandle, ServerInfo};
use crate::snapshot::{InputDevice, OutputDevice, UNKNOWN_PORT};
use crate::volume::ChannelVolume;

/// Device descriptions that must never become the current output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    descriptions: Vec<String>,
}

impl IgnoreList {
    pub fn new<I, S>(descriptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            descriptions: descriptions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, description: &str) -> bool {
        self.descriptions.iter().any(|d| d == description)
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }
}

/// What is known about the server's default sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultSink {
    /// No descriptor for the default has been seen since it was announced
    Unknown,
    Running,
    Stopped,
}

/// Resolves the current output device
#[derive(Debug, Clone)]
pub struct OutputResolver {
    ignored: IgnoreList,
    current_name: String,
    current_running: bool,
    default_sink: DefaultSink,
    /// Default sink name from the last server announcement
    announced_default: Option<String>,
    /// A running non-default sink was passed over while the default was unknown
    passed_over: bool,
    handle: Option<DeviceHandle>,
    channel_volume: Option<ChannelVolume>,
    device: OutputDevice,
}

impl OutputResolver {
    pub fn new(ignored: IgnoreList) -> Self {
        Self {
            ignored,
            current_name: String::new(),
            current_running: false,
            default_sink: DefaultSink::Unknown,
            announced_default: None,
            passed_over: false,
            handle: None,
            channel_volume: None,
            device: OutputDevice::default(),
        }
    }

    /// Server info arrived: point the current device at a changed default.
    ///
    /// Re-announcing the same default keeps the current selection, which may
    /// be a fallback sink.
    pub fn on_server_info(&mut self, info: &ServerInfo) {
        if self.announced_default.as_deref() == Some(info.default_sink.as_str()) {
            return;
        }
        debug!("Default sink is now '{}'", info.default_sink);
        self.announced_default = Some(info.default_sink.clone());
        if info.default_sink != self.current_name {
            self.current_name = info.default_sink.clone();
            self.current_running = false;
        }
        self.default_sink = DefaultSink::Unknown;
        self.passed_over = false;
    }

    /// A full sink listing finished.
    ///
    /// Returns `true` when the listing should be requested again because
    /// running non-default sinks were passed over that fallback now allows.
    pub fn on_list_complete(&mut self) -> bool {
        let relist = match self.default_sink {
            DefaultSink::Unknown => {
                debug!("Default sink not present in listing, allowing fallback");
                self.default_sink = DefaultSink::Stopped;
                true
            }
            DefaultSink::Stopped => self.passed_over && !self.current_running,
            DefaultSink::Running => false,
        };
        if relist {
            debug!("Relisting sinks for fallback");
        }
        self.passed_over = false;
        relist
    }

    /// Feed one sink descriptor through the resolution rules.
    ///
    /// Returns `true` when the current device's published fields were
    /// refreshed from `desc`.
    pub fn resolve(&mut self, desc: &DeviceDescriptor, default_sink: &str, epoch: u64) -> bool {
        let active = desc.state.is_active();
        trace!(
            "Sink '{}' state={:?} active={}",
            desc.name,
            desc.state,
            active
        );

        if self.ignored.contains(&desc.description) {
            // An ignored sink is never considered running, so a current one gets replaced
            if desc.name == self.current_name {
                self.current_running = false;
            }
            return false;
        }

        let is_default = desc.name == default_sink;
        if is_default {
            self.default_sink = if active {
                DefaultSink::Running
            } else {
                DefaultSink::Stopped
            };
        } else if self.default_sink != DefaultSink::Stopped {
            if self.default_sink == DefaultSink::Unknown && active {
                self.passed_over = true;
            }
            return false;
        }

        if desc.name == self.current_name {
            self.current_running = active;
        }

        let reclaim_default = is_default && desc.name != self.current_name;
        if active && (!self.current_running || reclaim_default) {
            debug!("Adopting sink '{}' as current output", desc.name);
            self.current_name = desc.name.clone();
            self.current_running = true;
        }

        if desc.name != self.current_name {
            return false;
        }

        self.apply(desc, epoch);
        true
    }

    fn apply(&mut self, desc: &DeviceDescriptor, epoch: u64) {
        self.handle = Some(DeviceHandle::new(desc.index, epoch));

        if desc.volume.is_valid() {
            self.device.volume = desc.volume.percent();
            self.channel_volume = Some(desc.volume.clone());
        } else {
            error!("Invalid volume structure received for sink '{}'", desc.name);
            self.channel_volume = None;
            self.device.volume = 0;
        }

        self.device.name = desc.name.clone();
        self.device.muted = desc.muted;
        self.device.description = desc.description.clone();
        self.device.port_name = desc
            .active_port
            .clone()
            .unwrap_or_else(|| UNKNOWN_PORT.to_string());
        self.device.form_factor = desc.form_factor.clone().unwrap_or_default();
        self.device.monitor_name = desc.monitor_source.clone().unwrap_or_default();
    }

    /// Forget everything tied to the old connection; published fields stay
    pub fn invalidate(&mut self) {
        self.handle = None;
        self.current_running = false;
        self.default_sink = DefaultSink::Unknown;
        self.announced_default = None;
        self.passed_over = false;
    }

    /// Optimistic local mute update ahead of the server's confirmation
    pub fn set_muted(&mut self, muted: bool) {
        self.device.muted = muted;
    }

    pub fn handle(&self) -> Option<DeviceHandle> {
        self.handle
    }

    /// Last valid channel-volume structure of the current sink
    pub fn channel_volume(&self) -> Option<&ChannelVolume> {
        self.channel_volume.as_ref()
    }

    pub fn current_name(&self) -> &str {
        &self.current_name
    }

    pub fn is_current_running(&self) -> bool {
        self.current_running
    }

    pub fn device(&self) -> &OutputDevice {
        &self.device
    }
}

/// Resolves the current input device
#[derive(Debug, Clone, Default)]
pub struct InputResolver {
    handle: Option<DeviceHandle>,
    device: InputDevice,
}

impl InputResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt `desc` iff it is the server's default source
    pub fn resolve(&mut self, desc: &DeviceDescriptor, default_source: &str, epoch: u64) -> bool {
        if desc.name != default_source {
            return false;
        }

        self.handle = Some(DeviceHandle::new(desc.index, epoch));
        self.device.volume = if desc.volume.is_valid() {
            desc.volume.percent()
        } else {
            error!("Invalid volume structure received for source '{}'", desc.name);
            0
        };
        self.device.name = desc.name.clone();
        self.device.muted = desc.muted;
        self.device.description = desc.description.clone();
        self.device.port_name = desc
            .active_port
            .clone()
            .unwrap_or_else(|| UNKNOWN_PORT.to_string());
        true
    }

    pub fn invalidate(&mut self) {
        self.handle = None;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.device.muted = muted;
    }

    pub fn handle(&self) -> Option<DeviceHandle> {
        self.handle
    }

    pub fn device(&self) -> &InputDevice {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::volume::{percent_to_native, ChannelVolume};

    const EPOCH: u64 = 1;

    fn sink(index: u32, name: &str, description: &str, state: DeviceState, percent: u16) -> DeviceDescriptor {
        DeviceDescriptor::new(
            index,
            name,
            description,
            state,
            ChannelVolume::uniform(2, percent_to_native(percent as f64)),
        )
    }

    fn resolver_with_default(default: &str, ignored: &[&str]) -> OutputResolver {
        let mut resolver = OutputResolver::new(IgnoreList::new(ignored.iter().copied()));
        resolver.on_server_info(&ServerInfo::new(default, "mic"));
        resolver
    }

    #[test]
    fn test_ignore_list() {
        let list = IgnoreList::new(vec!["Monitor of X", "Dummy Output"]);
        assert_eq!(list.len(), 2);
        assert!(list.contains("Dummy Output"));
        assert!(!list.contains("dummy output"));
        assert!(IgnoreList::default().is_empty());
    }

    #[test]
    fn test_idle_default_adopted() {
        let mut resolver = resolver_with_default("X", &[]);
        let desc = sink(3, "X", "Speakers", DeviceState::Idle, 50);

        assert!(resolver.resolve(&desc, "X", EPOCH));
        assert_eq!(resolver.device().volume, 50);
        assert!(resolver.is_current_running());
        assert_eq!(resolver.handle(), Some(DeviceHandle::new(3, EPOCH)));
    }

    #[test]
    fn test_ignored_never_adopted() {
        let mut resolver = resolver_with_default("X", &["Monitor of X"]);
        let desc = sink(9, "X.monitor-sink", "Monitor of X", DeviceState::Running, 80);

        assert!(!resolver.resolve(&desc, "X", EPOCH));
        assert!(resolver.on_list_complete());
        assert!(!resolver.resolve(&desc, "X", EPOCH));
        assert_eq!(resolver.current_name(), "X");
        assert!(resolver.handle().is_none());
    }

    #[test]
    fn test_ignored_default_never_adopted() {
        let mut resolver = resolver_with_default("X", &["Loopback"]);
        let desc = sink(1, "X", "Loopback", DeviceState::Running, 70);

        assert!(!resolver.resolve(&desc, "X", EPOCH));
        assert!(!resolver.is_current_running());
        assert!(resolver.handle().is_none());
    }

    #[test]
    fn test_ignored_current_marked_not_running() {
        let mut resolver = resolver_with_default("X", &["Loopback"]);
        assert!(resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Running, 40), "X", EPOCH));
        assert!(resolver.is_current_running());

        // Same name now reports an ignored description
        assert!(!resolver.resolve(&sink(1, "X", "Loopback", DeviceState::Running, 40), "X", EPOCH));
        assert!(!resolver.is_current_running());
    }

    #[test]
    fn test_fallback_when_current_stops() {
        let mut resolver = resolver_with_default("X", &[]);
        assert!(resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Running, 40), "X", EPOCH));

        // Default goes to sleep, another sink is playing
        assert!(resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Suspended, 40), "X", EPOCH));
        assert!(!resolver.is_current_running());

        assert!(resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 25), "X", EPOCH));
        assert_eq!(resolver.current_name(), "Y");
        assert_eq!(resolver.device().description, "Headphones");
        assert_eq!(resolver.device().volume, 25);
    }

    #[test]
    fn test_non_default_ignored_while_default_runs() {
        let mut resolver = resolver_with_default("X", &[]);
        assert!(resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Idle, 40), "X", EPOCH));
        assert!(!resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 25), "X", EPOCH));
        assert_eq!(resolver.current_name(), "X");
    }

    #[test]
    fn test_non_default_ignored_before_default_seen() {
        let mut resolver = resolver_with_default("X", &[]);
        assert!(!resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 25), "X", EPOCH));

        // The listing ends without X: Y may now take over
        assert!(resolver.on_list_complete());
        assert!(!resolver.on_list_complete());
        assert!(resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 25), "X", EPOCH));
        assert_eq!(resolver.current_name(), "Y");
    }

    #[test]
    fn test_fallback_independent_of_listing_order() {
        let x = sink(1, "X", "Speakers", DeviceState::Suspended, 40);
        let y = sink(2, "Y", "Headphones", DeviceState::Running, 25);

        let mut default_first = resolver_with_default("X", &[]);
        default_first.resolve(&x, "X", EPOCH);
        assert!(default_first.resolve(&y, "X", EPOCH));
        assert!(!default_first.on_list_complete());
        assert_eq!(default_first.current_name(), "Y");

        let mut default_last = resolver_with_default("X", &[]);
        assert!(!default_last.resolve(&y, "X", EPOCH));
        assert!(default_last.resolve(&x, "X", EPOCH));
        assert_eq!(default_last.current_name(), "X");

        // Y was passed over before X turned out to be asleep
        assert!(default_last.on_list_complete());
        assert!(default_last.resolve(&y, "X", EPOCH));
        assert!(!default_last.on_list_complete());
        assert_eq!(default_last.current_name(), "Y");
        assert_eq!(default_last.device().volume, 25);
    }

    #[test]
    fn test_no_relist_when_skipped_sink_was_asleep() {
        let mut resolver = resolver_with_default("X", &[]);
        resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Suspended, 25), "X", EPOCH);
        resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Suspended, 40), "X", EPOCH);
        assert!(!resolver.on_list_complete());
        assert_eq!(resolver.current_name(), "X");
    }

    #[test]
    fn test_same_default_reannounced_keeps_fallback() {
        let mut resolver = resolver_with_default("X", &[]);
        resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Suspended, 40), "X", EPOCH);
        resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 30), "X", EPOCH);
        assert_eq!(resolver.current_name(), "Y");

        // Only the default source changed
        resolver.on_server_info(&ServerInfo::new("X", "mic2"));
        assert!(!resolver.on_list_complete());
        assert_eq!(resolver.current_name(), "Y");

        assert!(resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 70), "X", EPOCH));
        assert_eq!(resolver.device().volume, 70);
        assert_eq!(resolver.device().name, resolver.current_name());
    }

    #[test]
    fn test_changed_default_replaces_fallback() {
        let mut resolver = resolver_with_default("X", &[]);
        resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Suspended, 40), "X", EPOCH);
        resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 30), "X", EPOCH);

        resolver.on_server_info(&ServerInfo::new("Z", "mic"));
        assert_eq!(resolver.current_name(), "Z");
        assert!(!resolver.is_current_running());

        assert!(!resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 30), "Z", EPOCH));
        assert!(resolver.resolve(&sink(5, "Z", "HDMI", DeviceState::Suspended, 60), "Z", EPOCH));
        assert!(resolver.on_list_complete());

        assert!(resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 30), "Z", EPOCH));
        assert_eq!(resolver.current_name(), "Y");
    }

    #[test]
    fn test_changed_default_already_current_stays_running() {
        let mut resolver = resolver_with_default("X", &[]);
        resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Suspended, 40), "X", EPOCH);
        resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 30), "X", EPOCH);

        resolver.on_server_info(&ServerInfo::new("Y", "mic"));
        assert_eq!(resolver.current_name(), "Y");
        assert!(resolver.is_current_running());
    }

    #[test]
    fn test_default_reclaimed_when_running_again() {
        let mut resolver = resolver_with_default("X", &[]);
        resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Suspended, 40), "X", EPOCH);
        resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 25), "X", EPOCH);
        assert_eq!(resolver.current_name(), "Y");

        assert!(resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Running, 40), "X", EPOCH));
        assert_eq!(resolver.current_name(), "X");
        assert!(!resolver.resolve(&sink(2, "Y", "Headphones", DeviceState::Running, 25), "X", EPOCH));
    }

    #[test]
    fn test_invalid_volume_resets_structure() {
        let mut resolver = resolver_with_default("X", &[]);
        resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Running, 40), "X", EPOCH);
        assert!(resolver.channel_volume().is_some());

        let mut broken = sink(1, "X", "Speakers", DeviceState::Running, 40);
        broken.volume = ChannelVolume::new(Vec::new());
        assert!(resolver.resolve(&broken, "X", EPOCH));
        assert!(resolver.channel_volume().is_none());
        assert_eq!(resolver.device().volume, 0);
    }

    #[test]
    fn test_optional_fields_fallbacks() {
        let mut resolver = resolver_with_default("X", &[]);
        let mut desc = sink(1, "X", "Speakers", DeviceState::Running, 40);
        desc.monitor_source = Some("X.monitor".to_string());
        resolver.resolve(&desc, "X", EPOCH);

        let device = resolver.device();
        assert_eq!(device.port_name, UNKNOWN_PORT);
        assert_eq!(device.form_factor, "");
        assert_eq!(device.monitor_name, "X.monitor");
    }

    #[test]
    fn test_invalidate_drops_handle() {
        let mut resolver = resolver_with_default("X", &[]);
        resolver.resolve(&sink(1, "X", "Speakers", DeviceState::Running, 40), "X", EPOCH);
        resolver.invalidate();
        assert!(resolver.handle().is_none());
        assert_eq!(resolver.device().volume, 40);
    }

    #[test]
    fn test_input_follows_default_source() {
        let mut resolver = InputResolver::new();
        let mut mic = sink(4, "mic", "Built-in Mic", DeviceState::Suspended, 60);
        mic.active_port = Some("analog-input-mic".to_string());
        mic.muted = true;

        assert!(!resolver.resolve(&mic, "other", EPOCH));
        assert!(resolver.resolve(&mic, "mic", EPOCH));

        let device = resolver.device();
        assert_eq!(device.volume, 60);
        assert!(device.muted);
        assert_eq!(device.port_name, "analog-input-mic");
        assert_eq!(resolver.handle(), Some(DeviceHandle::new(4, EPOCH)));
    }
}
