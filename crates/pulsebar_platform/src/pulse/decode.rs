//! Conversions between libpulse types and core types
//!
//! Nothing outside this module and `connection` sees a libpulse type.

use libpulse_binding as pulse;
use pulse::context::introspect::{ServerInfo as PaServerInfo, SinkInfo, SourceInfo};
use pulse::context::subscribe::{Facility as PaFacility, Operation as PaOperation};
use pulse::context::State as PaContextState;
use pulse::def::{SinkState, SourceState};
use pulse::proplist::properties;
use pulse::volume::{ChannelVolumes, Volume};

use pulsebar_core::{
    ChannelVolume, ConnectionState, DeviceDescriptor, DeviceKind, DeviceState, Facility,
    ServerInfo, SubscriptionOp, CHANNELS_MAX,
};

pub fn connection_state(state: PaContextState) -> ConnectionState {
    match state {
        PaContextState::Unconnected => ConnectionState::Disconnected,
        PaContextState::Connecting | PaContextState::Authorizing | PaContextState::SettingName => {
            ConnectionState::Connecting
        }
        PaContextState::Ready => ConnectionState::Ready,
        PaContextState::Failed => ConnectionState::Failed,
        PaContextState::Terminated => ConnectionState::Terminated,
    }
}

pub fn facility(facility: PaFacility) -> Facility {
    match facility {
        PaFacility::Server => Facility::Server,
        PaFacility::Sink => Facility::Sink,
        PaFacility::SinkInput => Facility::SinkInput,
        PaFacility::Source => Facility::Source,
        PaFacility::SourceOutput => Facility::SourceOutput,
        _ => Facility::Other,
    }
}

pub fn operation(operation: PaOperation) -> SubscriptionOp {
    match operation {
        PaOperation::New => SubscriptionOp::New,
        PaOperation::Changed => SubscriptionOp::Changed,
        PaOperation::Removed => SubscriptionOp::Removed,
    }
}

fn sink_state(state: SinkState) -> DeviceState {
    match state {
        SinkState::Running => DeviceState::Running,
        SinkState::Idle => DeviceState::Idle,
        SinkState::Suspended => DeviceState::Suspended,
        _ => DeviceState::Invalid,
    }
}

fn source_state(state: SourceState) -> DeviceState {
    match state {
        SourceState::Running => DeviceState::Running,
        SourceState::Idle => DeviceState::Idle,
        SourceState::Suspended => DeviceState::Suspended,
        _ => DeviceState::Invalid,
    }
}

/// Copy per-channel volumes out of a libpulse structure
///
/// A channel count the library cannot index yields an empty (invalid)
/// structure so the caller's validity check rejects it.
pub fn channel_volume(volumes: &ChannelVolumes) -> ChannelVolume {
    if volumes.len() as usize > CHANNELS_MAX {
        return ChannelVolume::new(Vec::new());
    }
    ChannelVolume::new(volumes.get().iter().map(|v| v.0).collect())
}

/// Build a libpulse structure from a planned channel volume
pub fn pulse_volumes(volume: &ChannelVolume) -> Option<ChannelVolumes> {
    if !volume.is_valid() {
        return None;
    }
    let channels = u8::try_from(volume.channels()).ok()?;

    let mut volumes = ChannelVolumes::default();
    volumes.set_len(channels);
    for (slot, &value) in volumes.get_mut().iter_mut().zip(volume.values()) {
        *slot = Volume(value);
    }
    volumes.is_valid().then_some(volumes)
}

fn owned(value: &Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    value.as_ref().map(|s| s.to_string())
}

pub fn server_info(info: &PaServerInfo) -> ServerInfo {
    ServerInfo::new(
        owned(&info.default_sink_name).unwrap_or_default(),
        owned(&info.default_source_name).unwrap_or_default(),
    )
}

fn descriptor(
    kind: DeviceKind,
    index: u32,
    name: &Option<std::borrow::Cow<'_, str>>,
    description: &Option<std::borrow::Cow<'_, str>>,
    state: DeviceState,
    volume: &ChannelVolumes,
) -> DeviceDescriptor {
    let name = owned(name).unwrap_or_default();
    tracing::trace!("Decoding {:?} #{} '{}'", kind, index, name);
    DeviceDescriptor::new(
        index,
        name,
        owned(description).unwrap_or_default(),
        state,
        channel_volume(volume),
    )
}

pub fn sink(info: &SinkInfo) -> DeviceDescriptor {
    let mut desc = descriptor(
        DeviceKind::Output,
        info.index,
        &info.name,
        &info.description,
        sink_state(info.state),
        &info.volume,
    );
    desc.muted = info.mute;
    desc.active_port = info.active_port.as_ref().and_then(|port| owned(&port.name));
    desc.form_factor = info.proplist.get_str(properties::DEVICE_FORM_FACTOR);
    desc.monitor_source = owned(&info.monitor_source_name);
    desc
}

pub fn source(info: &SourceInfo) -> DeviceDescriptor {
    let mut desc = descriptor(
        DeviceKind::Input,
        info.index,
        &info.name,
        &info.description,
        source_state(info.state),
        &info.volume,
    );
    desc.muted = info.mute;
    desc.active_port = info.active_port.as_ref().and_then(|port| owned(&port.name));
    desc.form_factor = info.proplist.get_str(properties::DEVICE_FORM_FACTOR);
    desc
}
