//! Message Types for Thread Communication
//!
//! Commands flow from callers -> event-loop thread
//! Backend events flow from server callbacks -> state machine
//! Effects flow from state machine -> event-loop thread

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::{ConnectionState, DeviceDescriptor, DeviceHandle, ServerInfo};
use crate::volume::{ChannelVolume, VolumeChange};

/// Server object class named in a subscription notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    Server,
    Sink,
    SinkInput,
    Source,
    SourceOutput,
    /// Anything we did not subscribe to for display purposes
    Other,
}

/// What happened to the object named in a subscription notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionOp {
    New,
    Changed,
    Removed,
}

/// Everything the server side can tell the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Context state transition
    ConnectionChanged(ConnectionState),

    /// Reply to a server-info query
    ServerInfo(ServerInfo),

    /// One sink descriptor (from a single or list query)
    Sink(DeviceDescriptor),

    /// A full sink listing finished
    SinkListComplete,

    /// One source descriptor (from a single or list query)
    Source(DeviceDescriptor),

    /// Subscription notification
    Subscription {
        facility: Facility,
        operation: SubscriptionOp,
        index: u32,
    },

    /// Completion of a sink volume request
    SinkVolumeApplied { success: bool, sink: DeviceHandle },
}

/// What a mute command should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuteAction {
    Toggle,
    Set(bool),
}

impl MuteAction {
    /// Resulting mute flag given the current one
    pub fn apply(self, current: bool) -> bool {
        match self {
            MuteAction::Toggle => !current,
            MuteAction::Set(muted) => muted,
        }
    }
}

/// Commands sent from callers to the event-loop thread
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Absolute volume set, clamped into `[min, max]`
    SetVolume { target: u16, min: u16, max: u16 },

    /// Relative volume step of `step` percent, capped at `max`
    StepVolume {
        change: VolumeChange,
        step: f64,
        max: u16,
    },

    SetSinkMute(MuteAction),

    SetSourceMute(MuteAction),

    /// Stop the event loop
    Shutdown,
}

/// Requests the event-loop thread issues to the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerRequest {
    GetServerInfo,
    Subscribe,
    GetSinkByIndex(u32),
    GetSinkList,
    GetSourceByIndex(u32),
    GetSourceList,
    SetSinkVolume {
        sink: DeviceHandle,
        volume: ChannelVolume,
    },
    SetSinkMute { sink: DeviceHandle, mute: bool },
    SetSourceMute { source: DeviceHandle, mute: bool },
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Request(ServerRequest),

    /// Publish the snapshot and invoke the update callback
    Notify,

    /// Drop the failed context and connect again after `delay`
    Reconnect { delay: Duration },

    /// Leave the event loop
    Stop,
}
