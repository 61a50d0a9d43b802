//! Pulsebar Core - Audio Device State
//!
//! This crate holds everything about the audio-server client that does not
//! need the server library itself:
//! - Device descriptors and epoch-stamped device handles
//! - Resolution of the "current" output and input device
//! - Channel-volume arithmetic for absolute sets and relative steps
//! - The state machine that turns server events into requests and notifications
//! - Configuration loading
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Caller Thread                         │
//! │   set_volume / step_volume / mute ──▶ Command               │
//! │   snapshot() ◀── Arc<RwLock<AudioSnapshot>>                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ crossbeam-channel
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Event-Loop Thread                       │
//! │  server callbacks ──BackendEvent──▶ AudioMachine ──Effect──┐│
//! │        ▲                                                   ││
//! │        └──────────── ServerRequest ◀───────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod device;
mod error;
mod machine;
mod message;
mod resolver;
mod snapshot;
mod volume;

pub use config::{BackendConfig, ReconnectPolicy};
pub use device::{
    ConnectionState, DeviceDescriptor, DeviceHandle, DeviceKind, DeviceState, ServerInfo,
};
pub use error::{CoreError, CoreResult};
pub use machine::AudioMachine;
pub use message::{
    BackendEvent, Command, Effect, Facility, MuteAction, ServerRequest, SubscriptionOp,
};
pub use resolver::{IgnoreList, InputResolver, OutputResolver};
pub use snapshot::{AudioSnapshot, InputDevice, OutputDevice, UNKNOWN_PORT};
pub use volume::{
    native_to_percent, percent_to_native, plan_absolute, plan_step, ChannelVolume, VolumeChange,
    CHANNELS_MAX, MAX_PERCENT, VOLUME_MAX, VOLUME_NORM, VOLUME_UI_MAX,
};
