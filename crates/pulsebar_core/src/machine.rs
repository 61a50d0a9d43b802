//! Audio State Machine
//!
//! The single-threaded step function behind the event loop. It consumes
//! decoded [`BackendEvent`]s and caller [`Command`]s and answers with the
//! [`Effect`]s the loop thread must carry out. It never talks to the server
//! itself, which keeps every resolution and volume rule testable without one.

use tracing::{debug, error, info, trace, warn};

use crate::config::{BackendConfig, ReconnectPolicy};
use crate::device::{ConnectionState, ServerInfo};
use crate::message::{BackendEvent, Command, Effect, Facility, ServerRequest, SubscriptionOp};
use crate::resolver::{InputResolver, OutputResolver};
use crate::snapshot::AudioSnapshot;
use crate::volume::{plan_absolute, plan_step};

/// Owner of all current-device state
#[derive(Debug)]
pub struct AudioMachine {
    policy: ReconnectPolicy,
    epoch: u64,
    connection: ConnectionState,
    server: ServerInfo,
    output: OutputResolver,
    input: InputResolver,
    failed_attempts: u32,
    tearing_down: bool,
}

impl AudioMachine {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            policy: config.reconnect.clone(),
            epoch: 0,
            connection: ConnectionState::Disconnected,
            server: ServerInfo::default(),
            output: OutputResolver::new(config.ignore_list()),
            input: InputResolver::new(),
            failed_attempts: 0,
            tearing_down: false,
        }
    }

    /// Epoch of the live connection; bumped every time a connection fails
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    pub fn output(&self) -> &OutputResolver {
        &self.output
    }

    pub fn input(&self) -> &InputResolver {
        &self.input
    }

    pub fn is_tearing_down(&self) -> bool {
        self.tearing_down
    }

    /// Copy of everything readers are allowed to see
    pub fn snapshot(&self) -> AudioSnapshot {
        AudioSnapshot {
            connection: self.connection,
            output: self.output.device().clone(),
            input: self.input.device().clone(),
        }
    }

    /// Suppress reconnection from here on
    pub fn begin_teardown(&mut self) {
        self.tearing_down = true;
    }

    /// Process one event raised by the connection stamped with `epoch`
    pub fn handle(&mut self, epoch: u64, event: BackendEvent) -> Vec<Effect> {
        if epoch != self.epoch {
            trace!("Dropping {:?} from stale connection (epoch {} != {})", event, epoch, self.epoch);
            return Vec::new();
        }

        match event {
            BackendEvent::ConnectionChanged(state) => self.on_connection(state),
            event if !self.connection.is_ready() => {
                trace!("Dropping {:?} while not ready", event);
                Vec::new()
            }
            BackendEvent::ServerInfo(info) => {
                debug!(
                    "Server defaults: sink='{}' source='{}'",
                    info.default_sink, info.default_source
                );
                self.output.on_server_info(&info);
                self.server = info;
                vec![
                    Effect::Request(ServerRequest::GetSinkList),
                    Effect::Request(ServerRequest::GetSourceList),
                ]
            }
            BackendEvent::Sink(desc) => {
                if self.output.resolve(&desc, &self.server.default_sink, self.epoch) {
                    vec![Effect::Notify]
                } else {
                    Vec::new()
                }
            }
            BackendEvent::SinkListComplete => {
                if self.output.on_list_complete() {
                    // Running sinks passed over before fallback was allowed get another look
                    vec![Effect::Request(ServerRequest::GetSinkList)]
                } else {
                    Vec::new()
                }
            }
            BackendEvent::Source(desc) => {
                if self.input.resolve(&desc, &self.server.default_source, self.epoch) {
                    vec![Effect::Notify]
                } else {
                    Vec::new()
                }
            }
            BackendEvent::Subscription {
                facility,
                operation,
                index,
            } => Self::on_subscription(facility, operation, index),
            BackendEvent::SinkVolumeApplied { success, sink } => {
                if !success {
                    debug!("Volume change on sink {} was rejected", sink.index);
                    Vec::new()
                } else if sink.is_current(self.epoch) {
                    vec![Effect::Request(ServerRequest::GetSinkByIndex(sink.index))]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn on_connection(&mut self, state: ConnectionState) -> Vec<Effect> {
        let previous = self.connection;
        self.connection = state;

        match state {
            ConnectionState::Ready => {
                info!("Connected to audio server");
                self.failed_attempts = 0;
                vec![
                    Effect::Notify,
                    Effect::Request(ServerRequest::GetServerInfo),
                    Effect::Request(ServerRequest::Subscribe),
                ]
            }
            ConnectionState::Failed => {
                self.epoch += 1;
                self.output.invalidate();
                self.input.invalidate();

                if self.tearing_down {
                    return vec![Effect::Notify];
                }

                self.failed_attempts = self.failed_attempts.saturating_add(1);
                if !self.policy.allows(self.failed_attempts) {
                    error!(
                        "Audio server connection failed; giving up after {} attempts",
                        self.failed_attempts - 1
                    );
                    return vec![Effect::Notify];
                }

                let delay = self.policy.delay_for(self.failed_attempts);
                warn!(
                    "Audio server connection failed (was {:?}), reconnecting in {:?}",
                    previous, delay
                );
                vec![Effect::Notify, Effect::Reconnect { delay }]
            }
            ConnectionState::Terminated => {
                info!("Audio server connection terminated");
                self.output.invalidate();
                self.input.invalidate();
                vec![Effect::Notify, Effect::Stop]
            }
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                debug!("Connection state: {:?}", state);
                Vec::new()
            }
        }
    }

    fn on_subscription(facility: Facility, operation: SubscriptionOp, index: u32) -> Vec<Effect> {
        if operation != SubscriptionOp::Changed {
            return Vec::new();
        }

        let request = match facility {
            Facility::Server => ServerRequest::GetServerInfo,
            Facility::Sink => ServerRequest::GetSinkByIndex(index),
            Facility::SinkInput => ServerRequest::GetSinkList,
            Facility::Source => ServerRequest::GetSourceByIndex(index),
            Facility::SourceOutput => ServerRequest::GetSourceList,
            Facility::Other => return Vec::new(),
        };
        vec![Effect::Request(request)]
    }

    /// Process one caller command
    pub fn handle_command(&mut self, command: Command) -> Vec<Effect> {
        if command == Command::Shutdown {
            self.begin_teardown();
            return vec![Effect::Stop];
        }

        if !self.connection.is_ready() {
            error!("Cannot execute {:?}: not connected to audio server", command);
            return Vec::new();
        }

        match command {
            Command::SetVolume { target, min, max } => {
                let Some(sink) = self.output.handle() else {
                    warn!("No current sink to set volume on");
                    return Vec::new();
                };
                let volume = plan_absolute(self.output.channel_volume(), target, min, max);
                vec![Effect::Request(ServerRequest::SetSinkVolume { sink, volume })]
            }
            Command::StepVolume { change, step, max } => {
                let Some(sink) = self.output.handle() else {
                    warn!("No current sink to step volume on");
                    return Vec::new();
                };
                let current = self.output.device().volume;
                match plan_step(self.output.channel_volume(), current, change, step, max) {
                    Some(volume) => vec![Effect::Request(ServerRequest::SetSinkVolume { sink, volume })],
                    None => {
                        trace!("{:?} by {} at {}% changes nothing", change, step, current);
                        Vec::new()
                    }
                }
            }
            Command::SetSinkMute(action) => {
                let Some(sink) = self.output.handle() else {
                    warn!("No current sink to mute");
                    return Vec::new();
                };
                let mute = action.apply(self.output.device().muted);
                self.output.set_muted(mute);
                vec![
                    Effect::Request(ServerRequest::SetSinkMute { sink, mute }),
                    Effect::Notify,
                ]
            }
            Command::SetSourceMute(action) => {
                let Some(source) = self.input.handle() else {
                    warn!("No current source to mute");
                    return Vec::new();
                };
                let mute = action.apply(self.input.device().muted);
                self.input.set_muted(mute);
                vec![
                    Effect::Request(ServerRequest::SetSourceMute { source, mute }),
                    Effect::Notify,
                ]
            }
            Command::Shutdown => vec![Effect::Stop],
        }
    }
}
