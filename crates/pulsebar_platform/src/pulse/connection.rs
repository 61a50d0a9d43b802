//! One server link
//!
//! A `Connection` wraps a single libpulse context and stamps everything it
//! reports with the epoch it was opened under. A failed connection is never
//! reused; the event loop drops it and opens a fresh one.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use libpulse_binding as pulse;
use pulse::callbacks::ListResult;
use pulse::context::subscribe::InterestMaskSet;
use pulse::context::{Context, FlagSet as ContextFlagSet};
use pulse::mainloop::standard::Mainloop;
use pulse::proplist::{properties, Proplist};
use tracing::{debug, info, trace, warn};

use pulsebar_core::{BackendEvent, ConnectionState, ServerRequest};

use super::decode;
use crate::error::{PlatformError, PlatformResult};

/// Events raised by libpulse callbacks, drained by the event loop
pub type EventQueue = Rc<RefCell<VecDeque<(u64, BackendEvent)>>>;

fn push(events: &EventQueue, epoch: u64, event: BackendEvent) {
    events.borrow_mut().push_back((epoch, event));
}

pub struct Connection {
    context: Context,
    epoch: u64,
    events: EventQueue,
    last_state: Option<ConnectionState>,
    /// Raised by the context state callback, cleared when the state is read
    state_changed: Rc<Cell<bool>>,
    /// `connect()` was refused outright; the context never leaves Unconnected
    connect_refused: bool,
}

impl Connection {
    /// Allocate a context and start connecting.
    ///
    /// Only allocation failures are errors. A refused connect request is
    /// reported as a `Failed` state event like any other connection failure.
    pub fn open(
        mainloop: &Mainloop,
        client_name: &str,
        epoch: u64,
        events: &EventQueue,
    ) -> PlatformResult<Self> {
        let mut proplist = Proplist::new()
            .ok_or_else(|| PlatformError::ContextCreation("property list".into()))?;
        if proplist
            .set_str(properties::APPLICATION_NAME, client_name)
            .is_err()
        {
            warn!("Failed to set application name '{}'", client_name);
        }

        let context = Context::new_with_proplist(mainloop, client_name, &proplist)
            .ok_or_else(|| PlatformError::ContextCreation(format!("client '{}'", client_name)))?;

        let mut connection = Self {
            context,
            epoch,
            events: Rc::clone(events),
            last_state: None,
            state_changed: Rc::new(Cell::new(true)),
            connect_refused: false,
        };
        connection.install_state_callback();
        connection.install_subscribe_callback();

        // NOFAIL: wait for a missing server instead of failing immediately
        match connection
            .context
            .connect(None, ContextFlagSet::NOFAIL, None)
        {
            Ok(()) => debug!("Connecting to audio server (epoch {})", epoch),
            Err(e) => {
                warn!("Audio server refused connect request: {}", e);
                connection.connect_refused = true;
                connection.report(ConnectionState::Failed);
            }
        }

        Ok(connection)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn report(&mut self, state: ConnectionState) {
        self.last_state = Some(state);
        push(&self.events, self.epoch, BackendEvent::ConnectionChanged(state));
    }

    /// Queue a state event if the state callback fired since the last call
    pub fn poll_state(&mut self) {
        if self.connect_refused || !self.state_changed.replace(false) {
            return;
        }
        let state = decode::connection_state(self.context.get_state());
        if self.last_state != Some(state) {
            trace!("Context state {:?} -> {:?}", self.last_state, state);
            self.report(state);
        }
    }

    fn install_state_callback(&mut self) {
        let state_changed = Rc::clone(&self.state_changed);
        self.context
            .set_state_callback(Some(Box::new(move || state_changed.set(true))));
    }

    fn install_subscribe_callback(&mut self) {
        let events = Rc::clone(&self.events);
        let epoch = self.epoch;

        self.context
            .set_subscribe_callback(Some(Box::new(move |facility, operation, index| {
                let (Some(facility), Some(operation)) = (facility, operation) else {
                    return;
                };
                push(
                    &events,
                    epoch,
                    BackendEvent::Subscription {
                        facility: decode::facility(facility),
                        operation: decode::operation(operation),
                        index,
                    },
                );
            })));
    }

    /// Issue one request; its reply arrives later through the event queue
    pub fn execute(&mut self, request: ServerRequest) {
        let events = Rc::clone(&self.events);
        let epoch = self.epoch;

        match request {
            ServerRequest::GetServerInfo => {
                self.context.introspect().get_server_info(move |info| {
                    push(&events, epoch, BackendEvent::ServerInfo(decode::server_info(info)));
                });
            }
            ServerRequest::Subscribe => {
                let mask = InterestMaskSet::SERVER
                    | InterestMaskSet::SINK
                    | InterestMaskSet::SINK_INPUT
                    | InterestMaskSet::SOURCE
                    | InterestMaskSet::SOURCE_OUTPUT;
                self.context.subscribe(mask, |success| {
                    if success {
                        info!("Subscribed to audio server events");
                    } else {
                        warn!("Audio server rejected event subscription");
                    }
                });
            }
            ServerRequest::GetSinkByIndex(index) => {
                self.context
                    .introspect()
                    .get_sink_info_by_index(index, move |result| match result {
                        ListResult::Item(info) => {
                            push(&events, epoch, BackendEvent::Sink(decode::sink(info)))
                        }
                        ListResult::End => {}
                        ListResult::Error => warn!("Failed to query sink #{}", index),
                    });
            }
            ServerRequest::GetSinkList => {
                self.context
                    .introspect()
                    .get_sink_info_list(move |result| match result {
                        ListResult::Item(info) => {
                            push(&events, epoch, BackendEvent::Sink(decode::sink(info)))
                        }
                        ListResult::End => push(&events, epoch, BackendEvent::SinkListComplete),
                        ListResult::Error => warn!("Failed to list sinks"),
                    });
            }
            ServerRequest::GetSourceByIndex(index) => {
                self.context
                    .introspect()
                    .get_source_info_by_index(index, move |result| match result {
                        ListResult::Item(info) => {
                            push(&events, epoch, BackendEvent::Source(decode::source(info)))
                        }
                        ListResult::End => {}
                        ListResult::Error => warn!("Failed to query source #{}", index),
                    });
            }
            ServerRequest::GetSourceList => {
                self.context
                    .introspect()
                    .get_source_info_list(move |result| match result {
                        ListResult::Item(info) => {
                            push(&events, epoch, BackendEvent::Source(decode::source(info)))
                        }
                        ListResult::End => {}
                        ListResult::Error => warn!("Failed to list sources"),
                    });
            }
            ServerRequest::SetSinkVolume { sink, volume } => {
                if !sink.is_current(self.epoch) {
                    debug!("Skipping volume change for sink from epoch {}", sink.epoch);
                    return;
                }
                let Some(volumes) = decode::pulse_volumes(&volume) else {
                    warn!("Refusing to submit invalid volume structure for sink #{}", sink.index);
                    return;
                };
                self.context.introspect().set_sink_volume_by_index(
                    sink.index,
                    &volumes,
                    Some(Box::new(move |success| {
                        push(&events, epoch, BackendEvent::SinkVolumeApplied { success, sink });
                    })),
                );
            }
            ServerRequest::SetSinkMute { sink, mute } => {
                if !sink.is_current(self.epoch) {
                    debug!("Skipping mute change for sink from epoch {}", sink.epoch);
                    return;
                }
                self.context
                    .introspect()
                    .set_sink_mute_by_index(sink.index, mute, None);
            }
            ServerRequest::SetSourceMute { source, mute } => {
                if !source.is_current(self.epoch) {
                    debug!("Skipping mute change for source from epoch {}", source.epoch);
                    return;
                }
                self.context
                    .introspect()
                    .set_source_mute_by_index(source.index, mute, None);
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.context.set_state_callback(None);
        self.context.set_subscribe_callback(None);
        self.context.disconnect();
        debug!("Closed audio server connection (epoch {})", self.epoch);
    }
}
