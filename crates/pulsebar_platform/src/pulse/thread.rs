//! Pulse Thread Implementation
//!
//! This module contains the logic that runs in the dedicated pulse thread.
//! libpulse objects are not Send/Sync, so every main-loop and context
//! operation happens here.
//!
//! Each pass of the loop:
//! 1. dispatches whatever the main loop has ready (callbacks queue events)
//! 2. reads the context state if the state callback fired
//! 3. feeds queued events through the `AudioMachine` and carries out its effects
//! 4. waits for a caller command, longer when the pass found nothing to do

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use libpulse_binding as pulse;
use parking_lot::RwLock;
use pulse::mainloop::standard::{IterateResult, Mainloop};
use tracing::{debug, error, info, warn};

use pulsebar_core::{AudioMachine, AudioSnapshot, BackendConfig, Command, ConnectionState, Effect};

use super::connection::{Connection, EventQueue};
use crate::error::{PlatformError, PlatformResult};
use crate::traits::UpdateCallback;

/// Wait for a caller command after a pass that did some work
const LOOP_TICK: Duration = Duration::from_millis(20);

/// Wait for a caller command after a pass that found nothing to do
const IDLE_TICK: Duration = Duration::from_millis(100);

/// Upper bound on main-loop dispatches per pass
const MAX_DISPATCH_PER_PASS: usize = 64;

/// Retry interval when a fresh context cannot even be allocated
const REOPEN_RETRY: Duration = Duration::from_secs(1);

/// Everything the pulse thread receives from the constructor
pub struct ThreadContext {
    pub config: BackendConfig,
    pub command_rx: Receiver<Command>,
    pub snapshot: Arc<RwLock<AudioSnapshot>>,
    pub on_update: UpdateCallback,
    pub shutdown: Arc<AtomicBool>,
    /// Reports allocation success or failure exactly once
    pub init_tx: Sender<PlatformResult<()>>,
}

struct EventLoop {
    /// Declared before `mainloop` so the context is dropped first
    connection: Option<Connection>,
    mainloop: Mainloop,
    machine: AudioMachine,
    events: EventQueue,
    client_name: String,
    reconnect_at: Option<Instant>,
    snapshot: Arc<RwLock<AudioSnapshot>>,
    on_update: UpdateCallback,
    /// The last pass dispatched sources or handled events
    active: bool,
}

/// How long to wait for a command after a pass
fn tick_after(active: bool) -> Duration {
    if active {
        LOOP_TICK
    } else {
        IDLE_TICK
    }
}

impl EventLoop {
    /// Run ready main-loop sources without blocking.
    ///
    /// Returns the number of sources dispatched, or `None` once the main
    /// loop is unusable.
    fn dispatch(&mut self) -> Option<u32> {
        let mut dispatched = 0;
        for _ in 0..MAX_DISPATCH_PER_PASS {
            match self.mainloop.iterate(false) {
                IterateResult::Success(0) => return Some(dispatched),
                IterateResult::Success(n) => dispatched += n,
                IterateResult::Quit(_) => {
                    warn!("Pulse main loop quit");
                    return None;
                }
                IterateResult::Err(e) => {
                    error!("Pulse main loop iteration failed: {}", e);
                    return None;
                }
            }
        }
        Some(dispatched)
    }

    /// One dispatch pass; returns `false` once the loop should stop
    fn step(&mut self) -> bool {
        let Some(dispatched) = self.dispatch() else {
            return false;
        };

        if let Some(connection) = self.connection.as_mut() {
            connection.poll_state();
        }

        if self.reconnect_at.is_some_and(|at| Instant::now() >= at) {
            self.reconnect_at = None;
            self.reopen();
        }

        // Events raised while handling this batch wait for the next pass
        let batch: Vec<_> = self.events.borrow_mut().drain(..).collect();
        self.active = dispatched > 0 || !batch.is_empty();
        let mut keep_running = true;
        for (epoch, event) in batch {
            let effects = self.machine.handle(epoch, event);
            keep_running &= self.apply(effects);
        }
        keep_running
    }

    fn command(&mut self, command: Command) -> bool {
        debug!("Executing {:?}", command);
        let effects = self.machine.handle_command(command);
        self.apply(effects)
    }

    fn apply(&mut self, effects: Vec<Effect>) -> bool {
        let mut keep_running = true;
        for effect in effects {
            match effect {
                Effect::Request(request) => match self.connection.as_mut() {
                    Some(connection) => connection.execute(request),
                    None => debug!("No live connection for {:?}", request),
                },
                Effect::Notify => self.publish(),
                Effect::Reconnect { delay } => {
                    // Never reuse a failed context
                    self.connection = None;
                    if delay.is_zero() {
                        self.reopen();
                    } else {
                        self.reconnect_at = Some(Instant::now() + delay);
                    }
                }
                Effect::Stop => keep_running = false,
            }
        }
        keep_running
    }

    fn reopen(&mut self) {
        let epoch = self.machine.epoch();
        match Connection::open(&self.mainloop, &self.client_name, epoch, &self.events) {
            Ok(connection) => {
                info!("Reconnecting to audio server (epoch {})", connection.epoch());
                self.connection = Some(connection);
            }
            Err(e) => {
                error!("{}; retrying in {:?}", e, REOPEN_RETRY);
                self.reconnect_at = Some(Instant::now() + REOPEN_RETRY);
            }
        }
    }

    /// Publish the machine's state and notify the owner
    fn publish(&self) {
        *self.snapshot.write() = self.machine.snapshot();
        (self.on_update)();
    }

    fn teardown(&mut self) {
        self.machine.begin_teardown();
        self.reconnect_at = None;
        self.connection = None;
        self.snapshot.write().connection = ConnectionState::Terminated;
    }
}

/// Main entry point for the pulse thread
///
/// This function blocks until shutdown is signaled or the connection is
/// terminated.
pub fn pulse_thread_main(ctx: ThreadContext) {
    let ThreadContext {
        config,
        command_rx,
        snapshot,
        on_update,
        shutdown,
        init_tx,
    } = ctx;

    info!("Pulse thread starting");

    let Some(mainloop) = Mainloop::new() else {
        error!("Failed to create PulseAudio main loop");
        let _ = init_tx.send(Err(PlatformError::MainloopCreation));
        return;
    };

    let machine = AudioMachine::new(&config);
    let events: EventQueue = Rc::new(RefCell::new(VecDeque::new()));

    let connection = match Connection::open(&mainloop, &config.client_name, machine.epoch(), &events) {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to create PulseAudio context: {}", e);
            let _ = init_tx.send(Err(e));
            return;
        }
    };

    let _ = init_tx.send(Ok(()));

    let mut event_loop = EventLoop {
        connection: Some(connection),
        mainloop,
        machine,
        events,
        client_name: config.client_name,
        reconnect_at: None,
        snapshot,
        on_update,
        active: true,
    };

    info!("Pulse main loop starting");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Shutdown flag set");
            break;
        }

        if !event_loop.step() {
            break;
        }

        match command_rx.recv_timeout(tick_after(event_loop.active)) {
            Ok(command) => {
                event_loop.active = true;
                if !event_loop.command(command) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Command channel closed");
                break;
            }
        }
    }

    event_loop.teardown();
    info!("Pulse thread exiting");
}
