//! Linux Platform Backend - PulseAudio
//!
//! Speaks the PulseAudio native protocol, which both PulseAudio and
//! PipeWire's `pipewire-pulse` layer serve.
//!
//! # Architecture
//!
//! libpulse objects are not `Send`/`Sync`, so the main loop and every
//! context live on a dedicated thread. The `PulseBackend` talks to that
//! thread through a command channel and reads a published snapshot:
//!
//! ```text
//! Caller Thread                   Pulse Thread
//! ─────────────                   ────────────
//! PulseBackend                    Mainloop::iterate()
//!   ├── snapshot (Arc<RwLock>) ◄── AudioMachine effects
//!   ├── command_tx ──────────────► AudioMachine::handle_command
//!   └── on_update  ◄────────────── Effect::Notify
//! ```

#[cfg(feature = "pulseaudio")]
mod connection;
#[cfg(feature = "pulseaudio")]
mod decode;
#[cfg(feature = "pulseaudio")]
mod thread;

use pulsebar_core::{AudioSnapshot, MuteAction, VolumeChange};

use crate::traits::AudioControl;

/// Stub backend for when the PulseAudio feature is disabled
#[cfg(not(feature = "pulseaudio"))]
pub struct StubBackend;

#[cfg(not(feature = "pulseaudio"))]
impl StubBackend {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(feature = "pulseaudio"))]
impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(feature = "pulseaudio"))]
impl AudioControl for StubBackend {
    fn name(&self) -> &'static str {
        "Linux Stub (PulseAudio disabled)"
    }

    fn snapshot(&self) -> AudioSnapshot {
        AudioSnapshot::default()
    }

    fn set_volume(&self, target: u16, _min: u16, _max: u16) {
        tracing::warn!("Ignoring volume change to {}%: PulseAudio feature not enabled", target);
    }

    fn step_volume(&self, change: VolumeChange, _step: f64, _max: u16) {
        tracing::warn!("Ignoring volume {:?}: PulseAudio feature not enabled", change);
    }

    fn set_sink_mute(&self, action: MuteAction) {
        tracing::warn!("Ignoring sink mute {:?}: PulseAudio feature not enabled", action);
    }

    fn set_source_mute(&self, action: MuteAction) {
        tracing::warn!("Ignoring source mute {:?}: PulseAudio feature not enabled", action);
    }
}

// ============================================================================
// PulseAudio Backend Implementation
// ============================================================================

#[cfg(feature = "pulseaudio")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "pulseaudio")]
use std::sync::Arc;
#[cfg(feature = "pulseaudio")]
use std::thread::JoinHandle;
#[cfg(feature = "pulseaudio")]
use std::time::Duration;

#[cfg(feature = "pulseaudio")]
use crossbeam_channel::{bounded, RecvTimeoutError, Sender, TrySendError};
#[cfg(feature = "pulseaudio")]
use parking_lot::RwLock;
#[cfg(feature = "pulseaudio")]
use pulsebar_core::{BackendConfig, Command};

#[cfg(feature = "pulseaudio")]
use crate::error::{PlatformError, PlatformResult};
#[cfg(feature = "pulseaudio")]
use crate::traits::UpdateCallback;

/// PulseAudio backend implementation
///
/// # Thread Safety
///
/// All server interaction happens on the "pulse-main" thread. Mutations are
/// queued and executed there between main-loop dispatch passes, so they are
/// serialized against server callbacks without any shared lock.
#[cfg(feature = "pulseaudio")]
pub struct PulseBackend {
    /// Last published state (written by the pulse thread only)
    snapshot: Arc<RwLock<AudioSnapshot>>,

    /// Channel to send commands to the pulse thread
    command_tx: Sender<Command>,

    /// Handle to the pulse thread
    thread_handle: Option<JoinHandle<()>>,

    /// Flag to signal shutdown
    shutdown: Arc<AtomicBool>,
}

#[cfg(feature = "pulseaudio")]
impl PulseBackend {
    /// Capacity of the command queue; commands beyond it are dropped with a warning
    const COMMAND_CAPACITY: usize = 64;

    /// Timeout for the pulse thread to report its allocations
    const INIT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a new PulseAudio backend
    ///
    /// Spawns the event-loop thread and starts connecting. Returns once the
    /// main loop and the first context are allocated; the connection itself
    /// completes (or keeps retrying) in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the main loop or
    /// context cannot be allocated.
    pub fn new(config: BackendConfig, on_update: UpdateCallback) -> PlatformResult<Self> {
        config.validate()?;
        tracing::info!("Initializing PulseAudio backend as '{}'", config.client_name);

        let snapshot = Arc::new(RwLock::new(AudioSnapshot::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = bounded::<Command>(Self::COMMAND_CAPACITY);
        let (init_tx, init_rx) = bounded::<PlatformResult<()>>(1);

        let thread_ctx = thread::ThreadContext {
            config,
            command_rx,
            snapshot: Arc::clone(&snapshot),
            on_update,
            shutdown: Arc::clone(&shutdown),
            init_tx,
        };

        let thread_handle = std::thread::Builder::new()
            .name("pulse-main".into())
            .spawn(move || thread::pulse_thread_main(thread_ctx))
            .map_err(|e| PlatformError::ThreadSpawn(e.to_string()))?;

        match init_rx.recv_timeout(Self::INIT_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("PulseAudio initialization failed: {}", e);
                if thread_handle.join().is_err() {
                    tracing::error!("Pulse thread panicked during initialization");
                }
                return Err(e);
            }
            Err(RecvTimeoutError::Timeout) => {
                shutdown.store(true, Ordering::SeqCst);
                return Err(PlatformError::InitializationFailed(
                    "pulse thread did not report within timeout".into(),
                ));
            }
            Err(RecvTimeoutError::Disconnected) => {
                if thread_handle.join().is_err() {
                    tracing::error!("Pulse thread panicked during initialization");
                }
                return Err(PlatformError::InitializationFailed(
                    "pulse thread exited during initialization".into(),
                ));
            }
        }

        Ok(Self {
            snapshot,
            command_tx,
            thread_handle: Some(thread_handle),
            shutdown,
        })
    }

    /// Queue a command without blocking the caller
    fn send(&self, command: Command) {
        match self.command_tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                tracing::warn!("Command queue full, dropping {:?}", command);
            }
            Err(TrySendError::Disconnected(command)) => {
                tracing::error!("Pulse thread is gone, dropping {:?}", command);
            }
        }
    }
}

#[cfg(feature = "pulseaudio")]
impl Drop for PulseBackend {
    fn drop(&mut self) {
        tracing::info!("Shutting down PulseAudio backend");

        // Signal shutdown
        self.shutdown.store(true, Ordering::SeqCst);

        // The flag alone is enough if the queue happens to be full
        let _ = self.command_tx.try_send(Command::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                tracing::error!("Pulse thread panicked: {:?}", e);
            }
        }

        tracing::info!("PulseAudio backend shut down");
    }
}

#[cfg(feature = "pulseaudio")]
impl AudioControl for PulseBackend {
    fn name(&self) -> &'static str {
        "PulseAudio"
    }

    fn snapshot(&self) -> AudioSnapshot {
        self.snapshot.read().clone()
    }

    fn set_volume(&self, target: u16, min: u16, max: u16) {
        self.send(Command::SetVolume { target, min, max });
    }

    fn step_volume(&self, change: VolumeChange, step: f64, max: u16) {
        self.send(Command::StepVolume { change, step, max });
    }

    fn set_sink_mute(&self, action: MuteAction) {
        self.send(Command::SetSinkMute(action));
    }

    fn set_source_mute(&self, action: MuteAction) {
        self.send(Command::SetSourceMute(action));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "pulseaudio"))]
    #[test]
    fn test_stub_backend() {
        let backend = StubBackend::new();
        assert!(!backend.is_connected());
        assert_eq!(backend.snapshot(), AudioSnapshot::default());

        // Mutations are absorbed
        backend.set_volume(50, 0, 100);
        backend.step_volume(VolumeChange::Decrease, 5.0, 100);
        backend.set_sink_mute(MuteAction::Toggle);
        backend.set_source_mute(MuteAction::Set(true));
        assert_eq!(backend.volume(), 0);
    }

    #[cfg(feature = "pulseaudio")]
    #[test]
    #[ignore = "requires PulseAudio server"]
    fn test_pulse_backend_connects() {
        use std::sync::atomic::AtomicUsize;

        let updates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        let backend = PulseBackend::new(
            BackendConfig::default(),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("backend should initialize");

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !backend.is_connected() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }

        assert!(backend.is_connected());
        assert!(updates.load(Ordering::SeqCst) > 0);
        assert_eq!(backend.name(), "PulseAudio");
    }
}
