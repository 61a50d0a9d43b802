//! Pulsebar Platform - Audio-Server Connection
//!
//! This crate owns the link to the audio server:
//! - Connection set-up, automatic reconnection and teardown
//! - Change subscriptions and follow-up queries
//! - Execution of volume and mute requests
//!
//! # Platform Support
//!
//! | Platform | Backend                         | Feature       |
//! |----------|---------------------------------|---------------|
//! | Linux    | PulseAudio / pipewire-pulse     | `pulseaudio`  |
//! | Linux    | Stub (never connects)           | (default)     |
//!
//! # Architecture
//!
//! Each backend implements the `AudioControl` trait; the decision logic it
//! drives lives in `pulsebar_core` and knows nothing about the server library.

mod error;
mod traits;

// Linux module is always compiled (contains stub for non-pulseaudio builds)
#[cfg(target_os = "linux")]
pub mod pulse;

pub use error::{PlatformError, PlatformResult};
pub use traits::{AudioControl, UpdateCallback};

use pulsebar_core::BackendConfig;

/// Get the audio backend for the current OS
///
/// `on_update` is invoked from the backend's event-loop thread whenever the
/// published snapshot changes.
pub fn get_backend(
    config: BackendConfig,
    on_update: UpdateCallback,
) -> Result<Box<dyn AudioControl>, PlatformError> {
    #[cfg(target_os = "linux")]
    {
        #[cfg(feature = "pulseaudio")]
        {
            Ok(Box::new(pulse::PulseBackend::new(config, on_update)?))
        }
        #[cfg(not(feature = "pulseaudio"))]
        {
            config.validate()?;
            let _ = on_update;
            Ok(Box::new(pulse::StubBackend::new()))
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = (config, on_update);
        Err(PlatformError::UnsupportedPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_invalid_config_rejected() {
        let config = BackendConfig {
            client_name: String::new(),
            ..Default::default()
        };
        let result = get_backend(config, Arc::new(|| {}));
        assert!(result.is_err());
    }

    #[cfg(all(target_os = "linux", not(feature = "pulseaudio")))]
    #[test]
    fn test_stub_backend_selected() {
        let backend = get_backend(BackendConfig::default(), Arc::new(|| {})).unwrap();
        assert!(!backend.is_connected());
        assert!(backend.name().contains("Stub"));
    }
}
