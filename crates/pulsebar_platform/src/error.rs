//! Platform Error Types

use thiserror::Error;

use pulsebar_core::CoreError;

/// Fatal errors raised while constructing a backend
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Platform not supported")]
    UnsupportedPlatform,

    #[error("Failed to allocate audio-server main loop")]
    MainloopCreation,

    #[error("Failed to allocate audio-server context: {0}")]
    ContextCreation(String),

    #[error("Failed to spawn event-loop thread: {0}")]
    ThreadSpawn(String),

    #[error("Backend initialization failed: {0}")]
    InitializationFailed(String),

    #[error(transparent)]
    Config(#[from] CoreError),
}

/// Result type alias for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;
