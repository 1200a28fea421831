//! Errors reported by the host

/// Everything that can go wrong outside the tick path
#[derive(thiserror::Error, Debug)]
pub enum HostError {
    /// The driver thread could not be started
    #[error("failed to spawn tick driver: {0}")]
    Spawn(#[from] std::io::Error),

    /// The event queue is full, the event was dropped
    #[error("event queue full")]
    QueueFull,

    /// The driver thread has stopped
    #[error("tick driver disconnected")]
    Disconnected,

    /// The driver thread panicked
    #[error("tick driver panicked")]
    Panicked,

    /// The configuration was rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// A patch blob could not be decoded
    #[error("invalid patch: {0}")]
    InvalidPatch(&'static str),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;
