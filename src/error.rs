//! Error types for the telemetry core.

/// Errors that can occur in the telemetry core.
///
/// Store-side failures are boxed to keep the enum size small, which keeps
/// `Result<T, TelemetryError>` cheap to pass on the stack.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Sampling rate outside the unit interval.
    #[error("invalid sampling rate {rate}: must be within 0.0..=1.0")]
    InvalidSampleRate {
        /// The rejected rate.
        rate: f64,
    },

    /// Persistence collaborator failure (boxed - arbitrary store error).
    #[error("store write failed: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TelemetryError {
    /// Wrap an arbitrary store-side error.
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }
}
