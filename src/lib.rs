//! Meridian Telemetry - Application-side error capture and latency sampling.
//!
//! This crate provides the in-process half of an error tracking pipeline:
//! - Masks raw error messages into stable templates and hashes them into
//!   fingerprints, so every recurrence of one bug shares a grouping key
//! - Times operations and samples their latency, always keeping failures
//!   and slow calls
//! - Resolves ambient request context without ever failing
//! - Persists best-effort: telemetry never breaks the code path it observes
//!
//! ## Architecture
//!
//! ```text
//! ErrorOccurrence / LogEvent → ErrorRecordEmitter
//!                                     ↓   (context merge + fingerprint)
//!                                ErrorRecord → TelemetryStore
//!                                                    ↑
//! Operation → LatencySampler → LatencySample ────────┘
//! ```

use std::fmt;
use std::sync::Arc;

pub mod config;
pub mod context;
pub mod emitter;
pub mod error;
pub mod fingerprint;
pub mod record;
pub mod sampler;
pub mod sink;
pub mod store;

#[cfg(test)]
pub mod test_fixtures;

pub use config::TelemetryConfig;
pub use context::{ContextProvider, RequestContext};
pub use emitter::ErrorRecordEmitter;
pub use error::TelemetryError;
pub use record::{ErrorOccurrence, ErrorRecord, LatencySample, Level, TagValue};
pub use sampler::{LatencySampler, Operation, OperationGuard};
pub use sink::{EventSink, LogEvent, TelemetrySink};
pub use store::{MemoryStore, TelemetryStore};

/// Handle onto a wired telemetry pipeline.
///
/// Cheap to clone and share across threads; every clone writes through the
/// same store and resolves context through the same provider.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    config: Arc<TelemetryConfig>,
    emitter: Arc<ErrorRecordEmitter>,
    sampler: LatencySampler,
}

impl Telemetry {
    /// Wire the pipeline over `store` with no ambient context.
    ///
    /// Suitable for background workers and scripts; web processes should use
    /// [`Telemetry::with_context`] with a request-scoped provider instead.
    pub fn new(
        config: TelemetryConfig,
        store: Arc<dyn TelemetryStore>,
    ) -> Result<Self, TelemetryError> {
        Self::with_context(config, store, Arc::new(context::EmptyContext))
    }

    /// Wire the pipeline over `store`, resolving ambient fields via `context`.
    ///
    /// The config is validated here since its fields are public; this is the
    /// only fallible step in the pipeline's life.
    pub fn with_context(
        config: TelemetryConfig,
        store: Arc<dyn TelemetryStore>,
        context: Arc<dyn ContextProvider>,
    ) -> Result<Self, TelemetryError> {
        config.validate()?;
        let config = Arc::new(config);
        let emitter = Arc::new(ErrorRecordEmitter::new(
            config.clone(),
            store.clone(),
            context,
        ));
        let sampler = LatencySampler::new(config.clone(), store, emitter.clone());
        tracing::debug!(service = %config.service.name, "Telemetry pipeline initialised");
        Ok(Self {
            inner: Arc::new(TelemetryInner {
                config,
                emitter,
                sampler,
            }),
        })
    }

    /// The configuration the pipeline was wired with.
    #[must_use]
    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    /// The error emitter, for callers that hold onto it directly.
    #[must_use]
    pub fn emitter(&self) -> &ErrorRecordEmitter {
        &self.inner.emitter
    }

    /// The latency sampler, for callers that hold onto it directly.
    #[must_use]
    pub fn sampler(&self) -> &LatencySampler {
        &self.inner.sampler
    }

    /// A log sink feeding this pipeline, for registration with the host
    /// logging framework.
    #[must_use]
    pub fn sink(&self) -> TelemetrySink {
        TelemetrySink::new(self.inner.emitter.clone())
    }

    /// Persist one error occurrence. Never fails.
    pub fn emit(&self, occurrence: ErrorOccurrence) {
        self.inner.emitter.emit(occurrence);
    }

    /// Start timing `operation`; see [`LatencySampler::begin`].
    pub fn begin(&self, operation: Operation) -> OperationGuard<'_> {
        self.inner.sampler.begin(operation)
    }

    /// Time a closure, deriving the outcome from its result; see
    /// [`LatencySampler::observe`].
    pub fn observe<T, E, F>(&self, operation: Operation, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.inner.sampler.observe(operation, f)
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("service", &self.inner.config.service.name)
            .finish_non_exhaustive()
    }
}
