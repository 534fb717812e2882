//! Best-effort assembly and persistence of error rows.
//!
//! The emitter is the convergence point of the pipeline: it resolves ambient
//! request context, derives the error identity, merges everything into one
//! [`ErrorRecord`], and performs a single insert. Its defining contract is
//! that nothing escapes to the caller: a failed write is logged to the
//! diagnostic channel and dropped.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::config::TelemetryConfig;
use crate::context::ContextProvider;
use crate::fingerprint::{derive_error_type, Fingerprinter};
use crate::record::{ErrorOccurrence, ErrorRecord};
use crate::store::TelemetryStore;

/// Error type recorded when neither the caller nor the stack trace names one.
pub const UNKNOWN_ERROR_TYPE: &str = "UnknownError";

/// Turns error occurrences into persisted rows.
///
/// Merge precedence: fields set on the occurrence win; ambient context fills
/// only what the caller left unset.
pub struct ErrorRecordEmitter {
    config: Arc<TelemetryConfig>,
    fingerprinter: Fingerprinter,
    store: Arc<dyn TelemetryStore>,
    context: Arc<dyn ContextProvider>,
}

impl ErrorRecordEmitter {
    /// Emitter writing through `store`, resolving ambient fields via
    /// `context`.
    #[must_use]
    pub fn new(
        config: Arc<TelemetryConfig>,
        store: Arc<dyn TelemetryStore>,
        context: Arc<dyn ContextProvider>,
    ) -> Self {
        let fingerprinter = Fingerprinter::with_config(config.fingerprint.clone());
        Self {
            config,
            fingerprinter,
            store,
            context,
        }
    }

    /// Persist one occurrence as a full error row.
    ///
    /// Never fails and never panics on a failing store: identity derivation
    /// and context resolution are infallible by construction, and the only
    /// fallible step, the insert itself, is absorbed here.
    pub fn emit(&self, occurrence: ErrorOccurrence) {
        let record = self.assemble(occurrence);
        if let Err(err) = self.store.insert_error(&record) {
            tracing::warn!(
                fingerprint = %record.fingerprint,
                error = %err,
                "Failed to persist error record"
            );
        }
    }

    /// Build the full row for an occurrence without writing it.
    fn assemble(&self, occurrence: ErrorOccurrence) -> ErrorRecord {
        let ambient = self.context.current();
        let service = &self.config.service;
        let limits = &self.config.limits;

        // Explicit type, then the raise line of the trace, then the raising
        // function, then the fixed fallback.
        let error_type = occurrence
            .error_type
            .clone()
            .or_else(|| occurrence.stack_trace.as_deref().and_then(derive_error_type))
            .or_else(|| occurrence.function_name.clone())
            .unwrap_or_else(|| UNKNOWN_ERROR_TYPE.to_owned());

        let identity = self.fingerprinter.identify(
            &error_type,
            &occurrence.message,
            occurrence.stack_trace.as_deref(),
            &service.name,
            service.release_version.as_deref(),
        );

        ErrorRecord {
            recorded_at: Utc::now(),
            level: occurrence.level,
            message: truncate_on_char_boundary(occurrence.message, limits.max_message_len),
            message_template: identity.template,
            stack_trace: occurrence
                .stack_trace
                .map(|trace| truncate_on_char_boundary(trace, limits.max_stack_trace_len)),
            fingerprint: identity.fingerprint,
            error_type,
            service: service.name.clone(),
            component: occurrence.component,
            environment: service.environment.clone(),
            release_version: service.release_version.clone(),
            build_sha: service.build_sha.clone(),
            route: occurrence.route.or(ambient.route),
            function_name: occurrence.function_name,
            http_method: occurrence.http_method.or(ambient.http_method),
            http_status: occurrence.http_status,
            latency_ms: occurrence.latency_ms,
            request_id: occurrence.request_id.or(ambient.request_id),
            session_id: occurrence.session_id.or(ambient.session_id),
            host: occurrence.host,
            domain_ids: occurrence.domain_ids,
            tags: occurrence.tags,
        }
    }
}

impl fmt::Debug for ErrorRecordEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecordEmitter")
            .field("service", &self.config.service.name)
            .finish_non_exhaustive()
    }
}

/// Truncate to at most `max_len` bytes, cutting back to a char boundary.
fn truncate_on_char_boundary(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}
