//! Latency capture for outbound and inbound operations.
//!
//! Every timed region produces at most one metrics row and at most one slow
//! warning. Failed and slow operations are always persisted; fast successful
//! ones are kept at the configured sample rate, so steady-state volume stays
//! proportional to traffic without losing the interesting tail.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::TelemetryConfig;
use crate::context::new_request_id;
use crate::emitter::ErrorRecordEmitter;
use crate::record::{ErrorOccurrence, LatencySample, Level};
use crate::store::TelemetryStore;

/// Identity of one timed operation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Remote system or dependency being called (e.g. "payments-api").
    pub peer: String,
    /// Route pattern of the call.
    pub route: String,
    /// HTTP method of the call.
    pub method: String,
    /// Correlation id; generated at `begin` when unset.
    pub request_id: Option<String>,
    /// Numeric foreign keys carried onto the sample and any slow warning.
    pub domain_ids: HashMap<String, i64>,
}

impl Operation {
    /// Operation against `peer` for `method` `route`.
    #[must_use]
    pub fn new(
        peer: impl Into<String>,
        route: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            peer: peer.into(),
            route: route.into(),
            method: method.into(),
            request_id: None,
            domain_ids: HashMap::new(),
        }
    }

    /// Carry the caller's correlation id instead of generating one.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach a numeric domain identifier.
    #[must_use]
    pub fn with_domain_id(mut self, key: impl Into<String>, id: i64) -> Self {
        self.domain_ids.insert(key.into(), id);
        self
    }
}

/// Times operations and decides which produce persisted samples.
///
/// An operation is kept when it failed, when it crossed the slow threshold,
/// or when a uniform draw lands under the sample rate. The draw only happens
/// for fast successful operations, so the always-keep rules cost no entropy.
pub struct LatencySampler {
    config: Arc<TelemetryConfig>,
    store: Arc<dyn TelemetryStore>,
    emitter: Arc<ErrorRecordEmitter>,
    rng: Mutex<SmallRng>,
}

impl LatencySampler {
    /// Sampler writing samples through `store` and slow warnings through
    /// `emitter`.
    #[must_use]
    pub fn new(
        config: Arc<TelemetryConfig>,
        store: Arc<dyn TelemetryStore>,
        emitter: Arc<ErrorRecordEmitter>,
    ) -> Self {
        Self {
            config,
            store,
            emitter,
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Start timing `operation`.
    ///
    /// The returned guard records the operation when it drops. Call
    /// [`OperationGuard::complete`] or [`OperationGuard::fail`] to set the
    /// outcome explicitly; a guard dropped without either counts as success,
    /// unless the thread is unwinding, which counts as failure.
    pub fn begin(&self, operation: Operation) -> OperationGuard<'_> {
        let request_id = operation.request_id.clone().unwrap_or_else(new_request_id);
        OperationGuard {
            sampler: self,
            operation,
            request_id,
            started: Instant::now(),
            outcome: None,
        }
    }

    /// Time a closure, deriving the outcome from its result.
    ///
    /// The result passes through unchanged, so this wraps an existing call
    /// without disturbing its error handling.
    pub fn observe<T, E, F>(&self, operation: Operation, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let guard = self.begin(operation);
        let result = f();
        match &result {
            Ok(_) => guard.complete(),
            Err(_) => guard.fail(),
        }
        result
    }

    /// Record one finished operation: maybe a sample, maybe a slow warning.
    fn finish(&self, operation: &Operation, request_id: &str, ok: bool, latency_ms: u64) {
        let slow = latency_ms >= self.config.sampler.slow_threshold_ms;

        if self.keep_sample(ok, slow) {
            let sample = LatencySample {
                recorded_at: Utc::now(),
                service: self.config.service.name.clone(),
                peer: operation.peer.clone(),
                route: operation.route.clone(),
                method: operation.method.clone(),
                status: if ok { 200 } else { 500 },
                ok,
                latency_ms,
                request_id: request_id.to_owned(),
                domain_ids: operation.domain_ids.clone(),
            };
            if let Err(err) = self.store.insert_latency(&sample) {
                tracing::warn!(
                    peer = %sample.peer,
                    route = %sample.route,
                    error = %err,
                    "Failed to persist latency sample"
                );
            }
        }

        if slow {
            let mut warning = ErrorOccurrence::new(format!(
                "SLOW {} {} {} {}ms",
                operation.peer, operation.method, operation.route, latency_ms
            ))
            .with_level(Level::Warning)
            .with_function_name(format!("http:{}", operation.peer))
            .with_route(operation.route.clone())
            .with_http_method(operation.method.clone())
            .with_http_status(if ok { 200 } else { 500 })
            .with_latency_ms(latency_ms);
            warning.domain_ids = operation.domain_ids.clone();
            self.emitter.emit(warning);
        }
    }

    fn keep_sample(&self, ok: bool, slow: bool) -> bool {
        !ok || slow || self.rng.lock().gen::<f64>() < self.config.sampler.sample_rate
    }
}

impl fmt::Debug for LatencySampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencySampler")
            .field("sample_rate", &self.config.sampler.sample_rate)
            .field("slow_threshold_ms", &self.config.sampler.slow_threshold_ms)
            .finish_non_exhaustive()
    }
}

/// Live timed region; records its operation exactly once, on drop.
#[must_use = "dropping the guard immediately ends the timed region"]
#[derive(Debug)]
pub struct OperationGuard<'a> {
    sampler: &'a LatencySampler,
    operation: Operation,
    request_id: String,
    started: Instant,
    outcome: Option<bool>,
}

impl OperationGuard<'_> {
    /// Correlation id for this operation, generated if the caller set none.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// End the region as a success.
    pub fn complete(mut self) {
        self.outcome = Some(true);
    }

    /// End the region as a failure.
    pub fn fail(mut self) {
        self.outcome = Some(false);
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let ok = self.outcome.unwrap_or_else(|| !std::thread::panicking());
        let latency_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.sampler
            .finish(&self.operation, &self.request_id, ok, latency_ms);
    }
}
