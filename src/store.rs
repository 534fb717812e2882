//! Persistence seam for telemetry rows.

use parking_lot::Mutex;

use crate::error::TelemetryError;
use crate::record::{ErrorRecord, LatencySample};

/// Persistence collaborator for telemetry rows.
///
/// One insert per event; the core never reads, updates, or deletes. Writes
/// run synchronously in the caller's thread, so implementations talking to a
/// remote store should keep their own timeouts short. A returned error is
/// absorbed by the emitter or sampler and never reaches instrumented code.
pub trait TelemetryStore: Send + Sync {
    /// Persist one error row.
    fn insert_error(&self, record: &ErrorRecord) -> Result<(), TelemetryError>;

    /// Persist one latency metrics row.
    fn insert_latency(&self, sample: &LatencySample) -> Result<(), TelemetryError>;
}

/// In-memory store for tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    errors: Mutex<Vec<ErrorRecord>>,
    latencies: Mutex<Vec<LatencySample>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all persisted error rows, in insertion order.
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.lock().clone()
    }

    /// Snapshot of all persisted latency rows, in insertion order.
    #[must_use]
    pub fn latencies(&self) -> Vec<LatencySample> {
        self.latencies.lock().clone()
    }
}

impl TelemetryStore for MemoryStore {
    fn insert_error(&self, record: &ErrorRecord) -> Result<(), TelemetryError> {
        self.errors.lock().push(record.clone());
        Ok(())
    }

    fn insert_latency(&self, sample: &LatencySample) -> Result<(), TelemetryError> {
        self.latencies.lock().push(sample.clone());
        Ok(())
    }
}
