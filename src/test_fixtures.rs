//! Composable test fixtures using rstest.
//!
//! This module provides a small hierarchy of fixtures for testing:
//!
//! ```text
//! config ──┐
//! store  ──┴── telemetry (pipeline wired to a shared in-memory store)
//! ```
//!
//! The plain constructors (`test_config`, `error_record`, `latency_sample`)
//! work outside rstest too.
//!
//! # Example
//!
//! ```ignore
//! use rstest::*;
//! use crate::test_fixtures::*;
//!
//! #[rstest]
//! fn my_test(telemetry: TestTelemetry) {
//!     telemetry.telemetry.emit(ErrorOccurrence::new("boom"));
//!     assert_eq!(telemetry.store.errors().len(), 1);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rstest::fixture;

use crate::config::{ServiceConfig, TelemetryConfig};
use crate::context::new_request_id;
use crate::fingerprint::compute_fingerprint;
use crate::record::{ErrorRecord, LatencySample, Level};
use crate::store::MemoryStore;
use crate::Telemetry;

/// Config with a fixed service identity, defaults everywhere else.
pub fn test_config() -> TelemetryConfig {
    TelemetryConfig {
        service: ServiceConfig {
            name: "kennel".to_owned(),
            environment: "test".to_owned(),
            release_version: Some("2024.06.1".to_owned()),
            build_sha: Some("4f9d2c0".to_owned()),
        },
        ..TelemetryConfig::default()
    }
}

/// Fully populated error row carrying `message`.
pub fn error_record(message: &str) -> ErrorRecord {
    ErrorRecord {
        recorded_at: Utc::now(),
        level: Level::Error,
        message: message.to_owned(),
        message_template: message.to_owned(),
        stack_trace: None,
        fingerprint: compute_fingerprint("TestError", message, None, "kennel", Some("2024.06.1")),
        error_type: "TestError".to_owned(),
        service: "kennel".to_owned(),
        component: None,
        environment: "test".to_owned(),
        release_version: Some("2024.06.1".to_owned()),
        build_sha: Some("4f9d2c0".to_owned()),
        route: None,
        function_name: None,
        http_method: None,
        http_status: None,
        latency_ms: None,
        request_id: None,
        session_id: None,
        host: None,
        domain_ids: HashMap::new(),
        tags: HashMap::new(),
    }
}

/// Successful latency row against `peer`.
pub fn latency_sample(peer: &str) -> LatencySample {
    LatencySample {
        recorded_at: Utc::now(),
        service: "kennel".to_owned(),
        peer: peer.to_owned(),
        route: "/dogs/<id>".to_owned(),
        method: "GET".to_owned(),
        status: 200,
        ok: true,
        latency_ms: 42,
        request_id: new_request_id(),
        domain_ids: HashMap::new(),
    }
}

/// Test service config.
#[fixture]
pub fn config() -> TelemetryConfig {
    test_config()
}

/// Shared in-memory store.
#[fixture]
pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// A wired pipeline together with the store it writes to.
pub struct TestTelemetry {
    /// The pipeline under test.
    pub telemetry: Telemetry,
    /// Handle onto the rows it persists.
    pub store: Arc<MemoryStore>,
}

/// Complete pipeline over an in-memory store.
#[fixture]
pub fn telemetry(config: TelemetryConfig, store: Arc<MemoryStore>) -> TestTelemetry {
    let telemetry = Telemetry::new(config, store.clone()).expect("test config is valid");
    TestTelemetry { telemetry, store }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ErrorOccurrence;
    use rstest::rstest;

    #[rstest]
    fn config_fixture_is_valid(config: TelemetryConfig) {
        assert!(config.validate().is_ok());
        assert_eq!(config.service.name, "kennel");
    }

    #[rstest]
    fn telemetry_fixture_is_fully_wired(telemetry: TestTelemetry) {
        telemetry.telemetry.emit(ErrorOccurrence::new("boom"));

        let rows = telemetry.store.errors();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service, "kennel");
    }

    #[test]
    fn record_constructors_share_the_service_identity() {
        let config = test_config();
        let record = error_record("boom");
        let sample = latency_sample("postgres");

        assert_eq!(record.service, config.service.name);
        assert_eq!(sample.service, config.service.name);
        assert_eq!(record.fingerprint.len(), 64);
    }
}
