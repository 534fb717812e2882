//! Integration tests for the capture pipeline.
//!
//! Tests the full flow: occurrence / log event / timed operation ->
//! context resolution and fingerprinting -> rows in the store.

use std::sync::Arc;

use rstest::{fixture, rstest};

use meridian_telemetry::context::{RequestContext, ThreadLocalContext};
use meridian_telemetry::{
    ErrorOccurrence, ErrorRecord, EventSink, LatencySample, Level, LogEvent, MemoryStore,
    Operation, TagValue, Telemetry, TelemetryConfig, TelemetryError, TelemetryStore,
};

// ============================================================================
// Fixtures
// ============================================================================

const KENNEL: &str = r#"
[service]
name = "kennel"
environment = "production"
release_version = "2024.06.1"
"#;

const ALWAYS_SAMPLE: &str = "[sampler]\nsample_rate = 1.0\nslow_threshold_ms = 60000\n";
const NEVER_SAMPLE: &str = "[sampler]\nsample_rate = 0.0\nslow_threshold_ms = 60000\n";
const EVERYTHING_SLOW: &str = "[sampler]\nsample_rate = 0.0\nslow_threshold_ms = 0\n";

fn config(toml: &str) -> TelemetryConfig {
    TelemetryConfig::parse(toml).unwrap()
}

fn kennel_with(sampler: &str) -> TelemetryConfig {
    config(&format!("{KENNEL}\n{sampler}"))
}

#[fixture]
fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

#[fixture]
fn telemetry(store: Arc<MemoryStore>) -> (Telemetry, Arc<MemoryStore>) {
    let telemetry = Telemetry::new(config(KENNEL), store.clone()).unwrap();
    (telemetry, store)
}

// ============================================================================
// Test data builders
// ============================================================================

const TRACE_DOG_12: &str = r#"Traceback (most recent call last):
  File "app/views.py", line 31, in fetch_dog
    dog = repository.get(dog_id)
  File "app/repository.py", line 88, in get
    raise LookupError(f"dog {dog_id} missing")
LookupError: dog 12 missing"#;

// Same failure on a later deploy: different id, shifted line numbers.
const TRACE_DOG_99: &str = r#"Traceback (most recent call last):
  File "app/views.py", line 31, in fetch_dog
    dog = repository.get(dog_id)
  File "app/repository.py", line 92, in get
    raise LookupError(f"dog {dog_id} missing")
LookupError: dog 99 missing"#;

fn dog_fetch_failure(id: u32, trace: &str) -> ErrorOccurrence {
    ErrorOccurrence::new(format!("Failed to fetch dog {id}")).with_stack_trace(trace)
}

// ============================================================================
// Error capture
// ============================================================================

#[rstest]
fn repeated_errors_share_one_fingerprint(telemetry: (Telemetry, Arc<MemoryStore>)) {
    let (telemetry, store) = telemetry;

    telemetry.emit(dog_fetch_failure(12, TRACE_DOG_12));
    telemetry.emit(dog_fetch_failure(99, TRACE_DOG_99));

    let rows = store.errors();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].fingerprint, rows[1].fingerprint);
    assert_eq!(rows[0].message_template, "Failed to fetch dog <N>");
    assert_eq!(rows[0].error_type, "LookupError");
    // Raw messages stay untouched for display
    assert_eq!(rows[0].message, "Failed to fetch dog 12");
    assert_eq!(rows[1].message, "Failed to fetch dog 99");
}

#[rstest]
fn unrelated_errors_do_not_collide(telemetry: (Telemetry, Arc<MemoryStore>)) {
    let (telemetry, store) = telemetry;

    telemetry.emit(dog_fetch_failure(12, TRACE_DOG_12));
    telemetry.emit(ErrorOccurrence::new("Payment declined").with_error_type("CardError"));

    let rows = store.errors();
    assert_ne!(rows[0].fingerprint, rows[1].fingerprint);
}

#[rstest]
fn rows_carry_the_service_identity(telemetry: (Telemetry, Arc<MemoryStore>)) {
    let (telemetry, store) = telemetry;

    telemetry.emit(ErrorOccurrence::new("boom"));

    let row = &store.errors()[0];
    assert_eq!(row.service, "kennel");
    assert_eq!(row.environment, "production");
    assert_eq!(row.release_version.as_deref(), Some("2024.06.1"));
}

#[rstest]
fn oversized_messages_are_truncated(store: Arc<MemoryStore>) {
    let config = config(&format!("{KENNEL}\n[limits]\nmax_message_len = 8\n"));
    let telemetry = Telemetry::new(config, store.clone()).unwrap();

    telemetry.emit(ErrorOccurrence::new("a message far past the limit"));

    assert_eq!(store.errors()[0].message, "a messag");
}

// ============================================================================
// Request context
// ============================================================================

#[rstest]
fn ambient_context_lands_on_error_rows(store: Arc<MemoryStore>) {
    let telemetry = Telemetry::with_context(
        config(KENNEL),
        store.clone(),
        Arc::new(ThreadLocalContext),
    )
    .unwrap();

    {
        let _scope = ThreadLocalContext::enter(
            RequestContext::empty()
                .with_route("/dogs/<id>")
                .with_http_method("GET")
                .with_request_id("req-123"),
        );
        telemetry.emit(ErrorOccurrence::new("inside the request"));
    }
    telemetry.emit(ErrorOccurrence::new("outside any request"));

    let rows = store.errors();
    assert_eq!(rows[0].route.as_deref(), Some("/dogs/<id>"));
    assert_eq!(rows[0].request_id.as_deref(), Some("req-123"));
    assert!(rows[1].route.is_none());
    assert!(rows[1].request_id.is_none());
}

#[rstest]
fn caller_fields_override_ambient_context(store: Arc<MemoryStore>) {
    let telemetry = Telemetry::with_context(
        config(KENNEL),
        store.clone(),
        Arc::new(ThreadLocalContext),
    )
    .unwrap();

    let _scope = ThreadLocalContext::enter(
        RequestContext::empty()
            .with_route("/dogs/<id>")
            .with_request_id("ambient"),
    );
    telemetry.emit(ErrorOccurrence::new("boom").with_request_id("explicit"));

    let row = &store.errors()[0];
    assert_eq!(row.request_id.as_deref(), Some("explicit"));
    assert_eq!(row.route.as_deref(), Some("/dogs/<id>"));
}

// ============================================================================
// Latency sampling
// ============================================================================

#[rstest]
fn slow_operations_yield_a_sample_and_a_warning(store: Arc<MemoryStore>) {
    let telemetry = Telemetry::new(kennel_with(EVERYTHING_SLOW), store.clone()).unwrap();

    telemetry
        .begin(Operation::new("postgres", "/dogs/<id>", "GET"))
        .complete();

    let samples = store.latencies();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].service, "kennel");
    assert!(samples[0].ok);

    let warnings = store.errors();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Level::Warning);
    assert!(warnings[0].message.starts_with("SLOW postgres GET /dogs/<id> "));
    assert_eq!(warnings[0].function_name.as_deref(), Some("http:postgres"));
}

#[rstest]
fn failures_are_recorded_even_at_rate_zero(store: Arc<MemoryStore>) {
    let telemetry = Telemetry::new(kennel_with(NEVER_SAMPLE), store.clone()).unwrap();

    let result: Result<(), &str> = telemetry.observe(
        Operation::new("payments-api", "/charges", "POST"),
        || Err("card declined"),
    );

    assert!(result.is_err());
    let samples = store.latencies();
    assert_eq!(samples.len(), 1);
    assert!(!samples[0].ok);
    assert_eq!(samples[0].status, 500);
}

#[rstest]
fn fast_successes_respect_the_sample_rate(store: Arc<MemoryStore>) {
    let silent = Telemetry::new(kennel_with(NEVER_SAMPLE), store.clone()).unwrap();
    for _ in 0..5 {
        silent
            .begin(Operation::new("postgres", "/dogs", "GET"))
            .complete();
    }
    assert!(store.latencies().is_empty());

    let eager = Telemetry::new(kennel_with(ALWAYS_SAMPLE), store.clone()).unwrap();
    for _ in 0..5 {
        eager
            .begin(Operation::new("postgres", "/dogs", "GET"))
            .complete();
    }
    assert_eq!(store.latencies().len(), 5);
}

#[rstest]
fn request_lifecycle_correlates_error_and_sample(store: Arc<MemoryStore>) {
    let telemetry = Telemetry::with_context(
        kennel_with(ALWAYS_SAMPLE),
        store.clone(),
        Arc::new(ThreadLocalContext),
    )
    .unwrap();

    let _scope = ThreadLocalContext::enter(
        RequestContext::empty()
            .with_route("/dogs/<id>")
            .with_http_method("GET")
            .with_request_id("req-123"),
    );

    let guard = telemetry.begin(
        Operation::new("postgres", "/dogs/<id>", "GET").with_request_id("req-123"),
    );
    telemetry.emit(dog_fetch_failure(12, TRACE_DOG_12));
    guard.complete();

    assert_eq!(store.errors()[0].request_id.as_deref(), Some("req-123"));
    assert_eq!(store.latencies()[0].request_id, "req-123");
}

// ============================================================================
// Log sink
// ============================================================================

#[rstest]
fn log_events_flow_through_the_sink(telemetry: (Telemetry, Arc<MemoryStore>)) {
    let (telemetry, store) = telemetry;
    let sink = telemetry.sink();

    sink.handle(LogEvent::new(Level::Info, "routine chatter"));
    sink.handle(
        LogEvent::new(Level::Error, "sync failed")
            .with_module("tasks")
            .with_function("sync_dogs")
            .with_field("dog_id", 12_i64)
            .with_field("region", "eu-west-1"),
    );

    let rows = store.errors();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.message, "sync failed");
    assert_eq!(row.function_name.as_deref(), Some("tasks.sync_dogs"));
    assert_eq!(row.domain_ids.get("dog_id"), Some(&12));
    assert_eq!(row.tags.get("region"), Some(&TagValue::from("eu-west-1")));
}

// ============================================================================
// Store behaviour
// ============================================================================

struct FailingStore;

impl TelemetryStore for FailingStore {
    fn insert_error(&self, _record: &ErrorRecord) -> Result<(), TelemetryError> {
        Err(TelemetryError::store(std::io::Error::other(
            "database unreachable",
        )))
    }

    fn insert_latency(&self, _sample: &LatencySample) -> Result<(), TelemetryError> {
        Err(TelemetryError::store(std::io::Error::other(
            "database unreachable",
        )))
    }
}

#[rstest]
fn store_failures_never_reach_instrumented_code() {
    let telemetry =
        Telemetry::new(kennel_with(EVERYTHING_SLOW), Arc::new(FailingStore)).unwrap();

    telemetry.emit(dog_fetch_failure(12, TRACE_DOG_12));
    telemetry
        .begin(Operation::new("postgres", "/dogs/<id>", "GET"))
        .complete();
    let result: Result<u32, &str> =
        telemetry.observe(Operation::new("postgres", "/dogs", "GET"), || Ok(7));

    // Every call above returned normally despite a store that always fails.
    assert_eq!(result, Ok(7));
}
