//! Row and value types for the telemetry pipeline.
//!
//! [`ErrorOccurrence`] is what callers hand in; [`ErrorRecord`] and
//! [`LatencySample`] are what the store receives. Occurrences are transient
//! and never persisted directly.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a telemetry event.
///
/// Variants are ordered, so a minimum-level filter is a plain comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    /// Stable uppercase name, as persisted in the `level` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Error
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar tag value attached to a record.
///
/// Serialises as the bare scalar, so tags round-trip as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    Str(String),
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A single error event as reported by the caller.
///
/// Fields left unset are filled from ambient request context where one is
/// active; explicitly set fields always win.
#[derive(Debug, Clone, Default)]
pub struct ErrorOccurrence {
    /// Raw, unmasked message.
    pub message: String,
    /// Severity (defaults to [`Level::Error`]).
    pub level: Level,
    /// Error type name (e.g. "LookupError"). Derived from the stack trace
    /// or function name when unset.
    pub error_type: Option<String>,
    /// Raw stack trace text.
    pub stack_trace: Option<String>,
    /// Function or endpoint that raised the error.
    pub function_name: Option<String>,
    /// Sub-component within the service.
    pub component: Option<String>,
    /// Route pattern being handled.
    pub route: Option<String>,
    /// HTTP method being handled.
    pub http_method: Option<String>,
    /// HTTP status associated with the event.
    pub http_status: Option<u16>,
    /// Elapsed time associated with the event.
    pub latency_ms: Option<u64>,
    /// Correlation id for the request.
    pub request_id: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Host the event originated from.
    pub host: Option<String>,
    /// Numeric foreign keys (e.g. `clinic_id`).
    pub domain_ids: HashMap<String, i64>,
    /// Free-form caller-supplied tags.
    pub tags: HashMap<String, TagValue>,
}

impl ErrorOccurrence {
    /// Occurrence for `message` at ERROR level.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Set the severity.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the error type name.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Attach the raw stack trace text.
    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Set the raising function or endpoint.
    #[must_use]
    pub fn with_function_name(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = Some(function_name.into());
        self
    }

    /// Set the sub-component.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set the route, overriding ambient context.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Set the HTTP method, overriding ambient context.
    #[must_use]
    pub fn with_http_method(mut self, http_method: impl Into<String>) -> Self {
        self.http_method = Some(http_method.into());
        self
    }

    /// Set the HTTP status.
    #[must_use]
    pub fn with_http_status(mut self, http_status: u16) -> Self {
        self.http_status = Some(http_status);
        self
    }

    /// Set the associated latency.
    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Set the request id, overriding ambient context.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the session id, overriding ambient context.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the originating host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Attach a numeric domain identifier.
    #[must_use]
    pub fn with_domain_id(mut self, key: impl Into<String>, id: i64) -> Self {
        self.domain_ids.insert(key.into(), id);
        self
    }

    /// Attach a free-form tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// The persisted error row.
///
/// Immutable once written; deduplication is a query-time grouping over
/// `fingerprint`, never write-time suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Server-side timestamp assigned at write time.
    pub recorded_at: DateTime<Utc>,
    /// Severity of the event.
    pub level: Level,
    /// Raw message, truncated to the configured bound.
    pub message: String,
    /// Masked message used for grouping.
    pub message_template: String,
    /// Raw stack trace, truncated to the configured bound.
    pub stack_trace: Option<String>,
    /// 64-char hex grouping key.
    pub fingerprint: String,
    /// Error type the fingerprint was computed with.
    pub error_type: String,
    /// Service that produced the error.
    pub service: String,
    /// Sub-component within the service.
    pub component: Option<String>,
    /// Deployment environment.
    pub environment: String,
    /// Release version running when the error occurred.
    pub release_version: Option<String>,
    /// Build identifier.
    pub build_sha: Option<String>,
    /// Route pattern being handled.
    pub route: Option<String>,
    /// Function or endpoint that raised the error.
    pub function_name: Option<String>,
    /// HTTP method being handled.
    pub http_method: Option<String>,
    /// HTTP status associated with the event.
    pub http_status: Option<u16>,
    /// Elapsed time associated with the event.
    pub latency_ms: Option<u64>,
    /// Correlation id for the request.
    pub request_id: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Host the event originated from.
    pub host: Option<String>,
    /// Numeric foreign keys.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub domain_ids: HashMap<String, i64>,
    /// Free-form caller-supplied tags.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, TagValue>,
}

/// The persisted metrics row for one timed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySample {
    /// Server-side timestamp assigned at write time.
    pub recorded_at: DateTime<Utc>,
    /// Service that performed the operation.
    pub service: String,
    /// Remote system or dependency the operation talked to.
    pub peer: String,
    /// Route pattern of the operation.
    pub route: String,
    /// HTTP method of the operation.
    pub method: String,
    /// Outcome status (200 on success, 500 on failure).
    pub status: u16,
    /// Whether the operation completed without error.
    pub ok: bool,
    /// Elapsed time in milliseconds.
    pub latency_ms: u64,
    /// Correlation id, generated when the caller supplied none.
    pub request_id: String,
    /// Numeric foreign keys.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub domain_ids: HashMap<String, i64>,
}
