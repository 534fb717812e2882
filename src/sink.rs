//! Bridge from a host logging pipeline into the error store.
//!
//! A [`TelemetrySink`] is registered with whatever logging framework the host
//! application runs and turns qualifying log events into error rows. Events
//! below the minimum level are rejected before any assembly work happens.
//! The sink reports its own persistence failures through the diagnostic
//! channel, never through itself, so it cannot feed back into the store.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::emitter::ErrorRecordEmitter;
use crate::record::{ErrorOccurrence, Level, TagValue};

/// Events below this level are dropped unless the sink is reconfigured.
pub const DEFAULT_MIN_LEVEL: Level = Level::Warning;

/// One log event as handed over by the host logging framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Severity of the event.
    pub level: Level,
    /// Formatted log message.
    pub message: String,
    /// Error type name, when the framework captured an exception.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Stack trace text, when the framework captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Module that issued the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Function that issued the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Structured fields attached to the event.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, TagValue>,
}

impl LogEvent {
    /// Event with `message` at `level` and nothing else set.
    #[must_use]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            error_type: None,
            stack_trace: None,
            module: None,
            function: None,
            fields: HashMap::new(),
        }
    }

    /// Set the captured error type name.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Attach captured stack trace text.
    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Set the issuing module.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Set the issuing function.
    #[must_use]
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Attach a structured field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Receiver for host log events.
///
/// Split into a cheap level check and the handling proper so adapters can
/// skip event assembly entirely for levels the sink will drop.
pub trait EventSink: Send + Sync {
    /// Whether events at `level` would be handled at all.
    fn enabled(&self, level: Level) -> bool;

    /// Consume one event.
    fn handle(&self, event: LogEvent);
}

/// Sink that persists qualifying log events as error rows.
///
/// Well-known structured fields map onto their dedicated columns; integer
/// fields named `*_id` become domain identifiers; everything else lands in
/// the free-form tags.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    emitter: Arc<ErrorRecordEmitter>,
    min_level: Level,
}

impl TelemetrySink {
    /// Sink forwarding to `emitter` at the default minimum level.
    #[must_use]
    pub fn new(emitter: Arc<ErrorRecordEmitter>) -> Self {
        Self {
            emitter,
            min_level: DEFAULT_MIN_LEVEL,
        }
    }

    /// Change the minimum level handled.
    #[must_use]
    pub fn with_min_level(mut self, min_level: Level) -> Self {
        self.min_level = min_level;
        self
    }

    fn occurrence_from(event: LogEvent) -> ErrorOccurrence {
        let function_name = match (event.module, event.function) {
            (Some(module), Some(function)) => Some(format!("{module}.{function}")),
            (Some(module), None) => Some(module),
            (None, Some(function)) => Some(function),
            (None, None) => None,
        };

        let mut occurrence = ErrorOccurrence::new(event.message).with_level(event.level);
        occurrence.error_type = event.error_type;
        occurrence.stack_trace = event.stack_trace;
        occurrence.function_name = function_name;

        for (key, value) in event.fields {
            let Some(value) = assign_known_field(&mut occurrence, &key, value) else {
                continue;
            };
            match value {
                TagValue::Int(id) if key.ends_with("_id") => {
                    occurrence.domain_ids.insert(key, id);
                }
                other => {
                    occurrence.tags.insert(key, other);
                }
            }
        }
        occurrence
    }
}

impl EventSink for TelemetrySink {
    fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn handle(&self, event: LogEvent) {
        if !self.enabled(event.level) {
            return;
        }
        self.emitter.emit(Self::occurrence_from(event));
    }
}

/// Map a well-known field onto its column.
///
/// Returns the value back when the key is not recognised or the value has
/// the wrong shape for the column, so the caller can keep it as a tag.
fn assign_known_field(
    occurrence: &mut ErrorOccurrence,
    key: &str,
    value: TagValue,
) -> Option<TagValue> {
    match (key, value) {
        ("component", TagValue::Str(s)) => occurrence.component = Some(s),
        ("route", TagValue::Str(s)) => occurrence.route = Some(s),
        ("http_method", TagValue::Str(s)) => occurrence.http_method = Some(s),
        ("request_id", TagValue::Str(s)) => occurrence.request_id = Some(s),
        ("session_id", TagValue::Str(s)) => occurrence.session_id = Some(s),
        ("host", TagValue::Str(s)) => occurrence.host = Some(s),
        ("http_status", TagValue::Int(n)) => match u16::try_from(n) {
            Ok(status) => occurrence.http_status = Some(status),
            Err(_) => return Some(TagValue::Int(n)),
        },
        ("latency_ms", TagValue::Int(n)) => match u64::try_from(n) {
            Ok(ms) => occurrence.latency_ms = Some(ms),
            Err(_) => return Some(TagValue::Int(n)),
        },
        (_, value) => return Some(value),
    }
    None
}
