//! Configuration types for the telemetry core.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::TelemetryError;

// ============================================================================
// Default configuration constants
// ============================================================================

/// Default service name when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "unknown";

/// Default deployment environment.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Default maximum stack frames included in a fingerprint.
pub const DEFAULT_MAX_FRAMES: usize = 5;

/// Default minimum digit count before an integer is masked in templates.
pub const DEFAULT_MASK_MIN_DIGITS: u32 = 2;

/// Default fraction of fast, successful calls persisted as metrics rows.
pub const DEFAULT_SAMPLE_RATE: f64 = 0.02;

/// Default slow-call threshold in milliseconds.
pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 2_000;

/// Default maximum stored message length in bytes.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 10_000;

/// Default maximum stored stack trace length in bytes.
pub const DEFAULT_MAX_STACK_TRACE_LEN: usize = 40_000;

/// Telemetry core configuration.
///
/// Set once at initialisation and treated as read-only thereafter; every
/// component holds a shared handle to it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service identity stamped onto every record.
    pub service: ServiceConfig,
    /// Fingerprint computation settings.
    pub fingerprint: FingerprintConfig,
    /// Latency sampling settings.
    pub sampler: SamplerConfig,
    /// Stored payload size limits.
    pub limits: LimitsConfig,
}

impl TelemetryConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order (later sources override earlier):
    /// 1. Default values
    /// 2. `telemetry.toml` in current directory
    /// 3. Environment variables prefixed with `TELEMETRY_`, with `__`
    ///    separating sections (`TELEMETRY_SAMPLER__SAMPLE_RATE`)
    pub fn load() -> Result<Self, TelemetryError> {
        Figment::new()
            .merge(Toml::file("telemetry.toml"))
            .merge(Env::prefixed("TELEMETRY_").split("__"))
            .extract::<Self>()
            .map_err(|e| TelemetryError::Config(e.to_string()))
            .and_then(Self::validated)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &str) -> Result<Self, TelemetryError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("TELEMETRY_").split("__"))
            .extract::<Self>()
            .map_err(|e| TelemetryError::Config(e.to_string()))
            .and_then(Self::validated)
    }

    /// Parse configuration from a literal TOML string.
    pub fn parse(content: &str) -> Result<Self, TelemetryError> {
        Figment::new()
            .merge(Toml::string(content))
            .extract::<Self>()
            .map_err(|e| TelemetryError::Config(e.to_string()))
            .and_then(Self::validated)
    }

    fn validated(self) -> Result<Self, TelemetryError> {
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges. Called by the loaders and again when a config is
    /// handed to the pipeline, since the fields are public.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if !(0.0..=1.0).contains(&self.sampler.sample_rate) {
            return Err(TelemetryError::InvalidSampleRate {
                rate: self.sampler.sample_rate,
            });
        }
        if self.limits.max_message_len == 0 {
            return Err(TelemetryError::Config(
                "limits.max_message_len must be greater than zero".to_owned(),
            ));
        }
        if self.limits.max_stack_trace_len == 0 {
            return Err(TelemetryError::Config(
                "limits.max_stack_trace_len must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Logical service name (e.g. "processing").
    pub name: String,
    /// Deployment environment (e.g. "production").
    pub environment: String,
    /// Release version; part of the grouping key unless excluded.
    pub release_version: Option<String>,
    /// Build identifier (e.g. a git SHA).
    pub build_sha: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_owned(),
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            release_version: None,
            build_sha: None,
        }
    }
}

/// Fingerprint computation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Maximum stack frames to include (0 = unlimited).
    pub max_frames: usize,
    /// Minimum digit count before an integer is masked in the template.
    ///
    /// At the default of 2 a message like "dog 12" masks; raising it to 4
    /// keeps 3-digit HTTP status codes verbatim.
    pub mask_min_digits: u32,
    /// Include the release version in the grouping key.
    ///
    /// With this off the same bug groups together across releases.
    pub include_release: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            mask_min_digits: DEFAULT_MASK_MIN_DIGITS,
            include_release: true,
        }
    }
}

/// Latency sampling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Fraction of fast, successful calls persisted as metrics rows.
    ///
    /// Failed and slow calls are always persisted regardless of this rate.
    pub sample_rate: f64,
    /// Elapsed-time cutoff in milliseconds above which a call is slow.
    pub slow_threshold_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
        }
    }
}

/// Stored payload size limits, in bytes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum stored message length.
    pub max_message_len: usize,
    /// Maximum stored stack trace length.
    pub max_stack_trace_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_stack_trace_len: DEFAULT_MAX_STACK_TRACE_LEN,
        }
    }
}
