//! Fingerprint computation over canonical error components.
//!
//! The fingerprint is a SHA-256 hash of {error type, message template,
//! canonical frames, service, release}, hex-encoded to a fixed 64 characters.
//! It is a pure function of its inputs: identical occurrences hash
//! identically, and any differing component changes the hash.

use sha2::{Digest, Sha256};

use crate::config::FingerprintConfig;
use crate::fingerprint::{top_frames, TemplateMasker};

/// Separates components inside the hash input. A NUL byte never appears in
/// user text, so `type="A", template="B|C"` cannot collide with
/// `type="A|B", template="C"`.
const DELIMITER: &[u8] = b"\x00";

/// The derived identity of one error occurrence.
///
/// Every field is a deterministic function of the occurrence; the
/// `fingerprint` is the query-time grouping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorIdentity {
    /// Masked message template.
    pub template: String,
    /// Canonical `file:function` frames the fingerprint was computed over.
    pub frames: Vec<String>,
    /// 64-character hex grouping key.
    pub fingerprint: String,
}

/// Computes the grouping identity for error occurrences.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    config: FingerprintConfig,
    masker: TemplateMasker,
}

impl Fingerprinter {
    /// Fingerprinter with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FingerprintConfig::default())
    }

    /// Fingerprinter with custom configuration.
    #[must_use]
    pub fn with_config(config: FingerprintConfig) -> Self {
        let masker = TemplateMasker::new(&config);
        Self { config, masker }
    }

    /// Derive the full identity for one occurrence.
    ///
    /// Masks the message, canonicalises the stack trace to the first K
    /// frames, and hashes the result together with the service identity.
    /// Never fails: a frameless or empty trace simply contributes nothing
    /// to the hash.
    #[must_use]
    pub fn identify(
        &self,
        error_type: &str,
        message: &str,
        stack_trace: Option<&str>,
        service: &str,
        release: Option<&str>,
    ) -> ErrorIdentity {
        let template = self.masker.template(message);
        let frames = stack_trace
            .map(|trace| top_frames(trace, self.config.max_frames))
            .unwrap_or_default();
        let fingerprint = self.compute(error_type, &template, &frames, service, release);
        ErrorIdentity {
            template,
            frames,
            fingerprint,
        }
    }

    /// Hash the five canonical components into the grouping key.
    ///
    /// `template` and `frames` are expected to be already normalised; use
    /// [`Fingerprinter::identify`] to go from raw inputs. A missing release
    /// hashes as an explicit empty component, so absence and `""` group
    /// identically rather than silently diverging.
    #[must_use]
    pub fn compute(
        &self,
        error_type: &str,
        template: &str,
        frames: &[String],
        service: &str,
        release: Option<&str>,
    ) -> String {
        let release = if self.config.include_release {
            release.unwrap_or("")
        } else {
            ""
        };

        let mut hasher = Sha256::new();
        hasher.update(error_type.as_bytes());
        hasher.update(DELIMITER);
        hasher.update(template.as_bytes());
        hasher.update(DELIMITER);
        hasher.update(frames.join(";").as_bytes());
        hasher.update(DELIMITER);
        hasher.update(service.as_bytes());
        hasher.update(DELIMITER);
        hasher.update(release.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience: one-shot identity derivation with default configuration.
#[must_use]
pub fn compute_fingerprint(
    error_type: &str,
    message: &str,
    stack_trace: Option<&str>,
    service: &str,
    release: Option<&str>,
) -> String {
    Fingerprinter::new()
        .identify(error_type, message, stack_trace, service, release)
        .fingerprint
}
