//! Message-template masking.
//!
//! Variable tokens are replaced with fixed placeholders so messages that
//! differ only in embedded values produce the same template:
//!
//! - UUIDs and long hex runs become `<ID>`
//! - email addresses become `<EMAIL>`
//! - integers of a configured minimum width become `<N>`

use regex::Regex;
use std::sync::LazyLock;

use crate::config::FingerprintConfig;

/// Placeholder for masked integers.
pub const NUMBER_PLACEHOLDER: &str = "<N>";

/// Placeholder for masked identifiers (UUIDs, hex runs).
pub const ID_PLACEHOLDER: &str = "<ID>";

/// Placeholder for masked email addresses.
pub const EMAIL_PLACEHOLDER: &str = "<EMAIL>";

/// Compiled width-independent masking patterns, shared by every masker.
struct MaskPatterns {
    /// Dashed UUIDs: `550e8400-e29b-41d4-a716-446655440000`
    uuids: Regex,
    /// Email addresses: `vet@clinic.example.com`
    emails: Regex,
    /// Bare hex runs of 16+ chars (hashes, tokens, dashless UUIDs)
    hex_runs: Regex,
}

fn build_patterns() -> Option<MaskPatterns> {
    Some(MaskPatterns {
        uuids: Regex::new(
            r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
        )
        .ok()?,
        emails: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").ok()?,
        hex_runs: Regex::new(r"\b[0-9a-fA-F]{16,}\b").ok()?,
    })
}

static PATTERNS: LazyLock<Option<MaskPatterns>> = LazyLock::new(build_patterns);

/// Masks variable tokens out of raw messages.
///
/// Construction compiles the width-dependent integer pattern. If any pattern
/// is unavailable the masker degrades to passing the affected tokens through
/// unmasked rather than failing; a coarse template is better than a lost
/// record.
#[derive(Debug, Clone)]
pub struct TemplateMasker {
    numbers: Option<Regex>,
}

impl TemplateMasker {
    /// Masker for the given configuration.
    #[must_use]
    pub fn new(config: &FingerprintConfig) -> Self {
        let pattern = format!(r"\b\d{{{},}}\b", config.mask_min_digits);
        Self {
            numbers: Regex::new(&pattern).ok(),
        }
    }

    /// Derive the message template for `message`.
    ///
    /// Deterministic: two messages differing only in masked values yield the
    /// same template. Whitespace runs collapse to single spaces.
    #[must_use]
    pub fn template(&self, message: &str) -> String {
        let mut result = message.to_owned();

        if let Some(patterns) = PATTERNS.as_ref() {
            result = patterns
                .uuids
                .replace_all(&result, ID_PLACEHOLDER)
                .to_string();
            result = patterns
                .emails
                .replace_all(&result, EMAIL_PLACEHOLDER)
                .to_string();
            result = patterns
                .hex_runs
                .replace_all(&result, ID_PLACEHOLDER)
                .to_string();
        }
        if let Some(numbers) = self.numbers.as_ref() {
            result = numbers.replace_all(&result, NUMBER_PLACEHOLDER).to_string();
        }

        collapse_whitespace(&result)
    }
}

impl Default for TemplateMasker {
    fn default() -> Self {
        Self::new(&FingerprintConfig::default())
    }
}

/// Collapse whitespace runs to single spaces and trim the ends.
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_whitespace = false;

    for c in s.chars() {
        if c.is_whitespace() {
            if !prev_whitespace {
                result.push(' ');
            }
            prev_whitespace = true;
        } else {
            result.push(c);
            prev_whitespace = false;
        }
    }

    result.trim().to_owned()
}
