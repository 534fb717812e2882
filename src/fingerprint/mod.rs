//! Error identity: message templates, canonical frames, and fingerprints.
//!
//! # Architecture
//!
//! ```text
//! raw message ──► TemplateMasker ──► message template ──┐
//! stack trace ──► top_frames ─────► [file:function] ────┼──► Fingerprinter
//! service, release ─────────────────────────────────────┘         │
//!                                                                 v
//!                                                          64-char hex hash
//! ```
//!
//! The fingerprint groups repeated incidents of one underlying bug: variable
//! data is masked out of the message, line numbers are dropped from frames,
//! and the canonical remainder is hashed. Grouping is a query-time concern;
//! every occurrence is still written as its own row.

mod engine;
mod frames;
mod template;

pub use engine::{compute_fingerprint, ErrorIdentity, Fingerprinter};
pub use frames::{derive_error_type, top_frames};
pub use template::{TemplateMasker, EMAIL_PLACEHOLDER, ID_PLACEHOLDER, NUMBER_PLACEHOLDER};
