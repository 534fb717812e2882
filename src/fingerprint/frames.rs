//! Stack-frame canonicalisation.
//!
//! Frames are reduced to `file:function` so that line-number drift between
//! builds cannot fragment fingerprints. The first K frames are kept in the
//! order the trace lists them.

use regex::Regex;
use std::sync::LazyLock;

/// Frame-shape patterns for the trace formats this core understands.
struct FramePatterns {
    /// Python: `File "app/views.py", line 31, in fetch_dog`
    python: Regex,
    /// at-style with a callable: `at fetch (app/views.js:31:7)` or
    /// `at com.example.Foo.bar(Foo.java:123)`
    at_call: Regex,
    /// at-style bare location: `at app/views.js:31:7`
    at_bare: Regex,
    /// Raise line at the trace tail: `LookupError: dog 12 missing`
    raise_line: Regex,
}

fn build_patterns() -> Option<FramePatterns> {
    Some(FramePatterns {
        python: Regex::new(r#"^File "([^"]+)", line \d+(?:, in (\S+))?"#).ok()?,
        at_call: Regex::new(r"^at\s+(?:async\s+)?([^\s(]+)\s*\(([^():]+)(?::\d+){0,2}\)$").ok()?,
        at_bare: Regex::new(r"^at\s+([^\s():]+?)(?::\d+){0,2}$").ok()?,
        raise_line: Regex::new(r"^([A-Za-z_][A-Za-z0-9_.]*)(?:\s*:(?:\s|$)|$)").ok()?,
    })
}

static PATTERNS: LazyLock<Option<FramePatterns>> = LazyLock::new(build_patterns);

/// Extract up to `max_frames` canonical `file:function` frames from a stack
/// trace (0 = unlimited).
///
/// Lines matching no known frame shape (the message, code context, the
/// `Traceback` header) are skipped. A trace with no recognisable frames
/// yields an empty vector and the fingerprint rests on the remaining
/// components.
#[must_use]
pub fn top_frames(stack_trace: &str, max_frames: usize) -> Vec<String> {
    let Some(patterns) = PATTERNS.as_ref() else {
        return Vec::new();
    };

    let mut frames = Vec::new();
    for line in stack_trace.lines() {
        if max_frames > 0 && frames.len() == max_frames {
            break;
        }
        let line = line.trim();

        if let Some(caps) = patterns.python.captures(line) {
            let file = &caps[1];
            match caps.get(2) {
                Some(function) => frames.push(format!("{file}:{}", function.as_str())),
                None => frames.push(file.to_owned()),
            }
        } else if let Some(caps) = patterns.at_call.captures(line) {
            let function = &caps[1];
            let file = &caps[2];
            frames.push(format!("{file}:{function}"));
        } else if let Some(caps) = patterns.at_bare.captures(line) {
            frames.push(caps[1].to_owned());
        }
    }
    frames
}

/// Best-effort error type from the raise line at the tail of a trace.
///
/// Python-style tracebacks end with `SomeError: message`, or a bare
/// `SomeError` when the exception carries no message. Any identifier-shaped
/// name in that position is returned, not just conventionally suffixed ones;
/// `StopIteration` and `SystemExit` count too.
#[must_use]
pub fn derive_error_type(stack_trace: &str) -> Option<String> {
    let patterns = PATTERNS.as_ref()?;
    let last = stack_trace.trim_end().lines().next_back()?.trim();
    let caps = patterns.raise_line.captures(last)?;
    Some(caps[1].to_owned())
}
