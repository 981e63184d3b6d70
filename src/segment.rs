//! Splitting request text around inline pause directives.
//!
//! A pause directive has the form `<p=N>` where `N` is a duration in
//! milliseconds written with ASCII digits. Matching is case-insensitive and
//! tolerates whitespace around `=` and the digits, so `<P = 500 >` is
//! recognised. Anything else that looks like a tag is left in the text
//! untouched.

use once_cell::sync::Lazy;
use regex::Regex;

static PAUSE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p\s*=\s*([0-9]+)\s*>").expect("valid regex"));

/// One unit of synthesis work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text to be spoken, already trimmed.
    Text(String),
    /// Silence lasting the given number of milliseconds (always > 0).
    Pause(u64),
}

/// Split `text` into an ordered list of speech and silence segments.
///
/// Zero-length pauses are dropped. If nothing is produced the result is a
/// single (possibly empty) `Text` holding the trimmed input, never an empty
/// list.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last_end = 0;

    for caps in PAUSE_TAG_RE.captures_iter(text) {
        let Some(tag) = caps.get(0) else { continue };
        push_text(&mut segments, &text[last_end..tag.start()]);

        // Digits that overflow u64 saturate; the assembler clamps long pauses.
        let millis = caps[1].parse::<u64>().unwrap_or(u64::MAX);
        if millis > 0 {
            segments.push(Segment::Pause(millis));
        }
        last_end = tag.end();
    }
    push_text(&mut segments, &text[last_end..]);

    if segments.is_empty() {
        segments.push(Segment::Text(text.trim().to_string()));
    }
    segments
}

fn push_text(segments: &mut Vec<Segment>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(Segment::Text(trimmed.to_string()));
    }
}
