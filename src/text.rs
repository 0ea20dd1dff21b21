//! # Text Chord Recognition
//!
//! Finds chord names in free-form text, lyric and marker annotations.
//!
//! Recognition has two stages:
//! 1. A permissive pattern picks the first chord-shaped substring out of the
//!    text ("Gm7 riff" -> "Gm7").
//! 2. The candidate must parse as a [`Harmony`]. Candidates that look like
//!    chords but are not (`C_ riff`) are dropped.
//!
//! The pattern accepts more than the chord grammar does. A few inputs
//! therefore resolve differently from how a reader might expect:
//!
//! | Text       | Candidate | Result |
//! |------------|-----------|--------|
//! | `C#`       | `C`       | `C`    |
//! | `C/F#`     | `C/F`     | `C/F`  |
//! | `C(add9)`  | `C`       | `C`    |
//! | `C_maj`    | none      | none   |
//!
//! A trailing `#` only matches when a word character follows it, because the
//! pattern ends on a word boundary.

use crate::harmony::{Harmony, HarmonyError};
use once_cell::sync::Lazy;
use regex::Regex;

static CHORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[^A-G]*([A-G][b#]?(?:maj|min|m|M|dim|aug|sus|add|[-_])?[0-9]*(?:\(.*\))?(?:/[A-G][b#]?)?)\b",
    )
    .expect("chord pattern is a valid regex")
});

/// Outcome of scanning one annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum TextScan {
    /// Nothing in the text looks like a chord.
    NoCandidate,
    /// A chord-shaped substring was found but is not a valid chord symbol.
    Rejected {
        candidate: String,
        error: HarmonyError,
    },
    Chord(Harmony),
}

/// Run both stages over `content`.
pub fn scan_text(content: &str) -> TextScan {
    let text = content.trim();
    if text.is_empty() {
        return TextScan::NoCandidate;
    }

    let candidate = match CHORD_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
    {
        Some(m) => m.as_str(),
        None => return TextScan::NoCandidate,
    };

    match Harmony::parse(candidate) {
        Ok(harmony) => TextScan::Chord(harmony),
        Err(error) => TextScan::Rejected {
            candidate: candidate.to_string(),
            error,
        },
    }
}

/// The chord name found in `content`, if any.
///
/// ```
/// use leadsheet::text::recognize_text;
///
/// assert_eq!(recognize_text("Gm7 riff").as_deref(), Some("Gm7"));
/// assert_eq!(recognize_text("verse 2"), None);
/// ```
pub fn recognize_text(content: &str) -> Option<String> {
    match scan_text(content) {
        TextScan::Chord(harmony) => Some(harmony.text),
        _ => None,
    }
}
