//! Hebrew text normalization for embedding input.
//!
//! Prepares verse text for embedding:
//! 1. Drop nikkud and cantillation marks
//! 2. Turn anything outside the Hebrew block (except whitespace) into a space
//! 3. Replace final letter forms with their standard forms
//! 4. Collapse whitespace and trim

use std::ops::RangeInclusive;

/// Nikkud (vowel points) and trope (cantillation) marks.
const NIKKUD_AND_TROPE: RangeInclusive<char> = '\u{0591}'..='\u{05C7}';

/// The Hebrew Unicode block.
const HEBREW_BLOCK: RangeInclusive<char> = '\u{0590}'..='\u{05FF}';

/// Map a final letter form (ך ם ן ף ץ) to its standard form.
fn standard_form(ch: char) -> char {
    match ch {
        'ך' => 'כ',
        'ם' => 'מ',
        'ן' => 'נ',
        'ף' => 'פ',
        'ץ' => 'צ',
        other => other,
    }
}

/// Normalize Hebrew text into the plain form stored next to each verse
/// and sent to the embedding provider.
///
/// Deterministic and idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let plain: String = text
        .chars()
        .filter(|ch| !NIKKUD_AND_TROPE.contains(ch))
        .map(|ch| {
            if HEBREW_BLOCK.contains(&ch) || ch.is_whitespace() {
                standard_form(ch)
            } else {
                ' '
            }
        })
        .collect();

    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}
