//! Locale-aware text normalization.

/// Map Persian (U+06F0..U+06F9) and Arabic-Indic (U+0660..U+0669) digits to ASCII.
pub fn normalize_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => ascii_digit(c as u32 - 0x06F0),
            '\u{0660}'..='\u{0669}' => ascii_digit(c as u32 - 0x0660),
            other => other,
        })
        .collect()
}

fn ascii_digit(offset: u32) -> char {
    char::from_digit(offset, 10).unwrap_or('0')
}

/// Normalize a display string: ASCII digits, Persian letter forms, single spaces.
///
/// Arabic yeh and kaf are folded into their Persian forms so titles from
/// different vendors compare equal downstream.
pub fn normalize_text(input: &str) -> String {
    let folded: String = normalize_digits(input)
        .chars()
        .map(|c| match c {
            '\u{064A}' | '\u{0649}' => '\u{06CC}',
            '\u{0643}' => '\u{06A9}',
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
            other => other,
        })
        .filter(|c| !matches!(c, '\u{200E}' | '\u{200F}' | '\u{FEFF}'))
        .collect();
    collapse_whitespace(&folded)
}

/// Trim and collapse runs of whitespace into one space.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
