use unicode_normalization::UnicodeNormalization;

// Combining diacritical marks block
const DIACRITICS: std::ops::RangeInclusive<char> = '\u{0300}'..='\u{036f}';

/// Folds text into the form used for every search and filter comparison:
/// lowercased, decomposed, stripped of diacritics and trimmed.
///
/// Lowercasing happens before decomposition so that letters whose lowercase
/// form carries a combining mark (e.g. `İ`) are folded in a single pass.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !DIACRITICS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Same as [`normalize`] for optional values, absent text folds to "".
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}
