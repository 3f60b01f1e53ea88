//! Text predicates and normalizers for loosely authored playlists

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

const SLUG_MAX_CHARS: usize = 64;

fn noise_pattern() -> &'static Regex {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    NOISE.get_or_init(|| Regex::new(r"^[/\\#\-= _|.]{6,}$").expect("valid noise pattern"))
}

fn domain_pattern() -> &'static Regex {
    static DOMAIN: OnceLock<Regex> = OnceLock::new();
    DOMAIN.get_or_init(|| Regex::new(r"(?i)[a-z0-9-]+\.[a-z]{2,}").expect("valid domain pattern"))
}

fn manifest_pattern() -> &'static Regex {
    static MANIFEST: OnceLock<Regex> = OnceLock::new();
    MANIFEST.get_or_init(|| Regex::new(r"(?i)\.(m3u8|mpd)(\?|$)").expect("valid manifest pattern"))
}

/// Whether the text ends in (or carries before a query) a known manifest extension
pub fn has_manifest_extension(text: &str) -> bool {
    manifest_pattern().is_match(text)
}

/// Separator runs such as `"=========="` or `"// ----- //"`
pub fn is_noise_text(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && noise_pattern().is_match(trimmed)
}

/// Banner lines that only look like locators
///
/// Empty text, separator runs, and `//`-prefixed lines with neither a
/// domain-like token nor a manifest extension all count.
pub fn is_decorative_line(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || noise_pattern().is_match(trimmed) {
        return true;
    }
    trimmed.starts_with("//")
        && !(domain_pattern().is_match(trimmed) || manifest_pattern().is_match(trimmed))
}

/// Comparison key: trimmed and lower-cased
pub fn fold_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Lower-case ASCII slug with diacritics removed, at most 64 characters
///
/// ```rust
/// use m3u_merge::utils::slugify_id;
///
/// assert_eq!(slugify_id("Thể Thao TV"), "thethaotv");
/// assert_eq!(slugify_id("VTV-1 HD"), "vtv1hd");
/// ```
pub fn slugify_id(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(SLUG_MAX_CHARS)
        .collect()
}

fn is_pictograph(c: char) -> bool {
    matches!(
        c as u32,
        0x2600..=0x27BF | 0xE000..=0xF8FF | 0xFE00..=0xFE0F | 0x200D | 0x1F000..=0x1FAFF
    )
}

/// Group title cleanup: drop emoji/pictographs, then trim `|` and whitespace at the edges
///
/// ```rust
/// use m3u_merge::utils::text::strip_decorative_symbols;
///
/// assert_eq!(strip_decorative_symbols("🇰🇷| Hàn Quốc"), "Hàn Quốc");
/// assert_eq!(strip_decorative_symbols("⚽| Thể thao quốc tế"), "Thể thao quốc tế");
/// ```
pub fn strip_decorative_symbols(title: &str) -> String {
    let without_symbols: String = title.chars().filter(|c| !is_pictograph(*c)).collect();
    without_symbols
        .trim()
        .trim_matches('|')
        .trim()
        .to_string()
}
