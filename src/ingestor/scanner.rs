//! Line classification for extended-M3U text
//!
//! Each trimmed line maps to one [`Directive`]. Nothing here keeps state
//! between lines; accumulation is the assembler's job.

use regex::Regex;
use std::sync::OnceLock;

use crate::utils::text::{has_manifest_extension, is_decorative_line};

const EXTM3U: &str = "#EXTM3U";
const EXTINF_PREFIX: &str = "#EXTINF:";
const EXTGRP_PREFIX: &str = "#EXTGRP:";
const EXTVLCOPT_PREFIX: &str = "#EXTVLCOPT:";
const KODIPROP_PREFIX: &str = "#KODIPROP:";

const MIN_LOCATOR_LEN: usize = 8;
const LOCATOR_SCHEMES: &[&str] = &[
    "http://", "https://", "rtmp://", "rtsp://", "rtsps://", "srt://", "udp://",
];

/// What a single line of playlist text means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    /// Empty lines, the file header, plain comments and anything malformed
    Ignored,
    /// `#EXTGRP:<name>`
    GroupHint(&'a str),
    /// `#EXTVLCOPT:key=value`, surrounding quotes removed from the value
    CustomHeader { key: &'a str, value: &'a str },
    /// `#KODIPROP:key=value`, surrounding quotes removed from the value
    AdaptiveProperty { key: &'a str, value: &'a str },
    /// `#EXTINF:` line with its attributes scanned
    EntryMetadata(EntryAttributes),
    /// A stream locator, still carrying any `|header` suffix
    Locator(&'a str),
}

/// Attributes recognized on an `#EXTINF:` line
///
/// Empty attribute values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryAttributes {
    pub tvg_id: Option<String>,
    pub tvg_name: Option<String>,
    pub tvg_logo: Option<String>,
    pub group_title: Option<String>,
    /// Text after the last comma, trimmed
    pub display_name: String,
}

impl EntryAttributes {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key.to_ascii_lowercase().as_str() {
            "tvg-id" => Some(&mut self.tvg_id),
            "tvg-name" => Some(&mut self.tvg_name),
            "tvg-logo" => Some(&mut self.tvg_logo),
            "group-title" => Some(&mut self.group_title),
            _ => None,
        }
    }

    fn assign(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.slot(key) {
            let trimmed = value.trim();
            *slot = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
    }

    fn assign_if_unset(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.slot(key) {
            if slot.is_none() && !value.trim().is_empty() {
                *slot = Some(value.trim().to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Key,
    ValueStart,
    Quoted,
    Bare,
}

/// Scan an `#EXTINF:` line into its attributes and display name
///
/// The display name is everything after the last comma; only the text
/// before that comma is scanned. The duration token is skipped. Quoted
/// values keep their spaces, bare values end at the next space.
pub fn scan_attributes(line: &str) -> EntryAttributes {
    let (attr_part, display) = match line.rfind(',') {
        Some(pos) => (&line[..pos], line[pos + 1..].trim()),
        None => (line, ""),
    };
    let mut attrs = EntryAttributes {
        display_name: display.to_string(),
        ..Default::default()
    };

    let body = attr_part.strip_prefix(EXTINF_PREFIX).unwrap_or(attr_part);
    let body = match body.find(' ') {
        Some(pos) => body[pos..].trim_start_matches(' '),
        None => "",
    };

    let mut state = ScanState::Key;
    let mut key = String::new();
    let mut value = String::new();
    for c in body.chars() {
        match state {
            ScanState::Key => match c {
                '=' => state = ScanState::ValueStart,
                ' ' => key.clear(),
                _ => key.push(c),
            },
            ScanState::ValueStart => match c {
                '"' => state = ScanState::Quoted,
                ' ' => {
                    attrs.assign(&key, "");
                    key.clear();
                    state = ScanState::Key;
                }
                _ => {
                    value.push(c);
                    state = ScanState::Bare;
                }
            },
            ScanState::Quoted => {
                if c == '"' {
                    attrs.assign(&key, &value);
                    key.clear();
                    value.clear();
                    state = ScanState::Key;
                } else {
                    value.push(c);
                }
            }
            ScanState::Bare => {
                if c == ' ' {
                    attrs.assign(&key, &value);
                    key.clear();
                    value.clear();
                    state = ScanState::Key;
                } else {
                    value.push(c);
                }
            }
        }
    }
    if !key.is_empty() && !value.is_empty() {
        attrs.assign_if_unset(&key, &value);
    }
    attrs
}

fn windows_path_pattern() -> &'static Regex {
    static WINDOWS_PATH: OnceLock<Regex> = OnceLock::new();
    WINDOWS_PATH.get_or_init(|| Regex::new(r"^[A-Za-z]:\\").expect("valid windows path pattern"))
}

/// Whether a trimmed line is a stream locator
///
/// The part before any `|` must be at least 8 characters, contain a path
/// separator and either start with a known scheme, `//` or a filesystem
/// path, or name an HLS/DASH manifest. Decorative banner lines are
/// rejected even when they would otherwise qualify.
pub fn looks_like_locator(line: &str) -> bool {
    if line.is_empty() || line.starts_with('#') {
        return false;
    }
    let head = line.split('|').next().unwrap_or_default().trim();
    if head.chars().count() < MIN_LOCATOR_LEN {
        return false;
    }
    if !head.contains('/') && !head.contains('\\') {
        return false;
    }
    let lower = head.to_ascii_lowercase();
    let shaped = head.starts_with("//")
        || LOCATOR_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
        || head.starts_with('/')
        || head.starts_with("./")
        || windows_path_pattern().is_match(head)
        || has_manifest_extension(head);
    shaped && !is_decorative_line(line)
}

fn split_property(body: &str) -> Option<(&str, &str)> {
    let (key, value) = body.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, strip_quotes(value.trim())))
}

fn strip_quotes(value: &str) -> &str {
    if value.len() > 1 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Classify one line; the line is trimmed first
pub fn classify_line(line: &str) -> Directive<'_> {
    let line = line.trim();
    if line.is_empty() || line == EXTM3U {
        return Directive::Ignored;
    }
    if let Some(rest) = line.strip_prefix(EXTGRP_PREFIX) {
        return Directive::GroupHint(rest.trim());
    }
    if let Some(rest) = line.strip_prefix(KODIPROP_PREFIX) {
        return match split_property(rest) {
            Some((key, value)) => Directive::AdaptiveProperty { key, value },
            None => Directive::Ignored,
        };
    }
    if let Some(rest) = line.strip_prefix(EXTVLCOPT_PREFIX) {
        return match split_property(rest) {
            Some((key, value)) => Directive::CustomHeader { key, value },
            None => Directive::Ignored,
        };
    }
    if line.starts_with(EXTINF_PREFIX) {
        return Directive::EntryMetadata(scan_attributes(line));
    }
    if looks_like_locator(line) {
        return Directive::Locator(line);
    }
    Directive::Ignored
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_scan_quoted_attributes() {
        let attrs = scan_attributes(
            r#"#EXTINF:-1 tvg-id="vtv1" tvg-name="VTV1 HD" tvg-logo="https://img.example.com/vtv1.png" group-title="Việt Nam",VTV One"#,
        );
        assert_eq!(attrs.tvg_id.as_deref(), Some("vtv1"));
        assert_eq!(attrs.tvg_name.as_deref(), Some("VTV1 HD"));
        assert_eq!(attrs.tvg_logo.as_deref(), Some("https://img.example.com/vtv1.png"));
        assert_eq!(attrs.group_title.as_deref(), Some("Việt Nam"));
        assert_eq!(attrs.display_name, "VTV One");
    }

    #[test]
    fn test_scan_bare_values_and_trailing_attribute() {
        let attrs = scan_attributes("#EXTINF:0 tvg-id=htv7 group-title=News,HTV7");
        assert_eq!(attrs.tvg_id.as_deref(), Some("htv7"));
        assert_eq!(attrs.group_title.as_deref(), Some("News"));
        assert_eq!(attrs.display_name, "HTV7");
    }

    #[test]
    fn test_display_name_is_after_last_comma() {
        let attrs = scan_attributes(r#"#EXTINF:-1 tvg-name="A, B",Channel, Extra"#);
        assert_eq!(attrs.display_name, "Extra");
    }

    #[test]
    fn test_empty_values_are_absent() {
        let attrs = scan_attributes(r#"#EXTINF:-1 tvg-id="" tvg-logo="",Plain"#);
        assert_eq!(attrs.tvg_id, None);
        assert_eq!(attrs.tvg_logo, None);
        assert_eq!(attrs.display_name, "Plain");
    }

    #[test]
    fn test_no_comma_means_no_display_name() {
        let attrs = scan_attributes(r#"#EXTINF:-1 tvg-id="x""#);
        assert_eq!(attrs.tvg_id.as_deref(), Some("x"));
        assert_eq!(attrs.display_name, "");
    }

    #[rstest]
    #[case("http://cdn.example.com/live/index.m3u8", true)]
    #[case("https://cdn.example.com/a|User-Agent=x", true)]
    #[case("rtmp://live.example.com/app/key", true)]
    #[case("udp://239.0.0.1:1234/", true)]
    #[case("//cdn.example.com/live/stream", true)]
    #[case("/srv/media/channel.ts", true)]
    #[case("./media/channel.ts", true)]
    #[case(r"C:\media\channel.ts", true)]
    #[case("cdn.example.com/live/index.m3u8", true)]
    #[case("cdn.example.com/live/index.m3u8?token=1", true)]
    #[case("// ---------------", false)]
    #[case("// banner text only", false)]
    #[case("==========/", false)]
    #[case("http:/", false)]
    #[case("#EXTINF:-1,x", false)]
    #[case("plain text line", false)]
    #[case("cdn.example.com/live/stream", false)]
    fn test_locator_predicate(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(looks_like_locator(line), expected, "line: {line:?}");
    }

    #[test]
    fn test_classify_directives() {
        assert_eq!(classify_line("  #EXTM3U "), Directive::Ignored);
        assert_eq!(classify_line("#EXTGRP: News "), Directive::GroupHint("News"));
        assert_eq!(
            classify_line(r#"#EXTVLCOPT:http-user-agent="Mozilla/5.0""#),
            Directive::CustomHeader {
                key: "http-user-agent",
                value: "Mozilla/5.0"
            }
        );
        assert_eq!(
            classify_line(r#"#KODIPROP:inputstream.adaptive.license_key="abc:def""#),
            Directive::AdaptiveProperty {
                key: "inputstream.adaptive.license_key",
                value: "abc:def"
            }
        );
        assert_eq!(classify_line("#KODIPROP:=oops"), Directive::Ignored);
        assert_eq!(classify_line("# just a comment"), Directive::Ignored);
        assert!(matches!(
            classify_line("#EXTINF:-1,VTV1"),
            Directive::EntryMetadata(ref attrs) if attrs.display_name == "VTV1"
        ));
        assert_eq!(
            classify_line("http://cdn.example.com/a.m3u8\r"),
            Directive::Locator("http://cdn.example.com/a.m3u8")
        );
    }
}
