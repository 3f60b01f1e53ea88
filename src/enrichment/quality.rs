//! Bitrate and quality inference from display text and locators

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Quality, Source};

/// Result of bitrate/quality inference for one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualityEstimate {
    pub bitrate_kbps: Option<u32>,
    pub quality: Option<Quality>,
}

impl QualityEstimate {
    pub fn apply_to(self, source: &mut Source) {
        source.bitrate_kbps = self.bitrate_kbps;
        source.quality = self.quality;
    }
}

struct BitratePatterns {
    megabits: Regex,
    kilobits: Regex,
    bare_megabits: Regex,
    query: Regex,
}

fn patterns() -> &'static BitratePatterns {
    static PATTERNS: OnceLock<BitratePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| BitratePatterns {
        megabits: Regex::new(r"(\d+(?:\.\d+)?)\s*m(?:bps|pbs|bs|ps)").expect("valid megabit pattern"),
        kilobits: Regex::new(r"(\d{3,6})\s*k(?:bps|b?s)?").expect("valid kilobit pattern"),
        bare_megabits: Regex::new(r"(\d+(?:\.\d+)?)\s*m(?:[^\p{L}]|$)")
            .expect("valid bare megabit pattern"),
        query: Regex::new(r"[?&](?:bw|br|bitrate|vb|rate)=(\d{3,6})\b")
            .expect("valid query bitrate pattern"),
    })
}

fn megabits_to_kbps(text: &str) -> Option<u32> {
    let mbps: f64 = text.parse().ok()?;
    Some((mbps * 1000.0).round() as u32)
}

fn capture_kbps(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// First numeric bitrate found in free text, in kbps
///
/// Priority: `N Mbps` forms, `N kbps` forms (3-6 digits), bare `N M`,
/// then bitrate-like query parameters. Zero counts as absent.
pub fn extract_bitrate(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let p = patterns();
    let found = p
        .megabits
        .captures(&lower)
        .and_then(|c| megabits_to_kbps(c.get(1)?.as_str()))
        .or_else(|| capture_kbps(&p.kilobits, &lower))
        .or_else(|| {
            p.bare_megabits
                .captures(&lower)
                .and_then(|c| megabits_to_kbps(c.get(1)?.as_str()))
        })
        .or_else(|| capture_kbps(&p.query, &lower));
    found.filter(|kbps| *kbps > 0)
}

/// Bitrate carried by a locator's query string (`bw`, `br`, `bitrate`, `vb`, `rate`)
pub fn extract_query_bitrate(url: &str) -> Option<u32> {
    capture_kbps(&patterns().query, &url.to_lowercase()).filter(|kbps| *kbps > 0)
}

/// Keyword tier for display texts that carry no numeric bitrate
pub fn quality_from_keywords(display: &str) -> Option<Quality> {
    let lower = display.to_lowercase();
    if lower.contains("uhd") || lower.contains("4k") {
        Some(Quality::UHD)
    } else if lower.contains("fhd") || lower.contains("1080") {
        Some(Quality::FHD)
    } else if lower.contains("hd") || lower.contains("720") {
        Some(Quality::HD)
    } else {
        None
    }
}

/// Infer bitrate and quality from the entry's display text, then its locator
pub fn estimate_quality(display: &str, url: &str) -> QualityEstimate {
    match extract_bitrate(display).or_else(|| extract_query_bitrate(url)) {
        Some(kbps) => QualityEstimate {
            bitrate_kbps: Some(kbps),
            quality: Some(Quality::from_kbps(kbps)),
        },
        None => QualityEstimate {
            bitrate_kbps: None,
            quality: quality_from_keywords(display),
        },
    }
}
