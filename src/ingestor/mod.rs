//! Extended-M3U ingestion: text in, one document's [`Directory`] out
//!
//! Parsing never fails. Malformed lines are ignored, dangling entries are
//! discarded and unidentifiable channels are dropped, so an empty or
//! entirely malformed document yields an empty directory.

use std::collections::HashMap;
use tracing::info;

pub mod assembler;
pub mod scanner;

pub use assembler::{AssemblyStats, EntryAssembler};
pub use scanner::{classify_line, looks_like_locator, scan_attributes, Directive, EntryAttributes};

use crate::config::defaults::DEFAULT_FALLBACK_GROUP;
use crate::config::ParserConfig;
use crate::models::{Directory, UnknownTransportPolicy};

/// Per-document parsing behavior
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub fallback_group: String,
    pub unknown_transport: UnknownTransportPolicy,
    pub group_logos: HashMap<String, String>,
    pub group_sort_order: HashMap<String, i64>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            fallback_group: DEFAULT_FALLBACK_GROUP.to_string(),
            unknown_transport: UnknownTransportPolicy::default(),
            group_logos: HashMap::new(),
            group_sort_order: HashMap::new(),
        }
    }
}

impl From<&ParserConfig> for ParseOptions {
    fn from(config: &ParserConfig) -> Self {
        Self {
            fallback_group: config.fallback_group.clone(),
            unknown_transport: config.unknown_transport,
            group_logos: config.group_logos.clone(),
            group_sort_order: config.group_sort_order.clone(),
        }
    }
}

/// Parse one playlist document
pub fn parse_playlist(text: &str, options: &ParseOptions) -> Directory {
    parse_playlist_with_stats(text, options).0
}

/// Parse one playlist document, also returning its assembly counters
pub fn parse_playlist_with_stats(text: &str, options: &ParseOptions) -> (Directory, AssemblyStats) {
    let mut assembler = EntryAssembler::new(options);
    for line in text.split('\n') {
        assembler.feed_line(line);
    }
    let (directory, stats) = assembler.finish();

    info!(
        "Parsed playlist: groups={} channels={} sources={} discarded_entries={} dropped_channels={} ignored_lines={}",
        directory.groups.len(),
        directory.channel_count(),
        directory.source_count(),
        stats.discarded_entries,
        stats.dropped_channels,
        stats.ignored_lines
    );
    (directory, stats)
}
