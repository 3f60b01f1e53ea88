//! Per-document assembly of groups, channels and sources
//!
//! Directives that precede a locator are accumulated in a [`PendingEntry`].
//! A locator commits the pending entry into a [`Source`] attached to the
//! channel it resolves to within this document.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::mem;
use tracing::{debug, trace};

use super::scanner::{classify_line, Directive, EntryAttributes};
use super::ParseOptions;
use crate::enrichment::{build_drm, estimate_quality, merge_headers, split_pipe_headers};
use crate::models::{Channel, Directory, Group, Source, TransportType};
use crate::utils::text::is_noise_text;

pub const LICENSE_TYPE_PROPERTY: &str = "inputstream.adaptive.license_type";
pub const LICENSE_KEY_PROPERTY: &str = "inputstream.adaptive.license_key";

const KEY_SEPARATOR: char = '\u{1}';

/// Directives seen since the last committed locator
#[derive(Debug, Default)]
struct PendingEntry {
    metadata: Option<EntryAttributes>,
    header_properties: IndexMap<String, String>,
    adaptive_properties: IndexMap<String, String>,
}

impl PendingEntry {
    fn license_type(&self) -> Option<&str> {
        self.adaptive_properties
            .get(LICENSE_TYPE_PROPERTY)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn license_key(&self) -> Option<&str> {
        self.adaptive_properties
            .get(LICENSE_KEY_PROPERTY)
            .map(String::as_str)
    }
}

/// Counters for one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub lines: usize,
    pub ignored_lines: usize,
    pub sources: usize,
    /// Metadata lines never followed by a locator
    pub discarded_entries: usize,
    /// Channels removed for having no sources or a noise id/name
    pub dropped_channels: usize,
}

/// Builds one document's [`Directory`] line by line
pub struct EntryAssembler<'a> {
    options: &'a ParseOptions,
    groups: IndexMap<String, Group>,
    /// Composite key -> position of the channel within its group, this document only
    channel_index: HashMap<String, usize>,
    last_group: Option<String>,
    pending: PendingEntry,
    stats: AssemblyStats,
}

impl<'a> EntryAssembler<'a> {
    pub fn new(options: &'a ParseOptions) -> Self {
        Self {
            options,
            groups: IndexMap::new(),
            channel_index: HashMap::new(),
            last_group: None,
            pending: PendingEntry::default(),
            stats: AssemblyStats::default(),
        }
    }

    pub fn feed_line(&mut self, line: &str) {
        self.stats.lines += 1;
        match classify_line(line) {
            Directive::Ignored => {
                if !line.trim().is_empty() {
                    trace!("Ignoring line: {}", line.trim());
                    self.stats.ignored_lines += 1;
                }
            }
            Directive::GroupHint(name) => {
                self.last_group = (!name.is_empty()).then(|| name.to_string());
            }
            Directive::CustomHeader { key, value } => {
                self.pending
                    .header_properties
                    .insert(key.to_string(), value.to_string());
            }
            Directive::AdaptiveProperty { key, value } => {
                self.pending
                    .adaptive_properties
                    .insert(key.to_string(), value.to_string());
            }
            Directive::EntryMetadata(attrs) => {
                if let Some(previous) = self.pending.metadata.replace(attrs) {
                    self.discard(&previous);
                }
            }
            Directive::Locator(locator) => self.commit(locator),
        }
    }

    fn discard(&mut self, entry: &EntryAttributes) {
        debug!(
            "Discarding entry without locator: display_name='{}' tvg_id={:?}",
            entry.display_name, entry.tvg_id
        );
        self.stats.discarded_entries += 1;
    }

    fn ensure_group(&mut self, name: &str) -> usize {
        if let Some(index) = self.groups.get_index_of(name) {
            return index;
        }
        let mut group = Group::new(name);
        group.logo = self.options.group_logos.get(name).cloned();
        group.sort_order = self.options.group_sort_order.get(name).copied();
        self.groups.insert_full(name.to_string(), group).0
    }

    fn commit(&mut self, locator: &str) {
        let mut entry = mem::take(&mut self.pending);
        let attrs = entry.metadata.take().unwrap_or_default();

        let (url, inline_headers) = split_pipe_headers(locator);

        let group_name = attrs
            .group_title
            .clone()
            .or_else(|| self.last_group.clone())
            .unwrap_or_else(|| self.options.fallback_group.clone());
        let group_index = self.ensure_group(&group_name);

        let display = [
            Some(attrs.display_name.as_str()),
            attrs.tvg_name.as_deref(),
            attrs.tvg_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or(url.as_str())
        .to_string();

        let identity = match &attrs.tvg_id {
            Some(id) => id.to_lowercase(),
            None => attrs.tvg_name.as_deref().unwrap_or(&display).to_lowercase(),
        };
        let key = format!("{group_name}{KEY_SEPARATOR}{identity}");

        let group = &mut self.groups[group_index];
        let channel_index = match self.channel_index.get(&key) {
            Some(&channel_index) => {
                let channel = &mut group.channels[channel_index];
                if display != channel.name && display != channel.id {
                    channel.tags.insert(display.clone());
                }
                if channel.logo.is_none() {
                    channel.logo = attrs.tvg_logo.clone();
                }
                channel_index
            }
            None => {
                let id = match (&attrs.tvg_id, &attrs.tvg_name) {
                    (Some(id), _) => id.clone(),
                    (None, Some(name)) => name
                        .to_lowercase()
                        .chars()
                        .filter(|c| !c.is_whitespace())
                        .collect(),
                    (None, None) => display.clone(),
                };
                let name = attrs.tvg_name.clone().unwrap_or_else(|| display.clone());
                let mut channel = Channel::new(id, name);
                channel.logo = attrs.tvg_logo.clone();
                group.channels.push(channel);
                let channel_index = group.channels.len() - 1;
                self.channel_index.insert(key, channel_index);
                channel_index
            }
        };

        let transport = match entry.license_type() {
            Some(license_type) if license_type.to_lowercase().contains("apple.fps") => {
                TransportType::Hls
            }
            Some(_) => TransportType::Dash,
            None => TransportType::from_url(&url, self.options.unknown_transport),
        };

        let mut source = Source::new(url, transport);
        estimate_quality(&display, &source.url).apply_to(&mut source);
        source.drm = build_drm(entry.license_type(), entry.license_key());
        source.headers = merge_headers(inline_headers, &entry.header_properties);

        trace!(
            "Committed source: group='{}' channel_key='{}' transport={} url={}",
            group_name,
            identity,
            source.transport,
            source.url
        );
        group.channels[channel_index].sources.push(source);
        self.stats.sources += 1;
    }

    /// Close the document: discard any dangling entry, filter and order the result
    pub fn finish(mut self) -> (Directory, AssemblyStats) {
        if let Some(dangling) = self.pending.metadata.take() {
            self.discard(&dangling);
        }

        let mut groups = Vec::with_capacity(self.groups.len());
        for (position, (_, mut group)) in self.groups.into_iter().enumerate() {
            if group.sort_order.is_none() {
                group.sort_order = Some(position as i64 + 1);
            }
            let before = group.channels.len();
            group.channels.retain(|channel| {
                let keep = !channel.sources.is_empty()
                    && !is_noise_text(&channel.id)
                    && !is_noise_text(&channel.name);
                if !keep {
                    debug!(
                        "Dropping channel: group='{}' id='{}' name='{}' sources={}",
                        group.name,
                        channel.id,
                        channel.name,
                        channel.sources.len()
                    );
                }
                keep
            });
            self.stats.dropped_channels += before - group.channels.len();
            for channel in &mut group.channels {
                channel.sort_sources();
            }
            if !group.channels.is_empty() {
                groups.push(group);
            }
        }

        (Directory::new(groups), self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(text: &str) -> (Directory, AssemblyStats) {
        let options = ParseOptions::default();
        let mut assembler = EntryAssembler::new(&options);
        for line in text.lines() {
            assembler.feed_line(line);
        }
        assembler.finish()
    }

    #[test]
    fn test_same_key_collects_sources_and_tags() {
        let (dir, stats) = assemble(
            r#"#EXTM3U
#EXTINF:-1 tvg-id="vtv1" group-title="VN",VTV1 HD
http://a.example.com/vtv1.m3u8
#EXTINF:-1 tvg-id="VTV1" group-title="VN" tvg-logo="https://img.example.com/vtv1.png",VTV1 Backup
http://b.example.com/vtv1.m3u8
"#,
        );
        assert_eq!(stats.sources, 2);
        let group = dir.group("VN").expect("group VN");
        assert_eq!(group.channels.len(), 1);
        let channel = &group.channels[0];
        assert_eq!(channel.id, "vtv1");
        assert_eq!(channel.name, "VTV1 HD");
        assert_eq!(channel.logo.as_deref(), Some("https://img.example.com/vtv1.png"));
        assert!(channel.tags.contains("VTV1 Backup"));
        assert_eq!(channel.sources.len(), 2);
    }

    #[test]
    fn test_identity_fallbacks() {
        let (dir, _) = assemble(
            r#"#EXTINF:-1 tvg-name="Thể Thao TV",Sport
http://a.example.com/sport.m3u8
#EXTINF:-1,Just Display
http://a.example.com/display.m3u8
http://a.example.com/bare.m3u8
"#,
        );
        let group = dir.group("Khác").expect("fallback group");
        let ids: Vec<_> = group.channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["thểthaotv", "Just Display", "http://a.example.com/bare.m3u8"]
        );
        assert_eq!(group.channels[0].name, "Thể Thao TV");
    }

    #[test]
    fn test_dangling_entries_are_discarded() {
        let (dir, stats) = assemble(
            r#"#EXTINF:-1 tvg-id="lost",Lost
#EXTINF:-1 tvg-id="kept",Kept
http://a.example.com/kept.m3u8
#EXTINF:-1 tvg-id="tail",Tail
"#,
        );
        assert_eq!(stats.discarded_entries, 2);
        assert_eq!(dir.channel_count(), 1);
        assert!(dir.find_channel("kept").is_some());
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_discarded_entry_is_logged() {
        let (dir, _) = assemble("#EXTINF:-1 tvg-id=\"orphan\",Orphan\n");
        assert!(dir.is_empty());
        assert!(logs_contain("Discarding entry without locator"));
    }

    #[test]
    fn test_banner_between_entry_and_locator_is_skipped() {
        let (dir, _) = assemble(
            r#"#EXTINF:-1 tvg-id="vtv3",VTV3
// ----------------------
http://a.example.com/vtv3.m3u8
"#,
        );
        let channel = dir.find_channel("vtv3").expect("vtv3");
        assert_eq!(channel.sources[0].url, "http://a.example.com/vtv3.m3u8");
    }

    #[test]
    fn test_properties_apply_to_next_entry_only() {
        let (dir, _) = assemble(
            r#"#EXTINF:-1 tvg-id="kplus",K+
#KODIPROP:inputstream.adaptive.license_type=clearkey
#KODIPROP:inputstream.adaptive.license_key=6b657969640000000000000000000000:6b657976616c00000000000000000000
#EXTVLCOPT:http-user-agent=Player/2.0
https://cdn.example.com/kplus/manifest.mpd|Referer=https://site.example.com/
#EXTINF:-1 tvg-id="free",Free
https://cdn.example.com/free/index.m3u8
"#,
        );
        let kplus = &dir.find_channel("kplus").expect("kplus").sources[0];
        assert_eq!(kplus.transport, TransportType::Dash);
        assert_eq!(kplus.url, "https://cdn.example.com/kplus/manifest.mpd");
        let drm = kplus.drm.as_ref().expect("drm");
        assert_eq!(drm.keys.len(), 1);
        let headers = kplus.headers.as_ref().expect("headers");
        assert_eq!(headers.user_agent.as_deref(), Some("Player/2.0"));
        assert_eq!(headers.referer.as_deref(), Some("https://site.example.com/"));

        let free = &dir.find_channel("free").expect("free").sources[0];
        assert_eq!(free.drm, None);
        assert_eq!(free.headers, None);
    }

    #[test]
    fn test_fairplay_license_means_hls() {
        let (dir, _) = assemble(
            r#"#EXTINF:-1 tvg-id="fp",FP
#KODIPROP:inputstream.adaptive.license_type=com.apple.fps
https://cdn.example.com/fp/stream
"#,
        );
        assert_eq!(
            dir.find_channel("fp").unwrap().sources[0].transport,
            TransportType::Hls
        );
    }

    #[test]
    fn test_group_hint_and_sort_order() {
        let (dir, _) = assemble(
            r#"#EXTINF:-1 tvg-id="a" group-title="Sport",A
http://a.example.com/a.m3u8
#EXTGRP:News
#EXTINF:-1 tvg-id="b",B
http://a.example.com/b.m3u8
"#,
        );
        let names: Vec<_> = dir.groups.iter().map(|g| (g.name.as_str(), g.sort_order)).collect();
        assert_eq!(names, vec![("Sport", Some(1)), ("News", Some(2))]);
    }

    #[test]
    fn test_noise_channels_are_dropped() {
        let (dir, stats) = assemble(
            r#"#EXTINF:-1 tvg-id="==========",==========
http://a.example.com/noise.m3u8
"#,
        );
        assert!(dir.is_empty());
        assert_eq!(stats.dropped_channels, 1);
    }
}
