//! Normalization of incoming channels before they reach the merge index
//!
//! Parsed playlists only pass through the rename tables. Pre-structured
//! directories are additionally slugified and converted from their loose
//! JSON shape into [`Channel`]/[`Source`] records.

use tracing::debug;

use crate::config::MappingConfig;
use crate::enrichment::{build_drm, normalize_clearkey_pair, split_pipe_headers};
use crate::models::raw::{RawChannel, RawDirectory, RawDrm, RawSource};
use crate::models::{
    Channel, ClearKeyPair, Directory, DrmInfo, Group, Quality, Source, StreamHeaders,
    TransportType, UnknownTransportPolicy,
};
use crate::utils::text::slugify_id;

/// Channel id after the rename table, if the table knows it
///
/// Looked up as authored first, then lower-cased.
pub fn mapped_channel_id(raw: &str, mappings: &MappingConfig) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    mappings
        .channel_ids
        .get(trimmed)
        .or_else(|| mappings.channel_ids.get(&trimmed.to_lowercase()))
        .cloned()
}

fn mapped_channel_name(id: &str, mappings: &MappingConfig) -> Option<String> {
    mappings
        .channel_names
        .get(id)
        .or_else(|| mappings.channel_names.get(&id.to_lowercase()))
        .cloned()
}

/// Apply the id and name tables to a parsed channel
pub fn normalize_parsed_channel(mut channel: Channel, mappings: &MappingConfig) -> Channel {
    if let Some(id) = mapped_channel_id(&channel.id, mappings) {
        debug!("Renamed channel id: from='{}' to='{}'", channel.id, id);
        channel.id = id;
    }
    if let Some(name) = mapped_channel_name(&channel.id, mappings) {
        channel.name = name;
    }
    channel
}

/// Convert a pre-structured directory into the internal shape
///
/// Groups with a blank name are filed under `fallback_group`.
pub fn normalize_raw_directory(
    raw: RawDirectory,
    mappings: &MappingConfig,
    policy: UnknownTransportPolicy,
    fallback_group: &str,
) -> Directory {
    let groups = raw
        .groups
        .iter()
        .map(|raw_group| {
            let name = match raw_group.name.trim() {
                "" => {
                    debug!("Raw group without a name filed under '{}'", fallback_group);
                    fallback_group
                }
                name => name,
            };
            let mut group = Group::new(name);
            group.logo = raw_group
                .logo
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            group.sort_order = raw_group.sort_order;
            group.channels = raw_group
                .all_channels()
                .map(|c| normalize_raw_channel(c, mappings, policy))
                .collect();
            group
        })
        .collect();
    Directory::new(groups)
}

fn normalize_raw_channel(
    raw: &RawChannel,
    mappings: &MappingConfig,
    policy: UnknownTransportPolicy,
) -> Channel {
    let raw_id = [raw.id.as_deref(), raw.name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    let id = mapped_channel_id(raw_id, mappings).unwrap_or_else(|| slugify_id(raw_id));
    let name = mapped_channel_name(&id, mappings)
        .or_else(|| raw.name.as_deref().map(|n| n.trim().to_string()))
        .unwrap_or_default();

    let mut channel = Channel::new(id, name);
    channel.logo = raw
        .logo
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    channel.tags = raw
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    channel.sources = raw
        .sources
        .iter()
        .filter_map(|s| normalize_raw_source(s, policy))
        .collect();
    if let Some(urls) = &raw.url {
        for locator in urls.locators() {
            let (url, headers) = split_pipe_headers(&locator);
            if url.is_empty() || channel.sources.iter().any(|s| s.url == url) {
                continue;
            }
            let transport = TransportType::from_url(&url, policy);
            let mut source = Source::new(url, transport);
            source.headers = (!headers.is_empty()).then_some(headers);
            channel.sources.push(source);
        }
    }
    channel
}

fn normalize_raw_source(raw: &RawSource, policy: UnknownTransportPolicy) -> Option<Source> {
    let url = raw.url.trim();
    if url.is_empty() {
        return None;
    }
    let transport = raw
        .transport
        .as_deref()
        .and_then(|t| t.trim().parse::<TransportType>().ok())
        .unwrap_or_else(|| TransportType::from_url(url, policy));

    let mut source = Source::new(url, transport);
    source.bitrate_kbps = raw.bitrate_kbps.filter(|kbps| *kbps > 0);
    source.quality = raw
        .quality
        .as_deref()
        .and_then(|q| q.trim().parse::<Quality>().ok())
        .or_else(|| source.bitrate_kbps.map(Quality::from_kbps));
    source.drm = raw.drm.as_ref().and_then(normalize_raw_drm);
    source.headers = raw.headers.as_ref().and_then(|map| {
        let headers = StreamHeaders::from_pairs(map.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        (!headers.is_empty()).then_some(headers)
    });
    Some(source)
}

fn normalize_raw_drm(raw: &RawDrm) -> Option<DrmInfo> {
    let keys: Vec<ClearKeyPair> = raw
        .keys
        .iter()
        .filter(|pair| !pair.kid.trim().is_empty() && !pair.key.trim().is_empty())
        .map(|pair| normalize_clearkey_pair(&pair.kid, &pair.key))
        .collect();
    let license_type = raw
        .license_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| (!keys.is_empty()).then_some("clearkey"))?;

    let mut drm = build_drm(Some(license_type), raw.license_key.as_deref())?;
    if !keys.is_empty() {
        drm.keys = keys;
        drm.license_key_raw = None;
    }
    if let Some(server) = raw
        .license_server
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        drm.license_server = Some(server.to_string());
    }
    Some(drm)
}
