//! Directory data model shared by the parser, merge engine and generator
//!
//! A [`Directory`] is an ordered list of [`Group`]s, each holding
//! [`Channel`]s which in turn hold one or more playable [`Source`]s.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumString};

pub mod raw;

/// Delivery protocol of a stream locator
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransportType {
    Hls,
    Dash,
    #[default]
    Unknown,
}

impl TransportType {
    /// Ordering priority when sorting a channel's sources (higher first)
    pub fn weight(self) -> u8 {
        match self {
            TransportType::Hls => 2,
            TransportType::Dash => 1,
            TransportType::Unknown => 0,
        }
    }

    /// Infer the transport from the locator's manifest extension
    pub fn from_url(url: &str, policy: UnknownTransportPolicy) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".m3u8") || lower.contains(".m3u8?") {
            TransportType::Hls
        } else if lower.ends_with(".mpd") || lower.contains(".mpd?") {
            TransportType::Dash
        } else {
            policy.fallback()
        }
    }
}

/// What to call a locator whose transport cannot be inferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UnknownTransportPolicy {
    #[default]
    Unknown,
    Hls,
}

impl UnknownTransportPolicy {
    pub fn fallback(self) -> TransportType {
        match self {
            UnknownTransportPolicy::Unknown => TransportType::Unknown,
            UnknownTransportPolicy::Hls => TransportType::Hls,
        }
    }
}

/// Quality tier inferred from bitrate or display keywords
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Quality {
    SD,
    HD,
    FHD,
    UHD,
}

impl Quality {
    /// Rank used only for ordering sources (SD=1 .. UHD=4)
    pub fn rank(self) -> u8 {
        match self {
            Quality::SD => 1,
            Quality::HD => 2,
            Quality::FHD => 3,
            Quality::UHD => 4,
        }
    }

    /// Tier for a numeric bitrate
    pub fn from_kbps(kbps: u32) -> Self {
        let mbps = f64::from(kbps) / 1000.0;
        if mbps >= 8.0 {
            Quality::UHD
        } else if mbps >= 3.0 {
            Quality::FHD
        } else if mbps >= 1.5 {
            Quality::HD
        } else {
            Quality::SD
        }
    }
}

/// A ClearKey key-id/key pair, both as 32 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClearKeyPair {
    pub kid: String,
    pub key: String,
}

/// License metadata attached to a protected source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrmInfo {
    pub license_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<ClearKeyPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_server: Option<String>,
    /// Opaque license material kept when no structured form could be recovered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key_raw: Option<String>,
}

/// Request headers a player must send for a source
///
/// The four recognized headers get named fields; anything else is passed
/// through under the key it was authored with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamHeaders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl StreamHeaders {
    pub fn is_empty(&self) -> bool {
        self.user_agent.is_none()
            && self.referer.is_none()
            && self.origin.is_none()
            && self.cookie.is_none()
            && self.extra.is_empty()
    }

    /// Overlay `other` on top of `self`; values present in `other` win
    pub fn overlay(&mut self, other: StreamHeaders) {
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
        if other.referer.is_some() {
            self.referer = other.referer;
        }
        if other.origin.is_some() {
            self.origin = other.origin;
        }
        if other.cookie.is_some() {
            self.cookie = other.cookie;
        }
        self.extra.extend(other.extra);
    }
}

/// One playable locator of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub url: String,
    #[serde(rename = "type")]
    pub transport: TransportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drm: Option<DrmInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<StreamHeaders>,
}

impl Source {
    pub fn new<S: Into<String>>(url: S, transport: TransportType) -> Self {
        Self {
            url: url.into(),
            transport,
            bitrate_kbps: None,
            quality: None,
            drm: None,
            headers: None,
        }
    }

    pub fn rank(&self) -> u8 {
        self.quality.map(Quality::rank).unwrap_or(0)
    }

    /// Preferred-first ordering: transport weight, then quality rank, then bitrate
    pub fn preference(a: &Source, b: &Source) -> Ordering {
        b.transport
            .weight()
            .cmp(&a.transport.weight())
            .then_with(|| b.rank().cmp(&a.rank()))
            .then_with(|| b.bitrate_kbps.unwrap_or(0).cmp(&a.bitrate_kbps.unwrap_or(0)))
    }

    /// Human-readable quality label such as `"FHD · 3.5Mbps"`
    pub fn label(&self) -> Option<String> {
        let quality = self.quality?;
        match self.bitrate_kbps {
            Some(_) if quality == Quality::SD => Some("SD".to_string()),
            Some(kbps) => {
                let mbps = (f64::from(kbps) / 100.0).round() / 10.0;
                Some(format!("{quality} · {mbps}Mbps"))
            }
            None => Some(quality.to_string()),
        }
    }
}

/// Stable sort of sources into preferred-first order; ties keep their relative order
pub fn sort_sources(sources: &mut [Source]) {
    sources.sort_by(Source::preference);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Alternate display names and ids seen for this logical channel
    #[serde(default)]
    pub tags: IndexSet<String>,
    pub sources: Vec<Source>,
}

impl Channel {
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo: None,
            tags: IndexSet::new(),
            sources: Vec::new(),
        }
    }

    pub fn sort_sources(&mut self) {
        sort_sources(&mut self.sources);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    pub channels: Vec<Channel>,
}

impl Group {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            logo: None,
            sort_order: None,
            channels: Vec::new(),
        }
    }
}

/// Groups of channels recovered from one document, or merged from many
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Directory {
    pub groups: Vec<Group>,
}

impl Directory {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.groups.iter().map(|g| g.channels.len()).sum()
    }

    pub fn source_count(&self) -> usize {
        self.channels().map(|c| c.sources.len()).sum()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.groups.iter().flat_map(|g| g.channels.iter())
    }

    /// First channel with the given id (case-insensitive)
    pub fn find_channel(&self, id: &str) -> Option<&Channel> {
        self.channels().find(|c| c.id.eq_ignore_ascii_case(id))
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn source(transport: TransportType, kbps: Option<u32>) -> Source {
        let mut s = Source::new(format!("http://example.com/{transport}/{kbps:?}"), transport);
        s.bitrate_kbps = kbps;
        s.quality = kbps.map(Quality::from_kbps);
        s
    }

    #[test]
    fn sources_sort_by_transport_then_quality_then_bitrate() {
        let mut sources = vec![
            source(TransportType::Unknown, Some(500)),
            source(TransportType::Dash, Some(2000)),
            source(TransportType::Hls, Some(3000)),
        ];
        sort_sources(&mut sources);
        let order: Vec<_> = sources.iter().map(|s| (s.transport, s.bitrate_kbps)).collect();
        assert_eq!(
            order,
            vec![
                (TransportType::Hls, Some(3000)),
                (TransportType::Dash, Some(2000)),
                (TransportType::Unknown, Some(500)),
            ]
        );
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let mut a = Source::new("http://a.example.com/live.m3u8", TransportType::Hls);
        a.quality = Some(Quality::HD);
        let mut b = Source::new("http://b.example.com/live.m3u8", TransportType::Hls);
        b.quality = Some(Quality::HD);
        let mut sources = vec![a.clone(), b.clone()];
        sort_sources(&mut sources);
        assert_eq!(sources, vec![a, b]);
    }

    #[rstest]
    #[case(500, Quality::SD)]
    #[case(1499, Quality::SD)]
    #[case(1500, Quality::HD)]
    #[case(3000, Quality::FHD)]
    #[case(7999, Quality::FHD)]
    #[case(8000, Quality::UHD)]
    fn quality_thresholds(#[case] kbps: u32, #[case] expected: Quality) {
        assert_eq!(Quality::from_kbps(kbps), expected);
    }

    #[rstest]
    #[case("http://x.example.com/live/index.m3u8", TransportType::Hls)]
    #[case("http://x.example.com/live/index.M3U8?token=1", TransportType::Hls)]
    #[case("http://x.example.com/live/manifest.mpd", TransportType::Dash)]
    #[case("http://x.example.com/live/manifest.mpd?x=1", TransportType::Dash)]
    #[case("http://x.example.com/live/stream.ts", TransportType::Unknown)]
    fn transport_from_url(#[case] url: &str, #[case] expected: TransportType) {
        assert_eq!(
            TransportType::from_url(url, UnknownTransportPolicy::Unknown),
            expected
        );
    }

    #[test]
    fn unknown_policy_can_default_to_hls() {
        assert_eq!(
            TransportType::from_url("rtmp://x.example.com/app/key", UnknownTransportPolicy::Hls),
            TransportType::Hls
        );
    }

    #[rstest]
    #[case(Some(8500), Some(Quality::UHD), Some("UHD · 8.5Mbps"))]
    #[case(Some(3000), Some(Quality::FHD), Some("FHD · 3Mbps"))]
    #[case(Some(800), Some(Quality::SD), Some("SD"))]
    #[case(None, Some(Quality::HD), Some("HD"))]
    #[case(None, None, None)]
    fn source_labels(
        #[case] kbps: Option<u32>,
        #[case] quality: Option<Quality>,
        #[case] expected: Option<&str>,
    ) {
        let mut s = Source::new("http://x.example.com/a.m3u8", TransportType::Hls);
        s.bitrate_kbps = kbps;
        s.quality = quality;
        assert_eq!(s.label().as_deref(), expected);
    }

    #[test]
    fn header_overlay_prefers_incoming_values() {
        let mut base = StreamHeaders {
            user_agent: Some("pipe-agent".into()),
            referer: Some("https://pipe.example.com/".into()),
            ..Default::default()
        };
        base.overlay(StreamHeaders {
            user_agent: Some("vlc-agent".into()),
            ..Default::default()
        });
        assert_eq!(base.user_agent.as_deref(), Some("vlc-agent"));
        assert_eq!(base.referer.as_deref(), Some("https://pipe.example.com/"));
    }
}
