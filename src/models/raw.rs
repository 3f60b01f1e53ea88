//! Loosely shaped directory objects supplied by a trusted aggregate feed
//!
//! These mirror the upstream JSON verbatim; [`crate::merge::normalize`]
//! turns them into the internal [`super::Channel`]/[`super::Source`] shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::ClearKeyPair;
use crate::errors::AggregatorResult;

/// A whole pre-structured directory: a list of groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDirectory {
    pub groups: Vec<RawGroup>,
}

impl RawDirectory {
    /// Decode the upstream JSON document
    pub fn from_json(text: &str) -> AggregatorResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
    /// Legacy spelling still produced by some feeds; read before `channels`
    #[serde(default)]
    pub chanel: Vec<RawChannel>,
    #[serde(default)]
    pub channels: Vec<RawChannel>,
}

impl RawGroup {
    /// Channels from both list spellings, legacy list first
    pub fn all_channels(&self) -> impl Iterator<Item = &RawChannel> {
        self.chanel.iter().chain(self.channels.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawChannel {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sources: Vec<RawSource>,
    /// Bare locators, either one comma-separated string or a list
    #[serde(default)]
    pub url: Option<RawUrls>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawUrls {
    One(String),
    Many(Vec<String>),
}

impl RawUrls {
    /// Trimmed, non-empty, de-duplicated locators in authored order
    pub fn locators(&self) -> Vec<String> {
        let candidates: Vec<&str> = match self {
            RawUrls::One(joined) => joined.split(',').collect(),
            RawUrls::Many(list) => list.iter().map(String::as_str).collect(),
        };
        let mut out: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let trimmed = candidate.trim();
            if !trimmed.is_empty() && !out.iter().any(|u| u == trimmed) {
                out.push(trimmed.to_string());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSource {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type")]
    pub transport: Option<String>,
    /// Feeds write this as an integer, a float or a numeric string
    #[serde(default, deserialize_with = "deserialize_lenient_kbps")]
    pub bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub drm: Option<RawDrm>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
}

/// Serde helper for bitrate fields of uncertain type
///
/// Numbers and numeric strings are rounded to whole kbps; anything else,
/// including negative or non-finite values, reads as absent instead of
/// failing the whole document.
pub fn deserialize_lenient_kbps<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let kbps = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(kbps
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v.round() as u32))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDrm {
    #[serde(default)]
    pub license_type: Option<String>,
    #[serde(default)]
    pub keys: Vec<ClearKeyPair>,
    #[serde(default)]
    pub license_server: Option<String>,
    #[serde(default, alias = "licenseKeyRaw")]
    pub license_key: Option<String>,
}
