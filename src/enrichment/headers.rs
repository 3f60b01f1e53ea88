//! Request headers recovered from pipe suffixes and custom-property lines
//!
//! Players accept headers in two spellings: appended to the locator as
//! `url|User-Agent=...&Referer=...`, or as `#EXTVLCOPT:http-user-agent=...`
//! lines ahead of it. Both end up in one [`StreamHeaders`].

use indexmap::IndexMap;

use crate::models::StreamHeaders;
use crate::utils::url::UrlUtils;

/// The header names that get a dedicated field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKey {
    UserAgent,
    Referer,
    Origin,
    Cookie,
}

impl HeaderKey {
    /// Recognize a header name in any of its common spellings
    ///
    /// `User-Agent`, `useragent`, `userAgent`, `http-user-agent` and
    /// `http_user_agent` all map to [`HeaderKey::UserAgent`].
    pub fn canonicalize(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        let stripped = lower.strip_prefix("http-").unwrap_or(&lower);
        let folded: String = stripped.chars().filter(|c| *c != '-' && *c != '_').collect();
        match folded.as_str() {
            "useragent" => Some(HeaderKey::UserAgent),
            "referer" | "referrer" => Some(HeaderKey::Referer),
            "origin" => Some(HeaderKey::Origin),
            "cookie" => Some(HeaderKey::Cookie),
            _ => None,
        }
    }
}

impl StreamHeaders {
    /// Set a header by authored name; unrecognized names are kept verbatim
    pub fn insert(&mut self, name: &str, value: String) {
        match HeaderKey::canonicalize(name) {
            Some(HeaderKey::UserAgent) => self.user_agent = Some(value),
            Some(HeaderKey::Referer) => self.referer = Some(value),
            Some(HeaderKey::Origin) => self.origin = Some(value),
            Some(HeaderKey::Cookie) => self.cookie = Some(value),
            None => {
                self.extra.insert(name.trim().to_string(), value);
            }
        }
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut headers = StreamHeaders::default();
        for (name, value) in pairs {
            headers.insert(name, value.to_string());
        }
        headers
    }
}

/// Split `url|k=v&k2=v2` into the bare locator and its inline headers
///
/// Values are percent-decoded when they decode cleanly. Segments without
/// `=` or with an empty name are dropped.
pub fn split_pipe_headers(locator: &str) -> (String, StreamHeaders) {
    let Some((base, tail)) = locator.split_once('|') else {
        return (locator.trim().to_string(), StreamHeaders::default());
    };

    let mut headers = StreamHeaders::default();
    for segment in tail.split('&') {
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        headers.insert(name, UrlUtils::decode_component(value).into_owned());
    }
    (base.trim().to_string(), headers)
}

/// Combine inline headers with custom-property headers; properties win per key
pub fn merge_headers(
    inline: StreamHeaders,
    properties: &IndexMap<String, String>,
) -> Option<StreamHeaders> {
    let mut merged = inline;
    merged.overlay(StreamHeaders::from_pairs(
        properties.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    ));
    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}
