//! URL utilities for consistent URL handling
//!
//! This module provides the small set of URL checks and decoding helpers
//! used by the enrichment stage and the generator.

use std::borrow::Cow;
use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Whether the value is an absolute `http`/`https` URL
    ///
    /// # Examples
    ///
    /// ```rust
    /// use m3u_merge::utils::url::UrlUtils;
    ///
    /// assert!(UrlUtils::is_http_url("https://license.example.com/widevine"));
    /// assert!(UrlUtils::is_http_url("HTTP://license.example.com"));
    /// assert!(!UrlUtils::is_http_url("0123abcd:4567ef00"));
    /// assert!(!UrlUtils::is_http_url("rtmp://live.example.com/app"));
    /// ```
    pub fn is_http_url(value: &str) -> bool {
        let trimmed = value.trim();
        let lower = trimmed.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return false;
        }
        Url::parse(trimmed).is_ok()
    }

    /// Percent-decode a component, keeping the raw text when it is not valid UTF-8
    ///
    /// ```rust
    /// use m3u_merge::utils::url::UrlUtils;
    ///
    /// assert_eq!(UrlUtils::decode_component("Mozilla%2F5.0"), "Mozilla/5.0");
    /// assert_eq!(UrlUtils::decode_component("%FF%FE"), "%FF%FE");
    /// ```
    pub fn decode_component(value: &str) -> Cow<'_, str> {
        match urlencoding::decode(value) {
            Ok(decoded) => decoded,
            Err(_) => Cow::Borrowed(value),
        }
    }

    /// Percent-encode a value for use inside a query string
    pub fn encode_component(value: &str) -> Cow<'_, str> {
        urlencoding::encode(value)
    }
}
