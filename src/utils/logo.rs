//! Logo URL resolution for the generated playlist
//!
//! Channels and groups may arrive without artwork. When synthesis is
//! enabled an initials avatar URL is produced instead; authored logos can
//! optionally be routed through an image proxy.
//!
//! # Usage
//!
//! ```rust
//! use m3u_merge::utils::logo::LogoResolver;
//!
//! let resolver = LogoResolver::new(true);
//! assert_eq!(
//!     resolver.resolve(Some("https://img.example.com/vtv1.png"), "VTV1").as_deref(),
//!     Some("https://img.example.com/vtv1.png")
//! );
//! assert!(resolver.resolve(None, "VTV1").unwrap().ends_with("name=VTV1"));
//! ```

use crate::config::defaults::AVATAR_BASE_URL;
use crate::config::{LogoProxyConfig, OutputConfig};
use crate::utils::url::UrlUtils;

/// Resolves the logo emitted for a channel or group
#[derive(Debug, Clone, Default)]
pub struct LogoResolver {
    synthesize: bool,
    proxy: Option<LogoProxyConfig>,
}

impl LogoResolver {
    pub fn new(synthesize: bool) -> Self {
        Self {
            synthesize,
            proxy: None,
        }
    }

    /// Route authored logos through an image proxy
    pub fn with_proxy(mut self, proxy: LogoProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        let resolver = Self::new(config.synthesize_logos);
        match &config.logo_proxy {
            Some(proxy) if !proxy.prefix.trim().is_empty() => resolver.with_proxy(proxy.clone()),
            _ => resolver,
        }
    }

    /// Avatar URL rendering the initials of `label`
    pub fn avatar_url(label: &str) -> String {
        format!("{AVATAR_BASE_URL}{}", UrlUtils::encode_component(label))
    }

    /// Logo to emit, or `None` when there is nothing to show
    pub fn resolve(&self, logo: Option<&str>, fallback_label: &str) -> Option<String> {
        match logo.map(str::trim).filter(|l| !l.is_empty()) {
            Some(authored) => Some(self.proxied(authored)),
            None if self.synthesize && !fallback_label.trim().is_empty() => {
                Some(Self::avatar_url(fallback_label))
            }
            None => None,
        }
    }

    fn proxied(&self, logo: &str) -> String {
        match &self.proxy {
            Some(proxy) if !proxy.bypass.iter().any(|token| logo.contains(token.as_str())) => {
                format!("{}{}", proxy.prefix, UrlUtils::encode_component(logo))
            }
            _ => logo.to_string(),
        }
    }
}
