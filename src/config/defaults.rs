//! Built-in values used when neither the config file nor the environment sets one

// Environment
pub const DEFAULT_CONFIG_FILE: &str = "m3u-merge.toml";
pub const ENV_PREFIX: &str = "M3U_MERGE_";

// Parser defaults
pub const DEFAULT_FALLBACK_GROUP: &str = "Khác";

// Merge defaults
pub const DEFAULT_MAX_SOURCES_PER_CHANNEL: usize = 120;

// Output defaults
pub const DEFAULT_SYNTHESIZE_LOGOS: bool = true;
pub const DEFAULT_UPPERCASE_NAMES: bool = true;
pub const DEFAULT_LOGO_PROXY_BYPASS: &[&str] = &["imgur"];

/// Guides advertised in every generated header, ahead of configured ones
pub const DEFAULT_EPG_URLS: &[&str] = &[
    "https://vnepg.site/epg.xml",
    "https://lichphatsong.site/schedule/epg.xml",
    "https://cdn.jsdelivr.net/gh/BurningC4/Chinese-IPTV@master/guide.xml",
    "https://epgshare01.online/epgshare01/epg_ripper_ALL_SOURCES1.xml.gz",
];

/// Generated avatar endpoint; the display name is appended percent-encoded
pub const AVATAR_BASE_URL: &str =
    "https://ui-avatars.com/api/?size=256&format=png&rounded=true&background=random&length=2&name=";
