use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub mod defaults;

use crate::errors::{AggregatorError, AggregatorResult};
use crate::models::UnknownTransportPolicy;
use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub mappings: MappingConfig,
}

/// Per-document parsing behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Group label used when an entry has neither a group attribute nor a preceding group hint
    #[serde(default = "default_fallback_group")]
    pub fallback_group: String,
    /// Transport assigned to locators without a recognized manifest extension
    #[serde(default)]
    pub unknown_transport: UnknownTransportPolicy,
    /// Logo attached to groups created by the parser, keyed by group name
    #[serde(default)]
    pub group_logos: HashMap<String, String>,
    /// Sort order attached to groups created by the parser, keyed by group name
    #[serde(default)]
    pub group_sort_order: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Upper bound on sources kept per merged channel (oldest kept first)
    #[serde(default = "default_max_sources_per_channel")]
    pub max_sources_per_channel: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Synthesize an avatar logo for channels and groups without one
    #[serde(default = "default_synthesize_logos")]
    pub synthesize_logos: bool,
    /// Additional guide URLs, advertised after the built-in ones
    #[serde(default)]
    pub epg_urls: Vec<String>,
    /// Upper-case channel display names
    #[serde(default = "default_uppercase_names")]
    pub uppercase_names: bool,
    /// Optional image proxy that authored logos are routed through
    #[serde(default)]
    pub logo_proxy: Option<LogoProxyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoProxyConfig {
    /// Prefix the percent-encoded logo URL is appended to
    pub prefix: String,
    /// Logos whose URL contains any of these tokens are left untouched
    #[serde(default = "default_logo_proxy_bypass")]
    pub bypass: Vec<String>,
}

/// Externally supplied lookup data, treated as opaque tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Raw channel id -> canonical channel id
    #[serde(default)]
    pub channel_ids: HashMap<String, String>,
    /// Canonical channel id -> display name override
    #[serde(default)]
    pub channel_names: HashMap<String, String>,
    /// Authored group name -> output group title
    #[serde(default)]
    pub group_names: HashMap<String, String>,
}

fn default_fallback_group() -> String {
    DEFAULT_FALLBACK_GROUP.to_string()
}

fn default_max_sources_per_channel() -> usize {
    DEFAULT_MAX_SOURCES_PER_CHANNEL
}

fn default_synthesize_logos() -> bool {
    DEFAULT_SYNTHESIZE_LOGOS
}

fn default_uppercase_names() -> bool {
    DEFAULT_UPPERCASE_NAMES
}

fn default_logo_proxy_bypass() -> Vec<String> {
    DEFAULT_LOGO_PROXY_BYPASS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            fallback_group: default_fallback_group(),
            unknown_transport: UnknownTransportPolicy::default(),
            group_logos: HashMap::new(),
            group_sort_order: HashMap::new(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_sources_per_channel: default_max_sources_per_channel(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            synthesize_logos: default_synthesize_logos(),
            epg_urls: Vec::new(),
            uppercase_names: default_uppercase_names(),
            logo_proxy: None,
        }
    }
}

impl Config {
    /// Load from the file named by `CONFIG_FILE`, falling back to `m3u-merge.toml`
    pub fn load() -> AggregatorResult<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from_file(&config_file)
    }

    /// Layer defaults, the TOML file (when present) and `M3U_MERGE_*` environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AggregatorResult<Self> {
        let path = config_file.as_ref();
        if path.exists() {
            info!("Loading configuration from {}", path.display());
        } else {
            debug!(
                "Configuration file {} not found, using defaults and environment",
                path.display()
            );
        }

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        debug!(
            "Configuration resolved: max_sources_per_channel={} synthesize_logos={} extra_epg_urls={} channel_id_mappings={} group_name_mappings={}",
            config.merge.max_sources_per_channel,
            config.output.synthesize_logos,
            config.output.epg_urls.len(),
            config.mappings.channel_ids.len(),
            config.mappings.group_names.len()
        );

        Ok(config)
    }

    /// Write the built-in defaults to `path` as TOML, refusing to overwrite
    pub fn write_default<P: AsRef<Path>>(path: P) -> AggregatorResult<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(AggregatorError::invalid_input(format!(
                "refusing to overwrite existing configuration {}",
                path.display()
            )));
        }
        let contents = toml::to_string_pretty(&Config::default())?;
        std::fs::write(path, contents).map_err(|e| AggregatorError::io(path, e))?;
        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.merge.max_sources_per_channel, 120);
        assert!(config.output.synthesize_logos);
        assert!(config.output.epg_urls.is_empty());
        assert_eq!(config.parser.fallback_group, "Khác");
        assert_eq!(
            config.parser.unknown_transport,
            UnknownTransportPolicy::Unknown
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.merge.max_sources_per_channel, 120);
    }

    #[test]
    fn test_partial_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[merge]
max_sources_per_channel = 8

[parser]
unknown_transport = "hls"

[output]
epg_urls = ["https://example.com/guide.xml"]
synthesize_logos = false

[output.logo_proxy]
prefix = "https://images.example.net/?url="

[mappings.channel_ids]
vtv6hd = "vtvcantho"
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.merge.max_sources_per_channel, 8);
        assert_eq!(config.parser.unknown_transport, UnknownTransportPolicy::Hls);
        assert_eq!(config.parser.fallback_group, "Khác");
        assert!(!config.output.synthesize_logos);
        assert_eq!(config.output.epg_urls, vec!["https://example.com/guide.xml"]);
        let proxy = config.output.logo_proxy.expect("logo proxy configured");
        assert_eq!(proxy.bypass, vec!["imgur".to_string()]);
        assert_eq!(
            config.mappings.channel_ids.get("vtv6hd").map(String::as_str),
            Some("vtvcantho")
        );
    }

    #[test]
    fn test_written_defaults_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m3u-merge.toml");
        Config::write_default(&path).unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.merge.max_sources_per_channel, 120);
        assert_eq!(config.parser.fallback_group, "Khác");
        assert!(config.output.logo_proxy.is_none());

        assert!(Config::write_default(&path).is_err());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[merge]\nmax_sources_per_channel = \"lots\"").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }
}
