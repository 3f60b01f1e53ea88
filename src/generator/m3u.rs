//! Extended-M3U serialization of a merged [`Directory`]
//!
//! Output is produced group by group through [`PlaylistChunks`], so the
//! buffered and streamed renderings share one code path.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexSet;
use std::collections::HashMap;

use crate::config::defaults::DEFAULT_EPG_URLS;
use crate::config::OutputConfig;
use crate::config::{Config, MappingConfig};
use crate::ingestor::assembler::{LICENSE_KEY_PROPERTY, LICENSE_TYPE_PROPERTY};
use crate::models::{Channel, Directory, Group, Source};
use crate::utils::logo::LogoResolver;
use crate::utils::text::strip_decorative_symbols;

const BANNER_RULE: &str = "=================================";
const RADIO_TOKEN: &str = "radio";
const RADIO_SUFFIX: &str = " (Radio)";

/// Output behavior of the generator
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Guide URLs advertised after the built-in ones
    pub epg_urls: Vec<String>,
    pub uppercase_names: bool,
    pub logos: LogoResolver,
    /// Authored group name -> output title
    pub group_names: HashMap<String, String>,
}

impl GeneratorOptions {
    pub fn from_config(output: &OutputConfig, mappings: &MappingConfig) -> Self {
        Self {
            epg_urls: output.epg_urls.clone(),
            uppercase_names: output.uppercase_names,
            logos: LogoResolver::from_config(output),
            group_names: mappings.group_names.clone(),
        }
    }
}

impl From<&Config> for GeneratorOptions {
    fn from(config: &Config) -> Self {
        Self::from_config(&config.output, &config.mappings)
    }
}

/// Serializes a merged [`Directory`] as extended-M3U
///
/// The generation timestamp is fixed when the generator is built.
#[derive(Debug, Clone)]
pub struct M3uGenerator {
    options: GeneratorOptions,
    generated_at: DateTime<Utc>,
}

impl M3uGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self::with_timestamp(options, Utc::now())
    }

    pub fn with_timestamp(options: GeneratorOptions, generated_at: DateTime<Utc>) -> Self {
        Self {
            options,
            generated_at,
        }
    }

    /// Advertise additional guide URLs for this run
    pub fn with_extra_epg_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.epg_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Built-in guides followed by configured ones, de-duplicated in first-seen order
    pub fn epg_urls(&self) -> Vec<String> {
        let urls: IndexSet<String> = DEFAULT_EPG_URLS
            .iter()
            .map(|u| u.to_string())
            .chain(self.options.epg_urls.iter().map(|u| u.trim().to_string()))
            .filter(|u| !u.is_empty())
            .collect();
        urls.into_iter().collect()
    }

    fn header(&self) -> String {
        format!(
            "#EXTM3U url-tvg=\"{}\"\n# Generated: {}\n",
            self.epg_urls().join(","),
            self.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    /// Output title for a group, or `None` when nothing printable remains
    pub fn group_title(&self, group: &Group) -> Option<String> {
        let mapped = self
            .options
            .group_names
            .get(&group.name)
            .map(String::as_str)
            .unwrap_or(&group.name);
        let title = strip_decorative_symbols(mapped);
        (!title.is_empty()).then_some(title)
    }

    fn display_name(&self, channel: &Channel, title: &str) -> String {
        let base = if channel.name.trim().is_empty() {
            channel.id.trim()
        } else {
            channel.name.trim()
        };
        let mut display = base.to_string();
        if title.to_lowercase().contains(RADIO_TOKEN) {
            display.push_str(RADIO_SUFFIX);
        }
        if self.options.uppercase_names {
            display = display.to_uppercase();
        }
        display
    }

    fn render_channel(&self, channel: &Channel, title: &str, group_logo: &mut Option<String>) -> Option<String> {
        let sources: Vec<&Source> = channel
            .sources
            .iter()
            .filter(|s| !s.url.trim().is_empty())
            .collect();
        if sources.is_empty() {
            return None;
        }

        let label = if channel.name.trim().is_empty() {
            &channel.id
        } else {
            &channel.name
        };
        let logo = self.options.logos.resolve(channel.logo.as_deref(), label);
        let display = self.display_name(channel, title);

        let mut out = String::new();
        for source in sources {
            let mut extinf = format!("#EXTINF:-1 tvg-id=\"{}\" group-title=\"{}\"", channel.id, title);
            if let Some(logo) = &logo {
                extinf.push_str(&format!(" tvg-logo=\"{logo}\""));
            }
            if let Some(group_logo) = group_logo.take() {
                extinf.push_str(&format!(" group-logo=\"{group_logo}\""));
            }
            extinf.push_str(&format!(",{display}\n"));
            out.push_str(&extinf);

            if let Some(headers) = &source.headers {
                if let Some(user_agent) = &headers.user_agent {
                    out.push_str(&format!("#EXTVLCOPT:http-user-agent={user_agent}\n"));
                }
                if let Some(referer) = &headers.referer {
                    out.push_str(&format!("#EXTVLCOPT:http-referrer={referer}\n"));
                }
            }

            if let Some(drm) = &source.drm {
                if !drm.license_type.is_empty() {
                    out.push_str(&format!("#KODIPROP:{LICENSE_TYPE_PROPERTY}={}\n", drm.license_type));
                }
                for pair in &drm.keys {
                    out.push_str(&format!("#KODIPROP:{LICENSE_KEY_PROPERTY}={}:{}\n", pair.kid, pair.key));
                }
                if let Some(server) = &drm.license_server {
                    out.push_str(&format!("#KODIPROP:{LICENSE_KEY_PROPERTY}={server}\n"));
                }
                if drm.keys.is_empty() && drm.license_server.is_none() {
                    if let Some(raw) = &drm.license_key_raw {
                        out.push_str(&format!("#KODIPROP:{LICENSE_KEY_PROPERTY}={raw}\n"));
                    }
                }
            }

            out.push_str(source.url.trim());
            out.push('\n');
        }
        out.push('\n');
        Some(out)
    }

    /// Lazy chunk sequence for `directory`
    pub fn chunks<'a>(&'a self, directory: &'a Directory) -> PlaylistChunks<'a> {
        PlaylistChunks {
            generator: self,
            groups: &directory.groups,
            group_index: 0,
            channel_index: 0,
            phase: Phase::Header,
            current: None,
        }
    }

    /// Whole playlist as one string
    pub fn render_to_string(&self, directory: &Directory) -> String {
        self.chunks(directory).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    GroupOpen,
    Channels,
    GroupClose,
    Done,
}

#[derive(Debug)]
struct OpenGroup {
    title: String,
    logo: Option<String>,
}

/// Finite, non-restartable sequence of output chunks
///
/// Yields the header, then per group an opening banner, one chunk per
/// emitted channel and a closing banner. Groups without a printable title
/// or without any emitted channel produce nothing.
pub struct PlaylistChunks<'a> {
    generator: &'a M3uGenerator,
    groups: &'a [Group],
    group_index: usize,
    channel_index: usize,
    phase: Phase,
    current: Option<OpenGroup>,
}

impl PlaylistChunks<'_> {
    fn has_output(&self, group: &Group) -> bool {
        group
            .channels
            .iter()
            .any(|c| c.sources.iter().any(|s| !s.url.trim().is_empty()))
    }
}

impl Iterator for PlaylistChunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let groups = self.groups;
        loop {
            match self.phase {
                Phase::Header => {
                    self.phase = Phase::GroupOpen;
                    return Some(self.generator.header());
                }
                Phase::GroupOpen => {
                    let group = groups.get(self.group_index)?;
                    let title = match self.generator.group_title(group) {
                        Some(title) if self.has_output(group) => title,
                        _ => {
                            self.group_index += 1;
                            continue;
                        }
                    };
                    let logo = self.generator.options.logos.resolve(group.logo.as_deref(), &title);
                    let banner = format!("\n#▽ {BANNER_RULE} {title} {BANNER_RULE}\n\n");
                    self.current = Some(OpenGroup { title, logo });
                    self.channel_index = 0;
                    self.phase = Phase::Channels;
                    return Some(banner);
                }
                Phase::Channels => {
                    let group = &groups[self.group_index];
                    let Some(channel) = group.channels.get(self.channel_index) else {
                        self.phase = Phase::GroupClose;
                        continue;
                    };
                    self.channel_index += 1;
                    let Some(open) = self.current.as_mut() else {
                        self.phase = Phase::GroupClose;
                        continue;
                    };
                    if let Some(chunk) = self.generator.render_channel(channel, &open.title, &mut open.logo) {
                        return Some(chunk);
                    }
                }
                Phase::GroupClose => {
                    self.group_index += 1;
                    self.phase = if self.group_index < groups.len() {
                        Phase::GroupOpen
                    } else {
                        Phase::Done
                    };
                    if let Some(open) = self.current.take() {
                        return Some(format!("#△ {BANNER_RULE} {} {BANNER_RULE}\n", open.title));
                    }
                }
                Phase::Done => return None,
            }
        }
    }
}
