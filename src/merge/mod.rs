//! Cross-document identity resolution and merge
//!
//! Documents are folded in arrival order into one set of representative
//! channels. A candidate is matched through the [`IdentityIndex`] in two
//! tiers: exact id/tag hits first, then a loose alias probe over every
//! representative's ids, names and tags. A loose hit only merges when the
//! gate confirms it (same id, or the candidate's id or name is already one
//! of the representative's tags); otherwise the candidate stands alone.
//!
//! The engine is single-threaded: lookup-then-insert must not interleave.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

pub mod index;
pub mod normalize;

pub use index::{IdentityIndex, RepId};

use crate::config::defaults::{DEFAULT_FALLBACK_GROUP, DEFAULT_MAX_SOURCES_PER_CHANNEL};
use crate::config::{Config, MappingConfig};
use crate::models::raw::RawDirectory;
use crate::models::{Channel, Directory, Group, Source, UnknownTransportPolicy};
use crate::utils::text::fold_key;
use normalize::{normalize_parsed_channel, normalize_raw_directory};

/// One input to the merge, in the order it should be consumed
#[derive(Debug, Clone)]
pub enum MergeInput {
    /// A directory produced by the playlist parser
    Playlist(Directory),
    /// A pre-structured directory from a trusted aggregate feed
    Raw(RawDirectory),
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Sources kept per representative; the oldest are kept
    pub max_sources_per_channel: usize,
    pub mappings: MappingConfig,
    /// Used when normalizing pre-structured sources without a usable type
    pub unknown_transport: UnknownTransportPolicy,
    /// Group for pre-structured groups that arrive without a name
    pub fallback_group: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            max_sources_per_channel: DEFAULT_MAX_SOURCES_PER_CHANNEL,
            mappings: MappingConfig::default(),
            unknown_transport: UnknownTransportPolicy::default(),
            fallback_group: DEFAULT_FALLBACK_GROUP.to_string(),
        }
    }
}

impl From<&Config> for MergeOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_sources_per_channel: config.merge.max_sources_per_channel,
            mappings: config.mappings.clone(),
            unknown_transport: config.parser.unknown_transport,
            fallback_group: config.parser.fallback_group.clone(),
        }
    }
}

/// Counters describing how candidates were resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Candidates resolved by id or tag against registered ids
    pub exact_hits: usize,
    /// Candidates resolved only through the alias probe
    pub alias_hits: usize,
    /// Lookups that had to fall back to the alias probe
    pub fallback_probes: usize,
    /// Matches refused by the merge gate
    pub gate_rejections: usize,
    /// Representatives created
    pub created: usize,
    /// Candidates folded into an existing representative
    pub merged: usize,
    /// Candidates skipped for having no id
    pub skipped: usize,
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exact_hits={} alias_hits={} fallback_probes={} gate_rejections={} created={} merged={} skipped={}",
            self.exact_hits,
            self.alias_hits,
            self.fallback_probes,
            self.gate_rejections,
            self.created,
            self.merged,
            self.skipped
        )
    }
}

#[derive(Debug)]
struct MergedGroup {
    shell: Group,
    members: Vec<RepId>,
}

/// Folds documents into representative channels
pub struct MergeEngine {
    options: MergeOptions,
    index: IdentityIndex,
    reps: Vec<Channel>,
    groups: IndexMap<String, MergedGroup>,
    stats: MergeStats,
}

impl MergeEngine {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            index: IdentityIndex::new(),
            reps: Vec::new(),
            groups: IndexMap::new(),
            stats: MergeStats::default(),
        }
    }

    pub fn add(&mut self, input: MergeInput) {
        match input {
            MergeInput::Playlist(directory) => self.add_playlist(directory),
            MergeInput::Raw(raw) => self.add_raw(raw),
        }
    }

    /// Fold a parsed playlist directory
    pub fn add_playlist(&mut self, directory: Directory) {
        for group in directory.groups {
            let Group {
                name,
                logo,
                sort_order,
                channels,
            } = group;
            let slot = self.ensure_group(&name, logo, sort_order);
            for channel in channels {
                let channel = normalize_parsed_channel(channel, &self.options.mappings);
                self.absorb(slot, channel);
            }
        }
    }

    /// Normalize and fold a pre-structured directory
    pub fn add_raw(&mut self, raw: RawDirectory) {
        let directory = normalize_raw_directory(
            raw,
            &self.options.mappings,
            self.options.unknown_transport,
            &self.options.fallback_group,
        );
        for group in directory.groups {
            let slot = self.ensure_group(&group.name, group.logo, group.sort_order);
            for channel in group.channels {
                self.absorb(slot, channel);
            }
        }
    }

    fn ensure_group(&mut self, name: &str, logo: Option<String>, sort_order: Option<i64>) -> usize {
        let entry = self.groups.entry(name.to_string());
        let slot = entry.index();
        let merged = entry.or_insert_with(|| MergedGroup {
            shell: Group::new(name),
            members: Vec::new(),
        });
        if merged.shell.logo.is_none() {
            merged.shell.logo = logo;
        }
        if merged.shell.sort_order.is_none() {
            merged.shell.sort_order = sort_order;
        }
        slot
    }

    fn absorb(&mut self, group_slot: usize, candidate: Channel) {
        let id = fold_key(&candidate.id);
        if id.is_empty() {
            debug!(
                "Skipping channel without id: name='{}' sources={}",
                candidate.name,
                candidate.sources.len()
            );
            self.stats.skipped += 1;
            return;
        }
        let name = fold_key(&candidate.name);
        let tags: Vec<String> = candidate
            .tags
            .iter()
            .map(|t| fold_key(t))
            .filter(|t| !t.is_empty())
            .collect();

        let found = match self.index.exact(&id, tags.iter().map(String::as_str)) {
            Some(rep) => {
                self.stats.exact_hits += 1;
                Some(rep)
            }
            None => {
                self.stats.fallback_probes += 1;
                let probe = std::iter::once(id.as_str())
                    .chain(std::iter::once(name.as_str()))
                    .chain(tags.iter().map(String::as_str));
                let hit = self.index.alias(probe);
                if hit.is_some() {
                    self.stats.alias_hits += 1;
                }
                hit
            }
        };

        let Some(rep) = found else {
            self.create(group_slot, &id, candidate);
            return;
        };

        if self.passes_gate(rep, &id, &name) {
            self.merge_into(rep, candidate);
            return;
        }

        self.stats.gate_rejections += 1;
        debug!(
            "Merge gate rejected candidate: id='{}' name='{}' matched_rep='{}'",
            candidate.id, candidate.name, self.reps[rep].id
        );
        match self.index.primary(&id) {
            Some(seed) => self.merge_into(seed, candidate),
            None => self.create(group_slot, &id, candidate),
        }
    }

    fn passes_gate(&self, rep: RepId, id: &str, name: &str) -> bool {
        let representative = &self.reps[rep];
        if fold_key(&representative.id) == id {
            return true;
        }
        let rep_tags: HashSet<String> = representative.tags.iter().map(|t| fold_key(t)).collect();
        (!name.is_empty() && rep_tags.contains(name)) || rep_tags.contains(id)
    }

    fn create(&mut self, group_slot: usize, id: &str, candidate: Channel) {
        let rep_id = self.reps.len();
        let mut rep = Channel::new(id, candidate.name.trim());
        rep.logo = candidate
            .logo
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        rep.tags = candidate
            .tags
            .iter()
            .map(String::as_str)
            .chain([candidate.id.as_str(), candidate.name.as_str()])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        append_sources(&mut rep.sources, candidate.sources, self.options.max_sources_per_channel);

        self.index.register_primary(id, rep_id);
        self.index.register_aliases(
            std::iter::once(rep.id.as_str())
                .chain(std::iter::once(rep.name.as_str()))
                .chain(rep.tags.iter().map(String::as_str)),
            rep_id,
        );
        self.reps.push(rep);
        if let Some((_, group)) = self.groups.get_index_mut(group_slot) {
            group.members.push(rep_id);
        }
        self.stats.created += 1;
    }

    fn merge_into(&mut self, rep_id: RepId, candidate: Channel) {
        let max = self.options.max_sources_per_channel;
        let rep = &mut self.reps[rep_id];
        let dropped = append_sources(&mut rep.sources, candidate.sources, max);
        if dropped > 0 {
            debug!(
                "Source cap reached: channel='{}' max={} dropped={}",
                rep.id, max, dropped
            );
        }

        let mut new_keys: Vec<String> = Vec::new();
        if rep.logo.is_none() {
            rep.logo = candidate
                .logo
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
        }
        if rep.name.is_empty() && !candidate.name.trim().is_empty() {
            rep.name = candidate.name.trim().to_string();
            new_keys.push(rep.name.clone());
        }
        for tag in candidate.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if rep.tags.insert(tag.to_string()) {
                new_keys.push(tag.to_string());
            }
        }

        self.index
            .register_aliases(new_keys.iter().map(String::as_str), rep_id);
        self.stats.merged += 1;
    }

    /// Merge statistics so far
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Emit the merged directory: sources re-sorted, empty channels and groups dropped
    pub fn finish(self) -> (Directory, MergeStats) {
        debug!(
            "Identity index: ids={} aliases={} representatives={}",
            self.index.primary_len(),
            self.index.alias_len(),
            self.reps.len()
        );
        let mut reps: Vec<Option<Channel>> = self.reps.into_iter().map(Some).collect();
        let mut groups = Vec::with_capacity(self.groups.len());
        for (_, merged) in self.groups {
            let mut group = merged.shell;
            for rep_id in merged.members {
                let Some(mut channel) = reps.get_mut(rep_id).and_then(Option::take) else {
                    continue;
                };
                if channel.sources.is_empty() {
                    debug!("Dropping merged channel without sources: id='{}'", channel.id);
                    continue;
                }
                channel.sort_sources();
                group.channels.push(channel);
            }
            if group.channels.is_empty() {
                debug!("Dropping empty group: name='{}'", group.name);
                continue;
            }
            groups.push(group);
        }

        let directory = Directory::new(groups);
        info!(
            "Merged documents: groups={} channels={} sources={} {}",
            directory.groups.len(),
            directory.channel_count(),
            directory.source_count(),
            self.stats
        );
        (directory, self.stats)
    }
}

/// Append `incoming` sources whose URL is new, keeping at most `max`; returns how many were cut
fn append_sources(sources: &mut Vec<Source>, incoming: Vec<Source>, max: usize) -> usize {
    let max = max.max(1);
    let mut seen: HashSet<String> = sources.iter().map(|s| s.url.clone()).collect();
    let mut dropped = 0;
    for source in incoming {
        if source.url.trim().is_empty() || !seen.insert(source.url.clone()) {
            continue;
        }
        if sources.len() >= max {
            dropped += 1;
            continue;
        }
        sources.push(source);
    }
    dropped
}

/// Merge a sequence of inputs in order
pub fn merge_documents<I>(inputs: I, options: MergeOptions) -> (Directory, MergeStats)
where
    I: IntoIterator<Item = MergeInput>,
{
    let mut engine = MergeEngine::new(options);
    for input in inputs {
        engine.add(input);
    }
    engine.finish()
}
