//! End-to-end aggregation: parse every document, merge, serialize
//!
//! Documents are assembled independently, so the async form parses them
//! concurrently on the blocking pool. The merge always consumes them in
//! input order, which decides first-writer-wins precedence.

use futures::future::join_all;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{AggregatorError, AggregatorResult};
use crate::generator::{GeneratorOptions, M3uGenerator};
use crate::ingestor::{parse_playlist, ParseOptions};
use crate::merge::{merge_documents, MergeInput, MergeOptions, MergeStats};
use crate::models::raw::RawDirectory;
use crate::models::Directory;

/// One input document
#[derive(Debug, Clone)]
pub enum SourceDocument {
    /// Extended-M3U text
    Playlist { label: String, text: String },
    /// An already decoded pre-structured directory
    Directory { label: String, directory: RawDirectory },
}

impl SourceDocument {
    pub fn playlist<L: Into<String>, T: Into<String>>(label: L, text: T) -> Self {
        SourceDocument::Playlist {
            label: label.into(),
            text: text.into(),
        }
    }

    pub fn directory<L: Into<String>>(label: L, directory: RawDirectory) -> Self {
        SourceDocument::Directory {
            label: label.into(),
            directory,
        }
    }

    /// Read a document from disk; `.json` files are pre-structured directories
    pub async fn from_path<P: AsRef<Path>>(path: P) -> AggregatorResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AggregatorError::io(path, e))?;
        let label = path.display().to_string();
        debug!("Read input: path='{}' bytes={}", label, text.len());

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(Self::directory(label, RawDirectory::from_json(&text)?))
        } else {
            Ok(Self::playlist(label, text))
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SourceDocument::Playlist { label, .. } | SourceDocument::Directory { label, .. } => label,
        }
    }
}

/// Merged directory plus how the merge went
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub directory: Directory,
    pub stats: MergeStats,
}

/// Parser, merge engine and generator configured from one [`Config`]
#[derive(Debug, Clone)]
pub struct AggregationPipeline {
    parse_options: ParseOptions,
    merge_options: MergeOptions,
    generator_options: GeneratorOptions,
}

impl AggregationPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            parse_options: ParseOptions::from(&config.parser),
            merge_options: MergeOptions::from(config),
            generator_options: GeneratorOptions::from(config),
        }
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.parse_options
    }

    fn to_merge_input(document: SourceDocument, options: &ParseOptions) -> MergeInput {
        match document {
            SourceDocument::Playlist { label, text } => {
                let directory = parse_playlist(&text, options);
                info!(
                    "Document parsed: label='{}' groups={} channels={}",
                    label,
                    directory.groups.len(),
                    directory.channel_count()
                );
                MergeInput::Playlist(directory)
            }
            SourceDocument::Directory { label, directory } => {
                info!(
                    "Document accepted: label='{}' groups={} (pre-structured)",
                    label,
                    directory.groups.len()
                );
                MergeInput::Raw(directory)
            }
        }
    }

    /// Parse sequentially, then merge
    pub fn aggregate(&self, documents: Vec<SourceDocument>) -> Aggregation {
        let inputs: Vec<MergeInput> = documents
            .into_iter()
            .map(|doc| Self::to_merge_input(doc, &self.parse_options))
            .collect();
        self.merge(inputs)
    }

    /// Parse concurrently on the blocking pool, then merge in input order
    pub async fn aggregate_async(&self, documents: Vec<SourceDocument>) -> Aggregation {
        let tasks = documents.into_iter().map(|doc| {
            let options = self.parse_options.clone();
            let label = doc.label().to_string();
            let task = tokio::task::spawn_blocking(move || Self::to_merge_input(doc, &options));
            async move { (label, task.await) }
        });

        let mut inputs = Vec::new();
        for (label, result) in join_all(tasks).await {
            match result {
                Ok(input) => inputs.push(input),
                Err(e) => warn!("Parsing task failed, document skipped: label='{}' error={}", label, e),
            }
        }
        self.merge(inputs)
    }

    fn merge(&self, inputs: Vec<MergeInput>) -> Aggregation {
        let (directory, stats) = merge_documents(inputs, self.merge_options.clone());
        Aggregation { directory, stats }
    }

    /// Generator for this run, advertising `extra_epg_urls` as well
    pub fn generator<I, S>(&self, extra_epg_urls: I) -> M3uGenerator
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        M3uGenerator::new(self.generator_options.clone()).with_extra_epg_urls(extra_epg_urls)
    }

    /// Aggregate and render to a string in one call
    pub fn render(&self, documents: Vec<SourceDocument>) -> String {
        let aggregation = self.aggregate(documents);
        self.generator(Vec::<String>::new())
            .render_to_string(&aggregation.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_A: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="vtv1" tvg-name="VTV1" group-title="VN",VTV One
http://a.example.com/vtv1.mpd
"#;
    const DOC_B: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="vtv1" tvg-name="VTV1" group-title="VN",VTV One
http://b.example.com/vtv1.m3u8
"#;

    fn documents() -> Vec<SourceDocument> {
        vec![
            SourceDocument::playlist("a", DOC_A),
            SourceDocument::playlist("b", DOC_B),
        ]
    }

    #[test]
    fn test_sync_aggregation() {
        let pipeline = AggregationPipeline::new(&Config::default());
        let result = pipeline.aggregate(documents());
        let vtv1 = result.directory.find_channel("vtv1").unwrap();
        assert_eq!(vtv1.sources[0].url, "http://b.example.com/vtv1.m3u8");
        assert_eq!(vtv1.sources[1].url, "http://a.example.com/vtv1.mpd");
        assert_eq!(result.stats.merged, 1);
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let pipeline = AggregationPipeline::new(&Config::default());
        let sync = pipeline.aggregate(documents());
        let parallel = pipeline.aggregate_async(documents()).await;
        assert_eq!(sync.directory, parallel.directory);
        assert_eq!(sync.stats, parallel.stats);
    }

    #[tokio::test]
    async fn test_documents_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let m3u = dir.path().join("a.m3u");
        let json = dir.path().join("b.JSON");
        std::fs::write(&m3u, DOC_A).unwrap();
        std::fs::write(&json, r#"[{"name": "VN", "channels": [{"id": "vtv1", "url": "http://c.example.com/vtv1.m3u8"}]}]"#).unwrap();

        let docs = vec![
            SourceDocument::from_path(&m3u).await.unwrap(),
            SourceDocument::from_path(&json).await.unwrap(),
        ];
        assert!(matches!(docs[0], SourceDocument::Playlist { .. }));
        assert!(matches!(docs[1], SourceDocument::Directory { .. }));

        let pipeline = AggregationPipeline::new(&Config::default());
        let result = pipeline.aggregate(docs);
        assert_eq!(result.directory.find_channel("vtv1").unwrap().sources.len(), 2);

        let missing = SourceDocument::from_path(dir.path().join("absent.m3u")).await;
        assert!(matches!(missing, Err(AggregatorError::Io { .. })));
    }

    #[test]
    fn test_render_mentions_channel_once_per_source() {
        let pipeline = AggregationPipeline::new(&Config::default());
        let out = pipeline.render(documents());
        assert_eq!(out.matches("tvg-id=\"vtv1\"").count(), 2);
        assert!(out.contains(",VTV1\n"));
    }
}
