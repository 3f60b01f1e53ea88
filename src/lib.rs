//! Aggregates independently authored extended-M3U playlists into one
//! deduplicated, enriched playlist.
//!
//! The flow is one-way: text is parsed per document ([`ingestor`]), the
//! resulting directories are folded together ([`merge`]) and the merged
//! directory is written back out ([`generator`]). [`pipeline`] wires the
//! three together.

pub mod config;
pub mod enrichment;
pub mod errors;
pub mod generator;
pub mod ingestor;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod utils;

pub use config::Config;
pub use errors::{AggregatorError, AggregatorResult};
pub use generator::{GeneratorOptions, M3uGenerator};
pub use ingestor::{parse_playlist, ParseOptions};
pub use merge::{merge_documents, MergeEngine, MergeInput, MergeOptions, MergeStats};
pub use models::{Channel, Directory, Group, Source};
pub use pipeline::{Aggregation, AggregationPipeline, SourceDocument};
