use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_merge::{
    config::{defaults::DEFAULT_CONFIG_FILE, Config},
    generator::{byte_stream, write_stream},
    AggregationPipeline, AggregatorError, SourceDocument,
};

#[derive(Parser)]
#[command(name = "m3u-merge")]
#[command(version)]
#[command(about = "Merge extended-M3U playlists into one deduplicated playlist")]
#[command(long_about = None)]
struct Cli {
    /// Input files, merged in the order given (`.json` = pre-structured directory)
    #[arg(required_unless_present = "init_config", value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Write the playlist here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Additional guide URL to advertise (repeatable)
    #[arg(long = "epg", value_name = "URL")]
    epg_urls: Vec<String>,

    /// Maximum sources kept per merged channel (overrides config file)
    #[arg(long, value_name = "N")]
    max_sources: Option<usize>,

    /// Do not synthesize avatar logos for channels without one
    #[arg(long)]
    no_avatars: bool,

    /// Write the playlist incrementally instead of buffering it
    #[arg(long)]
    stream: bool,

    /// Write a default configuration file to --config and exit
    #[arg(long)]
    init_config: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("m3u_merge={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting m3u-merge v{}", env!("CARGO_PKG_VERSION"));

    if cli.init_config {
        Config::write_default(&cli.config)?;
        return Ok(());
    }

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(max_sources) = cli.max_sources {
        if max_sources == 0 {
            return Err(AggregatorError::invalid_input("--max-sources must be at least 1").into());
        }
        config.merge.max_sources_per_channel = max_sources;
    }
    if cli.no_avatars {
        config.output.synthesize_logos = false;
    }

    let mut documents = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        documents.push(SourceDocument::from_path(path).await?);
    }

    let pipeline = AggregationPipeline::new(&config);
    let aggregation = pipeline.aggregate_async(documents).await;
    let generator = pipeline.generator(cli.epg_urls.clone());

    let written = match (&cli.output, cli.stream) {
        (Some(path), true) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            write_stream(byte_stream(generator, aggregation.directory), &mut file).await?
        }
        (None, true) => {
            let mut stdout = tokio::io::stdout();
            write_stream(byte_stream(generator, aggregation.directory), &mut stdout).await?
        }
        (Some(path), false) => {
            let playlist = generator.render_to_string(&aggregation.directory);
            tokio::fs::write(path, playlist.as_bytes())
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            playlist.len()
        }
        (None, false) => {
            let playlist = generator.render_to_string(&aggregation.directory);
            let mut stdout = tokio::io::stdout();
            stdout.write_all(playlist.as_bytes()).await?;
            stdout.flush().await?;
            playlist.len()
        }
    };

    info!(
        "Playlist written: bytes={} inputs={} {}",
        written,
        cli.inputs.len(),
        aggregation.stats
    );
    Ok(())
}
