//! Batch driver: extract metadata for every document in a directory.
//!
//! Processes documents one at a time, sleeping between documents to stay
//! under the remote service's rate limit. A failing document is logged
//! and skipped; the batch continues.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use deckmeta_core::convert::SofficeConverter;
use deckmeta_core::{GeminiClient, MetadataPipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "deckmeta")]
#[command(about = "Extract structured metadata from a directory of documents")]
struct Args {
    /// Directory containing the documents to process
    #[arg(default_value = "decks")]
    decks_dir: PathBuf,

    /// Remote API rate limit, in requests per minute
    #[arg(long, default_value_t = 10)]
    requests_per_minute: u64,

    /// Generation model to use
    #[arg(long)]
    model: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deckmeta=info".parse().unwrap())
                .add_directive("deckmeta_core=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let api_key = std::env::var("GOOGLE_API_KEY").context("GOOGLE_API_KEY is not set")?;

    let mut config = PipelineConfig::default();
    if let Some(model) = args.model {
        config.model = model;
    }

    let pipeline = MetadataPipeline::new(
        Arc::new(GeminiClient::new(&api_key)),
        Arc::new(SofficeConverter::new()),
        config,
    );

    let paths = document_paths(&args.decks_dir)?;
    tracing::info!(
        count = paths.len(),
        dir = %args.decks_dir.display(),
        "Found documents"
    );

    let delay = Duration::from_millis(60_000_u64.div_ceil(args.requests_per_minute.max(1)));

    let mut failed = 0usize;
    for (i, path) in paths.iter().enumerate() {
        // Pace requests against the remote rate limit
        if i > 0 {
            tokio::time::sleep(delay).await;
        }

        match pipeline.extract_metadata(path).await {
            Ok(metadata) => {
                tracing::info!(path = %path.display(), title = %metadata.title, "Metadata extracted");
                println!("{}", serde_json::to_string(&metadata)?);
            }
            Err(e) => {
                failed += 1;
                tracing::error!(path = %path.display(), error = %e, "Failed to extract metadata");
            }
        }
    }

    tracing::info!(total = paths.len(), failed, "Batch complete");

    Ok(())
}

/// Regular files in the decks directory, sorted for stable ordering.
fn document_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    Ok(paths)
}
