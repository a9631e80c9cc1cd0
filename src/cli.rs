//! Command-line entry: run one crawl cycle and stream products as JSON lines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{info, warn};

use shopscrape::config::{EngineConfig, ProfileSet};
use shopscrape::models::TaskBatch;
use shopscrape::scheduler::{ChannelSink, Orchestrator};

#[derive(Parser)]
#[command(name = "shopscrape")]
#[command(about = "Profile-driven product listing scraper")]
#[command(version)]
pub struct Cli {
    /// Engine config file (TOML, YAML or JSON); discovered when omitted
    #[arg(short, long, env = "SHOPSCRAPE_CONFIG")]
    config: Option<PathBuf>,

    /// Site profile file, overriding `profiles_path` from the config
    #[arg(short, long, env = "SHOPSCRAPE_PROFILES")]
    profiles: Option<PathBuf>,

    /// Only crawl these domains (repeatable)
    #[arg(long = "only", value_name = "DOMAIN")]
    only: Vec<String>,

    /// Write products here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

pub async fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_path(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::load().await,
    };
    if let Some(path) = &cli.profiles {
        config.profiles_path = Some(absolute(path)?);
    }

    let profiles_path = config
        .resolved_profiles_path()
        .context("no site profiles given; pass --profiles or set profiles_path")?;
    let profiles = ProfileSet::load_from_path(&profiles_path)
        .with_context(|| format!("loading profiles {}", profiles_path.display()))?;

    let (sink, mut rx) = ChannelSink::channel(64);
    let orchestrator = Orchestrator::builder(config, profiles, Arc::new(sink))
        .only(cli.only.clone())
        .build()?;

    let writer: Box<dyn AsyncWrite + Unpin + Send> = match &cli.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    let writer_task = tokio::spawn(async move {
        let mut out = BufWriter::new(writer);
        let mut written = 0usize;
        while let Some(batch) = rx.recv().await {
            written += write_batch(&mut out, &batch).await?;
        }
        out.flush().await?;
        Ok::<_, std::io::Error>(written)
    });

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling cycle");
            cancel.cancel();
        }
    });

    let summary = orchestrator.run_cycle().await;
    orchestrator.shutdown().await;
    drop(orchestrator);

    let written = writer_task.await.context("output writer panicked")??;
    info!("Wrote {} product record(s)", written);

    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(!summary.is_aborted())
}

async fn write_batch<W: AsyncWrite + Unpin>(
    out: &mut W,
    batch: &TaskBatch,
) -> std::io::Result<usize> {
    for product in &batch.products {
        let line = serde_json::to_string(product).map_err(std::io::Error::other)?;
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    Ok(batch.products.len())
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
