//! SmartLens Entry Point
//!
//! Three commands share one session:
//! - `index`: embed every image in the folder that is not yet stored
//! - `search QUERY`: print the closest images for a text description
//! - `stats`: show what the store holds

use clap::{Parser, Subcommand};
use smartlens_cli::{render, CliError, CliResult, LensSession, OutputFormat, ProviderKind};
use smartlens_index::LensConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "smartlens")]
#[command(about = "Semantic image search over a local folder")]
#[command(version)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long, short, env = "SMARTLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Image folder to index
    #[arg(long, env = "SMARTLENS_IMAGES")]
    images: Option<PathBuf>,

    /// Vector store directory
    #[arg(long, env = "SMARTLENS_DB")]
    db: Option<PathBuf>,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = ProviderKind::Clip)]
    provider: ProviderKind,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index new images
    Index,
    /// Search indexed images by text
    Search {
        /// Text description of the image
        query: String,
        /// Number of results
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Show store statistics
    Stats,
}

fn load_config(args: &Args) -> CliResult<LensConfig> {
    let mut config = match &args.config {
        Some(path) if !path.is_file() => return Err(CliError::ConfigNotFound(path.clone())),
        Some(path) => LensConfig::load(path)?,
        None => LensConfig::default(),
    };

    if let Some(images) = &args.images {
        config.source.root = images.clone();
    }
    if let Some(db) = &args.db {
        config.store.path = db.clone();
    }
    Ok(config)
}

async fn run(args: Args) -> CliResult<()> {
    let config = load_config(&args)?;
    let format = OutputFormat::from_flag(args.json);

    let session = LensSession::new(config, args.provider);
    session.initialize().await?;

    match args.command {
        Command::Index => {
            let report = session.index().await?;
            let out = &mut std::io::stdout().lock();
            render::index_report(out, format, session.images_dir(), &report)
        }
        Command::Search { query, k } => {
            let hits = session.search(&query, k).await?;
            render::search_results(&mut std::io::stdout().lock(), format, query.trim(), &hits)
        }
        Command::Stats => {
            let stats = session.stats().await?;
            render::stats(&mut std::io::stdout().lock(), format, &stats)
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "smartlens=info,smartlens_cli=info,smartlens_index=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
