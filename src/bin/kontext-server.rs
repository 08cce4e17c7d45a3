// kontext-server - HTTP service for FLUX Kontext image edits

use clap::Parser;
use kontext_studio::{server, NvidiaSmiProbe, PreviewLoader, Provisioner, ServiceConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve FLUX Kontext image edits over HTTP", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Force CPU usage (default: use GPU if available)
    #[arg(long)]
    cpu: bool,

    /// Do not contact the HuggingFace Hub while loading
    #[arg(long)]
    skip_hub_check: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("kontext_studio={},kontext_server={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // .env may carry HF_TOKEN
    match dotenvy::dotenv() {
        Ok(path) => tracing::info!("Loaded .env file from: {}", path.display()),
        Err(e) => tracing::debug!(".env file not loaded: {}", e),
    }

    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            ServiceConfig::from_file(path)?
        }
        None => ServiceConfig::default(),
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.cpu {
        config.model.use_cpu = true;
    }
    if args.skip_hub_check {
        config.model.verify_hub_access = false;
    }

    if std::env::var(&config.model.token_env).is_err() {
        tracing::warn!(
            "{} is not set - gated model downloads may fail",
            config.model.token_env
        );
    }

    let loader =
        PreviewLoader::new(config.model.use_cpu).with_hub_check(config.model.verify_hub_access);
    let provisioner = Provisioner::new(Box::new(NvidiaSmiProbe::default()), Box::new(loader))
        .with_threshold_mb(config.model.vram_threshold_mb);

    tracing::info!("Starting kontext-server");
    server::serve(config, provisioner).await?;

    Ok(())
}
