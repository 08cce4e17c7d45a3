// kontext-edit - run a single FLUX Kontext edit from the command line

use clap::Parser;
use kontext_studio::{EditExecutor, NvidiaSmiProbe, PreviewLoader, Provisioner, ServiceConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Edit one image with FLUX Kontext", long_about = None)]
struct Args {
    /// Local path or http(s) URL of the image to edit
    #[arg(short, long)]
    image: String,

    /// Edit instruction
    #[arg(short, long)]
    prompt: String,

    /// Output file path (PNG format)
    #[arg(short, long, default_value = "output.png")]
    output: PathBuf,

    /// Guidance scale (overrides config)
    #[arg(short, long)]
    guidance_scale: Option<f64>,

    /// Number of inference steps (overrides config)
    #[arg(short, long)]
    num_steps: Option<usize>,

    /// Random seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

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
                format!("kontext_studio={},kontext_edit={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        tracing::info!("Loaded .env file from: {}", path.display());
    }

    let config = match &args.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };

    let loader = PreviewLoader::new(args.cpu || config.model.use_cpu)
        .with_hub_check(config.model.verify_hub_access && !args.skip_hub_check);
    let provisioner = Provisioner::new(Box::new(NvidiaSmiProbe::default()), Box::new(loader))
        .with_threshold_mb(config.model.vram_threshold_mb);

    let source = config.model.source();
    let handle = tokio::task::spawn_blocking(move || provisioner.provision(&source)).await??;

    let options = config
        .edit
        .options(args.prompt, args.guidance_scale, args.num_steps, args.seed);
    let image = EditExecutor::with_timeout(config.server.fetch_timeout())?
        .edit(&handle, args.image.into(), &options)
        .await?;

    image.save(&args.output)?;
    tracing::info!("Saved image to {}", args.output.display());
    println!("Image saved to: {}", args.output.display());

    Ok(())
}
