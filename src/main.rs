use clap::Parser;
use keyword_spotter::{KeywordSpotter, OversizePolicy, RefreshMode, SpotterConfig};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "keyword-spotter")]
#[command(about = "Spoken keyword recognition over HTTP using TensorFlow Lite")]
struct Args {
    /// Address to serve the HTTP endpoints on
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    bind: String,

    /// Classifier artifact (overrides KWS_MODEL_PATH)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// What a failed refresh does: retain or hard-reset (overrides KWS_REFRESH_MODE)
    #[arg(long)]
    refresh_mode: Option<RefreshMode>,

    /// Handling of clips over one second: truncate, pass-through or reject
    #[arg(long)]
    oversize: Option<OversizePolicy>,

    /// Interpreter threads (overrides KWS_THREADS)
    #[arg(short, long)]
    threads: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = apply_overrides(SpotterConfig::from_env()?, &args);

    info!("🚀 Starting keyword spotter");
    info!("📦 Classifier artifact: {}", config.model_path.display());
    info!(
        "⚙️ Refresh mode: {}, oversize policy: {}, threads: {}",
        config.refresh_mode, config.oversize_policy, config.thread_count
    );

    let spotter = Arc::new(KeywordSpotter::from_config(&config));

    let warm = Arc::clone(&spotter);
    if tokio::task::spawn_blocking(move || warm.warm_up()).await? {
        info!("✅ Classifier loaded");
    } else {
        warn!(
            "⚠️ No classifier at {}; predictions fail until POST /refresh succeeds",
            spotter.model_path().display()
        );
    }

    keyword_spotter::server::serve(&args.bind, spotter).await?;
    Ok(())
}

fn apply_overrides(mut config: SpotterConfig, args: &Args) -> SpotterConfig {
    if let Some(model) = &args.model {
        config.model_path = model.clone();
    }
    if let Some(mode) = args.refresh_mode {
        config.refresh_mode = mode;
    }
    if let Some(policy) = args.oversize {
        config.oversize_policy = policy;
    }
    if let Some(threads) = args.threads {
        config.thread_count = threads.max(1);
    }
    config
}
