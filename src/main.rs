use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hma_content_bridge::config::{self, AppConfig, FileConfig};
use hma_content_bridge::content::{
    AudioCodec, BucketStore, ContentAccessService, ContentMode, FfmpegCodec, RemoteStore,
};
use hma_content_bridge::server::{run_server, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(about = "Serves audio, icons, research documents and ML features from a content tree.")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Root of the canonical content tree.
    #[clap(long, env = "CONTENT_ROOT", value_parser = parse_path)]
    pub content_root: Option<PathBuf>,

    /// Directory for derived artifacts (transcodes, extracted features).
    #[clap(long, env = "CACHE_DIR", value_parser = parse_path)]
    pub cache_dir: Option<PathBuf>,

    /// Where content is expected to live.
    #[clap(long, env = "CONTENT_MODE", ignore_case = true)]
    pub mode: Option<ContentMode>,

    /// Object store bucket used in hybrid and s3 modes.
    #[clap(long, env = "S3_BUCKET")]
    pub bucket: Option<String>,

    /// Public base URL of the CDN fronting the bucket.
    #[clap(long, env = "CDN_URL")]
    pub cdn_url: Option<String>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// The maximum age of content in the cache in seconds.
    #[clap(long, default_value_t = 3600)]
    pub content_cache_age_sec: usize,

    /// ffmpeg binary used for decoding and transcoding.
    #[clap(long, env = "FFMPEG_PATH")]
    pub ffmpeg_path: Option<PathBuf>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            content_root: args.content_root.clone(),
            cache_dir: args.cache_dir.clone(),
            mode: args.mode,
            bucket: args.bucket.clone(),
            cdn_url: args.cdn_url.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            content_cache_age_sec: args.content_cache_age_sec,
            ffmpeg_path: args.ffmpeg_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&config::CliConfig::from(&cli_args), file_config)?;

    info!(
        "Content root {:?}, cache {:?}, mode {}",
        app_config.content.content_root, app_config.content.cache_dir, app_config.content.mode
    );

    let codec = FfmpegCodec::new(app_config.ffmpeg_path.clone());
    if let Err(err) = codec.check_available().await {
        warn!(
            "ffmpeg is not usable ({}); transcoding and feature extraction will fail",
            err
        );
    }
    let codec: Arc<dyn AudioCodec> = Arc::new(codec);

    let remote: Option<Arc<dyn RemoteStore>> = if app_config.content.mode.uses_remote() {
        Some(Arc::new(BucketStore::new(
            app_config.content.bucket.clone(),
            app_config.content.cdn_url.clone(),
        )))
    } else {
        None
    };

    let content = ContentAccessService::new(app_config.content.clone(), codec, remote);

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    tokio::select! {
        result = run_server(
            content,
            app_config.logging_level.clone(),
            app_config.port,
            app_config.metrics_port,
            app_config.content_cache_age_sec,
        ) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
