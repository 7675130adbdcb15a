mod file_config;

pub use file_config::FileConfig;

use crate::content::{ContentMode, ContentSettings};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// Every field can be overridden by the TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub content_root: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub mode: Option<ContentMode>,
    pub bucket: Option<String>,
    pub cdn_url: Option<String>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub content_cache_age_sec: usize,
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub content: ContentSettings,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub content_cache_age_sec: usize,
    pub ffmpeg_path: PathBuf,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let defaults = ContentSettings::default();

        let content_root = file
            .content_root
            .map(PathBuf::from)
            .or_else(|| cli.content_root.clone())
            .unwrap_or(defaults.content_root);

        if !content_root.exists() {
            bail!("Content root does not exist: {:?}", content_root);
        }
        if !content_root.is_dir() {
            bail!("content_root is not a directory: {:?}", content_root);
        }

        let cache_dir = file
            .cache_dir
            .map(PathBuf::from)
            .or_else(|| cli.cache_dir.clone())
            .unwrap_or(defaults.cache_dir);
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", cache_dir))?;

        let mode = match file.mode {
            Some(mode) => match mode.parse::<ContentMode>() {
                Ok(mode) => mode,
                Err(err) => bail!("{}", err),
            },
            None => cli.mode.unwrap_or(defaults.mode),
        };

        let bucket = file
            .bucket
            .or_else(|| cli.bucket.clone())
            .unwrap_or(defaults.bucket);
        let cdn_url = file
            .cdn_url
            .or_else(|| cli.cdn_url.clone())
            .unwrap_or(defaults.cdn_url);

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let content_cache_age_sec = file
            .content_cache_age_sec
            .unwrap_or(cli.content_cache_age_sec);

        let ffmpeg_path = file
            .ffmpeg_path
            .map(PathBuf::from)
            .or_else(|| cli.ffmpeg_path.clone())
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));

        Ok(Self {
            content: ContentSettings {
                content_root,
                cache_dir,
                mode,
                bucket,
                cdn_url,
            },
            port,
            metrics_port,
            logging_level,
            content_cache_age_sec,
            ffmpeg_path,
        })
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
