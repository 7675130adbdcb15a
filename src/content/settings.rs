use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where content is expected to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    #[default]
    Local,
    Hybrid,
    S3,
}

impl ContentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentMode::Local => "local",
            ContentMode::Hybrid => "hybrid",
            ContentMode::S3 => "s3",
        }
    }

    /// Whether a remote object store is consulted in this mode.
    pub fn uses_remote(&self) -> bool {
        !matches!(self, ContentMode::Local)
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ContentMode::Local),
            "hybrid" => Ok(ContentMode::Hybrid),
            "s3" => Ok(ContentMode::S3),
            other => Err(format!("Unknown content mode: {}", other)),
        }
    }
}

/// Everything the content service needs to know about its environment.
#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub content_root: PathBuf,
    pub cache_dir: PathBuf,
    pub mode: ContentMode,
    pub bucket: String,
    pub cdn_url: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("/content"),
            cache_dir: PathBuf::from("/cache"),
            mode: ContentMode::Local,
            bucket: "hma-content-alpha".to_string(),
            cdn_url: "http://localhost:8090".to_string(),
        }
    }
}
