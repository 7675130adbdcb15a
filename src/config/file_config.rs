use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Content layout (can override CLI)
    pub content_root: Option<String>,
    pub cache_dir: Option<String>,
    pub mode: Option<String>,
    pub bucket: Option<String>,
    pub cdn_url: Option<String>,

    // Server
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub content_cache_age_sec: Option<usize>,

    pub ffmpeg_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
content_root = "/srv/content"
mode = "hybrid"
port = 8080
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.content_root.as_deref(), Some("/srv/content"));
        assert_eq!(config.mode.as_deref(), Some("hybrid"));
        assert_eq!(config.port, Some(8080));
        assert!(config.cache_dir.is_none());
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number").unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(FileConfig::load(Path::new("/nonexistent/content-bridge.toml")).is_err());
    }
}
