//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own content root and cache.

use super::constants::*;
use super::fixtures::{create_test_content, TestCodec};
use hma_content_bridge::content::{ContentAccessService, ContentMode, ContentSettings};
use hma_content_bridge::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated content and cache directories
///
/// When dropped, the server shuts down and temp directories are removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Codec double, for asserting how often decoding/transcoding ran
    pub codec: Arc<TestCodec>,

    content_dir: TempDir,
    cache_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    pub async fn spawn() -> Self {
        let content_dir = create_test_content().expect("Failed to create test content");
        let cache_dir = TempDir::new().expect("Failed to create cache dir");
        let codec = Arc::new(TestCodec::default());

        let settings = ContentSettings {
            content_root: content_dir.path().to_path_buf(),
            cache_dir: cache_dir.path().to_path_buf(),
            mode: ContentMode::Local,
            ..Default::default()
        };
        let service = ContentAccessService::new(settings, codec.clone(), None);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            content_cache_age_sec: 0,
            ..Default::default()
        };
        let app = make_app(config, Arc::new(service));

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            codec,
            content_dir,
            cache_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    pub fn content_root(&self) -> &Path {
        self.content_dir.path()
    }

    pub fn cache_path(&self, relative: &str) -> PathBuf {
        self.cache_dir.path().join(relative)
    }

    /// Number of entries directly inside the cache directory.
    pub fn cache_entries(&self) -> usize {
        std::fs::read_dir(self.cache_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Waits for the server to become ready by polling /health
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
