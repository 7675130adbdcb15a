//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per content bridge endpoint.
//! When API routes change, update only this file.

use super::constants::*;
use reqwest::Response;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn get_with_range(&self, path: &str, range: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("Range", range)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn health(&self) -> Response {
        self.get("/health").await
    }

    // ========================================================================
    // Audio
    // ========================================================================

    pub fn audio_path(category: &str, species: &str, filename: &str) -> String {
        format!("/api/audio/{}/{}/{}", category, species, filename)
    }

    pub async fn get_audio(&self, category: &str, species: &str, filename: &str) -> Response {
        self.get(&Self::audio_path(category, species, filename)).await
    }

    pub async fn get_audio_transformed(
        &self,
        category: &str,
        species: &str,
        filename: &str,
        format: Option<&str>,
        sample_rate: Option<u32>,
    ) -> Response {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(format) = format {
            query.push(("format", format.to_string()));
        }
        if let Some(rate) = sample_rate {
            query.push(("sample_rate", rate.to_string()));
        }
        self.client
            .get(format!(
                "{}{}",
                self.base_url,
                Self::audio_path(category, species, filename)
            ))
            .query(&query)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn get_audio_index(&self) -> Response {
        self.get("/api/audio/index").await
    }

    pub async fn get_audio_ids(&self) -> Response {
        self.get("/api/audio/ids").await
    }

    // ========================================================================
    // Icons, documents, features
    // ========================================================================

    pub async fn get_icon(&self, category: &str, name: &str, size: Option<&str>) -> Response {
        match size {
            Some(size) => {
                self.get(&format!("/api/icons/{}/{}?size={}", category, name, size))
                    .await
            }
            None => self.get(&format!("/api/icons/{}/{}", category, name)).await,
        }
    }

    pub async fn get_research(
        &self,
        category: &str,
        paper_id: &str,
        extract: Option<&str>,
    ) -> Response {
        match extract {
            Some(extract) => {
                self.get(&format!(
                    "/api/research/{}/{}?extract={}",
                    category, paper_id, extract
                ))
                .await
            }
            None => {
                self.get(&format!("/api/research/{}/{}", category, paper_id))
                    .await
            }
        }
    }

    pub async fn get_features(&self, audio_id: &str) -> Response {
        self.get(&format!("/api/ml/features/{}", audio_id)).await
    }

    pub async fn get_manifest(&self) -> Response {
        self.get("/api/manifest").await
    }
}
