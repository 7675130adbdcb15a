//! Resolution of content requests against the layered content store.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::codec::AudioCodec;
use super::error::{ContentError, ContentResult, ExtractionError};
use super::features::{self, FeatureVector, FeaturesResponse};
use super::index::{self, ContentIndex, AUDIO_EXTENSIONS};
use super::mime;
use super::remote::RemoteStore;
use super::request::ContentRequest;
use super::settings::{ContentMode, ContentSettings};
use super::store::{is_safe_segment, ContentRoot, DerivedCache};

const REGISTRY_PATH: &[&str] = &["manifests", "content-registry.json"];
const SNIFF_LEN: usize = 512;

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Read-only artifact shipped with the content root.
    Precomputed,
    /// Previously derived artifact found in the cache directory.
    CacheHit,
    /// Canonical file from the content root, served as is.
    Source,
    /// Artifact derived during this request.
    Derived,
    /// Derivation failed and the deterministic fallback was used.
    Fallback,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Precomputed => "precomputed",
            Resolution::CacheHit => "cache_hit",
            Resolution::Source => "source",
            Resolution::Derived => "derived",
            Resolution::Fallback => "fallback",
        }
    }
}

/// A file ready to be streamed back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    pub path: PathBuf,
    pub content_type: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFeatures {
    pub response: FeaturesResponse,
    pub resolution: Resolution,
}

fn require_segments(segments: &[&str], what: &str) -> ContentResult<()> {
    if segments.iter().all(|s| is_safe_segment(s)) {
        Ok(())
    } else {
        Err(ContentError::not_found(format!("{} not found", what)))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub struct ContentAccessService {
    settings: ContentSettings,
    root: ContentRoot,
    cache: DerivedCache,
    codec: Arc<dyn AudioCodec>,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl ContentAccessService {
    pub fn new(
        settings: ContentSettings,
        codec: Arc<dyn AudioCodec>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        let root = ContentRoot::new(settings.content_root.clone());
        let cache = DerivedCache::new(settings.cache_dir.clone());
        Self {
            settings,
            root,
            cache,
            codec,
            remote,
        }
    }

    pub fn settings(&self) -> &ContentSettings {
        &self.settings
    }

    pub fn content_root(&self) -> &ContentRoot {
        &self.root
    }

    /// Content type by `ext_hint` when known, else by sniffing the file.
    async fn content_type_of(&self, path: &Path, ext_hint: Option<&str>) -> ContentResult<String> {
        if let Some(content_type) = ext_hint.and_then(mime::content_type_for_extension) {
            return Ok(content_type.to_string());
        }
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let file = tokio::fs::File::open(path).await?;
        file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
        Ok(mime::content_type_for_path(path, &head))
    }

    fn audio_miss(&self, relative: &str) -> ContentError {
        match (&self.settings.mode, &self.remote) {
            (ContentMode::Hybrid, Some(remote)) => ContentError::Unimplemented(format!(
                "Remote fallback for {} (bucket {}) is not implemented",
                remote.object_url(relative),
                remote.bucket()
            )),
            _ => ContentError::not_found("Audio file not found"),
        }
    }

    pub async fn get_audio(
        &self,
        category: &str,
        species: &str,
        filename: &str,
        format: Option<&str>,
        sample_rate: Option<u32>,
    ) -> ContentResult<ContentFile> {
        require_segments(&[category, species, filename], "Audio file")?;

        let request = ContentRequest::Audio {
            category: category.to_string(),
            species: species.to_string(),
            filename: filename.to_string(),
            format: format.map(str::to_string),
            sample_rate,
        };
        let key = request.cache_key();
        let derived = self.cache.artifact_path(&key);
        let source_ext = extension_of(Path::new(filename));
        let type_hint = format
            .map(str::to_ascii_lowercase)
            .or_else(|| source_ext.clone());

        if let Some(path) = self.cache.file(derived.clone()).await? {
            debug!("Audio cache hit for {}/{}/{} ({})", category, species, filename, key);
            let content_type = self.content_type_of(&path, type_hint.as_deref()).await?;
            return Ok(ContentFile {
                path,
                content_type,
                resolution: Resolution::CacheHit,
            });
        }

        let segments = ["audio", category, species, filename];
        let source = match self.root.file(self.root.join(&segments)).await? {
            Some(source) => source,
            None => return Err(self.audio_miss(&segments.join("/"))),
        };

        if format.is_none() && sample_rate.is_none() {
            let content_type = self.content_type_of(&source, source_ext.as_deref()).await?;
            return Ok(ContentFile {
                path: source,
                content_type,
                resolution: Resolution::Source,
            });
        }

        let target_format = type_hint.unwrap_or_else(|| "wav".to_string());
        info!(
            "Transcoding {} to {} (sample rate {:?})",
            source.display(),
            target_format,
            sample_rate
        );
        let scratch = self.cache.scratch_path_for(&derived).await?;
        self.codec
            .transcode(&source, &scratch, &target_format, sample_rate)
            .await?;
        scratch.persist(&derived).map_err(|err| err.error)?;

        let content_type = self.content_type_of(&derived, Some(&target_format)).await?;
        Ok(ContentFile {
            path: derived,
            content_type,
            resolution: Resolution::Derived,
        })
    }

    pub async fn get_icon(
        &self,
        category: &str,
        name: &str,
        size: Option<&str>,
    ) -> ContentResult<ContentFile> {
        require_segments(&[category, name], "Icon")?;

        let mut candidates = Vec::with_capacity(3);
        if let Some(size) = size {
            // A missing sized variant falls through to the unsized ones.
            let sized = format!("{}{}.png", name, size);
            if is_safe_segment(&sized) {
                candidates.push(sized);
            }
        }
        candidates.push(format!("{}.svg", name));
        candidates.push(format!("{}.png", name));

        for candidate in candidates {
            let path = self
                .root
                .join(&["media", "icons", category, candidate.as_str()]);
            if let Some(path) = self.root.file(path).await? {
                let content_type = self
                    .content_type_of(&path, extension_of(&path).as_deref())
                    .await?;
                return Ok(ContentFile {
                    path,
                    content_type,
                    resolution: Resolution::Source,
                });
            }
        }
        Err(ContentError::not_found("Icon not found"))
    }

    pub async fn get_research_paper(
        &self,
        category: &str,
        paper_id: &str,
        extract: Option<&str>,
    ) -> ContentResult<ContentFile> {
        require_segments(&[category, paper_id], "Paper")?;

        let paper_file = format!("{}.pdf", paper_id);
        let paper = self
            .root
            .join(&["documents", "research-papers", category, paper_file.as_str()]);

        if let Some(extract) = extract.filter(|e| is_safe_segment(e)) {
            let extract_path = paper
                .parent()
                .map(|dir| dir.join("extracted").join(extract))
                .unwrap_or_default();
            if let Some(path) = self.root.file(extract_path).await? {
                let content_type = self
                    .content_type_of(&path, extension_of(&path).as_deref())
                    .await?;
                return Ok(ContentFile {
                    path,
                    content_type,
                    resolution: Resolution::Source,
                });
            }
        }

        match self.root.file(paper).await? {
            Some(path) => Ok(ContentFile {
                path,
                content_type: "application/pdf".to_string(),
                resolution: Resolution::Source,
            }),
            None => Err(ContentError::not_found("Paper not found")),
        }
    }

    async fn find_audio_source(&self, audio_id: &str) -> ContentResult<Option<PathBuf>> {
        let root = self.root.clone();
        let audio_id = audio_id.to_string();
        let found = tokio::task::spawn_blocking(move || {
            AUDIO_EXTENSIONS.iter().find_map(|ext| {
                root.find_by_file_name("audio", &format!("{}.{}", audio_id, ext))
            })
        })
        .await
        .map_err(std::io::Error::other)?;
        Ok(found)
    }

    /// Extract features, replacing undecodable audio with the fixed
    /// fallback matrix. The boolean reports whether the fallback was used.
    /// A decoder that cannot be run at all is an error, not a fallback.
    async fn extract_features(&self, path: &Path) -> ContentResult<(FeatureVector, bool)> {
        let decoded = match self.codec.decode_samples(path).await {
            Ok(samples) => Ok(samples),
            Err(err) => Err(ExtractionError::from_decode(err)?),
        };
        match features::extract(decoded) {
            Ok(vector) => Ok((vector, false)),
            Err(err) => {
                warn!(
                    "Feature extraction failed for {}, using fallback: {}",
                    path.display(),
                    err
                );
                Ok((FeatureVector::fallback(), true))
            }
        }
    }

    pub async fn get_features(&self, audio_id: &str) -> ContentResult<ResolvedFeatures> {
        require_segments(&[audio_id], "Features")?;

        let precomputed_file = format!("{}-features.npy", audio_id);
        let precomputed = self
            .root
            .join(&["audio", "processed", precomputed_file.as_str()]);
        if let Some(path) = self.root.file(precomputed).await? {
            let bytes = tokio::fs::read(&path).await?;
            return Ok(ResolvedFeatures {
                response: FeaturesResponse::from_npy(audio_id, &bytes)?,
                resolution: Resolution::Precomputed,
            });
        }

        let cached = self.cache.features_path(audio_id);
        if let Some(path) = self.cache.file(cached.clone()).await? {
            let bytes = tokio::fs::read(&path).await?;
            return Ok(ResolvedFeatures {
                response: FeaturesResponse::from_npy(audio_id, &bytes)?,
                resolution: Resolution::CacheHit,
            });
        }

        let source = match self.find_audio_source(audio_id).await? {
            Some(source) => source,
            None => return Err(ContentError::not_found("Features not found")),
        };

        debug!("Extracting features for {} from {}", audio_id, source.display());
        let (vector, fell_back) = self.extract_features(&source).await?;
        self.cache.write_atomic(cached, vector.to_npy()).await?;

        Ok(ResolvedFeatures {
            response: FeaturesResponse::from_vector(audio_id, &vector),
            resolution: if fell_back {
                Resolution::Fallback
            } else {
                Resolution::Derived
            },
        })
    }

    /// Read-through load of the audio index.
    pub async fn load_audio_index(&self) -> ContentResult<ContentIndex> {
        let root = self.root.clone();
        let index = tokio::task::spawn_blocking(move || index::load_index(&root))
            .await
            .map_err(std::io::Error::other)??;
        Ok(index)
    }

    pub async fn audio_ids(&self) -> ContentResult<Vec<String>> {
        Ok(self.load_audio_index().await?.ids())
    }

    /// The content registry manifest, passed through as JSON.
    pub async fn content_registry(&self) -> ContentResult<Value> {
        let path = self.root.join(REGISTRY_PATH);
        match self.root.file(path).await? {
            Some(path) => {
                let bytes = tokio::fs::read(path).await?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            None => Err(ContentError::not_found("Manifest not found")),
        }
    }
}
