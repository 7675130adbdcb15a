//! Logical content requests and the cache keys derived from them.

use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Audio,
    Icon,
    Document,
    Features,
    Index,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Audio => "audio",
            ContentKind::Icon => "icon",
            ContentKind::Document => "document",
            ContentKind::Features => "features",
            ContentKind::Index => "index",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for a piece of content, with its identifying keys and optional
/// transform parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRequest {
    Audio {
        category: String,
        species: String,
        filename: String,
        format: Option<String>,
        sample_rate: Option<u32>,
    },
    Icon {
        category: String,
        name: String,
        size: Option<String>,
    },
    Document {
        category: String,
        paper_id: String,
        extract: Option<String>,
    },
    Features {
        audio_id: String,
    },
    Index,
}

impl ContentRequest {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentRequest::Audio { .. } => ContentKind::Audio,
            ContentRequest::Icon { .. } => ContentKind::Icon,
            ContentRequest::Document { .. } => ContentKind::Document,
            ContentRequest::Features { .. } => ContentKind::Features,
            ContentRequest::Index => ContentKind::Index,
        }
    }

    fn key_fields(&self) -> Vec<Option<String>> {
        match self {
            ContentRequest::Audio {
                category,
                species,
                filename,
                format,
                sample_rate,
            } => vec![
                Some(category.clone()),
                Some(species.clone()),
                Some(filename.clone()),
                format.clone(),
                sample_rate.map(|rate| rate.to_string()),
            ],
            ContentRequest::Icon {
                category,
                name,
                size,
            } => vec![Some(category.clone()), Some(name.clone()), size.clone()],
            ContentRequest::Document {
                category,
                paper_id,
                extract,
            } => vec![
                Some(category.clone()),
                Some(paper_id.clone()),
                extract.clone(),
            ],
            ContentRequest::Features { audio_id } => vec![Some(audio_id.clone())],
            ContentRequest::Index => vec![],
        }
    }

    /// The unhashed form of the cache key.
    ///
    /// Present values are prefixed with `=` and have `\` and `:` escaped,
    /// absent values render as `-`, so distinct field tuples never collide.
    pub fn key_material(&self) -> String {
        let mut material = String::from(self.kind().as_str());
        for field in self.key_fields() {
            material.push(':');
            match field {
                Some(value) => {
                    material.push('=');
                    for c in value.chars() {
                        if c == '\\' || c == ':' {
                            material.push('\\');
                        }
                        material.push(c);
                    }
                }
                None => material.push('-'),
            }
        }
        material
    }

    pub fn cache_key(&self) -> CacheKey {
        let digest = Sha256::digest(self.key_material().as_bytes());
        CacheKey(format!("{:x}", digest))
    }
}

/// Content-addressed name of a derived artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
