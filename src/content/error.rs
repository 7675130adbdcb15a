use thiserror::Error;

use super::codec::ConversionError;
use super::npy::NpyError;

/// Errors surfaced by [`super::ContentAccessService`].
#[derive(Debug, Error)]
pub enum ContentError {
    /// The requested identity has no artifact through any fallback chain.
    #[error("{0}")]
    NotFound(String),

    /// A resolution path exists in this mode but is not wired up.
    #[error("{0}")]
    Unimplemented(String),

    #[error("Audio conversion failed: {0}")]
    Transcode(#[from] ConversionError),

    #[error("Unreadable feature file: {0}")]
    Features(#[from] NpyError),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContentError {
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        ContentError::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ContentError::NotFound(_))
    }
}

/// Failures while turning an audio source into a feature vector.
///
/// These never leave the service: the features endpoint always answers,
/// falling back to a fixed zero matrix.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Audio decode failed: {0}")]
    Decode(ConversionError),

    #[error("Malformed sample data: {0}")]
    Samples(String),
}

impl ExtractionError {
    /// Sort a decoder error into a failure of the audio itself, which
    /// extraction absorbs, or a failure to run the decoder, which it does not.
    pub fn from_decode(err: ConversionError) -> Result<Self, ConversionError> {
        match err {
            ConversionError::ConversionFailed(_) | ConversionError::InvalidOutput(_) => {
                Ok(ExtractionError::Decode(err))
            }
            other => Err(other),
        }
    }
}

pub type ContentResult<T> = Result<T, ContentError>;
