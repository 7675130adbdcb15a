//! Audio decoding and transcoding through ffmpeg.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors that can occur while decoding or converting audio.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("ffmpeg failed: {0}")]
    ConversionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Decode/encode/resample capability used by the content service.
#[async_trait]
pub trait AudioCodec: Send + Sync {
    /// Decode the file into interleaved raw samples.
    async fn decode_samples(&self, path: &Path) -> Result<Vec<f32>, ConversionError>;

    /// Re-encode `input` into `format` at `output`, resampling when
    /// `sample_rate` is given.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: &str,
        sample_rate: Option<u32>,
    ) -> Result<(), ConversionError>;
}

/// Output containers ffmpeg is asked to produce.
pub const SUPPORTED_FORMATS: &[&str] = &["wav", "mp3", "ogg", "flac", "aac", "opus"];

/// ffmpeg muxer name for an output container.
fn muxer_for(format: &str) -> &str {
    match format {
        "aac" => "adts",
        other => other,
    }
}

pub struct FfmpegCodec {
    binary: PathBuf,
}

impl FfmpegCodec {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check that the configured ffmpeg binary can be executed.
    pub async fn check_available(&self) -> Result<(), ConversionError> {
        let status = Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(ConversionError::ConversionFailed(format!(
                "{} -version exited with {}",
                self.binary.display(),
                status
            )));
        }
        Ok(())
    }
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Convert little-endian signed 16 bit PCM into samples.
pub fn pcm_s16le_to_samples(bytes: &[u8]) -> Result<Vec<f32>, ConversionError> {
    if bytes.len() % 2 != 0 {
        return Err(ConversionError::InvalidOutput(format!(
            "PCM stream has odd length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32)
        .collect())
}

#[async_trait]
impl AudioCodec for FfmpegCodec {
    async fn decode_samples(&self, path: &Path) -> Result<Vec<f32>, ConversionError> {
        let output = Command::new(&self.binary)
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "s16le", "-acodec", "pcm_s16le", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConversionError::ConversionFailed(stderr.to_string()));
        }

        debug!(
            "Decoded {} PCM bytes from {}",
            output.stdout.len(),
            path.display()
        );
        pcm_s16le_to_samples(&output.stdout)
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: &str,
        sample_rate: Option<u32>,
    ) -> Result<(), ConversionError> {
        let format = format.to_ascii_lowercase();
        if !SUPPORTED_FORMATS.contains(&format.as_str()) {
            return Err(ConversionError::UnsupportedFormat(format));
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut command = Command::new(&self.binary);
        command.args(["-v", "error", "-i"]).arg(input).arg("-vn");
        if let Some(rate) = sample_rate {
            command.args(["-ar", &rate.to_string()]);
        }
        // The destination is a hashed name without extension, so the muxer
        // has to be explicit.
        let output_result = command
            .args(["-f", muxer_for(&format), "-y"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(ConversionError::ConversionFailed(stderr.to_string()));
        }

        Ok(())
    }
}
