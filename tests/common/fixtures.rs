//! Fixture content tree and the codec double used by the test server

use super::constants::*;
use async_trait::async_trait;
use hma_content_bridge::content::{
    pcm_s16le_to_samples, write_f32_matrix, AudioCodec, ConversionError,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Codec that understands the generated 16 bit mono WAV files and
/// "transcodes" by copying. Counts its invocations.
#[derive(Default)]
pub struct TestCodec {
    decodes: AtomicUsize,
    transcodes: AtomicUsize,
}

impl TestCodec {
    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn transcodes(&self) -> usize {
        self.transcodes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCodec for TestCodec {
    async fn decode_samples(&self, path: &Path) -> Result<Vec<f32>, ConversionError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        let bytes = tokio::fs::read(path).await?;
        if bytes.len() < WAV_HEADER_SIZE || &bytes[..4] != b"RIFF" {
            return Err(ConversionError::ConversionFailed(format!(
                "{} is not a WAV file",
                path.display()
            )));
        }
        pcm_s16le_to_samples(&bytes[WAV_HEADER_SIZE..])
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _format: &str,
        _sample_rate: Option<u32>,
    ) -> Result<(), ConversionError> {
        self.transcodes.fetch_add(1, Ordering::SeqCst);
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

/// 16 bit mono PCM WAV with the given samples.
pub fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(WAV_HEADER_SIZE + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

pub fn bull_samples() -> Vec<i16> {
    (0..BULL_SAMPLE_COUNT)
        .map(|i| ((i % 100) as i16 - 50) * 100)
        .collect()
}

fn write(root: &Path, relative: &str, bytes: &[u8]) -> std::io::Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}

/// Populate a temporary content root.
pub fn create_test_content() -> std::io::Result<TempDir> {
    let dir = TempDir::new()?;
    let root = dir.path();

    write(
        root,
        &format!("audio/{}/{}/{}", AUDIO_CATEGORY, AUDIO_SPECIES, BUGLE_FILE),
        &wav_bytes(&[0, 1000, -1000, 0].repeat(1000), 22050),
    )?;
    write(
        root,
        &format!("audio/game-calls/master/elk/{}.wav", BULL_ID),
        &wav_bytes(&bull_samples(), 44100),
    )?;
    write(
        root,
        &format!("audio/game-calls/master/elk/{}.mp3", BULL_ID),
        b"ID3-not-really",
    )?;
    write(
        root,
        &format!("audio/game-calls/processed/deer/{}.mp3", BROKEN_ID),
        b"garbage",
    )?;
    write(
        root,
        &format!("audio/processed/{}-features.npy", PRECOMPUTED_ID),
        &write_f32_matrix((2, 2), &[1.0, 0.5, 2.0, 0.25]),
    )?;

    write(root, "media/icons/species/elk.svg", b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>")?;
    write(root, "media/icons/species/elk_lg.png", b"\x89PNG\r\n\x1a\nlarge")?;
    write(root, "media/icons/species/deer.png", b"\x89PNG\r\n\x1a\ndeer")?;

    write(
        root,
        &format!("documents/research-papers/{}/{}.pdf", PAPER_CATEGORY, PAPER_ID),
        b"%PDF-1.4 rut study",
    )?;
    write(
        root,
        &format!(
            "documents/research-papers/{}/extracted/{}",
            PAPER_CATEGORY, PAPER_EXTRACT
        ),
        b"\x89PNG\r\n\x1a\nfigure",
    )?;

    write(
        root,
        "manifests/content-registry.json",
        br#"{"version": 1, "modules": ["elk-basics"]}"#,
    )?;

    Ok(dir)
}
