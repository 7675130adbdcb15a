//! Placeholder windowed-statistics features for audio.

use serde::Serialize;

use super::error::ExtractionError;
use super::npy::{self, Dtype, NpyError, NpyMatrix};

/// Samples per window.
pub const WINDOW_SIZE: usize = 2048;

/// Rows of the matrix returned when an audio source cannot be decoded.
pub const FALLBACK_ROWS: usize = 8;

const COLUMNS: usize = 2;

/// Row-major feature matrix, one `[mean, stddev]` row per window.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    rows: Vec<[f32; COLUMNS]>,
}

impl FeatureVector {
    pub fn zeros(rows: usize) -> Self {
        Self {
            rows: vec![[0.0; COLUMNS]; rows],
        }
    }

    /// The deterministic answer for undecodable audio.
    pub fn fallback() -> Self {
        Self::zeros(FALLBACK_ROWS)
    }

    pub fn rows(&self) -> &[[f32; COLUMNS]] {
        &self.rows
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), COLUMNS)
    }

    pub fn to_npy(&self) -> Vec<u8> {
        let flat: Vec<f32> = self.rows.iter().flatten().copied().collect();
        npy::write_f32_matrix(self.shape(), &flat)
    }
}

fn window_stats(window: &[f32]) -> [f32; COLUMNS] {
    let n = window.len() as f64;
    let mean = window.iter().map(|s| *s as f64).sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|s| {
            let d = *s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    [mean as f32, variance.sqrt() as f32]
}

/// Compute `[mean, stddev]` per 2048-sample window.
///
/// There are `max(1, n / 2048)` rows. Whenever the buffer does not divide
/// evenly into windows, the last row is computed over the whole buffer
/// instead of the trailing partial window; a buffer shorter than one window
/// therefore yields a single whole-buffer row.
pub fn extract_window_features(samples: &[f32]) -> FeatureVector {
    if samples.is_empty() {
        return FeatureVector::zeros(1);
    }

    let count = (samples.len() / WINDOW_SIZE).max(1);
    let has_partial_tail = samples.len() % WINDOW_SIZE != 0;

    let rows = (0..count)
        .map(|i| {
            if has_partial_tail && i == count - 1 {
                window_stats(samples)
            } else {
                window_stats(&samples[i * WINDOW_SIZE..(i + 1) * WINDOW_SIZE])
            }
        })
        .collect();

    FeatureVector { rows }
}

/// Run extraction on the result of a decode attempt.
pub fn extract(decoded: Result<Vec<f32>, ExtractionError>) -> Result<FeatureVector, ExtractionError> {
    let samples = decoded?;
    if let Some(bad) = samples.iter().find(|s| !s.is_finite()) {
        return Err(ExtractionError::Samples(format!(
            "non-finite sample {}",
            bad
        )));
    }
    Ok(extract_window_features(&samples))
}

/// Features as returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeaturesResponse {
    pub audio_id: String,
    pub features: Vec<Vec<f64>>,
    pub shape: [usize; 2],
    pub dtype: String,
}

impl FeaturesResponse {
    pub fn from_vector(audio_id: &str, vector: &FeatureVector) -> Self {
        let (rows, cols) = vector.shape();
        Self {
            audio_id: audio_id.to_string(),
            features: vector
                .rows()
                .iter()
                .map(|row| row.iter().map(|v| *v as f64).collect())
                .collect(),
            shape: [rows, cols],
            dtype: Dtype::Float32.name().to_string(),
        }
    }

    pub fn from_npy(audio_id: &str, bytes: &[u8]) -> Result<Self, NpyError> {
        let NpyMatrix {
            shape,
            dtype,
            values,
        } = npy::read_matrix(bytes)?;
        let features = if shape.1 == 0 {
            vec![Vec::new(); shape.0]
        } else {
            values.chunks(shape.1).map(|row| row.to_vec()).collect()
        };
        Ok(Self {
            audio_id: audio_id.to_string(),
            features,
            shape: [shape.0, shape.1],
            dtype: dtype.name().to_string(),
        })
    }
}
