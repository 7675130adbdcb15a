//! Shared constants for end-to-end tests
//!
//! When the fixture content tree changes, update only this file.

// ============================================================================
// Audio
// ============================================================================

pub const AUDIO_CATEGORY: &str = "master";
pub const AUDIO_SPECIES: &str = "elk";

/// Plain WAV served from `audio/master/elk/`
pub const BUGLE_FILE: &str = "bugle.wav";

/// Game call with decodable samples, `audio/game-calls/master/elk/bull1.wav`
pub const BULL_ID: &str = "bull1";

/// Number of PCM samples in the bull1 recording
pub const BULL_SAMPLE_COUNT: usize = 3 * 2048 + 100;

/// Game call whose bytes cannot be decoded
pub const BROKEN_ID: &str = "grunt";

/// Audio id with a precomputed feature matrix shipped in the content root
pub const PRECOMPUTED_ID: &str = "cow";

/// Size of the generated WAV header
pub const WAV_HEADER_SIZE: usize = 44;

// ============================================================================
// Icons and documents
// ============================================================================

pub const ICON_CATEGORY: &str = "species";
pub const PAPER_CATEGORY: &str = "elk";
pub const PAPER_ID: &str = "rut-2019";
pub const PAPER_EXTRACT: &str = "figure-1.png";

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 25;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
