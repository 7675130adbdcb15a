mod codec;
mod error;
mod features;
mod index;
mod mime;
mod npy;
mod remote;
mod request;
mod service;
mod settings;
mod store;

pub use codec::{pcm_s16le_to_samples, AudioCodec, ConversionError, FfmpegCodec, SUPPORTED_FORMATS};
pub use error::{ContentError, ContentResult, ExtractionError};
pub use features::{
    extract, extract_window_features, FeatureVector, FeaturesResponse, FALLBACK_ROWS, WINDOW_SIZE,
};
pub use index::{load_index, rebuild_index, ContentIndex, IndexItem, ScannedIndex};
pub use mime::{content_type_for_extension, content_type_for_path, OCTET_STREAM};
pub use npy::{read_matrix, write_f32_matrix, Dtype, NpyError, NpyMatrix};
pub use remote::{BucketStore, RemoteStore};
pub use request::{CacheKey, ContentKind, ContentRequest};
pub use service::{ContentAccessService, ContentFile, Resolution, ResolvedFeatures};
pub use settings::{ContentMode, ContentSettings};
pub use store::{is_safe_segment, ContentRoot, DerivedCache};

#[cfg(test)]
pub(crate) use service::tests::FakeCodec;
