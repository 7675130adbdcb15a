//! Remote object store collaborator used in hybrid and s3 modes.

/// Location of content in a remote object store.
///
/// The content bridge only needs to name where an object would live; it
/// never fetches from the remote side, so a hybrid-mode miss is reported as
/// unimplemented rather than served.
pub trait RemoteStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Public URL of `key`, typically through a CDN.
    fn object_url(&self, key: &str) -> String;
}

/// An S3 bucket fronted by a CDN.
#[derive(Debug, Clone)]
pub struct BucketStore {
    bucket: String,
    cdn_url: String,
}

impl BucketStore {
    pub fn new<B: Into<String>, U: Into<String>>(bucket: B, cdn_url: U) -> Self {
        Self {
            bucket: bucket.into(),
            cdn_url: cdn_url.into(),
        }
    }
}

impl RemoteStore for BucketStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.cdn_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}
