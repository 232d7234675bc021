use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IngestError;

/// Narrow contract this crate consumes from whatever object-store SDK is
/// wired in at the binary edge: listing a bucket prefix and fetching a
/// whole object body. The concrete SDK is never named here.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists object keys directly under `prefix` (non-recursive), in no
    /// particular order.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, IngestError>;

    /// Fetches the full body of one object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, IngestError>;
}
