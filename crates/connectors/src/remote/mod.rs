mod http_catalog;

pub use http_catalog::HttpRemoteCatalog;

use async_trait::async_trait;
use model::{CanonicalProduct, RemoteId, UpdatePayload};
use tokio_util::sync::CancellationToken;

use crate::error::RemoteError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpdateOutcome {
    pub remote_id: RemoteId,
    pub success: bool,
}

/// Narrow façade over the remote commerce catalog. Every operation is
/// expected to flow through a `RateGate` in the concrete implementation;
/// the trait itself says nothing about admission or retries so it can be
/// faked cheaply in tests. `cancel` is threaded through from the caller so
/// cancellation propagates into the RateGate admission wait.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn lookup_id_by_part_number(
        &self,
        part_number: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<RemoteId>, RemoteError>;

    async fn fetch_by_id(
        &self,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> Result<CanonicalProduct, RemoteError>;

    async fn bulk_update(
        &self,
        payloads: Vec<UpdatePayload>,
        cancel: &CancellationToken,
    ) -> Result<Vec<BulkUpdateOutcome>, RemoteError>;
}
