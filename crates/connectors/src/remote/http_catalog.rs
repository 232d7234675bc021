use async_trait::async_trait;
use catalog_core::rategate::RateGate;
use catalog_core::retry::RetryDisposition;
use model::{CanonicalProduct, MetaEntry, RemoteId, UpdatePayload, whitelist};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{BulkUpdateOutcome, RemoteCatalog};
use crate::error::{FailedUpdate, RemoteError, is_transient_reqwest_error};

#[derive(Debug, Deserialize)]
struct LookupResponseEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    sku: String,
    description: String,
    #[serde(default)]
    meta: Vec<MetaEntryWire>,
}

#[derive(Debug, Deserialize)]
struct MetaEntryWire {
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct BulkUpdateRequestEntry<'a> {
    remote_id: &'a str,
    sku: &'a str,
    description: &'a str,
    meta: &'a [MetaEntry],
}

#[derive(Debug, Deserialize)]
struct BulkUpdateResponseEntry {
    remote_id: String,
    success: bool,
}

/// [`RemoteCatalog`] implementation over the remote commerce API's HTTP
/// surface. All three operations are admitted through the same
/// [`RateGate`]; `bulk_update` additionally runs its own retry loop per
/// the widened backoff rule for HTTP 524.
pub struct HttpRemoteCatalog {
    client: reqwest::Client,
    base_url: String,
    rate_gate: RateGate,
}

impl HttpRemoteCatalog {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, rate_gate: RateGate) -> Self {
        HttpRemoteCatalog {
            client,
            base_url: base_url.into(),
            rate_gate,
        }
    }

    fn classify(err: &RemoteError) -> RetryDisposition {
        if err.is_transient() {
            RetryDisposition::Retry
        } else {
            RetryDisposition::Stop
        }
    }
}

#[async_trait]
impl RemoteCatalog for HttpRemoteCatalog {
    async fn lookup_id_by_part_number(
        &self,
        part_number: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<RemoteId>, RemoteError> {
        let client = self.client.clone();
        let url = format!("{}/products", self.base_url);
        let part_number = part_number.to_string();

        let entries = self
            .rate_gate
            .schedule(part_number.as_str(), Some("lookup_id_by_part_number"), cancel, || {
                let client = client.clone();
                let url = url.clone();
                let part_number = part_number.clone();
                async move {
                    let response = client
                        .get(&url)
                        .query(&[("part_number", part_number.as_str())])
                        .send()
                        .await
                        .and_then(reqwest::Response::error_for_status)
                        .map_err(|source| RemoteError::LookupFailed {
                            part_number: part_number.clone(),
                            source,
                        })?;
                    response
                        .json::<Vec<LookupResponseEntry>>()
                        .await
                        .map_err(|source| RemoteError::LookupFailed { part_number, source })
                }
            })
            .await
            .map_err(|_| RemoteError::UnexpectedResponse("rate gate cancelled".into()))??;

        Ok(entries.into_iter().next().map(|e| e.id))
    }

    async fn fetch_by_id(
        &self,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> Result<CanonicalProduct, RemoteError> {
        let client = self.client.clone();
        let url = format!("{}/products/{}", self.base_url, remote_id);
        let remote_id_owned = remote_id.to_string();

        let response = self
            .rate_gate
            .schedule(remote_id, Some("fetch_by_id"), cancel, || {
                let client = client.clone();
                let url = url.clone();
                let remote_id = remote_id_owned.clone();
                async move {
                    let response = client
                        .get(&url)
                        .send()
                        .await
                        .and_then(reqwest::Response::error_for_status)
                        .map_err(|source| RemoteError::FetchFailed {
                            remote_id: remote_id.clone(),
                            source,
                        })?;
                    response
                        .json::<ProductResponse>()
                        .await
                        .map_err(|source| RemoteError::FetchFailed { remote_id, source })
                }
            })
            .await
            .map_err(|_| RemoteError::UnexpectedResponse("rate gate cancelled".into()))??;

        Ok(project_to_whitelist(response))
    }

    async fn bulk_update(
        &self,
        payloads: Vec<UpdatePayload>,
        cancel: &CancellationToken,
    ) -> Result<Vec<BulkUpdateOutcome>, RemoteError> {
        let client = self.client.clone();
        let url = format!("{}/products/bulk_update", self.base_url);
        let retry = self.rate_gate.retry_policy().clone();
        let rate_gate = self.rate_gate.clone();

        let result = retry
            .run_with_backoff(
                move || {
                    let client = client.clone();
                    let url = url.clone();
                    let payloads = payloads.clone();
                    let rate_gate = rate_gate.clone();
                    let cancel = cancel.clone();
                    async move {
                        rate_gate
                            .schedule("bulk_update", Some("bulk_update"), &cancel, move || async move {
                                send_bulk_update(&client, &url, &payloads).await
                            })
                            .await
                            .map_err(|_| RemoteError::UnexpectedResponse("rate gate cancelled".into()))?
                    }
                },
                Self::classify,
                |err, default_delay| {
                    let is_524 = matches!(
                        err,
                        RemoteError::FetchFailed { source, .. }
                            if source.status().map(|s| s.as_u16()) == Some(524)
                    );
                    if is_524 {
                        default_delay * 2
                    } else {
                        default_delay
                    }
                },
            )
            .await;

        match result {
            Ok(outcomes) => Ok(outcomes),
            Err(catalog_core::retry::RetryError::Fatal(err)) | Err(catalog_core::retry::RetryError::AttemptsExceeded(err)) => {
                warn!(error = %err, "bulk_update failed permanently");
                Err(err)
            }
        }
    }
}

async fn send_bulk_update(
    client: &reqwest::Client,
    url: &str,
    payloads: &[UpdatePayload],
) -> Result<Vec<BulkUpdateOutcome>, RemoteError> {
    let entries: Vec<BulkUpdateRequestEntry<'_>> = payloads
        .iter()
        .map(|p| BulkUpdateRequestEntry {
            remote_id: &p.remote_id,
            sku: &p.sku,
            description: &p.description,
            meta: &p.meta_entries,
        })
        .collect();

    let response = client
        .post(url)
        .json(&entries)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|source| {
            if is_transient_reqwest_error(&source) {
                RemoteError::FetchFailed {
                    remote_id: "bulk".into(),
                    source,
                }
            } else {
                RemoteError::BulkFailed {
                    failed: payloads
                        .iter()
                        .map(|p| FailedUpdate {
                            part_number: p.part_number.clone(),
                            remote_id: p.remote_id.clone(),
                        })
                        .collect(),
                }
            }
        })?;

    let entries: Vec<BulkUpdateResponseEntry> =
        response.json().await.map_err(|source| RemoteError::FetchFailed {
            remote_id: "bulk".into(),
            source,
        })?;

    Ok(entries
        .into_iter()
        .map(|e| BulkUpdateOutcome {
            remote_id: e.remote_id,
            success: e.success,
        })
        .collect())
}

fn project_to_whitelist(response: ProductResponse) -> CanonicalProduct {
    let meta_entries = response
        .meta
        .into_iter()
        .filter(|entry| {
            whitelist::META_MAPPING
                .iter()
                .any(|(key, _)| *key == entry.key.as_str())
        })
        .map(|entry| MetaEntry {
            key: entry.key,
            value: entry.value,
        })
        .collect();

    CanonicalProduct {
        sku: response.sku,
        description: response.description,
        meta_entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_only_whitelisted_meta_keys() {
        let response = ProductResponse {
            sku: "s1".into(),
            description: "d1".into(),
            meta: vec![
                MetaEntryWire {
                    key: whitelist::META_MAPPING[0].0.to_string(),
                    value: "v1".into(),
                },
                MetaEntryWire {
                    key: "not_whitelisted".into(),
                    value: "v2".into(),
                },
            ],
        };

        let product = project_to_whitelist(response);
        assert_eq!(product.meta_entries.len(), 1);
        assert_eq!(product.meta_entries[0].key, whitelist::META_MAPPING[0].0);
    }
}
