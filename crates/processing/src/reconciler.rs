use std::sync::Arc;

use connectors::RemoteCatalog;
use model::{CanonicalProduct, MetaEntry, Row, UpdatePayload, whitelist};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ReconcileError;
use crate::normalize::normalize_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingPart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    /// Lookup returned no matching product for the part number.
    NotFound,
    /// Lookup itself failed (transport error after retries exhausted).
    Lookup,
    /// `fetch_by_id` failed after retries exhausted.
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skip(SkipReason),
    Fail(FailReason),
    NoChange,
    Update(UpdatePayload),
}

/// Per-row lookup -> diff -> emit logic. Holds no state of its own besides
/// the remote catalog handle; every call is independent and safe to run
/// concurrently across rows of the same batch.
pub struct Reconciler<R> {
    remote: Arc<R>,
}

impl<R: RemoteCatalog> Reconciler<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Reconciler { remote }
    }

    pub async fn reconcile(&self, row: &Row, cancel: &CancellationToken) -> Outcome {
        if row.missing_part_number() {
            return Outcome::Skip(SkipReason::MissingPart);
        }
        let part_number = row.get(whitelist::PART_NUMBER_COLUMN).unwrap_or_default();

        let remote_id = match self.remote.lookup_id_by_part_number(part_number, cancel).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(part_number, "lookup returned no match");
                return Outcome::Fail(FailReason::NotFound);
            }
            Err(source) => {
                let err = ReconcileError::Lookup {
                    part_number: part_number.to_string(),
                    source,
                };
                debug!(part_number, error = %err, "lookup failed");
                return Outcome::Fail(FailReason::Lookup);
            }
        };

        let current = match self.remote.fetch_by_id(&remote_id, cancel).await {
            Ok(product) => product,
            Err(source) => {
                let err = ReconcileError::Fetch {
                    remote_id: remote_id.clone(),
                    source,
                };
                debug!(remote_id, error = %err, "fetch failed");
                return Outcome::Fail(FailReason::Fetch);
            }
        };

        let new_payload = build_payload(remote_id, row);
        if payloads_match(&current, &new_payload) {
            Outcome::NoChange
        } else {
            Outcome::Update(new_payload)
        }
    }
}

fn build_payload(remote_id: String, row: &Row) -> UpdatePayload {
    let part_number = row.get(whitelist::PART_NUMBER_COLUMN).unwrap_or_default().to_string();
    let sku = row.get(whitelist::SKU_COLUMN).unwrap_or_default().to_string();
    let description = row.get(whitelist::DESCRIPTION_COLUMN).unwrap_or_default().to_string();
    let meta_entries = whitelist::META_MAPPING
        .iter()
        .map(|(meta_key, source_column)| MetaEntry {
            key: (*meta_key).to_string(),
            value: row.get(source_column).unwrap_or_default().to_string(),
        })
        .collect();

    UpdatePayload {
        remote_id,
        part_number,
        sku,
        description,
        meta_entries,
    }
}

/// Whitelist-symmetric comparison: `id`/`part_number` never participate;
/// every other field is compared under text normalization. A meta key
/// present only on the current product (not in the whitelist walk) is
/// ignored -- the update is non-destructive.
fn payloads_match(current: &CanonicalProduct, new_payload: &UpdatePayload) -> bool {
    if normalize_text(&current.sku) != normalize_text(&new_payload.sku) {
        return false;
    }
    if normalize_text(&current.description) != normalize_text(&new_payload.description) {
        return false;
    }
    new_payload.meta_entries.iter().all(|entry| {
        let current_value = current.meta_value(&entry.key).unwrap_or("");
        normalize_text(current_value) == normalize_text(&entry.value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::BulkUpdateOutcome;
    use connectors::error::RemoteError;
    use model::RemoteId;
    use std::sync::Arc as StdArc;

    struct FakeRemote {
        lookup: Option<RemoteId>,
        product: CanonicalProduct,
    }

    #[async_trait]
    impl RemoteCatalog for FakeRemote {
        async fn lookup_id_by_part_number(
            &self,
            _part_number: &str,
            _cancel: &CancellationToken,
        ) -> Result<Option<RemoteId>, RemoteError> {
            Ok(self.lookup.clone())
        }

        async fn fetch_by_id(
            &self,
            _remote_id: &str,
            _cancel: &CancellationToken,
        ) -> Result<CanonicalProduct, RemoteError> {
            Ok(self.product.clone())
        }

        async fn bulk_update(
            &self,
            _payloads: Vec<UpdatePayload>,
            _cancel: &CancellationToken,
        ) -> Result<Vec<BulkUpdateOutcome>, RemoteError> {
            unimplemented!("not exercised by reconciler tests")
        }
    }

    fn row_with(headers: &[&str], cells: &[&str]) -> Row {
        let headers: std::sync::Arc<[String]> =
            std::sync::Arc::from(headers.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        Row::new(headers, cells.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn missing_part_number_is_skipped_without_a_remote_call() {
        let remote = StdArc::new(FakeRemote {
            lookup: None,
            product: CanonicalProduct::default(),
        });
        let reconciler = Reconciler::new(remote);
        let row = row_with(&["sku"], &["s1"]);
        let outcome = reconciler.reconcile(&row, &CancellationToken::new()).await;
        assert_eq!(outcome, Outcome::Skip(SkipReason::MissingPart));
    }

    #[tokio::test]
    async fn absent_lookup_result_fails_as_not_found() {
        let remote = StdArc::new(FakeRemote {
            lookup: None,
            product: CanonicalProduct::default(),
        });
        let reconciler = Reconciler::new(remote);
        let row = row_with(&["part_number", "sku"], &["X-1", "s1"]);
        let outcome = reconciler.reconcile(&row, &CancellationToken::new()).await;
        assert_eq!(outcome, Outcome::Fail(FailReason::NotFound));
    }

    #[tokio::test]
    async fn identical_projection_yields_no_change() {
        let remote = StdArc::new(FakeRemote {
            lookup: Some("42".to_string()),
            product: CanonicalProduct {
                sku: "s1".to_string(),
                description: String::new(),
                meta_entries: whitelist::META_MAPPING
                    .iter()
                    .map(|(key, _)| MetaEntry {
                        key: key.to_string(),
                        value: String::new(),
                    })
                    .collect(),
            },
        });
        let reconciler = Reconciler::new(remote);
        let row = row_with(&["part_number", "sku"], &["X-1", "s1"]);
        let outcome = reconciler.reconcile(&row, &CancellationToken::new()).await;
        assert_eq!(outcome, Outcome::NoChange);
    }

    #[tokio::test]
    async fn differing_sku_yields_update() {
        let remote = StdArc::new(FakeRemote {
            lookup: Some("42".to_string()),
            product: CanonicalProduct {
                sku: "sku-old".to_string(),
                description: String::new(),
                meta_entries: Vec::new(),
            },
        });
        let reconciler = Reconciler::new(remote);
        let row = row_with(&["part_number", "sku"], &["X-1", "sku-new"]);
        let outcome = reconciler.reconcile(&row, &CancellationToken::new()).await;
        match outcome {
            Outcome::Update(payload) => {
                assert_eq!(payload.sku, "sku-new");
                assert_eq!(payload.remote_id, "42");
                assert_eq!(payload.meta_entries.len(), whitelist::META_MAPPING.len());
            }
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn html_and_entity_differences_alone_are_not_material() {
        let remote = StdArc::new(FakeRemote {
            lookup: Some("42".to_string()),
            product: CanonicalProduct {
                sku: "s1".to_string(),
                description: "Rated 90°C".to_string(),
                meta_entries: Vec::new(),
            },
        });
        let reconciler = Reconciler::new(remote);
        let row = row_with(
            &["part_number", "sku", "product_description"],
            &["X-1", "s1", "<b>Rated</b> 90&deg;C"],
        );
        let outcome = reconciler.reconcile(&row, &CancellationToken::new()).await;
        assert_eq!(outcome, Outcome::NoChange);
    }
}
