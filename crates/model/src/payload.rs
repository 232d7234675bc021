use serde::{Deserialize, Serialize};

pub type RemoteId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

/// The payload the reconciler hands to `RemoteCatalog::bulk_update` for a
/// single row. `meta_entries` always walks `whitelist::META_MAPPING` in
/// order, even when a source column is blank, so positional diffs against
/// a previous run stay meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub remote_id: RemoteId,
    pub part_number: String,
    pub sku: String,
    pub description: String,
    pub meta_entries: Vec<MetaEntry>,
}

/// The whitelisted projection of a remote product, as returned by
/// `RemoteCatalog::fetch_by_id` and used only for diffing. `meta_entries`
/// here has already been filtered to the whitelist by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalProduct {
    pub sku: String,
    pub description: String,
    pub meta_entries: Vec<MetaEntry>,
}

impl CanonicalProduct {
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta_entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}
