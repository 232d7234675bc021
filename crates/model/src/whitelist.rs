//! The fixed source-column -> payload-location mapping from the remote
//! update contract. Identical on both sides of a diff: what gets emitted
//! (from a CSV row) and what gets projected (from the remote product) walk
//! the same meta-key list, so the comparison is whitelist-symmetric.

/// Source columns recognized on a feed row besides `part_number` (required)
/// and `sku` / `product_description` (top-level payload fields).
pub const RECOGNIZED_COLUMNS: &[&str] = &[
    "sku",
    "product_description",
    "spq",
    "manufacturer",
    "image_url",
    "datasheet_url",
    "series_url",
    "series",
    "quantity",
    "operating_temp",
    "supply_voltage",
    "packaging_type",
    "supplier_device_package",
    "mounting_type",
    "long_description",
    "additional_info",
];

/// `(meta_key, source_column)` pairs, in payload emission order. This is
/// the whitelist referenced throughout the reconciler: it is walked once to
/// build a new payload's `meta_entries` and again to filter a fetched
/// product's entries down to the comparable projection.
pub const META_MAPPING: &[(&str, &str)] = &[
    ("spq", "spq"),
    ("manufacturer", "manufacturer"),
    ("image_url", "image_url"),
    ("datasheet_url", "datasheet_url"),
    ("series_url", "series_url"),
    ("series", "series"),
    ("quantity", "quantity"),
    ("operating_temperature", "operating_temp"),
    ("voltage", "supply_voltage"),
    ("package", "packaging_type"),
    ("supplier_device_package", "supplier_device_package"),
    ("mounting_type", "mounting_type"),
    ("short_description", "product_description"),
    ("detail_description", "long_description"),
    ("additional_key_information", "additional_info"),
];

pub const SKU_COLUMN: &str = "sku";
pub const DESCRIPTION_COLUMN: &str = "product_description";
pub const PART_NUMBER_COLUMN: &str = "part_number";

/// Returns the set of meta keys participating in the diff, for symmetric
/// filtering of a remote product's entries.
pub fn meta_keys() -> impl Iterator<Item = &'static str> {
    META_MAPPING.iter().map(|(key, _)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_mapping_keys_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for (key, _) in META_MAPPING {
            assert!(seen.insert(*key), "duplicate meta key: {key}");
        }
    }
}
