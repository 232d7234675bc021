use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Normalizes a CSV header the way every feed's first pass does: trim,
/// lowercase, and collapse runs of whitespace into a single underscore.
pub fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_space = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push('_');
            }
            last_was_space = true;
        } else {
            out.push(ch.to_ascii_lowercase());
            last_was_space = false;
        }
    }
    if out.ends_with('_') {
        out.pop();
    }
    out
}

/// A single CSV data row, keyed by normalized header. The header list is
/// shared (via `Arc`) across every row in a feed so per-row allocation is
/// limited to the cell values themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    headers: Arc<[String]>,
    cells: Vec<String>,
}

impl Row {
    pub fn new(headers: Arc<[String]>, cells: Vec<String>) -> Self {
        Row { headers, cells }
    }

    /// Looks up a cell by normalized column name. Returns `None` if the
    /// column was never present in the feed's header row; returns
    /// `Some("")` if the column exists but this row's cell is empty.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|idx| self.cells.get(idx).map(String::as_str).unwrap_or(""))
    }

    /// A row is missing `part_number` if the column is absent or blank
    /// after trimming.
    pub fn missing_part_number(&self) -> bool {
        match self.get("part_number") {
            Some(v) => v.trim().is_empty(),
            None => true,
        }
    }

    pub fn headers(&self) -> &Arc<[String]> {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trim_case_and_whitespace() {
        assert_eq!(normalize_header("  Part Number "), "part_number");
        assert_eq!(normalize_header("Product   Description"), "product_description");
        assert_eq!(normalize_header("SKU"), "sku");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["Part Number", "  spq ", "Operating Temp", "already_normal"] {
            let once = normalize_header(raw);
            let twice = normalize_header(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn missing_part_number_detects_absent_and_blank() {
        let headers: Arc<[String]> = Arc::from(vec!["sku".to_string()]);
        let row = Row::new(headers, vec!["abc".to_string()]);
        assert!(row.missing_part_number());

        let headers: Arc<[String]> = Arc::from(vec!["part_number".to_string()]);
        let row = Row::new(headers.clone(), vec!["   ".to_string()]);
        assert!(row.missing_part_number());

        let row = Row::new(headers, vec!["X-1".to_string()]);
        assert!(!row.missing_part_number());
    }
}
