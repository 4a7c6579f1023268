//! Result types handed to downstream consumers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The unified view of one analysed document.
///
/// Produced once per input and never mutated afterwards. `forms` is a
/// `BTreeMap` so serialising the same result twice yields identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// LINE text in backend emission order, newline-joined.
    pub plain_text: String,
    /// Tables in encounter order.
    pub tables: Vec<Table>,
    /// Key text → value text.
    pub forms: BTreeMap<String, String>,
}

impl ExtractionResult {
    /// A result that carries text only (plain-text inputs, text detection).
    pub fn text_only(plain_text: impl Into<String>) -> Self {
        Self {
            plain_text: plain_text.into(),
            ..Self::default()
        }
    }

    /// True when no view holds any content.
    pub fn is_empty(&self) -> bool {
        self.plain_text.is_empty() && self.tables.is_empty() && self.forms.is_empty()
    }
}

/// One reconstructed table; every row has the same number of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Zero-based position among the document's tables.
    pub index: usize,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at 1-based `(row, col)`, matching backend coordinates.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row.checked_sub(1)?)?
            .get(col.checked_sub(1)?)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Table {
        Table {
            index: 0,
            rows: vec![
                vec!["a".into(), "b".into()],
                vec!["c".into(), String::new()],
            ],
        }
    }

    #[test]
    fn table_dimensions() {
        let t = grid();
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.column_count(), 2);
        assert!(!t.is_empty());
    }

    #[test]
    fn cell_uses_one_based_coordinates() {
        let t = grid();
        assert_eq!(t.cell(1, 2), Some("b"));
        assert_eq!(t.cell(2, 2), Some(""));
        assert_eq!(t.cell(0, 1), None);
        assert_eq!(t.cell(3, 1), None);
    }

    #[test]
    fn text_only_result() {
        let r = ExtractionResult::text_only("hello");
        assert_eq!(r.plain_text, "hello");
        assert!(r.tables.is_empty() && r.forms.is_empty());
        assert!(!r.is_empty());
        assert!(ExtractionResult::default().is_empty());
    }

    #[test]
    fn result_serialises_with_snake_case_fields() {
        let r = ExtractionResult::text_only("x");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["plain_text"], "x");
        assert!(json["tables"].as_array().unwrap().is_empty());
        assert!(json["forms"].as_object().unwrap().is_empty());
    }
}
