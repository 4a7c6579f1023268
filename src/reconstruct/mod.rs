//! Reconstruction of structured views from an ingested block collection.
//!
//! Each submodule derives exactly one view. All of them are pure functions
//! of an immutable `&[Block]`: no I/O, no shared state, deterministic output.
//! Independent collections can be reconstructed concurrently without
//! coordination.
//!
//! ## Data Flow
//!
//! ```text
//!              ┌──▶ text   ──▶ plain_text
//! blocks ──▶ index ┼──▶ table  ──▶ tables
//!              └──▶ form   ──▶ forms
//! ```
//!
//! 1. [`index`]: `id → block` lookup built once per collection
//! 2. [`text`]: LINE concatenation and the generic block → text resolver
//! 3. [`table`]: TABLE/CELL graph into dense rectangular grids
//! 4. [`form`]: KEY/VALUE graph into a key → value map

pub mod form;
pub mod index;
pub mod table;
pub mod text;

pub use index::BlockIndex;

use crate::block::Block;
use crate::config::DuplicateKeyPolicy;
use crate::output::ExtractionResult;

/// Build all three views over one collection, sharing a single index.
pub fn reconstruct(blocks: &[Block], duplicate_keys: DuplicateKeyPolicy) -> ExtractionResult {
    let index = BlockIndex::new(blocks);
    ExtractionResult {
        plain_text: text::plain_text(blocks),
        tables: table::tables(blocks, &index),
        forms: form::forms(blocks, &index, duplicate_keys),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::build::*;
    use crate::block::Relation;

    fn invoice() -> Vec<Block> {
        vec![
            line("l1", "INVOICE"),
            line("l2", "Name: Alice"),
            word("wk", "Name:"),
            word("wv", "Alice"),
            word("h1", "Item"),
            word("h2", "Qty"),
            word("r1", "Widget"),
            mark("paid", true),
            value("v", &["wv"]),
            key("k", &["wk"], &["v"]),
            cell("c11", 1, 1, &["h1"]),
            cell("c12", 1, 2, &["h2"]),
            cell("c21", 2, 1, &["r1"]),
            cell("c22", 2, 2, &["paid"]),
            table("t", &["c11", "c12", "c21", "c22"]),
            other("p", crate::block::BlockKind::Page, None)
                .with(Relation::Child, &["l1", "l2"]),
        ]
    }

    #[test]
    fn reconstruct_builds_all_views() {
        let result = reconstruct(&invoice(), DuplicateKeyPolicy::LastWriteWins);
        assert_eq!(result.plain_text, "INVOICE\nName: Alice");
        assert_eq!(result.tables.len(), 1);
        assert_eq!(
            result.tables[0].rows,
            vec![vec!["Item", "Qty"], vec!["Widget", "X"]]
        );
        assert_eq!(result.forms["Name:"], "Alice");
    }

    #[test]
    fn reconstruct_is_deterministic() {
        let blocks = invoice();
        let first = reconstruct(&blocks, DuplicateKeyPolicy::LastWriteWins);
        let second = reconstruct(&blocks, DuplicateKeyPolicy::LastWriteWins);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
