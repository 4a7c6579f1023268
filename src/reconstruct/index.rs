//! Id lookup over one block collection.
//!
//! Built once per collection in a single pass. Every reconstructor resolves
//! relationships through it instead of re-scanning the list, which keeps a
//! whole reconstruction O(n) in the number of blocks plus edges.

use crate::block::{Block, Relation};
use std::collections::HashMap;

/// Borrowing index: `id → &Block`, plus relation-aware child resolution.
#[derive(Debug)]
pub struct BlockIndex<'a> {
    by_id: HashMap<&'a str, &'a Block>,
}

impl<'a> BlockIndex<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        let by_id = blocks.iter().map(|b| (b.id.as_str(), b)).collect();
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&'a Block> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Children of the block with `id` for one relation, in source order.
    ///
    /// An unknown `id` or a dangling target contributes nothing.
    pub fn children_of(&self, id: &str, relation: Relation) -> Vec<&'a Block> {
        match self.get(id) {
            Some(block) => self.children(block, relation),
            None => Vec::new(),
        }
    }

    /// Same as [`children_of`](Self::children_of) for a block already in hand.
    pub fn children(&self, block: &Block, relation: Relation) -> Vec<&'a Block> {
        block
            .related_ids(relation)
            .filter_map(|id| self.get(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::build::*;

    #[test]
    fn children_preserve_source_order_across_groups() {
        let blocks = vec![
            word("w1", "a"),
            word("w2", "b"),
            word("w3", "c"),
            line("l", "a b c")
                .with(Relation::Child, &["w3", "w1"])
                .with(Relation::Child, &["w2"]),
        ];
        let index = BlockIndex::new(&blocks);
        let ids: Vec<&str> = index
            .children_of("l", Relation::Child)
            .iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(ids, vec!["w3", "w1", "w2"]);
    }

    #[test]
    fn dangling_and_unknown_ids_resolve_to_nothing() {
        let blocks = vec![line("l", "x").with(Relation::Child, &["ghost"])];
        let index = BlockIndex::new(&blocks);
        assert!(index.children_of("l", Relation::Child).is_empty());
        assert!(index.children_of("missing", Relation::Child).is_empty());
        assert!(index.get("ghost").is_none());
    }

    #[test]
    fn relations_are_kept_apart() {
        let blocks = vec![
            word("w", "Name"),
            value("v", &[]),
            key("k", &["w"], &["v"]),
        ];
        let index = BlockIndex::new(&blocks);
        assert_eq!(index.children_of("k", Relation::Child)[0].id, "w");
        assert_eq!(index.children_of("k", Relation::ValueLink)[0].id, "v");
        assert_eq!(index.len(), 3);
    }
}
