//! Plain-text reconstruction and generic block → text resolution.

use super::index::BlockIndex;
use crate::block::{Block, BlockKind, Relation};

/// Text contributed by a selected selection mark.
pub const SELECTED_MARK: &str = "X";

/// Every LINE's text in collection order, newline-joined and trimmed.
///
/// Collection order is the backend's emission order, not a geometric
/// reading order; no layout sorting is attempted.
pub fn plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter(|b| b.is_line())
        .map(|b| b.text.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Resolve the text a block stands for.
///
/// With CHILD relations: WORD children contribute their text, selected
/// marks contribute [`SELECTED_MARK`], everything else nothing; the pieces
/// are space-joined and trimmed. Without CHILD relations the block's own
/// `text` is used.
pub fn resolve_text(block: &Block, index: &BlockIndex<'_>) -> String {
    if !block.has_relation(Relation::Child) {
        return block.text.clone().unwrap_or_default();
    }
    join_contributions(
        index
            .children(block, Relation::Child)
            .into_iter()
            .filter_map(contribution),
    )
}

/// What a single child adds to its parent's text.
pub(crate) fn contribution(child: &Block) -> Option<&str> {
    match child.kind {
        BlockKind::Word => child.text.as_deref(),
        BlockKind::SelectionMark { selected: true } => Some(SELECTED_MARK),
        _ => None,
    }
}

pub(crate) fn join_contributions<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces.collect::<Vec<_>>().join(" ").trim().to_string()
}
