//! Table reconstruction: TABLE → CELL graph into dense rectangular grids.
//!
//! Backends omit cells they consider empty or spanned, so the set of
//! reported `(row, col)` pairs is often ragged. The grid is always filled
//! densely over `1..=max_row × 1..=max_col`, with `""` for every slot no
//! cell claimed, so every row of a table has the same length.

use super::index::BlockIndex;
use super::text::{contribution, join_contributions, resolve_text};
use crate::block::{Block, BlockKind, Relation};
use crate::output::Table;
use std::collections::HashMap;

/// Every TABLE block in collection order, indexed from 0 by encounter.
pub fn tables(blocks: &[Block], index: &BlockIndex<'_>) -> Vec<Table> {
    blocks
        .iter()
        .filter(|b| b.is_table())
        .enumerate()
        .map(|(i, table)| Table {
            index: i,
            rows: table_rows(table, index),
        })
        .collect()
}

fn table_rows(table: &Block, index: &BlockIndex<'_>) -> Vec<Vec<String>> {
    let mut cells: HashMap<(u32, u32), String> = HashMap::new();
    let mut max_row = 0;
    let mut max_col = 0;

    for cell in index.children(table, Relation::Child) {
        if !matches!(cell.kind, BlockKind::Cell { .. }) {
            continue;
        }
        // A cell missing either coordinate has nowhere to go.
        let Some((row, col)) = cell.cell_position() else {
            continue;
        };
        max_row = max_row.max(row);
        max_col = max_col.max(col);
        cells.insert((row, col), cell_text(cell, index));
    }

    (1..=max_row)
        .map(|r| {
            (1..=max_col)
                .map(|c| cells.remove(&(r, c)).unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Generic resolution first; when that comes back empty, walk the cell's
/// CHILD ids directly so a cell holding only a selection mark still reads.
fn cell_text(cell: &Block, index: &BlockIndex<'_>) -> String {
    let text = resolve_text(cell, index);
    if !text.is_empty() {
        return text;
    }
    join_contributions(
        cell.related_ids(Relation::Child)
            .filter_map(|id| index.get(id))
            .filter_map(contribution),
    )
}
