//! Block data model and ingestion.
//!
//! Backends return a flat list of loosely-typed records (the Textract wire
//! shape: `BlockType`, `Id`, `Text`, `Relationships`, …) where most fields
//! are optional and only meaningful for certain block types. Ingestion turns
//! that list into the closed [`Block`] type exactly once, so reconstruction
//! never has to second-guess a field:
//!
//! ```text
//! RawBlock (serde, every field optional)
//!    │  ingest(): ids present + unique, selection status known,
//!    │            coordinates 0 → absent, roles classified
//!    ▼
//! Block { id, kind: BlockKind::{Word, Cell{row,col}, …}, text, relationships }
//! ```
//!
//! Relationship targets are *not* checked here: a dangling id is a normal
//! backend artefact and resolves to "no contribution" during reconstruction.

use crate::error::BlockError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One annotation unit of an analysis result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
    pub text: Option<String>,
    pub relationships: Vec<Relationship>,
}

/// The block type, carrying the fields that only exist for that type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Page,
    Line,
    Word,
    SelectionMark { selected: bool },
    Table,
    /// 1-based coordinates; `None` when the backend did not report one.
    Cell { row: Option<u32>, col: Option<u32> },
    /// `role` is `None` when the entry is tagged both KEY and VALUE, or neither.
    KeyValueEntry { role: Option<EntryRole> },
    Other,
}

/// Role of a key/value entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryRole {
    Key,
    Value,
}

/// Edge type between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Containment (table → cell, cell → word, …).
    Child,
    /// Key → value pairing.
    ValueLink,
}

/// An ordered group of target ids sharing one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub relation: Relation,
    pub ids: Vec<String>,
}

impl Block {
    /// Selection state; `None` for anything that is not a selection mark.
    pub fn selected(&self) -> Option<bool> {
        match self.kind {
            BlockKind::SelectionMark { selected } => Some(selected),
            _ => None,
        }
    }

    /// Key/value role; `None` for non-entries and unclassified entries.
    pub fn role(&self) -> Option<EntryRole> {
        match self.kind {
            BlockKind::KeyValueEntry { role } => role,
            _ => None,
        }
    }

    /// `(row, col)` when this is a cell with both coordinates.
    pub fn cell_position(&self) -> Option<(u32, u32)> {
        match self.kind {
            BlockKind::Cell {
                row: Some(row),
                col: Some(col),
            } => Some((row, col)),
            _ => None,
        }
    }

    /// Whether any relationship of the given type is present.
    pub fn has_relation(&self, relation: Relation) -> bool {
        self.relationships.iter().any(|r| r.relation == relation)
    }

    /// Target ids of every relationship of the given type, in source order.
    pub fn related_ids(&self, relation: Relation) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(move |r| r.relation == relation)
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }

    pub fn is_line(&self) -> bool {
        matches!(self.kind, BlockKind::Line)
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind, BlockKind::Table)
    }

    pub fn is_key_value_entry(&self) -> bool {
        matches!(self.kind, BlockKind::KeyValueEntry { .. })
    }
}

// ── Wire shape ───────────────────────────────────────────────────────────

/// A block exactly as the backend serialises it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RawRelationship>,
}

/// A relationship exactly as the backend serialises it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawRelationship {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

// ── Ingestion ────────────────────────────────────────────────────────────

/// Validate a raw collection and convert it into [`Block`]s, preserving order.
///
/// # Errors
/// - [`BlockError::MissingId`] for a block with no (or an empty) id
/// - [`BlockError::DuplicateId`] when two blocks share an id
/// - [`BlockError::MissingField`] / [`BlockError::InvalidField`] for a
///   selection element without a recognised `SelectionStatus`
/// - [`BlockError::InvalidField`] for a cell coordinate larger than the
///   collection itself
pub fn ingest(raw: Vec<RawBlock>) -> Result<Vec<Block>, BlockError> {
    // No table can have more rows or columns than there are blocks.
    let max_coordinate = raw.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut blocks = Vec::with_capacity(raw.len());

    for (position, rb) in raw.into_iter().enumerate() {
        let id = match rb.id {
            Some(ref id) if !id.is_empty() => id.clone(),
            _ => return Err(BlockError::MissingId { position }),
        };
        if !seen.insert(id.clone()) {
            return Err(BlockError::DuplicateId { id });
        }

        let kind = block_kind(&id, &rb, max_coordinate)?;
        let relationships = rb
            .relationships
            .into_iter()
            .filter_map(|r| {
                relation_from_wire(&r.kind).map(|relation| Relationship {
                    relation,
                    ids: r.ids,
                })
            })
            .collect();

        blocks.push(Block {
            id,
            kind,
            text: rb.text,
            relationships,
        });
    }

    Ok(blocks)
}

/// Decode a JSON array of raw blocks and ingest it.
pub fn parse_blocks(json: &[u8]) -> Result<Vec<Block>, BlockError> {
    let raw: Vec<RawBlock> =
        serde_json::from_slice(json).map_err(|e| BlockError::Json(e.to_string()))?;
    ingest(raw)
}

fn block_kind(id: &str, rb: &RawBlock, max_coordinate: usize) -> Result<BlockKind, BlockError> {
    let kind = match rb.block_type.as_str() {
        "PAGE" => BlockKind::Page,
        "LINE" => BlockKind::Line,
        "WORD" => BlockKind::Word,
        "SELECTION_ELEMENT" => {
            let status = rb
                .selection_status
                .as_deref()
                .ok_or_else(|| BlockError::MissingField {
                    id: id.to_string(),
                    field: "SelectionStatus",
                })?;
            let selected = match status {
                "SELECTED" => true,
                "NOT_SELECTED" => false,
                other => {
                    return Err(BlockError::InvalidField {
                        id: id.to_string(),
                        field: "SelectionStatus",
                        value: other.to_string(),
                    })
                }
            };
            BlockKind::SelectionMark { selected }
        }
        "TABLE" => BlockKind::Table,
        "CELL" => BlockKind::Cell {
            row: coordinate(id, "RowIndex", rb.row_index, max_coordinate)?,
            col: coordinate(id, "ColumnIndex", rb.column_index, max_coordinate)?,
        },
        "KEY_VALUE_SET" => {
            let is_key = rb.entity_types.iter().any(|t| t == "KEY");
            let is_value = rb.entity_types.iter().any(|t| t == "VALUE");
            let role = match (is_key, is_value) {
                (true, false) => Some(EntryRole::Key),
                (false, true) => Some(EntryRole::Value),
                _ => None,
            };
            BlockKind::KeyValueEntry { role }
        }
        _ => BlockKind::Other,
    };
    Ok(kind)
}

/// `0` reads as absent; anything past `max` is rejected.
fn coordinate(
    id: &str,
    field: &'static str,
    value: Option<u32>,
    max: usize,
) -> Result<Option<u32>, BlockError> {
    match value.filter(|&v| v > 0) {
        Some(v) if v as usize > max => Err(BlockError::InvalidField {
            id: id.to_string(),
            field,
            value: v.to_string(),
        }),
        other => Ok(other),
    }
}

fn relation_from_wire(kind: &str) -> Option<Relation> {
    match kind {
        "CHILD" => Some(Relation::Child),
        "VALUE" => Some(Relation::ValueLink),
        _ => None,
    }
}

// ── Test builders ────────────────────────────────────────────────────────
