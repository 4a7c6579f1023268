//! Form reconstruction: KEY → VALUE entry graph into a key/value map.
//!
//! Entries are partitioned by role first. A KEY links to its VALUE entries
//! through `ValueLink`; each target is looked up among VALUE-role entries and
//! then in the whole index, because some backends mislabel the role of the
//! linked block. Entries tagged with both roles, or neither, are skipped.

use super::index::BlockIndex;
use super::text::resolve_text;
use crate::block::{Block, EntryRole, Relation};
use crate::config::DuplicateKeyPolicy;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// Build the key → value map for one collection.
pub fn forms(
    blocks: &[Block],
    index: &BlockIndex<'_>,
    policy: DuplicateKeyPolicy,
) -> BTreeMap<String, String> {
    let mut keys: Vec<&Block> = Vec::new();
    let mut values: HashMap<&str, &Block> = HashMap::new();
    for block in blocks.iter().filter(|b| b.is_key_value_entry()) {
        match block.role() {
            Some(EntryRole::Key) => keys.push(block),
            Some(EntryRole::Value) => {
                values.insert(block.id.as_str(), block);
            }
            None => {}
        }
    }

    let mut out = BTreeMap::new();
    for key in keys {
        let key_text = resolve_text(key, index);
        let value_text = key
            .related_ids(Relation::ValueLink)
            .filter_map(|id| values.get(id).copied().or_else(|| index.get(id)))
            .map(|v| resolve_text(v, index))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        insert(&mut out, key_text, value_text, policy);
    }
    out
}

fn insert(
    out: &mut BTreeMap<String, String>,
    key: String,
    value: String,
    policy: DuplicateKeyPolicy,
) {
    match (out.entry(key), policy) {
        (Entry::Vacant(slot), _) => {
            slot.insert(value);
        }
        (Entry::Occupied(mut slot), DuplicateKeyPolicy::LastWriteWins) => {
            slot.insert(value);
        }
        (Entry::Occupied(_), DuplicateKeyPolicy::FirstWriteWins) => {}
        (Entry::Occupied(mut slot), DuplicateKeyPolicy::Merge) => {
            if value.is_empty() {
                return;
            }
            let merged = slot.get_mut();
            if !merged.is_empty() {
                merged.push('\n');
            }
            merged.push_str(&value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::build::*;
    use crate::block::BlockKind;

    fn run(blocks: &[Block], policy: DuplicateKeyPolicy) -> BTreeMap<String, String> {
        let index = BlockIndex::new(blocks);
        forms(blocks, &index, policy)
    }

    #[test]
    fn key_links_to_value_words() {
        let blocks = vec![
            word("wk", "Name"),
            word("wv", "Alice"),
            value("v", &["wv"]),
            key("k", &["wk"], &["v"]),
        ];
        let out = run(&blocks, DuplicateKeyPolicy::LastWriteWins);
        assert_eq!(out.get("Name").map(String::as_str), Some("Alice"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn multiple_values_join_with_newline() {
        let blocks = vec![
            word("wk", "Address"),
            word("a", "1 Main St"),
            word("b", "Springfield"),
            value("v1", &["a"]),
            value("v2", &["b"]),
            value("empty", &[]),
            key("k", &["wk"], &["v1", "empty", "v2"]),
        ];
        let out = run(&blocks, DuplicateKeyPolicy::LastWriteWins);
        assert_eq!(out["Address"], "1 Main St\nSpringfield");
    }

    #[test]
    fn mislabelled_value_resolves_through_index() {
        let blocks = vec![
            word("wk", "Total"),
            word("wv", "42"),
            line("l", "42").with(Relation::Child, &["wv"]),
            key("k", &["wk"], &["l"]),
        ];
        let out = run(&blocks, DuplicateKeyPolicy::LastWriteWins);
        assert_eq!(out["Total"], "42");
    }

    #[test]
    fn unclassified_entries_are_dropped() {
        let blocks = vec![
            word("w", "Ghost"),
            other("both", BlockKind::KeyValueEntry { role: None }, Some("Ghost"))
                .with(Relation::Child, &["w"]),
        ];
        assert!(run(&blocks, DuplicateKeyPolicy::LastWriteWins).is_empty());
    }

    #[test]
    fn key_without_value_maps_to_empty() {
        let blocks = vec![word("wk", "Signature"), key("k", &["wk"], &["nowhere"])];
        let out = run(&blocks, DuplicateKeyPolicy::LastWriteWins);
        assert_eq!(out["Signature"], "");
    }

    fn duplicate_keys() -> Vec<Block> {
        vec![
            word("wk1", "Date"),
            word("wk2", "Date"),
            word("a", "2024-01-01"),
            word("b", "2024-02-02"),
            value("v1", &["a"]),
            value("v2", &["b"]),
            key("k1", &["wk1"], &["v1"]),
            key("k2", &["wk2"], &["v2"]),
        ]
    }

    #[test]
    fn duplicate_keys_last_write_wins_by_default() {
        let out = run(&duplicate_keys(), DuplicateKeyPolicy::default());
        assert_eq!(out["Date"], "2024-02-02");
    }

    #[test]
    fn duplicate_keys_first_write_wins() {
        let out = run(&duplicate_keys(), DuplicateKeyPolicy::FirstWriteWins);
        assert_eq!(out["Date"], "2024-01-01");
    }

    #[test]
    fn duplicate_keys_merge() {
        let out = run(&duplicate_keys(), DuplicateKeyPolicy::Merge);
        assert_eq!(out["Date"], "2024-01-01\n2024-02-02");
    }
}
