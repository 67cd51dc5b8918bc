//! String interning and the globally searchable name trie.
//!
//! [`StringTable`] is the per-block interner: strings referenced by the
//! objects of one data block are registered while the objects are encoded
//! to memory, then the table is serialized before them, so readers can
//! resolve references without backpatching.
//!
//! [`IndexedStringTrie`] is the global name index: keys are split into
//! two-character chunks and arranged as a trie whose serialization is
//! randomly addressable. Its subtree sizes are precomputed bottom-up
//! before any byte is written, which is how the trie avoids needing
//! section frames of its own. Terminal nodes carry a fixed-width value
//! slot; the write returns those slots as shift references for other
//! structures to patch. The whole key set is held in memory by design:
//! a region's name set fits.

use crate::codec::varint::{varint32_len, write_varint32};
use crate::error::Result;
use crate::writer::{FileRef, IndexWriter, PatchWidth};
use bytes::BytesMut;
use std::collections::{BTreeMap, HashMap};

/// Flag bit: the trie node ends a key.
const TRIE_TERMINAL: u8 = 0x01;
/// Flag bit: the trie node has children.
const TRIE_HAS_CHILDREN: u8 = 0x02;

/// An insertion-ordered string interner, scoped to one data block (or
/// one section-level table).
#[derive(Debug, Default)]
pub struct StringTable {
    index: HashMap<String, u32>,
    order: Vec<String>,
}

impl StringTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of `s`, assigning the next sequential index on
    /// first sight.
    pub fn register(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.order.len() as u32;
        self.index.insert(s.to_string(), idx);
        self.order.push(s.to_string());
        idx
    }

    /// Number of distinct strings registered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Serialize the table: count, then per string a varint length and
    /// the UTF-8 bytes, in registration order.
    pub fn encode(&self, buf: &mut BytesMut) {
        write_varint32(buf, self.order.len() as u32);
        for s in &self.order {
            write_varint32(buf, s.len() as u32);
            buf.extend_from_slice(s.as_bytes());
        }
    }
}

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<String, TrieNode>,
    terminal: bool,
}

impl TrieNode {
    fn insert(&mut self, chunks: &[String]) {
        match chunks.split_first() {
            None => self.terminal = true,
            Some((head, rest)) => {
                self.children.entry(head.clone()).or_default().insert(rest);
            }
        }
    }

    /// Serialized size of this node's children, headers included.
    fn subtree_size(&self) -> usize {
        let mut size = 0;
        for (key, child) in &self.children {
            size += varint32_len(key.len() as u32) + key.len();
            size += 1; // flags
            if child.terminal {
                size += 4; // value slot
            }
            if !child.children.is_empty() {
                let nested = child.subtree_size();
                size += varint32_len(nested as u32) + nested;
            }
        }
        size
    }
}

/// A two-character-chunked trie over a set of keys, serialized for
/// random-access prefix search.
#[derive(Debug, Default)]
pub struct IndexedStringTrie {
    root: TrieNode,
}

impl IndexedStringTrie {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key. Chunking is by Unicode scalar pairs, so multi-byte
    /// names never split mid-character; the last chunk may be a single
    /// character. Empty keys are ignored.
    pub fn insert(&mut self, key: &str) {
        if key.is_empty() {
            return;
        }
        let chars: Vec<char> = key.chars().collect();
        let chunks: Vec<String> = chars.chunks(2).map(|c| c.iter().collect()).collect();
        self.root.insert(&chunks);
    }

    /// Total serialized size in bytes.
    pub fn serialized_size(&self) -> usize {
        self.root.subtree_size()
    }

    /// Write the trie at the current position and return the value slot
    /// of every terminal node, keyed by the full accumulated key. The
    /// slots are shift references anchored at the trie start; the caller
    /// patches each once its referenced structure is written.
    ///
    /// Child order is the chunk's lexicographic order, so the serialized
    /// bytes are identical no matter the insertion order.
    pub fn write(&self, writer: &mut IndexWriter) -> Result<BTreeMap<String, FileRef>> {
        let trie_start = writer.position();
        let mut slots = BTreeMap::new();
        Self::write_node(&self.root, writer, trie_start, String::new(), &mut slots)?;
        Ok(slots)
    }

    fn write_node(
        node: &TrieNode,
        writer: &mut IndexWriter,
        trie_start: u64,
        prefix: String,
        slots: &mut BTreeMap<String, FileRef>,
    ) -> Result<()> {
        for (key, child) in &node.children {
            let full_key = format!("{}{}", prefix, key);
            writer.write_str(key)?;

            let mut flags = 0u8;
            if child.terminal {
                flags |= TRIE_TERMINAL;
            }
            if !child.children.is_empty() {
                flags |= TRIE_HAS_CHILDREN;
            }
            writer.write_u8(flags)?;

            if child.terminal {
                let slot = writer.reserve_shift(PatchWidth::U32, trie_start)?;
                slots.insert(full_key.clone(), slot);
            }
            if !child.children.is_empty() {
                writer.write_varint32(child.subtree_size() as u32)?;
                Self::write_node(child, writer, trie_start, full_key, slots)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::writer::IndexWriter;
    use std::io::Read;
    use tempfile::NamedTempFile;

    #[test]
    fn test_register_returns_stable_indices() {
        let mut table = StringTable::new();
        assert_eq!(table.register("main street"), 0);
        assert_eq!(table.register("oak avenue"), 1);
        assert_eq!(table.register("main street"), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_encode_insertion_order() {
        let mut table = StringTable::new();
        table.register("b");
        table.register("a");

        let mut buf = BytesMut::new();
        table.encode(&mut buf);
        assert_eq!(&buf[..], &[2, 1, b'b', 1, b'a']);
    }

    #[test]
    fn test_empty_table_encodes_count_only() {
        let table = StringTable::new();
        let mut buf = BytesMut::new();
        table.encode(&mut buf);
        assert_eq!(&buf[..], &[0]);
    }

    fn trie_bytes(keys: &[&str]) -> (Vec<u8>, Vec<String>) {
        let tmp = NamedTempFile::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path(), Options::default()).unwrap();
        let start = writer.position() as usize;

        let mut trie = IndexedStringTrie::new();
        for key in keys {
            trie.insert(key);
        }
        let slots = trie.write(&mut writer).unwrap();
        let slot_keys: Vec<String> = slots.keys().cloned().collect();
        // Patch every slot to the trie start so the writer can close.
        for (_, slot) in slots {
            writer.patch(slot, start as u64).unwrap();
        }
        writer.close().unwrap();

        let mut data = Vec::new();
        std::fs::File::open(tmp.path()).unwrap().read_to_end(&mut data).unwrap();
        // Strip header and trailer.
        (data[start..data.len() - 4].to_vec(), slot_keys)
    }

    #[test]
    fn test_trie_deterministic_across_insertion_orders() {
        let (a, keys_a) = trie_bytes(&["Berlin", "Bern", "Bergen", "Paris"]);
        let (b, keys_b) = trie_bytes(&["Paris", "Bergen", "Bern", "Berlin"]);
        assert_eq!(a, b);
        assert_eq!(keys_a, keys_b);
        assert_eq!(keys_a, vec!["Bergen", "Berlin", "Bern", "Paris"]);
    }

    #[test]
    fn test_trie_shared_prefix_chunks() {
        let mut trie = IndexedStringTrie::new();
        trie.insert("Berlin");
        trie.insert("Bern");
        // "Be" is shared; "rl","in" and "rn" diverge below it.
        assert!(trie.root.children.contains_key("Be"));
        let be = &trie.root.children["Be"];
        assert!(be.children.contains_key("rl"));
        assert!(be.children.contains_key("rn"));
        assert!(be.children["rn"].terminal);
    }

    #[test]
    fn test_trie_odd_length_key() {
        let mut trie = IndexedStringTrie::new();
        trie.insert("Ulm");
        let ul = &trie.root.children["Ul"];
        assert!(ul.children.contains_key("m"));
        assert!(ul.children["m"].terminal);
    }

    #[test]
    fn test_trie_multibyte_chunking() {
        let mut trie = IndexedStringTrie::new();
        trie.insert("Zürich");
        // First chunk is two scalars, not two bytes.
        assert!(trie.root.children.contains_key("Zü"));
    }

    #[test]
    fn test_subtree_size_matches_written_bytes() {
        let keys = ["Berlin", "Bern", "Bergen", "Paris", "Ulm"];
        let mut trie = IndexedStringTrie::new();
        for key in &keys {
            trie.insert(key);
        }
        let (bytes, _) = trie_bytes(&keys);
        assert_eq!(trie.serialized_size(), bytes.len());
    }

    #[test]
    fn test_terminal_prefix_key() {
        // A key that is a strict prefix of another must terminate on an
        // interior node.
        let mut trie = IndexedStringTrie::new();
        trie.insert("Bern");
        trie.insert("Berning");
        let be = &trie.root.children["Be"];
        let rn = &be.children["rn"];
        assert!(rn.terminal);
        assert!(rn.children.contains_key("in"));
    }
}
