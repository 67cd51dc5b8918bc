//! Address family encoder.
//!
//! Layout under an `AddressIndex` section:
//! ```text
//! [region name]
//! [NameIndex]             // trie over entry names, slots patched below
//! [CityBlock]*            // entry blocks, grouped by caller (city type)
//! ```
//!
//! Each `CityBlock` carries a group tag and its entries; an entry is a
//! named point with a delta-coded boundary polygon. As entries are
//! written their file offsets resolve the trie slots reserved earlier,
//! so a name lookup lands directly on the entry.

use crate::codec::geometry::encode_run;
use crate::error::Result;
use crate::family::ObjectStore;
use crate::strings::IndexedStringTrie;
use crate::tile::TilePoint;
use crate::writer::{FileRef, IndexWriter, SectionKind};
use bytes::BytesMut;
use std::collections::BTreeMap;

/// One staged address entry: a named place with its boundary.
#[derive(Debug, Clone)]
pub struct AddressEntry {
    /// Stable object id.
    pub id: u64,
    /// Display name; also the trie key.
    pub name: String,
    /// Representative point in tile space.
    pub point: TilePoint,
    /// Boundary polygon, delta-coded against `point`. May be empty.
    pub boundary: Vec<TilePoint>,
}

/// Encoder for the address family.
pub struct AddressEncoder<'a> {
    writer: &'a mut IndexWriter,
    slots: BTreeMap<String, FileRef>,
}

impl<'a> AddressEncoder<'a> {
    /// Create an encoder over the shared writer core.
    pub fn new(writer: &'a mut IndexWriter) -> Self {
        Self { writer, slots: BTreeMap::new() }
    }

    /// Open the address family section.
    pub fn begin(&mut self, name: &str) -> Result<()> {
        self.writer.enter(SectionKind::AddressIndex)?;
        self.writer.write_str(name)
    }

    /// Write the searchable name index over every entry name that will
    /// follow. Each trie slot is patched when its entry is written.
    pub fn write_name_index(&mut self, names: &[&str]) -> Result<()> {
        let mut trie = IndexedStringTrie::new();
        for name in names {
            trie.insert(name);
        }

        self.writer.enter(SectionKind::NameIndex)?;
        self.slots = trie.write(self.writer)?;
        self.writer.leave(SectionKind::NameIndex)
    }

    /// Write one block of entries under a caller-chosen group tag
    /// (city / town / village / postcode grouping).
    pub fn write_block(&mut self, group: u32, entries: &[AddressEntry]) -> Result<()> {
        self.writer.enter(SectionKind::CityBlock)?;
        self.writer.write_varint32(group)?;
        self.writer.write_varint32(entries.len() as u32)?;

        for entry in entries {
            let offset = self.writer.position();
            self.writer.write_varint64(entry.id)?;
            self.writer.write_str(&entry.name)?;
            self.writer.write_varint32(entry.point.x as u32)?;
            self.writer.write_varint32(entry.point.y as u32)?;

            let mut boundary = BytesMut::new();
            if !entry.boundary.is_empty() {
                encode_run(&mut boundary, &entry.boundary, entry.point, 0);
            }
            self.writer.write_varint32(boundary.len() as u32)?;
            self.writer.write_bytes(&boundary)?;

            // First entry with a given name claims the trie slot.
            if let Some(slot) = self.slots.remove(&entry.name) {
                self.writer.patch(slot, offset)?;
            }
        }

        self.writer.leave(SectionKind::CityBlock)
    }

    /// Fetch staged entries for `ids` and write them as one block,
    /// skipping ids the store cannot resolve.
    pub fn write_block_from_store<S>(&mut self, group: u32, ids: &[u64], store: &S) -> Result<()>
    where
        S: ObjectStore<Object = AddressEntry>,
    {
        let entries = crate::family::fetch_objects(store, ids, "address");
        self.write_block(group, &entries)
    }

    /// Close the address family section. Any name that never matched a
    /// written entry resolves to the null target.
    pub fn end(&mut self) -> Result<()> {
        for (name, slot) in std::mem::take(&mut self.slots) {
            log::warn!("address name {:?} indexed but no entry was written", name);
            self.writer.patch_null(slot)?;
        }
        self.writer.leave(SectionKind::AddressIndex)
    }
}
