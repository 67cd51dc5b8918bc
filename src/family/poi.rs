//! Points-of-interest family encoder.
//!
//! Layout under a `PoiIndex` section:
//! ```text
//! [region name]
//! [left/right/top/bottom: varint u32, absolute]
//! [category table]        // categories with their subcategories
//! [NameIndex]             // indexed string trie over POI names
//! [PoiBox tree...]        // never grid-aligned
//! [PoiData]*              // one per data-bearing tree page
//! ```
//!
//! The name trie's terminal slots are patched to the `PoiData` block of
//! the page each name lives on, so a reader can jump from a typed name
//! straight to the data without touching the box tree.

use crate::boxtree::{BoxTreeWriter, PendingBlock, SpatialIndex};
use crate::codec::varint::{encode_zigzag32, encode_zigzag64, write_varint32, write_varint64};
use crate::error::{Error, Result};
use crate::family::{fetch_objects, open_block, ObjectStore};
use crate::strings::{IndexedStringTrie, StringTable};
use crate::tile::{TilePoint, TileRect};
use crate::writer::{FileRef, IndexWriter, SectionKind};
use bytes::BytesMut;
use std::collections::BTreeMap;

/// One staged POI record.
#[derive(Debug, Clone)]
pub struct PoiAtom {
    /// Stable object id.
    pub id: u64,
    /// Position in tile space.
    pub point: TilePoint,
    /// Category/subcategory ids from the category table.
    pub category_ids: Vec<u32>,
    /// Tag group ids.
    pub tag_group_ids: Vec<u32>,
    /// Display name, when present.
    pub name: Option<String>,
}

/// Encoder for the POI family.
pub struct PoiEncoder<'a> {
    writer: &'a mut IndexWriter,
    /// Trie slots waiting for their page's data block: name -> (page id,
    /// slot).
    name_slots: Vec<(String, u64, FileRef)>,
    pending: Vec<PendingBlock>,
}

impl<'a> PoiEncoder<'a> {
    /// Create an encoder over the shared writer core.
    pub fn new(writer: &'a mut IndexWriter) -> Self {
        Self { writer, name_slots: Vec::new(), pending: Vec::new() }
    }

    /// Open the POI family section with its overall bounds.
    pub fn begin(&mut self, name: &str, bounds: TileRect) -> Result<()> {
        self.writer.enter(SectionKind::PoiIndex)?;
        self.writer.write_str(name)?;
        self.writer.write_varint32(bounds.left as u32)?;
        self.writer.write_varint32(bounds.right as u32)?;
        self.writer.write_varint32(bounds.top as u32)?;
        self.writer.write_varint32(bounds.bottom as u32)?;
        self.writer.set_bounds(bounds)
    }

    /// Write the category table: each category with its subcategories,
    /// ids assigned by position.
    pub fn write_categories(&mut self, categories: &[(&str, Vec<&str>)]) -> Result<()> {
        self.writer.write_varint32(categories.len() as u32)?;
        for (category, subcategories) in categories {
            self.writer.write_str(category)?;
            self.writer.write_varint32(subcategories.len() as u32)?;
            for sub in subcategories {
                self.writer.write_str(sub)?;
            }
        }
        Ok(())
    }

    /// Write the searchable name index: a trie over `names`, each mapping
    /// to the tree page whose data block contains it. Slots are patched
    /// while the data blocks are written.
    pub fn write_name_index(&mut self, names: &[(String, u64)]) -> Result<()> {
        let mut by_name: BTreeMap<&str, u64> = BTreeMap::new();
        for (name, page) in names {
            by_name.entry(name.as_str()).or_insert(*page);
        }

        let mut trie = IndexedStringTrie::new();
        for name in by_name.keys() {
            trie.insert(name);
        }

        self.writer.enter(SectionKind::NameIndex)?;
        let slots = trie.write(self.writer)?;
        self.writer.leave(SectionKind::NameIndex)?;

        for (key, slot) in slots {
            let page = *by_name.get(key.as_str()).ok_or_else(|| {
                Error::protocol(format!("trie returned unknown key {:?}", key))
            })?;
            self.name_slots.push((key, page, slot));
        }
        Ok(())
    }

    /// Write the box tree. Must precede [`Self::write_data`].
    pub fn write_boxes<I: SpatialIndex>(&mut self, index: &I) -> Result<()> {
        self.pending =
            BoxTreeWriter::new(self.writer, SectionKind::PoiBox, None).write(index)?;
        Ok(())
    }

    /// Write the data blocks for every data-bearing page, patch the box
    /// slots, and resolve the name trie slots to their page's block.
    pub fn write_data<S>(&mut self, store: &S) -> Result<()>
    where
        S: ObjectStore<Object = PoiAtom>,
    {
        let mut block_offsets: BTreeMap<u64, u64> = BTreeMap::new();

        for block in std::mem::take(&mut self.pending) {
            let offset = self.writer.position();
            block_offsets.insert(block.page, offset);
            self.write_block(block, store)?;
        }

        for (name, page, slot) in std::mem::take(&mut self.name_slots) {
            match block_offsets.get(&page) {
                Some(&offset) => self.writer.patch(slot, offset)?,
                None => {
                    log::warn!("POI name {:?} references page {} with no data block", name, page);
                    self.writer.patch_null(slot)?;
                }
            }
        }
        Ok(())
    }

    /// Close the POI family section.
    pub fn end(&mut self) -> Result<()> {
        self.writer.leave(SectionKind::PoiIndex)
    }

    fn write_block<S>(&mut self, block: PendingBlock, store: &S) -> Result<()>
    where
        S: ObjectStore<Object = PoiAtom>,
    {
        let atoms = fetch_objects(store, &block.ids, "poi");
        let base_id = atoms.first().map(|a| a.id).unwrap_or(0);

        let mut table = StringTable::new();
        let mut body = BytesMut::new();
        for atom in &atoms {
            encode_atom(&mut body, atom, base_id, block.origin, &mut table);
        }

        open_block(self.writer, SectionKind::PoiData, block.data_ref)?;
        self.writer.write_varint64(base_id)?;
        let mut table_buf = BytesMut::new();
        table.encode(&mut table_buf);
        self.writer.write_bytes(&table_buf)?;
        self.writer.write_varint32(atoms.len() as u32)?;
        self.writer.write_bytes(&body)?;
        self.writer.leave(SectionKind::PoiData)
    }
}

fn encode_atom(
    buf: &mut BytesMut,
    atom: &PoiAtom,
    base_id: u64,
    origin: TilePoint,
    table: &mut StringTable,
) {
    write_varint64(buf, encode_zigzag64(atom.id as i64 - base_id as i64));
    // Box-relative position at full resolution; POIs are points, so no
    // run encoding applies.
    write_varint32(buf, encode_zigzag32(atom.point.x - origin.x));
    write_varint32(buf, encode_zigzag32(atom.point.y - origin.y));

    write_varint32(buf, atom.category_ids.len() as u32);
    for &c in &atom.category_ids {
        write_varint32(buf, c);
    }
    write_varint32(buf, atom.tag_group_ids.len() as u32);
    for &g in &atom.tag_group_ids {
        write_varint32(buf, g);
    }
    match &atom.name {
        Some(name) => {
            buf.extend_from_slice(&[1]);
            write_varint32(buf, table.register(name));
        }
        None => buf.extend_from_slice(&[0]),
    }
}
