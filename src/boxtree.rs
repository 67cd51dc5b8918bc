//! Bounding-box tree serialization.
//!
//! [`BoxTreeWriter`] walks a pre-built spatial index depth-first and
//! emits one nested section per tree page, holding the page rectangle as
//! four signed deltas against the enclosing bounds context. Sibling order
//! is exactly the index's child order: the collaborator packs its pages
//! for read locality before traversal, and readers depend on the write
//! order matching it.
//!
//! Box body layout:
//! ```text
//! [left/right/top/bottom: zigzag varint deltas vs parent bounds]
//! [flags: u8, bit 0 = page carries data objects]
//! [shift-to-data slot: u32, present when bit 0 is set]
//! [child boxes...]
//! ```
//!
//! A data-bearing page contributes a [`PendingBlock`]: the caller writes
//! the page's data block after the whole tree is closed and patches the
//! slot with the block's position (relative to the box body start).

use crate::error::Result;
use crate::tile::{TilePoint, TileRect};
use crate::writer::{FileRef, IndexWriter, PatchWidth, SectionKind};

/// Box body flag: the page carries data objects.
pub const BOX_HAS_DATA: u8 = 0x01;

/// One child of a spatial index page: either a nested page or a stored
/// object (id + rectangle only; full records live in the staging store).
#[derive(Debug, Clone, Copy)]
pub struct TreeEntry {
    /// Bounding rectangle of the page or object.
    pub rect: TileRect,
    /// Page id (traversable) or object id (stored), per `is_object`.
    pub id: u64,
    /// Whether this entry is a stored object rather than a nested page.
    pub is_object: bool,
}

/// Read-only traversal interface of the pre-built spatial index.
///
/// The index is constructed and packed by a collaborator before the write
/// pass; the writer only walks it. `children` dereferences a page id to
/// its ordered entries.
pub trait SpatialIndex {
    /// The root page, or `None` for an empty index (an empty index skips
    /// the whole box tree; that is not an error).
    fn root(&self) -> Option<TreeEntry>;

    /// Ordered children of a page. The order is preserved verbatim in
    /// the output.
    fn children(&self, page: u64) -> Vec<TreeEntry>;
}

/// A data-bearing page encountered during the walk, waiting for its data
/// block to be written and its slot patched.
#[derive(Debug)]
pub struct PendingBlock {
    /// Delta origin for geometry stored under this page: the (possibly
    /// alignment-grown) box's top-left corner.
    pub origin: TilePoint,
    /// The page id, for callers that key auxiliary structures by page.
    pub page: u64,
    /// Object ids stored on this page, in index order.
    pub ids: Vec<u64>,
    /// The box's shift-to-data slot.
    pub data_ref: FileRef,
}

/// Walks a spatial index and emits its box tree through the shared
/// writer core.
pub struct BoxTreeWriter<'a> {
    writer: &'a mut IndexWriter,
    kind: SectionKind,
    align_bits: Option<u8>,
}

impl<'a> BoxTreeWriter<'a> {
    /// Create a tree writer emitting boxes of `kind`. `align_bits` masks
    /// the left/top edges down to a coarse grid before encoding (map
    /// family only); `None` writes rectangles exactly as given.
    pub fn new(writer: &'a mut IndexWriter, kind: SectionKind, align_bits: Option<u8>) -> Self {
        Self { writer, kind, align_bits }
    }

    /// Write the whole tree. Returns the data-bearing pages in traversal
    /// order; the caller writes their blocks in this order and patches
    /// each slot.
    pub fn write<I: SpatialIndex>(mut self, index: &I) -> Result<Vec<PendingBlock>> {
        let mut pending = Vec::new();
        if let Some(root) = index.root() {
            self.visit(index, &root, &mut pending)?;
        } else {
            log::debug!("empty spatial index, skipping {:?} tree", self.kind);
        }
        Ok(pending)
    }

    fn visit<I: SpatialIndex>(
        &mut self,
        index: &I,
        entry: &TreeEntry,
        pending: &mut Vec<PendingBlock>,
    ) -> Result<()> {
        let rect = match self.align_bits {
            Some(bits) => entry.rect.align_down(bits),
            None => entry.rect,
        };

        self.writer.enter(self.kind)?;
        let body_start = self.writer.position();
        let base = self.writer.bounds().unwrap_or(TileRect::new(0, 0, 0, 0));
        self.writer.write_sint32(rect.left - base.left)?;
        self.writer.write_sint32(rect.right - base.right)?;
        self.writer.write_sint32(rect.top - base.top)?;
        self.writer.write_sint32(rect.bottom - base.bottom)?;
        self.writer.set_bounds(rect)?;

        let children = index.children(entry.id);
        let ids: Vec<u64> = children.iter().filter(|c| c.is_object).map(|c| c.id).collect();

        if ids.is_empty() {
            self.writer.write_u8(0)?;
        } else {
            self.writer.write_u8(BOX_HAS_DATA)?;
            let data_ref = self.writer.reserve_shift(PatchWidth::U32, body_start)?;
            pending.push(PendingBlock { origin: rect.origin(), page: entry.id, ids, data_ref });
        }

        for child in children.iter().filter(|c| !c.is_object) {
            self.visit(index, child, pending)?;
        }

        self.writer.leave(self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use tempfile::NamedTempFile;

    /// A hand-built index: pages keyed by id, children stored in order.
    struct VecIndex {
        root: Option<TreeEntry>,
        pages: Vec<(u64, Vec<TreeEntry>)>,
    }

    impl SpatialIndex for VecIndex {
        fn root(&self) -> Option<TreeEntry> {
            self.root
        }

        fn children(&self, page: u64) -> Vec<TreeEntry> {
            self.pages
                .iter()
                .find(|(id, _)| *id == page)
                .map(|(_, c)| c.clone())
                .unwrap_or_default()
        }
    }

    fn page(rect: TileRect, id: u64) -> TreeEntry {
        TreeEntry { rect, id, is_object: false }
    }

    fn object(rect: TileRect, id: u64) -> TreeEntry {
        TreeEntry { rect, id, is_object: true }
    }

    fn open_level(writer: &mut IndexWriter) {
        writer.enter(SectionKind::MapIndex).unwrap();
        writer.enter(SectionKind::MapLevel).unwrap();
        writer.set_bounds(TileRect::new(0, 1 << 20, 0, 1 << 20)).unwrap();
    }

    fn close_level(writer: &mut IndexWriter) {
        writer.leave(SectionKind::MapLevel).unwrap();
        writer.leave(SectionKind::MapIndex).unwrap();
    }

    #[test]
    fn test_empty_index_writes_nothing() {
        let tmp = NamedTempFile::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path(), Options::default()).unwrap();
        open_level(&mut writer);
        let before = writer.position();

        let index = VecIndex { root: None, pages: vec![] };
        let pending = BoxTreeWriter::new(&mut writer, SectionKind::MapBox, Some(5))
            .write(&index)
            .unwrap();
        assert!(pending.is_empty());
        assert_eq!(writer.position(), before);

        close_level(&mut writer);
        writer.close().unwrap();
    }

    #[test]
    fn test_leaf_page_yields_pending_block() {
        let tmp = NamedTempFile::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path(), Options::default()).unwrap();
        open_level(&mut writer);

        let leaf_rect = TileRect::new(1000, 2000, 1000, 2000);
        let index = VecIndex {
            root: Some(page(leaf_rect, 1)),
            pages: vec![(1, vec![object(leaf_rect, 101), object(leaf_rect, 102)])],
        };
        let mut pending = BoxTreeWriter::new(&mut writer, SectionKind::MapBox, Some(5))
            .write(&index)
            .unwrap();
        assert_eq!(pending.len(), 1);
        let block = pending.pop().unwrap();
        assert_eq!(block.page, 1);
        assert_eq!(block.ids, vec![101, 102]);
        // Alignment rounds the origin down to the 32-unit grid.
        assert_eq!(block.origin, TilePoint::new(992, 992));

        writer.patch(block.data_ref, writer.position()).unwrap();
        close_level(&mut writer);
        writer.close().unwrap();
    }

    #[test]
    fn test_traversal_order_is_index_order() {
        let tmp = NamedTempFile::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path(), Options::default()).unwrap();
        open_level(&mut writer);

        let r = |l: i32| TileRect::new(l, l + 100, 0, 100);
        let index = VecIndex {
            root: Some(page(TileRect::new(0, 1000, 0, 1000), 1)),
            pages: vec![
                // Children deliberately not sorted by coordinate: packed
                // order must be preserved.
                (1, vec![page(r(500), 3), page(r(100), 2)]),
                (2, vec![object(r(100), 21)]),
                (3, vec![object(r(500), 31)]),
            ],
        };
        let pending = BoxTreeWriter::new(&mut writer, SectionKind::MapBox, None)
            .write(&index)
            .unwrap();
        let pages: Vec<u64> = pending.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![3, 2]);

        for block in pending {
            let target = writer.position();
            writer.patch(block.data_ref, target).unwrap();
        }
        close_level(&mut writer);
        writer.close().unwrap();
    }

    #[test]
    fn test_route_boxes_not_aligned() {
        let tmp = NamedTempFile::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path(), Options::default()).unwrap();
        writer.enter(SectionKind::RouteIndex).unwrap();

        let rect = TileRect::new(1037, 2041, 517, 1999);
        let index = VecIndex {
            root: Some(page(rect, 1)),
            pages: vec![(1, vec![object(rect, 11)])],
        };
        let pending = BoxTreeWriter::new(&mut writer, SectionKind::RouteBox, None)
            .write(&index)
            .unwrap();
        // No grid alignment outside the map family.
        assert_eq!(pending[0].origin, TilePoint::new(1037, 517));

        for block in pending {
            let target = writer.position();
            writer.patch(block.data_ref, target).unwrap();
        }
        writer.leave(SectionKind::RouteIndex).unwrap();
        writer.close().unwrap();
    }
}
