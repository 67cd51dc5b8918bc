//! Per-family data-object encoders.
//!
//! Each family (map, routing, POI, address, transit) gets a thin encoder
//! translating its record shape into the shared writer primitives. The
//! encoders hold a mutable reference to the one [`IndexWriter`] and are
//! mutually unaware; the writer core is the only thing they share.
//!
//! Records reach the encoders through two collaborators: the spatial
//! pre-index (traversed as the box tree) carries only `id + rect`, and
//! the staging [`ObjectStore`] re-materializes the full record for each
//! id. An id present in the index but missing from the store is a data
//! quality problem in the source, not a write failure: it is logged and
//! skipped, and the write continues.

pub mod address;
pub mod map;
pub mod poi;
pub mod route;
pub mod transit;

use crate::error::Result;
use crate::writer::{FileRef, IndexWriter, SectionKind};

/// The staging store consumed by family encoders: full records keyed by
/// the object ids the spatial pre-index carries.
pub trait ObjectStore {
    /// The family's record type.
    type Object;

    /// Re-materialize the record for `id`, or `None` when the staging
    /// store has no such record.
    fn get(&self, id: u64) -> Option<Self::Object>;
}

/// Fetch the staged records for a block's ids, logging and skipping ids
/// the store cannot resolve.
pub(crate) fn fetch_objects<S: ObjectStore>(store: &S, ids: &[u64], family: &str) -> Vec<S::Object> {
    let mut objects = Vec::with_capacity(ids.len());
    for &id in ids {
        match store.get(id) {
            Some(obj) => objects.push(obj),
            None => log::warn!("{} object {} missing from staging store, skipped", family, id),
        }
    }
    objects
}

/// Open a data block section and resolve the box leaf's shift reference
/// to it. The stored shift points at the section's kind tag.
pub(crate) fn open_block(
    writer: &mut IndexWriter,
    kind: SectionKind,
    data_ref: FileRef,
) -> Result<()> {
    let target = writer.position();
    writer.enter(kind)?;
    writer.patch(data_ref, target)
}

/// Write the long-distance precomputed routing graph section.
///
/// The payload is produced elsewhere and opaque to this writer; the
/// section uses an 8-byte length field so very large instances fit.
pub fn write_graph_section(writer: &mut IndexWriter, payload: &[u8]) -> Result<()> {
    writer.enter(SectionKind::GraphIndex)?;
    writer.write_bytes(payload)?;
    writer.leave(SectionKind::GraphIndex)
}

/// Write the optional metadata/owner block: ordered key/value pairs.
pub fn write_metadata_section(writer: &mut IndexWriter, pairs: &[(&str, &str)]) -> Result<()> {
    writer.enter(SectionKind::Metadata)?;
    writer.write_varint32(pairs.len() as u32)?;
    for (key, value) in pairs {
        writer.write_str(key)?;
        writer.write_str(value)?;
    }
    writer.leave(SectionKind::Metadata)
}
