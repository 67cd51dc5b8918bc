//! Public transit family encoder.
//!
//! Layout under a `TransitIndex` section:
//! ```text
//! [region name]
//! [TransitRoutes]         // all routes, offsets recorded
//! [TransitStopTree]*      // nested boxes with stops inline
//! [TransitStrings]        // shared string table, written last
//! ```
//!
//! Routes are written first so stops can reference them by backward file
//! shift. Stops live inline in the tree leaves (no separate data blocks);
//! each tree box delta-codes its stop ids against the box's first stop.
//! Names across routes and stops share one section-level string table,
//! emitted after both because its content is only complete then; the
//! table section is addressed by kind tag, so readers can seek it before
//! resolving any name.

use crate::boxtree::{SpatialIndex, TreeEntry};
use crate::error::Result;
use crate::family::{fetch_objects, ObjectStore};
use crate::strings::StringTable;
use crate::tile::{TilePoint, TileRect};
use crate::writer::{IndexWriter, SectionKind};
use bytes::BytesMut;
use std::collections::HashMap;

/// One staged transit stop.
#[derive(Debug, Clone)]
pub struct TransitStop {
    /// Stable stop id.
    pub id: u64,
    /// Position in tile space.
    pub point: TilePoint,
    /// Stop name.
    pub name: String,
    /// Ids of the routes serving this stop.
    pub route_ids: Vec<u64>,
}

/// One staged transit route.
#[derive(Debug, Clone)]
pub struct TransitRoute {
    /// Stable route id.
    pub id: u64,
    /// Public reference (line number).
    pub ref_name: String,
    /// Full route name.
    pub name: String,
    /// Route length in meters.
    pub distance: u32,
    /// Stop ids in travel order.
    pub stop_ids: Vec<u64>,
    /// Opaque, pre-matched schedule bytes.
    pub schedule: Vec<u8>,
}

/// Encoder for the transit family.
pub struct TransitEncoder<'a> {
    writer: &'a mut IndexWriter,
    strings: StringTable,
    route_offsets: HashMap<u64, u64>,
}

impl<'a> TransitEncoder<'a> {
    /// Create an encoder over the shared writer core.
    pub fn new(writer: &'a mut IndexWriter) -> Self {
        Self { writer, strings: StringTable::new(), route_offsets: HashMap::new() }
    }

    /// Open the transit family section.
    pub fn begin(&mut self, name: &str) -> Result<()> {
        self.writer.enter(SectionKind::TransitIndex)?;
        self.writer.write_str(name)
    }

    /// Write every route and record its offset so stops can point back
    /// at it. Must precede [`Self::write_stop_tree`].
    pub fn write_routes(&mut self, routes: &[TransitRoute]) -> Result<()> {
        self.writer.enter(SectionKind::TransitRoutes)?;
        self.writer.write_varint32(routes.len() as u32)?;

        for route in routes {
            self.route_offsets.insert(route.id, self.writer.position());
            self.writer.write_varint64(route.id)?;
            let ref_idx = self.strings.register(&route.ref_name);
            let name_idx = self.strings.register(&route.name);
            self.writer.write_varint32(ref_idx)?;
            self.writer.write_varint32(name_idx)?;
            self.writer.write_varint32(route.distance)?;

            self.writer.write_varint32(route.stop_ids.len() as u32)?;
            let mut prev = 0i64;
            for &stop_id in &route.stop_ids {
                self.writer.write_sint64(stop_id as i64 - prev)?;
                prev = stop_id as i64;
            }

            self.writer.write_varint32(route.schedule.len() as u32)?;
            self.writer.write_bytes(&route.schedule)?;
        }

        self.writer.leave(SectionKind::TransitRoutes)
    }

    /// Write the stop tree: nested boxes with stops inline in the pages
    /// that carry them, in the pre-index's packed order.
    pub fn write_stop_tree<I, S>(&mut self, index: &I, store: &S) -> Result<()>
    where
        I: SpatialIndex,
        S: ObjectStore<Object = TransitStop>,
    {
        match index.root() {
            Some(root) => self.visit(index, &root, store),
            None => {
                log::debug!("empty transit index, skipping stop tree");
                Ok(())
            }
        }
    }

    /// Write the shared string table. Must follow routes and stops.
    pub fn write_strings(&mut self) -> Result<()> {
        self.writer.enter(SectionKind::TransitStrings)?;
        let mut buf = BytesMut::new();
        self.strings.encode(&mut buf);
        self.writer.write_bytes(&buf)?;
        self.writer.leave(SectionKind::TransitStrings)
    }

    /// Close the transit family section.
    pub fn end(&mut self) -> Result<()> {
        self.writer.leave(SectionKind::TransitIndex)
    }

    fn visit<I, S>(&mut self, index: &I, entry: &TreeEntry, store: &S) -> Result<()>
    where
        I: SpatialIndex,
        S: ObjectStore<Object = TransitStop>,
    {
        let rect = entry.rect;
        self.writer.enter(SectionKind::TransitStopTree)?;
        let base = self.writer.bounds().unwrap_or(TileRect::new(0, 0, 0, 0));
        self.writer.write_sint32(rect.left - base.left)?;
        self.writer.write_sint32(rect.right - base.right)?;
        self.writer.write_sint32(rect.top - base.top)?;
        self.writer.write_sint32(rect.bottom - base.bottom)?;
        self.writer.set_bounds(rect)?;

        let children = index.children(entry.id);
        let ids: Vec<u64> = children.iter().filter(|c| c.is_object).map(|c| c.id).collect();
        let stops = fetch_objects(store, &ids, "transit");

        self.writer.write_varint32(stops.len() as u32)?;
        if let Some(first) = stops.first() {
            let base_id = first.id;
            self.writer.write_varint64(base_id)?;
            for stop in &stops {
                let record_start = self.writer.position();
                self.writer.write_sint64(stop.id as i64 - base_id as i64)?;
                self.writer.write_sint32(stop.point.x - rect.left)?;
                self.writer.write_sint32(stop.point.y - rect.top)?;
                let name_idx = self.strings.register(&stop.name);
                self.writer.write_varint32(name_idx)?;

                let known: Vec<u64> = stop
                    .route_ids
                    .iter()
                    .filter_map(|rid| match self.route_offsets.get(rid) {
                        Some(&offset) => Some(record_start - offset),
                        None => {
                            log::warn!(
                                "stop {} references unknown route {}, skipped",
                                stop.id, rid
                            );
                            None
                        }
                    })
                    .collect();
                self.writer.write_varint32(known.len() as u32)?;
                for shift in known {
                    self.writer.write_varint64(shift)?;
                }
            }
        }

        for child in children.iter().filter(|c| !c.is_object) {
            self.visit(index, child, store)?;
        }

        self.writer.leave(SectionKind::TransitStopTree)
    }
}
