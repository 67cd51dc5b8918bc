//! Routing graph family encoder.
//!
//! Layout under a `RouteIndex` section:
//! ```text
//! [region name]
//! [RouteBox tree...]      // never grid-aligned
//! [RouteBlock]*           // one per data-bearing tree page
//! ```
//!
//! A `RouteBlock` mirrors the map block shape (base id, string table,
//! edges) but carries a per-point type overlay: points along an edge may
//! each attach their own type ids (turn restrictions, barriers), stored
//! as a side channel of `(point index, type ids)` groups so plain
//! geometry decoding can skip it cheaply.

use crate::boxtree::{BoxTreeWriter, PendingBlock, SpatialIndex};
use crate::codec::geometry::encode_run;
use crate::codec::varint::{encode_zigzag64, write_varint32, write_varint64};
use crate::error::Result;
use crate::family::{fetch_objects, open_block, ObjectStore};
use crate::strings::StringTable;
use crate::tile::TilePoint;
use crate::writer::{IndexWriter, SectionKind};
use bytes::BytesMut;

/// One point along a route edge, with its optional type overlay.
#[derive(Debug, Clone)]
pub struct RoutePoint {
    /// Position in tile space.
    pub point: TilePoint,
    /// Type ids attached to this specific point; usually empty.
    pub type_ids: Vec<u32>,
}

/// One staged routing edge.
#[derive(Debug, Clone)]
pub struct RouteEdge {
    /// Stable edge id.
    pub id: u64,
    /// Type ids of the whole edge.
    pub type_ids: Vec<u32>,
    /// Edge geometry with per-point overlays.
    pub points: Vec<RoutePoint>,
    /// Name references: (name rule id, text).
    pub names: Vec<(u32, String)>,
}

/// Encoder for the routing family.
pub struct RouteEncoder<'a> {
    writer: &'a mut IndexWriter,
}

impl<'a> RouteEncoder<'a> {
    /// Create an encoder over the shared writer core.
    pub fn new(writer: &'a mut IndexWriter) -> Self {
        Self { writer }
    }

    /// Open the routing family section.
    pub fn begin(&mut self, name: &str) -> Result<()> {
        self.writer.enter(SectionKind::RouteIndex)?;
        self.writer.write_str(name)
    }

    /// Write the box tree and the data blocks its leaves reference.
    pub fn write_tree<I, S>(&mut self, index: &I, store: &S) -> Result<()>
    where
        I: SpatialIndex,
        S: ObjectStore<Object = RouteEdge>,
    {
        let pending =
            BoxTreeWriter::new(self.writer, SectionKind::RouteBox, None).write(index)?;
        for block in pending {
            self.write_block(block, store)?;
        }
        Ok(())
    }

    /// Close the routing family section.
    pub fn end(&mut self) -> Result<()> {
        self.writer.leave(SectionKind::RouteIndex)
    }

    fn write_block<S>(&mut self, block: PendingBlock, store: &S) -> Result<()>
    where
        S: ObjectStore<Object = RouteEdge>,
    {
        let shift = self.writer.options().route_coord_shift;
        let edges = fetch_objects(store, &block.ids, "route");
        let base_id = edges.first().map(|e| e.id).unwrap_or(0);

        let mut table = StringTable::new();
        let mut body = BytesMut::new();
        for edge in &edges {
            encode_edge(&mut body, edge, base_id, block.origin, shift, &mut table);
        }

        open_block(self.writer, SectionKind::RouteBlock, block.data_ref)?;
        self.writer.write_varint64(base_id)?;
        let mut table_buf = BytesMut::new();
        table.encode(&mut table_buf);
        self.writer.write_bytes(&table_buf)?;
        self.writer.write_varint32(edges.len() as u32)?;
        self.writer.write_bytes(&body)?;
        self.writer.leave(SectionKind::RouteBlock)
    }
}

fn encode_edge(
    buf: &mut BytesMut,
    edge: &RouteEdge,
    base_id: u64,
    origin: TilePoint,
    shift: u8,
    table: &mut StringTable,
) {
    write_varint64(buf, encode_zigzag64(edge.id as i64 - base_id as i64));

    write_varint32(buf, edge.type_ids.len() as u32);
    for &t in &edge.type_ids {
        write_varint32(buf, t);
    }

    let points: Vec<TilePoint> = edge.points.iter().map(|p| p.point).collect();
    let mut coords = BytesMut::new();
    encode_run(&mut coords, &points, origin, shift);
    write_varint32(buf, coords.len() as u32);
    buf.extend_from_slice(&coords);

    // Per-point type overlay: only points that carry types appear.
    let mut overlay = BytesMut::new();
    let mut overlay_count = 0u32;
    for (i, p) in edge.points.iter().enumerate() {
        if p.type_ids.is_empty() {
            continue;
        }
        write_varint32(&mut overlay, i as u32);
        write_varint32(&mut overlay, p.type_ids.len() as u32);
        for &t in &p.type_ids {
            write_varint32(&mut overlay, t);
        }
        overlay_count += 1;
    }
    write_varint32(buf, overlay_count);
    buf.extend_from_slice(&overlay);

    write_varint32(buf, edge.names.len() as u32);
    for (rule, text) in &edge.names {
        write_varint32(buf, *rule);
        write_varint32(buf, table.register(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::varint::read_varint32;

    fn sample_edge() -> RouteEdge {
        RouteEdge {
            id: 42,
            type_ids: vec![1, 5],
            points: vec![
                RoutePoint { point: TilePoint::new(1600, 1600), type_ids: vec![] },
                RoutePoint { point: TilePoint::new(3200, 1600), type_ids: vec![9] },
                RoutePoint { point: TilePoint::new(3200, 3200), type_ids: vec![] },
            ],
            names: vec![(3, "A1".to_string())],
        }
    }

    #[test]
    fn test_overlay_lists_only_typed_points() {
        let mut table = StringTable::new();
        let mut buf = BytesMut::new();
        encode_edge(&mut buf, &sample_edge(), 42, TilePoint::new(0, 0), 4, &mut table);

        let mut pos = 0;
        // id delta (0), edge type count + 2 types
        assert_eq!(read_varint32(&buf, &mut pos).unwrap(), 0);
        assert_eq!(read_varint32(&buf, &mut pos).unwrap(), 2);
        read_varint32(&buf, &mut pos).unwrap();
        read_varint32(&buf, &mut pos).unwrap();
        // coord byte length
        let coords_len = read_varint32(&buf, &mut pos).unwrap() as usize;
        pos += coords_len;
        // one overlay group, at point index 1 with one type id 9
        assert_eq!(read_varint32(&buf, &mut pos).unwrap(), 1);
        assert_eq!(read_varint32(&buf, &mut pos).unwrap(), 1);
        assert_eq!(read_varint32(&buf, &mut pos).unwrap(), 1);
        assert_eq!(read_varint32(&buf, &mut pos).unwrap(), 9);
    }

    #[test]
    fn test_edge_names_interned() {
        let mut table = StringTable::new();
        let mut buf = BytesMut::new();
        encode_edge(&mut buf, &sample_edge(), 42, TilePoint::new(0, 0), 4, &mut table);
        assert_eq!(table.len(), 1);
    }
}
