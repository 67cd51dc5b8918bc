//! Map geometry family encoder.
//!
//! Layout under a `MapIndex` section:
//! ```text
//! [region name]
//! [MapLevel]*             // one per zoom range
//!   [min zoom: u8][max zoom: u8]
//!   [left/right/top/bottom: varint u32, absolute]
//!   [MapBox tree...]      // grid-aligned, delta-compressed
//!   [MapBlock]*           // one per data-bearing tree page
//! ```
//!
//! A `MapBlock` holds a base id, the block's string table, and the
//! geometry objects. Object coordinates are delta-coded against the
//! owning box's (aligned) origin at the map coordinate shift.

use crate::boxtree::{BoxTreeWriter, PendingBlock, SpatialIndex};
use crate::codec::geometry::{encode_label, encode_run, encode_runs, thin_run};
use crate::codec::varint::{encode_zigzag64, write_varint32, write_varint64};
use crate::config::Options;
use crate::error::Result;
use crate::family::{fetch_objects, open_block, ObjectStore};
use crate::strings::StringTable;
use crate::tile::{TilePoint, TileRect};
use crate::writer::{IndexWriter, SectionKind};
use bytes::BytesMut;

/// Object flag: closed area (first/last point joined implicitly).
pub const MAP_AREA: u8 = 0x01;
/// Object flag: inner rings present.
pub const MAP_HAS_INNER: u8 = 0x02;
/// Object flag: explicit label point stored.
pub const MAP_HAS_LABEL: u8 = 0x04;
/// Object flag: extra (additional) type ids stored.
pub const MAP_HAS_EXTRA_TYPES: u8 = 0x08;
/// Object flag: name references stored.
pub const MAP_HAS_NAMES: u8 = 0x10;

/// One staged map geometry record.
#[derive(Debug, Clone)]
pub struct MapGeometry {
    /// Stable object id.
    pub id: u64,
    /// Whether the outer run is a closed area.
    pub area: bool,
    /// Outer run, in tile space.
    pub points: Vec<TilePoint>,
    /// Inner rings (holes), each its own run.
    pub inner_rings: Vec<Vec<TilePoint>>,
    /// Natural label position, when the source provides one.
    pub label: Option<TilePoint>,
    /// Force the label point to be stored regardless of deviation.
    pub always_label: bool,
    /// Rendering type ids.
    pub type_ids: Vec<u32>,
    /// Additional type ids.
    pub extra_type_ids: Vec<u32>,
    /// Name references: (name rule id, text).
    pub names: Vec<(u32, String)>,
}

/// Encoder for the map family.
pub struct MapEncoder<'a> {
    writer: &'a mut IndexWriter,
}

impl<'a> MapEncoder<'a> {
    /// Create an encoder over the shared writer core.
    pub fn new(writer: &'a mut IndexWriter) -> Self {
        Self { writer }
    }

    /// Open the map family section.
    pub fn begin(&mut self, name: &str) -> Result<()> {
        self.writer.enter(SectionKind::MapIndex)?;
        self.writer.write_str(name)
    }

    /// Write one zoom level: its box tree in the pre-index's packed
    /// order, then the data blocks its leaves reference. Thinning applies
    /// when the level's maximum zoom is at or below the configured gate.
    pub fn write_level<I, S>(
        &mut self,
        min_zoom: u8,
        max_zoom: u8,
        bounds: TileRect,
        index: &I,
        store: &S,
    ) -> Result<()>
    where
        I: SpatialIndex,
        S: ObjectStore<Object = MapGeometry>,
    {
        let opts = self.writer.options().clone();

        self.writer.enter(SectionKind::MapLevel)?;
        self.writer.write_u8(min_zoom)?;
        self.writer.write_u8(max_zoom)?;
        self.writer.write_varint32(bounds.left as u32)?;
        self.writer.write_varint32(bounds.right as u32)?;
        self.writer.write_varint32(bounds.top as u32)?;
        self.writer.write_varint32(bounds.bottom as u32)?;
        self.writer.set_bounds(bounds)?;

        let pending =
            BoxTreeWriter::new(self.writer, SectionKind::MapBox, Some(opts.grid_align_bits))
                .write(index)?;

        let thin = max_zoom <= opts.thin_below_zoom;
        for block in pending {
            self.write_block(block, store, thin, &opts)?;
        }

        self.writer.leave(SectionKind::MapLevel)
    }

    /// Close the map family section.
    pub fn end(&mut self) -> Result<()> {
        self.writer.leave(SectionKind::MapIndex)
    }

    fn write_block<S>(
        &mut self,
        block: PendingBlock,
        store: &S,
        thin: bool,
        opts: &Options,
    ) -> Result<()>
    where
        S: ObjectStore<Object = MapGeometry>,
    {
        let objects = fetch_objects(store, &block.ids, "map");
        let base_id = objects.first().map(|o| o.id).unwrap_or(0);

        // Objects are encoded to memory first so the string table they
        // reference can be written ahead of them.
        let mut table = StringTable::new();
        let mut body = BytesMut::new();
        for obj in &objects {
            encode_object(&mut body, obj, base_id, block.origin, thin, opts, &mut table);
        }

        open_block(self.writer, SectionKind::MapBlock, block.data_ref)?;
        self.writer.write_varint64(base_id)?;
        let mut table_buf = BytesMut::new();
        table.encode(&mut table_buf);
        self.writer.write_bytes(&table_buf)?;
        self.writer.write_varint32(objects.len() as u32)?;
        self.writer.write_bytes(&body)?;
        self.writer.leave(SectionKind::MapBlock)
    }
}

fn encode_object(
    buf: &mut BytesMut,
    obj: &MapGeometry,
    base_id: u64,
    origin: TilePoint,
    thin: bool,
    opts: &Options,
    table: &mut StringTable,
) {
    let shift = opts.map_coord_shift;

    let outer = if thin {
        thin_run(&obj.points, opts.thinning_threshold)
    } else {
        obj.points.clone()
    };
    let mut coords = BytesMut::new();
    let stats = encode_run(&mut coords, &outer, origin, shift);

    let mut label_buf = BytesMut::new();
    let has_label = match obj.label {
        Some(natural) => encode_label(
            &mut label_buf,
            natural,
            &stats,
            shift,
            opts.label_deadzone,
            obj.always_label,
        ),
        None => false,
    };

    let mut inner = BytesMut::new();
    if !obj.inner_rings.is_empty() {
        let rings: Vec<Vec<TilePoint>> = obj
            .inner_rings
            .iter()
            .map(|r| if thin { thin_run(r, opts.thinning_threshold) } else { r.clone() })
            .collect();
        encode_runs(&mut inner, &rings, origin, shift);
    }

    let mut flags = 0u8;
    if obj.area {
        flags |= MAP_AREA;
    }
    if !inner.is_empty() {
        flags |= MAP_HAS_INNER;
    }
    if has_label {
        flags |= MAP_HAS_LABEL;
    }
    if !obj.extra_type_ids.is_empty() {
        flags |= MAP_HAS_EXTRA_TYPES;
    }
    if !obj.names.is_empty() {
        flags |= MAP_HAS_NAMES;
    }

    write_varint64(buf, encode_zigzag64(obj.id as i64 - base_id as i64));
    buf.extend_from_slice(&[flags]);
    write_varint32(buf, coords.len() as u32);
    buf.extend_from_slice(&coords);
    if flags & MAP_HAS_INNER != 0 {
        write_varint32(buf, inner.len() as u32);
        buf.extend_from_slice(&inner);
    }
    if has_label {
        buf.extend_from_slice(&label_buf);
    }
    write_varint32(buf, obj.type_ids.len() as u32);
    for &t in &obj.type_ids {
        write_varint32(buf, t);
    }
    if flags & MAP_HAS_EXTRA_TYPES != 0 {
        write_varint32(buf, obj.extra_type_ids.len() as u32);
        for &t in &obj.extra_type_ids {
            write_varint32(buf, t);
        }
    }
    if flags & MAP_HAS_NAMES != 0 {
        write_varint32(buf, obj.names.len() as u32);
        for (rule, text) in &obj.names {
            write_varint32(buf, *rule);
            write_varint32(buf, table.register(text));
        }
    }
}
