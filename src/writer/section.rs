//! Section kinds, the legal-nesting table, and the frame stack entry.
//!
//! The original three parallel stacks (state, size references, bounds)
//! collapse into one stack of [`Frame`]s, so a pop always yields one
//! coherent record and the invariant checks live in one place.

use crate::tile::TileRect;
use crate::writer::patch::{FileRef, PatchWidth};

/// The kind tag of a section. The numeric value is the on-disk tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectionKind {
    /// Implicit outermost frame; never written to the file.
    Root = 0,
    /// Map geometry family.
    MapIndex = 1,
    /// One zoom range inside the map family.
    MapLevel = 2,
    /// A bounding-box tree node in the map family.
    MapBox = 3,
    /// A map data block referenced from a box leaf.
    MapBlock = 4,
    /// Routing graph family.
    RouteIndex = 5,
    /// A bounding-box tree node in the routing family.
    RouteBox = 6,
    /// A routing data block.
    RouteBlock = 7,
    /// Address family.
    AddressIndex = 8,
    /// A block of address entries.
    CityBlock = 9,
    /// A searchable name index (indexed string trie).
    NameIndex = 10,
    /// Points-of-interest family.
    PoiIndex = 11,
    /// A bounding-box tree node in the POI family.
    PoiBox = 12,
    /// A POI data block.
    PoiData = 13,
    /// Public transit family.
    TransitIndex = 14,
    /// A bounding-box tree node holding transit stops inline.
    TransitStopTree = 15,
    /// The transit route list.
    TransitRoutes = 16,
    /// Transit string table, shared by stops and routes.
    TransitStrings = 17,
    /// Long-distance precomputed routing graph; 8-byte length.
    GraphIndex = 18,
    /// Optional owner / metadata block.
    Metadata = 19,
}

impl SectionKind {
    /// The on-disk tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Width of this section's length field. Only the long-distance graph
    /// uses the 8-byte variant, for very large instances.
    pub fn length_width(self) -> PatchWidth {
        match self {
            SectionKind::GraphIndex => PatchWidth::U64,
            _ => PatchWidth::U32,
        }
    }

    /// Whether `child` may open while `self` is the innermost section.
    pub fn allows_child(self, child: SectionKind) -> bool {
        use SectionKind::*;
        match self {
            Root => matches!(
                child,
                MapIndex | RouteIndex | AddressIndex | PoiIndex | TransitIndex | GraphIndex
                    | Metadata
            ),
            MapIndex => matches!(child, MapLevel),
            MapLevel => matches!(child, MapBox | MapBlock),
            MapBox => matches!(child, MapBox),
            RouteIndex => matches!(child, RouteBox | RouteBlock),
            RouteBox => matches!(child, RouteBox),
            AddressIndex => matches!(child, CityBlock | NameIndex),
            PoiIndex => matches!(child, PoiBox | PoiData | NameIndex),
            PoiBox => matches!(child, PoiBox),
            TransitIndex => matches!(child, TransitStopTree | TransitRoutes | TransitStrings),
            TransitStopTree => matches!(child, TransitStopTree),
            MapBlock | RouteBlock | CityBlock | NameIndex | PoiData | TransitRoutes
            | TransitStrings | GraphIndex | Metadata => false,
        }
    }
}

/// One entry of the section stack: the open section's kind, its pending
/// length reference, and the bounds context it pushed (if any).
#[derive(Debug)]
pub struct Frame {
    /// Kind of the open section.
    pub kind: SectionKind,
    /// Pending length patch, absent only for the root frame.
    pub size_ref: Option<FileRef>,
    /// Bounds context contributed by this section.
    pub bounds: Option<TileRect>,
}
