//! # GeoPack - A Streaming Geospatial Index Writer
//!
//! GeoPack serializes large geospatial record sets into one compact,
//! randomly-seekable binary file for offline map, routing, and search
//! applications. Output streams in a single forward pass (gigabyte-scale
//! files are never buffered in memory), yet the file is structured for
//! fast bounding-box range queries by readers that never load it whole.
//!
//! ## Architecture
//!
//! The writer substrate is a small set of composable pieces:
//!
//! - **Section frame stack**: nested, length-prefixed sections with a
//!   legal-transition table and backpatched sizes
//! - **Forward references**: "write now, patch later" slots for lengths
//!   and cross-section shifts
//! - **Coordinate codec**: delta/zigzag/varint point runs with write-time
//!   thinning and label placement
//! - **Box tree writer**: depth-first serialization of a pre-built
//!   spatial index as nested, delta-compressed bounding boxes
//! - **String tables and name trie**: per-block interning plus a
//!   randomly-addressable global name index
//! - **Family encoders**: thin map/route/POI/address/transit clients over
//!   the shared core
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use geopack::{IndexWriter, Options};
//! use geopack::family::write_metadata_section;
//!
//! # fn main() -> Result<(), geopack::Error> {
//! let mut writer = IndexWriter::create("./region.gpk", Options::default())?;
//! write_metadata_section(&mut writer, &[("owner", "example")])?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! The writer is strictly single-threaded and synchronous: one writer
//! owns one file for the whole run. An aborted run leaves an invalid
//! partial file that must be discarded and regenerated.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod boxtree;
pub mod codec;
pub mod config;
pub mod error;
pub mod family;
pub mod strings;
pub mod tile;
pub mod writer;

// Re-exports
pub use boxtree::{BoxTreeWriter, PendingBlock, SpatialIndex, TreeEntry};
pub use config::Options;
pub use error::{Error, Result};
pub use family::ObjectStore;
pub use strings::{IndexedStringTrie, StringTable};
pub use tile::{TilePoint, TileRect};
pub use writer::{FileRef, IndexWriter, PatchWidth, SectionKind, FORMAT_VERSION, MAGIC};
