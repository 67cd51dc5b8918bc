//! Basic usage example for GeoPack
//!
//! This example demonstrates the fundamental write pass:
//! - Creating an index file
//! - Writing a map family section from an in-memory spatial index
//! - Writing a metadata section
//! - Closing the file

use geopack::family::map::{MapEncoder, MapGeometry};
use geopack::family::write_metadata_section;
use geopack::{
    IndexWriter, ObjectStore, Options, SpatialIndex, TilePoint, TileRect, TreeEntry,
};
use std::collections::HashMap;

/// A toy staging store backed by a map.
struct MemoryStore(HashMap<u64, MapGeometry>);

impl ObjectStore for MemoryStore {
    type Object = MapGeometry;

    fn get(&self, id: u64) -> Option<MapGeometry> {
        self.0.get(&id).cloned()
    }
}

/// A toy spatial index: one leaf page holding every object.
struct OneLeaf {
    rect: TileRect,
    ids: Vec<u64>,
}

impl SpatialIndex for OneLeaf {
    fn root(&self) -> Option<TreeEntry> {
        Some(TreeEntry { rect: self.rect, id: 1, is_object: false })
    }

    fn children(&self, _page: u64) -> Vec<TreeEntry> {
        self.ids
            .iter()
            .map(|&id| TreeEntry { rect: self.rect, id, is_object: true })
            .collect()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let options = Options::default();
    let mut writer = IndexWriter::create("./example_region.gpk", options)?;
    println!("Index file created");

    // One road, staged by id.
    let road = MapGeometry {
        id: 1,
        area: false,
        points: vec![
            TilePoint::new(1056, 1056),
            TilePoint::new(1184, 1120),
            TilePoint::new(1312, 1056),
        ],
        inner_rings: vec![],
        label: None,
        always_label: false,
        type_ids: vec![4],
        extra_type_ids: vec![],
        names: vec![(1, "Main Street".to_string())],
    };
    let mut records = HashMap::new();
    records.insert(road.id, road);
    let store = MemoryStore(records);
    let index = OneLeaf { rect: TileRect::new(1024, 2048, 1024, 2048), ids: vec![1] };

    // Write the map family.
    println!("Writing map section...");
    let mut map = MapEncoder::new(&mut writer);
    map.begin("example-region")?;
    map.write_level(16, 18, TileRect::new(0, 1 << 20, 0, 1 << 20), &index, &store)?;
    map.end()?;

    // Write the metadata block.
    write_metadata_section(&mut writer, &[("owner", "example"), ("region", "demo")])?;

    writer.close()?;
    println!("Index file closed");

    Ok(())
}
