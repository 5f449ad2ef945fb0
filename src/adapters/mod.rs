// Adapters layer: concrete feature stores.

pub mod memory;
pub mod shapefile;

pub use memory::MemoryStore;
pub use shapefile::ShapefileStore;
