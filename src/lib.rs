pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;
pub use config::{toml_config::TomlConfig, IngestConfig};

pub use adapters::{MemoryStore, ShapefileStore};
pub use core::{etl::IngestEngine, pipeline::CsvIngestPipeline};
pub use domain::model::{IngestReport, TypeSchema, TypeTag};
pub use utils::error::{IngestError, Result};
