pub mod archive;
pub mod etl;
pub mod guesser;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod writer;

pub use crate::domain::model::{
    ArtifactSet, DiscardedRow, Feature, FeatureCollection, IngestReport, ParseOutcome, RowFormat,
    TypeSchema, TypeTag, Value,
};
pub use crate::domain::ports::{ConfigProvider, FeatureStore, Pipeline};
pub use crate::utils::error::Result;
