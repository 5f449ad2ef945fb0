use crate::domain::model::{Feature, ParseOutcome, RowFormat, TypeSchema};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Destination that receives parsed features under a transaction.
pub trait FeatureStore {
    type Transaction;

    fn create_schema(&mut self, spec: &str) -> Result<()>;
    fn begin(&mut self) -> Result<Self::Transaction>;
    fn add_features(&mut self, tx: &mut Self::Transaction, features: &[Feature]) -> Result<()>;
    fn commit(&mut self, tx: &mut Self::Transaction) -> Result<()>;
    fn rollback(&mut self, tx: &mut Self::Transaction) -> Result<()>;

    /// Frees the transaction. Called exactly once per `begin`.
    fn release(&mut self, tx: Self::Transaction) {
        drop(tx);
    }

    fn close(&mut self) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &Path;
    fn output_dir(&self) -> &Path;
    fn destination_name(&self) -> String;
    fn schema_spec(&self) -> Option<&str>;
    fn lat_lon(&self) -> Option<(&str, &str)>;
    fn row_format(&self) -> &RowFormat;
    fn batch_size(&self) -> usize;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn infer_schema(&self) -> Result<TypeSchema>;
    async fn extract(&self, schema: &TypeSchema) -> Result<ParseOutcome>;
    async fn load(&self, schema: &TypeSchema, outcome: &ParseOutcome) -> Result<PathBuf>;
}
