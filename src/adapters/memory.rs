use crate::domain::model::{Feature, TypeSchema};
use crate::domain::ports::FeatureStore;
use crate::utils::error::{IngestError, Result};

/// Keeps committed features in memory. Pending features live in the
/// transaction and are invisible until commit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    schema: Option<TypeSchema>,
    committed: Vec<Feature>,
    open_transactions: usize,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct MemoryTransaction {
    pending: Vec<Feature>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> Option<&TypeSchema> {
        self.schema.as_ref()
    }

    pub fn features(&self) -> &[Feature] {
        &self.committed
    }

    pub fn open_transactions(&self) -> usize {
        self.open_transactions
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(IngestError::write("memory store is closed"));
        }
        Ok(())
    }
}

impl FeatureStore for MemoryStore {
    type Transaction = MemoryTransaction;

    fn create_schema(&mut self, spec: &str) -> Result<()> {
        self.ensure_open()?;
        self.schema = Some(TypeSchema::from_spec("memory", spec)?);
        Ok(())
    }

    fn begin(&mut self) -> Result<Self::Transaction> {
        self.ensure_open()?;
        if self.schema.is_none() {
            return Err(IngestError::write("schema must be created before writing"));
        }
        self.open_transactions += 1;
        Ok(MemoryTransaction::default())
    }

    fn add_features(&mut self, tx: &mut Self::Transaction, features: &[Feature]) -> Result<()> {
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| IngestError::write("schema must be created before writing"))?;
        for feature in features {
            if feature.values.len() != schema.len() {
                return Err(IngestError::write(format!(
                    "feature {} has {} values, schema has {}",
                    feature.fid,
                    feature.values.len(),
                    schema.len()
                )));
            }
            let mismatch = feature
                .values
                .iter()
                .zip(schema.columns())
                .find(|(value, column)| value.tag() != column.tag);
            if let Some((value, column)) = mismatch {
                return Err(IngestError::write(format!(
                    "feature {} has a {} value in {} column '{}'",
                    feature.fid,
                    value.tag(),
                    column.tag,
                    column.name
                )));
            }
        }
        tx.pending.extend_from_slice(features);
        Ok(())
    }

    fn commit(&mut self, tx: &mut Self::Transaction) -> Result<()> {
        self.ensure_open()?;
        self.committed.append(&mut tx.pending);
        Ok(())
    }

    fn rollback(&mut self, tx: &mut Self::Transaction) -> Result<()> {
        tx.pending.clear();
        Ok(())
    }

    fn release(&mut self, tx: Self::Transaction) {
        self.open_transactions = self.open_transactions.saturating_sub(1);
        drop(tx);
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
