use crate::domain::model::Feature;
use crate::domain::ports::FeatureStore;
use crate::utils::error::{IngestError, Result};

/// Owns an open transaction and releases it exactly once when dropped.
/// A transaction that was neither committed nor rolled back is rolled back
/// first.
pub struct TransactionGuard<'s, S: FeatureStore> {
    store: &'s mut S,
    tx: Option<S::Transaction>,
    settled: bool,
}

impl<'s, S: FeatureStore> TransactionGuard<'s, S> {
    pub fn begin(store: &'s mut S) -> Result<Self> {
        let tx = store.begin()?;
        Ok(Self {
            store,
            tx: Some(tx),
            settled: false,
        })
    }

    pub fn add(&mut self, features: &[Feature]) -> Result<()> {
        let tx = self.tx.as_mut().ok_or_else(released)?;
        self.store.add_features(tx, features)
    }

    pub fn commit(&mut self) -> Result<()> {
        let tx = self.tx.as_mut().ok_or_else(released)?;
        self.store.commit(tx)?;
        self.settled = true;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.settled = true;
        let tx = self.tx.as_mut().ok_or_else(released)?;
        self.store.rollback(tx)
    }
}

fn released() -> IngestError {
    IngestError::write("transaction already released")
}

impl<S: FeatureStore> Drop for TransactionGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(mut tx) = self.tx.take() {
            if !self.settled {
                if let Err(e) = self.store.rollback(&mut tx) {
                    tracing::error!("Rollback of abandoned transaction failed: {}", e);
                }
            }
            self.store.release(tx);
        }
    }
}

/// Add every feature in batches and commit, or roll back and return the
/// original failure. The store ends up with all features or none.
pub fn write_features<S: FeatureStore>(
    store: &mut S,
    features: &[Feature],
    batch_size: usize,
) -> Result<usize> {
    let mut tx = TransactionGuard::begin(store)?;

    let mut outcome = Ok(());
    for batch in features.chunks(batch_size.max(1)) {
        outcome = tx.add(batch);
        if outcome.is_err() {
            break;
        }
        tracing::debug!("Added batch of {} features", batch.len());
    }
    let outcome = outcome.and_then(|_| tx.commit());

    match outcome {
        Ok(()) => {
            tracing::info!("Committed {} features", features.len());
            Ok(features.len())
        }
        Err(err) => {
            tracing::error!("Write failed, rolling back: {}", err);
            if let Err(rollback_err) = tx.rollback() {
                tracing::error!("Rollback failed: {}", rollback_err);
            }
            Err(IngestError::write_caused_by(
                "features could not be written",
                err,
            ))
        }
    }
}
